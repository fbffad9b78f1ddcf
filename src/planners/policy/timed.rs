use std::io;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use super::{LocalObservation, PolicyError, PolicySuggester};
use crate::infra::Action;

struct SuggestRequest {
    observation: LocalObservation,
    deadline: Instant,
    reply: mpsc::Sender<Result<Action, PolicyError>>,
}

/// Runs a policy on a dedicated worker thread and bounds every call by a deadline.
///
/// The wrapped policy only needs to be `Send`; it is owned by the worker, which
/// lets models that are not `Sync` be shared by all robots. A late answer is
/// discarded and the call reports [`PolicyError::Timeout`]. Requests whose caller
/// has already timed out are dropped unanswered, so a slow model never builds a
/// backlog of stale work.
pub struct TimedPolicy {
    name: String,
    timeout: Duration,
    requests: Mutex<mpsc::Sender<SuggestRequest>>,
}

impl TimedPolicy {
    pub fn spawn<P>(policy: P, timeout: Duration) -> io::Result<Self>
    where
        P: PolicySuggester + Send + 'static,
    {
        let name = policy.name().to_string();
        let (request_tx, request_rx) = mpsc::channel::<SuggestRequest>();

        thread::Builder::new()
            .name(format!("policy-{}", name))
            .spawn(move || {
                for request in request_rx {
                    if Instant::now() >= request.deadline {
                        trace!("Skipping expired policy request");
                        continue;
                    }
                    let result = policy.suggest(&request.observation);
                    // The caller may have given up already.
                    let _ = request.reply.send(result);
                }
                debug!("Policy worker shutting down");
            })?;

        Ok(Self {
            name,
            timeout,
            requests: Mutex::new(request_tx),
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl PolicySuggester for TimedPolicy {
    fn suggest(&self, observation: &LocalObservation) -> Result<Action, PolicyError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        let request = SuggestRequest {
            observation: observation.clone(),
            deadline: Instant::now() + self.timeout,
            reply: reply_tx,
        };

        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .send(request)
            .map_err(|_| PolicyError::Unavailable)?;

        match reply_rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                warn!("Policy {} timed out after {:?}", self.name, self.timeout);
                Err(PolicyError::Timeout(self.timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(PolicyError::Unavailable),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::Position;
    use crate::state::Grid;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct Fixed(Action);

    impl PolicySuggester for Fixed {
        fn suggest(&self, _observation: &LocalObservation) -> Result<Action, PolicyError> {
            Ok(self.0)
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct Sleepy(Duration);

    impl PolicySuggester for Sleepy {
        fn suggest(&self, _observation: &LocalObservation) -> Result<Action, PolicyError> {
            thread::sleep(self.0);
            Ok(Action::Up)
        }

        fn name(&self) -> &str {
            "sleepy"
        }
    }

    /// Slow until switched to fast; counts the requests it actually ran.
    struct Throttled {
        delay: Duration,
        slow: Arc<AtomicBool>,
        runs: Arc<AtomicUsize>,
    }

    impl PolicySuggester for Throttled {
        fn suggest(&self, _observation: &LocalObservation) -> Result<Action, PolicyError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.slow.load(Ordering::SeqCst) {
                thread::sleep(self.delay);
            }
            Ok(Action::Down)
        }

        fn name(&self) -> &str {
            "throttled"
        }
    }

    struct Panicky;

    impl PolicySuggester for Panicky {
        fn suggest(&self, _observation: &LocalObservation) -> Result<Action, PolicyError> {
            panic!("model exploded");
        }

        fn name(&self) -> &str {
            "panicky"
        }
    }

    fn observation() -> LocalObservation {
        LocalObservation::encode(Position::new(1, 1), Position::new(3, 3), &Grid::open(5, 5), 2)
    }

    #[test]
    fn test_forwards_suggestion() {
        let policy = TimedPolicy::spawn(Fixed(Action::Left), Duration::from_secs(5)).unwrap();
        assert_eq!(policy.name(), "fixed");
        assert!(policy.is_available());
        assert_eq!(policy.suggest(&observation()), Ok(Action::Left));
        assert_eq!(policy.suggest(&observation()), Ok(Action::Left));
    }

    #[test]
    fn test_slow_policy_times_out() {
        let timeout = Duration::from_millis(20);
        let policy = TimedPolicy::spawn(Sleepy(Duration::from_millis(500)), timeout).unwrap();
        assert_eq!(policy.suggest(&observation()), Err(PolicyError::Timeout(timeout)));
    }

    #[test]
    fn test_dead_worker_is_unavailable() {
        let policy = TimedPolicy::spawn(Panicky, Duration::from_secs(5)).unwrap();
        assert_eq!(policy.suggest(&observation()), Err(PolicyError::Unavailable));
        assert_eq!(policy.suggest(&observation()), Err(PolicyError::Unavailable));
    }

    #[test]
    fn test_timed_out_requests_do_not_pile_up() {
        let slow = Arc::new(AtomicBool::new(true));
        let runs = Arc::new(AtomicUsize::new(0));
        let timeout = Duration::from_millis(20);
        let policy = TimedPolicy::spawn(
            Throttled {
                delay: Duration::from_millis(100),
                slow: Arc::clone(&slow),
                runs: Arc::clone(&runs),
            },
            timeout,
        )
        .unwrap();

        let burst = 10;
        for _ in 0..burst {
            assert_eq!(policy.suggest(&observation()), Err(PolicyError::Timeout(timeout)));
        }

        // Let the worker finish whatever it was running when the burst ended.
        slow.store(false, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(250));
        let ran = runs.load(Ordering::SeqCst);
        assert!(ran < burst / 2, "worker ran {ran} of {burst} stale requests");

        assert_eq!(policy.suggest(&observation()), Ok(Action::Down));
        assert_eq!(runs.load(Ordering::SeqCst), ran + 1);
    }
}

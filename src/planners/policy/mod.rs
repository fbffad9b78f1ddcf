//! Optional action-suggestion capability.
//!
//! A policy looks at a [`LocalObservation`] and proposes an [`Action`]. The
//! engine treats every suggestion as advisory: it validates the move against
//! the grid and falls back to path planning when the suggestion is unusable or
//! the policy fails.
//!
//! ```text
//! LocalObservation ──► PolicySuggester::suggest ──► Action
//!                         │
//!                         ├── NoPolicy      (absent, never consulted)
//!                         ├── TimedPolicy   (worker thread + deadline)
//!                         └── NetworkPolicy (trained network, feature `rl`)
//! ```

mod observation;
mod timed;

#[cfg(feature = "rl")]
mod network;

use thiserror::Error;

use crate::infra::Action;

pub use observation::{DEFAULT_RADIUS, LocalObservation};
pub use timed::TimedPolicy;

#[cfg(feature = "rl")]
pub use network::{NetworkPolicy, PolicyNetwork, PolicyNetworkConfig};

/// Reasons a suggestion could not be produced. Never surfaced to callers of the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("policy is unavailable")]
    Unavailable,

    #[error("policy did not answer within {0:?}")]
    Timeout(std::time::Duration),

    #[error("policy produced out-of-range action {0}")]
    InvalidAction(i64),

    #[error("policy observation has {actual} features, expected {expected}")]
    ObservationSize { expected: usize, actual: usize },

    #[error("policy inference failed: {0}")]
    Inference(String),

    #[error("failed to load policy: {0}")]
    Load(String),
}

/// Capability that proposes an action for a local observation.
pub trait PolicySuggester {
    fn suggest(&self, observation: &LocalObservation) -> Result<Action, PolicyError>;

    /// Whether the engine should consult this policy at all.
    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &str;
}

/// The absent policy: the engine always plans paths itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPolicy;

impl PolicySuggester for NoPolicy {
    fn suggest(&self, _observation: &LocalObservation) -> Result<Action, PolicyError> {
        Err(PolicyError::Unavailable)
    }

    fn is_available(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "none"
    }
}

use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, warn};

use super::dispatcher::TaskQueueDispatcher;
use super::policy::{DEFAULT_RADIUS, LocalObservation, NoPolicy, PolicySuggester};
use super::stuck::StuckConfig;
use crate::error::EngineError;
use crate::infra::{Action, DecisionObserver, GridPathfinder, LoggingObserver, Position, RobotId};
use crate::state::{Grid, RobotState, RobotStates};

/// Tunables of the decision engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub stuck: StuckConfig,
    /// Ticks of forced path planning after an oscillation is detected
    pub cooldown_ticks: u32,
    /// Half-width of the observation window handed to the policy
    pub observation_radius: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stuck: StuckConfig::default(),
            cooldown_ticks: 5,
            observation_radius: DEFAULT_RADIUS,
        }
    }
}

/// Which branch of the engine produced an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecisionMode {
    /// No work left for the robot
    Idle,
    /// Forced path planning while recovering from oscillation
    Cooldown,
    /// Oscillation detected on this tick
    Unstuck,
    /// Policy suggestion accepted
    Policy,
    /// Policy consulted but its suggestion was not used
    Fallback,
    /// No policy configured
    Pathfinder,
}

/// Result of one decision request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub action: Action,
    pub target: Option<Position>,
    /// Goals still queued for the robot, current target included
    pub remaining_tasks: usize,
    pub completed: bool,
    pub mode: DecisionMode,
}

impl Decision {
    fn idle() -> Self {
        Self {
            action: Action::Stay,
            target: None,
            remaining_tasks: 0,
            completed: true,
            mode: DecisionMode::Idle,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStatus {
    pub initialized: bool,
    pub robot_count: usize,
    pub generation: u64,
    pub remaining_tasks: usize,
    pub policy: String,
}

/// Everything created by one environment initialization.
#[derive(Debug)]
struct Generation {
    id: u64,
    dispatcher: TaskQueueDispatcher,
    robots: RobotStates,
}

/// Per-tick action selection for a fleet of robots.
///
/// Combines the task queues, the oscillation detector with its cooldown, an
/// optional policy and the grid pathfinder. Decisions for different robots run
/// in parallel; decisions for the same robot are serialized by that robot's lock.
///
/// Reinitialization swaps in a whole new generation. A decision already in
/// flight finishes against the generation it started with.
pub struct DecisionEngine {
    config: EngineConfig,
    policy: Arc<dyn PolicySuggester + Send + Sync>,
    observer: Arc<dyn DecisionObserver>,
    current: RwLock<Option<Arc<Generation>>>,
}

impl DecisionEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            policy: Arc::new(NoPolicy),
            observer: Arc::new(LoggingObserver),
            current: RwLock::new(None),
        }
    }

    pub fn with_policy<P>(mut self, policy: P) -> Self
    where
        P: PolicySuggester + Send + Sync + 'static,
    {
        self.policy = Arc::new(policy);
        self
    }

    pub fn with_observer<O>(mut self, observer: O) -> Self
    where
        O: DecisionObserver + 'static,
    {
        self.observer = Arc::new(observer);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn policy_name(&self) -> &str {
        self.policy.name()
    }

    /// Install a new environment, discarding all queues and per-robot state.
    ///
    /// Returns the new generation number. Invalid input leaves the current
    /// environment in place.
    pub fn initialize(&self, robot_count: usize, task_pool: &[Position]) -> Result<u64, EngineError> {
        let mut dispatcher = TaskQueueDispatcher::new();
        dispatcher.initialize(robot_count, task_pool)?;

        let id = {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            let id = current.as_ref().map_or(0, |generation| generation.id) + 1;
            *current = Some(Arc::new(Generation {
                id,
                dispatcher,
                robots: RobotStates::new(self.config.stuck),
            }));
            id
        };

        self.observer
            .on_environment_initialized(id, robot_count, task_pool.len());
        Ok(id)
    }

    /// Decide the next move of `robot_id`, currently at `pos` on `grid`.
    pub fn decide(&self, robot_id: RobotId, pos: Position, grid: &Grid) -> Result<Decision, EngineError> {
        let generation = self.snapshot().ok_or(EngineError::NotInitialized)?;

        let robot_count = generation.dispatcher.robot_count();
        if robot_id >= robot_count {
            return Err(EngineError::UnknownRobot {
                robot_id,
                robot_count,
            });
        }
        if !grid.contains(pos) {
            return Err(EngineError::PositionOutOfBounds {
                position: pos,
                height: grid.height(),
                width: grid.width(),
            });
        }

        let slot = generation.robots.slot(robot_id);
        let mut robot = slot.lock().unwrap_or_else(PoisonError::into_inner);
        let decision = self.decide_for(&generation.dispatcher, robot_id, &mut robot, pos, grid);

        self.observer.on_decision(robot_id, pos, &decision);
        Ok(decision)
    }

    pub fn status(&self) -> EngineStatus {
        let generation = self.snapshot();
        EngineStatus {
            initialized: generation.is_some(),
            robot_count: generation
                .as_ref()
                .map_or(0, |g| g.dispatcher.robot_count()),
            generation: generation.as_ref().map_or(0, |g| g.id),
            remaining_tasks: generation
                .as_ref()
                .map_or(0, |g| g.dispatcher.total_remaining()),
            policy: self.policy.name().to_string(),
        }
    }

    /// Copy of a robot's transient state, if it has made a decision this generation.
    pub fn robot_state(&self, robot_id: RobotId) -> Option<RobotState> {
        let generation = self.snapshot()?;
        let slot = generation.robots.get(robot_id)?;
        let state = slot.lock().unwrap_or_else(PoisonError::into_inner).clone();
        Some(state)
    }

    pub fn current_goal(&self, robot_id: RobotId) -> Option<Position> {
        self.snapshot()?.dispatcher.current_goal(robot_id)
    }

    fn snapshot(&self) -> Option<Arc<Generation>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn decide_for(
        &self,
        dispatcher: &TaskQueueDispatcher,
        robot_id: RobotId,
        robot: &mut RobotState,
        pos: Position,
        grid: &Grid,
    ) -> Decision {
        let Some(mut target) = dispatcher.current_goal(robot_id) else {
            return Decision::idle();
        };

        if pos == target {
            dispatcher.complete_current(robot_id);
            robot.detector.clear();
            self.observer
                .on_goal_completed(robot_id, target, dispatcher.remaining(robot_id));

            match dispatcher.current_goal(robot_id) {
                Some(next) => target = next,
                None => return Decision::idle(),
            }
        }

        let (action, mode) = self.select_action(robot_id, robot, pos, target, grid);

        Decision {
            action,
            target: Some(target),
            remaining_tasks: dispatcher.remaining(robot_id),
            completed: false,
            mode,
        }
    }

    fn select_action(
        &self,
        robot_id: RobotId,
        robot: &mut RobotState,
        pos: Position,
        target: Position,
        grid: &Grid,
    ) -> (Action, DecisionMode) {
        if robot.in_cooldown() {
            robot.cooldown -= 1;
            debug!(robot_id, remaining = robot.cooldown, "Cooldown tick");
            return (
                GridPathfinder::next_action(pos, target, grid),
                DecisionMode::Cooldown,
            );
        }

        if robot.detector.observe(pos) {
            robot.cooldown = self.config.cooldown_ticks;
            robot.detector.clear();
            self.observer.on_stuck_detected(robot_id, pos);
            return (
                GridPathfinder::next_action(pos, target, grid),
                DecisionMode::Unstuck,
            );
        }

        if self.policy.is_available() {
            return self.consult_policy(robot_id, pos, target, grid);
        }

        (
            GridPathfinder::next_action(pos, target, grid),
            DecisionMode::Pathfinder,
        )
    }

    fn consult_policy(
        &self,
        robot_id: RobotId,
        pos: Position,
        target: Position,
        grid: &Grid,
    ) -> (Action, DecisionMode) {
        let observation = LocalObservation::encode(pos, target, grid, self.config.observation_radius);

        let (suggested, reason) = match self.policy.suggest(&observation) {
            // A suggested Stay counts as no suggestion, even when waiting would be right.
            Ok(Action::Stay) => (Some(Action::Stay), "stay is not accepted".to_string()),
            Ok(action) if grid.is_free(pos.step(action)) => return (action, DecisionMode::Policy),
            Ok(action) => (
                Some(action),
                format!("{} leads to {}", action, pos.step(action)),
            ),
            Err(err) => {
                warn!(robot_id, "Policy {} unavailable: {}", self.policy.name(), err);
                (None, err.to_string())
            }
        };

        self.observer.on_policy_rejected(robot_id, suggested, &reason);
        (
            GridPathfinder::next_action(pos, target, grid),
            DecisionMode::Fallback,
        )
    }
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigurationError;
    use crate::planners::MAX_ROBOTS;
    use crate::planners::policy::PolicyError;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        action: Action,
        calls: Arc<AtomicUsize>,
    }

    impl Scripted {
        fn new(action: Action) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    action,
                    calls: Arc::clone(&calls),
                },
                calls,
            )
        }
    }

    impl PolicySuggester for Scripted {
        fn suggest(&self, _observation: &LocalObservation) -> Result<Action, PolicyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.action)
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    struct Broken;

    impl PolicySuggester for Broken {
        fn suggest(&self, _observation: &LocalObservation) -> Result<Action, PolicyError> {
            Err(PolicyError::Inference("weights missing".to_string()))
        }

        fn name(&self) -> &str {
            "broken"
        }
    }

    #[derive(Default)]
    struct Recorder {
        stuck: AtomicUsize,
        completed: Mutex<Vec<(RobotId, Position)>>,
        rejected: AtomicUsize,
    }

    impl DecisionObserver for Arc<Recorder> {
        fn on_goal_completed(&self, robot_id: RobotId, goal: Position, _remaining: usize) {
            self.completed.lock().unwrap().push((robot_id, goal));
        }

        fn on_stuck_detected(&self, _robot_id: RobotId, _position: Position) {
            self.stuck.fetch_add(1, Ordering::SeqCst);
        }

        fn on_policy_rejected(&self, _robot_id: RobotId, _suggested: Option<Action>, _reason: &str) {
            self.rejected.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Apply decisions until the robot reports completion; returns the moves made.
    fn drive(engine: &DecisionEngine, robot_id: RobotId, mut pos: Position, grid: &Grid) -> Vec<Action> {
        let mut moves = Vec::new();
        for _ in 0..200 {
            let decision = engine.decide(robot_id, pos, grid).unwrap();
            if decision.completed {
                return moves;
            }
            assert_ne!(decision.action, Action::Stay, "robot stalled at {pos}");
            pos = pos.step(decision.action);
            assert!(grid.is_free(pos));
            moves.push(decision.action);
        }
        panic!("robot {robot_id} never finished");
    }

    #[test]
    fn test_decide_before_initialize_is_rejected() {
        let engine = DecisionEngine::default();
        let grid = Grid::open(3, 3);
        assert_eq!(
            engine.decide(0, Position::new(0, 0), &grid),
            Err(EngineError::NotInitialized)
        );
        assert!(!engine.status().initialized);
    }

    #[test]
    fn test_unknown_robot_is_rejected_without_side_effects() {
        let engine = DecisionEngine::default();
        engine.initialize(2, &[Position::new(2, 2)]).unwrap();
        let grid = Grid::open(3, 3);

        assert_eq!(
            engine.decide(5, Position::new(0, 0), &grid),
            Err(EngineError::UnknownRobot {
                robot_id: 5,
                robot_count: 2
            })
        );
        assert!(engine.robot_state(5).is_none());

        let decision = engine.decide(0, Position::new(0, 0), &grid).unwrap();
        assert_eq!(decision.target, Some(Position::new(2, 2)));
    }

    #[test]
    fn test_out_of_bounds_position_is_rejected() {
        let engine = DecisionEngine::default();
        engine.initialize(1, &[Position::new(1, 1)]).unwrap();
        let grid = Grid::open(3, 3);

        assert_eq!(
            engine.decide(0, Position::new(3, 0), &grid),
            Err(EngineError::PositionOutOfBounds {
                position: Position::new(3, 0),
                height: 3,
                width: 3
            })
        );
        assert!(engine.robot_state(0).is_none());
        assert_eq!(engine.current_goal(0), Some(Position::new(1, 1)));
    }

    #[test]
    fn test_invalid_environment_keeps_previous_generation() {
        let engine = DecisionEngine::default();
        let generation = engine.initialize(1, &[Position::new(1, 1)]).unwrap();

        assert!(matches!(
            engine.initialize(0, &[]),
            Err(EngineError::Configuration(_))
        ));
        assert_eq!(engine.status().generation, generation);
        assert_eq!(engine.current_goal(0), Some(Position::new(1, 1)));
    }

    #[test]
    fn test_center_obstacle_scenario() {
        let engine = DecisionEngine::default();
        engine.initialize(1, &[Position::new(4, 4)]).unwrap();
        let grid = Grid::open(5, 5).with_blocked(&[Position::new(2, 2)]);

        let first = engine.decide(0, Position::new(0, 0), &grid).unwrap();
        assert!(matches!(first.action, Action::Down | Action::Right));
        assert_eq!(first.mode, DecisionMode::Pathfinder);
        assert_eq!(first.remaining_tasks, 1);

        let moves = drive(&engine, 0, Position::new(0, 0), &grid);
        assert_eq!(moves.len(), 8);
    }

    #[test]
    fn test_arrival_retargets_in_same_call() {
        let engine = DecisionEngine::default();
        engine
            .initialize(1, &[Position::new(0, 0), Position::new(0, 3)])
            .unwrap();
        let grid = Grid::open(4, 4);

        let decision = engine.decide(0, Position::new(0, 0), &grid).unwrap();
        assert!(!decision.completed);
        assert_eq!(decision.target, Some(Position::new(0, 3)));
        assert_eq!(decision.action, Action::Right);
        assert_eq!(decision.remaining_tasks, 1);
    }

    #[test]
    fn test_arrival_at_last_goal_completes() {
        let engine = DecisionEngine::default();
        engine.initialize(1, &[Position::new(1, 1)]).unwrap();
        let grid = Grid::open(3, 3);

        let decision = engine.decide(0, Position::new(1, 1), &grid).unwrap();
        assert!(decision.completed);
        assert_eq!(decision.action, Action::Stay);
        assert_eq!(decision.target, None);
        assert_eq!(engine.status().remaining_tasks, 0);
    }

    #[test]
    fn test_two_robots_finish_and_stay_completed() {
        let recorder = Arc::new(Recorder::default());
        let engine = DecisionEngine::default().with_observer(Arc::clone(&recorder));
        let pool = [Position::new(0, 4), Position::new(4, 0)];
        engine.initialize(2, &pool).unwrap();
        let grid = Grid::open(5, 5);

        drive(&engine, 0, Position::new(0, 0), &grid);
        drive(&engine, 1, Position::new(4, 4), &grid);

        for _ in 0..3 {
            for (robot_id, pos) in [(0, Position::new(0, 4)), (1, Position::new(4, 0))] {
                let decision = engine.decide(robot_id, pos, &grid).unwrap();
                assert!(decision.completed);
                assert_eq!(decision.action, Action::Stay);
                assert_eq!(decision.mode, DecisionMode::Idle);
            }
        }
        assert_eq!(
            *recorder.completed.lock().unwrap(),
            vec![(0, pool[0]), (1, pool[1])]
        );
    }

    #[test]
    fn test_cooldown_overrides_policy_for_five_ticks() {
        let (policy, calls) = Scripted::new(Action::Down);
        let recorder = Arc::new(Recorder::default());
        let engine = DecisionEngine::default()
            .with_policy(policy)
            .with_observer(Arc::clone(&recorder));
        engine.initialize(1, &[Position::new(0, 0)]).unwrap();
        let grid = Grid::open(5, 5);
        let pinned = Position::new(2, 2);
        let planned = GridPathfinder::next_action(pinned, Position::new(0, 0), &grid);

        let decisions: Vec<Decision> = (0..10)
            .map(|_| engine.decide(0, pinned, &grid).unwrap())
            .collect();
        let modes: Vec<DecisionMode> = decisions.iter().map(|d| d.mode).collect();

        use DecisionMode::*;
        assert_eq!(
            modes,
            vec![Policy, Policy, Policy, Unstuck, Cooldown, Cooldown, Cooldown, Cooldown, Cooldown, Policy]
        );
        for decision in &decisions[3..9] {
            assert_eq!(decision.action, planned);
        }
        assert_eq!(decisions[9].action, Action::Down);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(recorder.stuck.load(Ordering::SeqCst), 1);
        assert_eq!(engine.robot_state(0).unwrap().cooldown, 0);
    }

    #[test]
    fn test_stuck_detection_without_policy() {
        let engine = DecisionEngine::default();
        engine.initialize(1, &[Position::new(0, 3)]).unwrap();
        let grid = Grid::open(4, 4);
        let a = Position::new(3, 0);
        let b = Position::new(3, 1);

        let modes: Vec<DecisionMode> = [a, b, a, b, a]
            .into_iter()
            .map(|pos| engine.decide(0, pos, &grid).unwrap().mode)
            .collect();
        assert_eq!(
            modes,
            vec![
                DecisionMode::Pathfinder,
                DecisionMode::Pathfinder,
                DecisionMode::Pathfinder,
                DecisionMode::Unstuck,
                DecisionMode::Cooldown
            ]
        );
        let state = engine.robot_state(0).unwrap();
        assert_eq!(state.cooldown, 4);
        assert!(state.detector.is_empty());
    }

    #[test]
    fn test_invalid_policy_suggestions_fall_back() {
        let grid = Grid::open(3, 3).with_blocked(&[Position::new(1, 2)]);
        let pos = Position::new(1, 1);
        let target = Position::new(0, 0);
        let planned = GridPathfinder::next_action(pos, target, &grid);

        for suggestion in [Action::Stay, Action::Right] {
            let (policy, calls) = Scripted::new(suggestion);
            let recorder = Arc::new(Recorder::default());
            let engine = DecisionEngine::default()
                .with_policy(policy)
                .with_observer(Arc::clone(&recorder));
            engine.initialize(1, &[target]).unwrap();

            let decision = engine.decide(0, pos, &grid).unwrap();
            assert_eq!(decision.mode, DecisionMode::Fallback);
            assert_eq!(decision.action, planned);
            assert_eq!(calls.load(Ordering::SeqCst), 1);
            assert_eq!(recorder.rejected.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn test_suggestion_off_grid_falls_back() {
        let (policy, _) = Scripted::new(Action::Up);
        let engine = DecisionEngine::default().with_policy(policy);
        engine.initialize(1, &[Position::new(2, 2)]).unwrap();
        let grid = Grid::open(3, 3);

        let decision = engine.decide(0, Position::new(0, 0), &grid).unwrap();
        assert_eq!(decision.mode, DecisionMode::Fallback);
        assert!(matches!(decision.action, Action::Down | Action::Right));
    }

    #[test]
    fn test_failing_policy_degrades_to_pathfinding() {
        let engine = DecisionEngine::default().with_policy(Broken);
        engine.initialize(1, &[Position::new(3, 3)]).unwrap();
        let grid = Grid::open(4, 4);

        let decision = engine.decide(0, Position::new(0, 0), &grid).unwrap();
        assert_eq!(decision.mode, DecisionMode::Fallback);
        assert_ne!(decision.action, Action::Stay);
        assert_eq!(engine.status().policy, "broken");
    }

    #[test]
    fn test_reinitialize_discards_robot_state() {
        let engine = DecisionEngine::default();
        let first = engine.initialize(1, &[Position::new(0, 0)]).unwrap();
        let grid = Grid::open(3, 3);
        let pinned = Position::new(2, 2);
        for _ in 0..4 {
            engine.decide(0, pinned, &grid).unwrap();
        }
        assert_eq!(engine.robot_state(0).unwrap().cooldown, 5);

        let second = engine
            .initialize(2, &[Position::new(0, 2), Position::new(2, 0)])
            .unwrap();
        assert_eq!(second, first + 1);
        assert!(engine.robot_state(0).is_none());

        let decision = engine.decide(0, pinned, &grid).unwrap();
        assert_eq!(decision.mode, DecisionMode::Pathfinder);
        assert_eq!(decision.target, Some(Position::new(0, 2)));
        assert_eq!(engine.status().robot_count, 2);
    }

    #[test]
    fn test_in_flight_snapshot_survives_reinitialize() {
        let engine = DecisionEngine::default();
        engine.initialize(1, &[Position::new(1, 1)]).unwrap();
        let old = engine.snapshot().unwrap();

        engine.initialize(3, &[Position::new(2, 2)]).unwrap();

        assert_eq!(old.dispatcher.robot_count(), 1);
        assert_eq!(old.dispatcher.current_goal(0), Some(Position::new(1, 1)));
        assert_eq!(engine.current_goal(0), Some(Position::new(2, 2)));
    }

    #[test]
    fn test_oversized_fleet_is_rejected() {
        let engine = DecisionEngine::default();
        let generation = engine.initialize(1, &[Position::new(1, 1)]).unwrap();

        assert_eq!(
            engine.initialize(usize::MAX, &[Position::new(1, 1)]),
            Err(EngineError::Configuration(ConfigurationError::TooManyRobots {
                requested: usize::MAX,
                max: MAX_ROBOTS
            }))
        );
        assert_eq!(engine.status().generation, generation);
        assert_eq!(engine.status().robot_count, 1);
    }

    #[test]
    fn test_robots_decide_concurrently() {
        let engine = DecisionEngine::default();
        let pool: Vec<Position> = (0..8).map(|i| Position::new(i, 7 - i)).collect();
        engine.initialize(4, &pool).unwrap();
        let grid = Grid::open(8, 8).with_blocked(&[Position::new(3, 3), Position::new(4, 4)]);

        std::thread::scope(|scope| {
            for robot_id in 0..4 {
                let engine = &engine;
                let grid = &grid;
                scope.spawn(move || {
                    let start = Position::new(robot_id as i32, 0);
                    drive(engine, robot_id, start, grid);
                });
            }
        });

        assert_eq!(engine.status().remaining_tasks, 0);
    }

    #[test]
    fn test_same_robot_calls_are_serialized() {
        let engine = DecisionEngine::default();
        engine.initialize(1, &[Position::new(0, 7)]).unwrap();
        let grid = Grid::open(8, 8);
        let a = Position::new(7, 0);
        let b = Position::new(7, 1);
        for pos in [a, b, a, b] {
            engine.decide(0, pos, &grid).unwrap();
        }
        assert_eq!(engine.robot_state(0).unwrap().cooldown, 5);

        let modes: Vec<DecisionMode> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let engine = &engine;
                    let grid = &grid;
                    scope.spawn(move || engine.decide(0, a, grid).unwrap().mode)
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(modes.iter().all(|&mode| mode == DecisionMode::Cooldown));
        assert_eq!(engine.robot_state(0).unwrap().cooldown, 1);
    }
}

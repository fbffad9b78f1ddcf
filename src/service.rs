use std::sync::Arc;

use tonic::{Request, Response, Status};
use tracing::info;

use crate::error::EngineError;
use crate::infra::{Action, Position};
use crate::planners::DecisionEngine;
use crate::robonav_interface::navigation_service_server::NavigationService;
use crate::robonav_interface::{
    self as proto, ActionRequest, ActionResponse, Coordinate, HealthRequest, HealthResponse,
    InitEnvRequest, InitEnvResponse,
};
use crate::state::Grid;

impl From<EngineError> for Status {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotInitialized => Status::failed_precondition(err.to_string()),
            EngineError::UnknownRobot { .. } => Status::not_found(err.to_string()),
            EngineError::PositionOutOfBounds { .. }
            | EngineError::InvalidGrid(_)
            | EngineError::Configuration(_) => Status::invalid_argument(err.to_string()),
        }
    }
}

impl From<Coordinate> for Position {
    fn from(coordinate: Coordinate) -> Self {
        Position::new(coordinate.row, coordinate.col)
    }
}

impl From<Position> for Coordinate {
    fn from(pos: Position) -> Self {
        Coordinate {
            row: pos.row,
            col: pos.col,
        }
    }
}

impl From<Action> for proto::Move {
    fn from(action: Action) -> Self {
        match action {
            Action::Stay => proto::Move::Stay,
            Action::Up => proto::Move::Up,
            Action::Down => proto::Move::Down,
            Action::Left => proto::Move::Left,
            Action::Right => proto::Move::Right,
        }
    }
}

/// gRPC front end over a shared [`DecisionEngine`].
pub struct NavigationServer {
    engine: Arc<DecisionEngine>,
}

impl NavigationServer {
    pub fn new(engine: Arc<DecisionEngine>) -> Self {
        Self { engine }
    }
}

fn count(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

#[tonic::async_trait]
impl NavigationService for NavigationServer {
    async fn health(
        &self,
        _request: Request<HealthRequest>,
    ) -> Result<Response<HealthResponse>, Status> {
        let status = self.engine.status();
        Ok(Response::new(HealthResponse {
            initialized: status.initialized,
            robot_count: count(status.robot_count),
            generation: status.generation,
            remaining_tasks: count(status.remaining_tasks),
            policy: status.policy,
        }))
    }

    async fn init_env(
        &self,
        request: Request<InitEnvRequest>,
    ) -> Result<Response<InitEnvResponse>, Status> {
        let request = request.into_inner();
        let task_pool: Vec<Position> = request.task_pool.into_iter().map(Position::from).collect();

        let generation = self
            .engine
            .initialize(request.robot_count as usize, &task_pool)?;
        info!(
            "Env init: {} robots, {} tasks (generation {})",
            request.robot_count,
            task_pool.len(),
            generation
        );

        Ok(Response::new(InitEnvResponse {
            robot_count: request.robot_count,
            generation,
        }))
    }

    async fn get_action(
        &self,
        request: Request<ActionRequest>,
    ) -> Result<Response<ActionResponse>, Status> {
        let request = request.into_inner();
        let pos: Position = request
            .current_pos
            .ok_or_else(|| Status::invalid_argument("current_pos is required"))?
            .into();
        let raw = request
            .grid
            .ok_or_else(|| Status::invalid_argument("grid is required"))?;
        let grid = Grid::from_flat(raw.height as usize, raw.width as usize, &raw.cells)
            .map_err(EngineError::from)?;
        let robot_id = request.robot_id as usize;

        let engine = Arc::clone(&self.engine);
        let decision = tokio::task::spawn_blocking(move || engine.decide(robot_id, pos, &grid))
            .await
            .map_err(|err| Status::internal(format!("decision task failed: {}", err)))??;

        Ok(Response::new(ActionResponse {
            action: proto::Move::from(decision.action) as i32,
            target: decision.target.map(Coordinate::from),
            remaining_tasks: count(decision.remaining_tasks),
            completed: decision.completed,
        }))
    }
}

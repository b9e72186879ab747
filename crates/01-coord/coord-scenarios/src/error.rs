use thiserror::Error;

use coord::CoordError;

pub type ScenarioResult<T> = Result<T, ScenarioError>;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("coordinator error: {0}")]
    Coord(#[from] CoordError),

    #[error("invalid scenario configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("{role} thread panicked")]
    WorkerPanicked { role: &'static str },
}

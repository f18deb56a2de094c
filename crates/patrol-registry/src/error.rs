//! Registry error types.

use patrol_core::PatrolId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Patrol not found: {0}")]
    NotFound(PatrolId),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

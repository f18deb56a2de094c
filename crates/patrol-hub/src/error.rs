//! Hub error types.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HubError {
    #[error("Observer limit reached ({max})")]
    Full { max: usize },
}

pub type HubResult<T> = Result<T, HubError>;

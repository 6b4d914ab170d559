use thiserror::Error;

use crate::domain::error::DomainError;
use crate::infra::error::InfraError;

use super::ports::{LookupError, PublishError, StorageError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("storage unavailable: {0}")]
    Storage(#[from] StorageError),
    #[error("product lookup failed: {0}")]
    Lookup(#[from] LookupError),
    #[error("publishing failed: {0}")]
    Publish(#[from] PublishError),
    #[error("message handling fault: {0}")]
    Fault(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn fault(message: impl Into<String>) -> Self {
        Self::Fault(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

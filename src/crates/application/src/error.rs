use domain::party::PartyError;
use domain::provider::ProviderError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Repository error: {0}: {1}")]
    RepositoryError(String, String),
    #[error("Party error: {0}")]
    PartyError(#[from] PartyError),
    #[error("Provider error: {0}")]
    ProviderError(#[from] ProviderError),
    #[error("Aggregate not found: {0}: {1}")]
    AggregateNotFound(String, String),
    #[error("{0} is already in a party")]
    AlreadyInAParty(String),
    #[error("Unknown error: {0}")]
    UnknownError(String),
}

impl AppError {
    /// Domain-rule rejections the caller can act on, as opposed to plumbing
    /// failures.
    pub fn is_domain_rejection(&self) -> bool {
        matches!(
            self,
            AppError::PartyError(_) | AppError::AlreadyInAParty(_) | AppError::AggregateNotFound(_, _)
        )
    }

    /// Transient failures are safe to retry; the transport boundary maps
    /// these to a retryable status.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::ProviderError(e) if e.is_transient())
    }
}

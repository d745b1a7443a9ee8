//! Pipeline error types.

use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Retryable provider or network failure
    #[error("Transient failure: {0}")]
    Transient(String),

    /// A required input asset is absent
    #[error("Asset missing for block {index}: {what}")]
    AssetMissing { index: usize, what: String },

    /// A generation job exceeded its attempt ceiling
    #[error("Generation job timed out for block {0}")]
    JobTimedOut(usize),

    /// Another call is processing this block right now
    #[error("Block {0} is already being processed")]
    BlockBusy(usize),

    /// A generation job for this block is already in flight
    #[error("A generation job is already in flight for block {0}")]
    AlreadyInFlight(usize),

    /// Provider reported no usable result for a query
    #[error("No usable result for block {0}")]
    NoResult(usize),

    #[error("Provider error: {0}")]
    Provider(#[from] sreel_providers::ProviderError),

    #[error("Media error: {0}")]
    Media(#[from] sreel_media::MediaError),

    #[error("Store error: {0}")]
    Store(#[from] sreel_store::StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Whether retrying the same call could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            PipelineError::Transient(_) => true,
            PipelineError::Provider(e) => e.is_transient(),
            _ => false,
        }
    }
}

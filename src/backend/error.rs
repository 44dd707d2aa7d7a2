//! Error type for the execution backend client.
//!
//! [`BackendError`] separates requests the backend answered with a refusal
//! from requests that never produced an answer. Either way the engine turns
//! it into a job log entry; nothing here escapes to the caller of `submit`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend answered but refused to start the task
    /// (capacity, bad task definition, missing permissions).
    #[error("backend rejected request: {0}")]
    Rejected(String),

    /// The call did not complete: network, credentials, throttling,
    /// service-side errors.
    #[error("backend request failed: {0}")]
    Request(String),

    /// The request could not be built from the configuration.
    #[error("invalid backend request: {0}")]
    InvalidRequest(String),
}

//! Client error types for remote authorization calls.

use thiserror::Error;

/// Errors surfaced by an [`AuthorizationClient`](crate::AuthorizationClient).
///
/// The caching core never retries these; a failed check propagates to the
/// caller uncached and a failed flush batch is dropped and counted.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The remote service could not be reached or returned a service error.
    #[error("authorization service unavailable: {message}")]
    Unavailable { message: String },

    /// The named connection is not known to the service.
    #[error("connection not found: {connection}")]
    ConnectionNotFound { connection: String },

    /// A tuple in the request is malformed.
    #[error("invalid tuple: {message}")]
    InvalidTuple { message: String },
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

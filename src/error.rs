//! Typed errors for store, remote, provider and service operations.

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while fetching, caching or editing contacts.
///
/// Operations never panic on these and never swallow them: they surface as
/// `Err` values, and the feed layer renders them as an error state with the
/// message below.
#[derive(Error, Debug)]
pub enum Error {
    /// The remote endpoint could not be reached (DNS, connect, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// The remote endpoint answered, but with an unsuccessful status or an
    /// undecodable body.
    #[error("response error: {0}")]
    Response(String),

    /// The local contact store failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// The device contact provider failed.
    #[error("device provider error: {0}")]
    Provider(String),

    /// A lookup or update referenced an id that is not stored.
    #[error("no contact with id {0}")]
    NotFound(i64),

    /// The input record cannot be used for the requested operation.
    #[error("invalid contact: {0}")]
    Validation(String),
}

impl Error {
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    pub fn response(msg: impl Into<String>) -> Self {
        Self::Response(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

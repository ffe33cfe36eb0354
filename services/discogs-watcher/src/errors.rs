//!
//! src/errors.rs  Andrew Belles  Oct 16th, 2026
//!
//! Defines enums and methods of error conversion
//! for errors the watcher uses
//!
//!

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("config error: {0}")]
    Config(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("{0}")]
    Fetch(#[from] FetchError),
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error)
}

impl From<reqwest::Error> for WatcherError {
    fn from(e: reqwest::Error) -> Self { WatcherError::Http(e.to_string()) }
}

impl From<serde_json::Error> for WatcherError {
    fn from(e: serde_json::Error) -> Self { WatcherError::Parse(e.to_string()) }
}

///
/// Failure of a single release lookup. `message` is what the user sees and
/// always names the release id.
///
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct FetchError {
    pub id: u64,
    pub status: Option<u16>,
    pub message: String
}

impl FetchError {
    /// Transport level failure, no response was received
    pub fn transport(id: u64, cause: impl std::fmt::Display) -> Self {
        Self { id, status: None, message: format!("Release {id}: {cause}") }
    }

    /// Non-success status, `body` is cut down to a bounded prefix
    pub fn status(id: u64, code: u16, reason: &str, body: &str) -> Self {
        let prefix: String = body.chars().take(BODY_PREFIX_CHARS).collect();
        Self {
            id,
            status: Some(code),
            message: format!("Release {id}: {code} {reason} — {prefix}")
        }
    }
}

pub const BODY_PREFIX_CHARS: usize = 200;

/// Rejected user input, reported as a prompt rather than a failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ValidationError(pub String);

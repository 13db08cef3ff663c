//! Error types for the poll daemon.
//!
//! The taxonomy follows the durability rules of the loop: a missing or
//! corrupt cursor file is *not* an error (the store falls back to "start
//! from now"), while a failed cursor write and any remote-call failure
//! propagate and terminate the loop. Malformed events are not errors either;
//! the differ tags and skips them.

use std::path::PathBuf;

use likesync_core::ListingId;
use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while polling and applying updates.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level HTTP failure (connect, timeout, body decode).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("API error ({status}): {body}")]
    Api {
        /// HTTP status of the response.
        status: reqwest::StatusCode,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The token endpoint rejected the client credentials.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The cursor file could not be written. Continuing would silently lose
    /// the resume guarantee, so this is fatal.
    #[error("failed to persist cursor to {path}: {source}")]
    CursorSave {
        /// Path of the cursor file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A listing referenced by an event was not found.
    #[error("listing {0} not found")]
    MissingListing(ListingId),
}

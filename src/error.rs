//! Error types for the playback engine.
//!
//! Collaborator and resource failures are modelled separately so the
//! controller can decide which ones degrade gracefully and which ones end a
//! `play_track` attempt.

use thiserror::Error;

/// Failure while talking to the remote catalog or downloading media.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Server answered with a non-success status
    #[error("server returned HTTP {0}")]
    Status(u16),

    /// Connection, TLS, timeout or body-read failures
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Writing the downloaded bytes failed
    #[error("I/O error while downloading: {0}")]
    Io(#[from] std::io::Error),

    /// API answered but reported a failure code in the payload
    #[error("catalog API returned code {0}")]
    Api(i64),

    /// Payload could not be interpreted
    #[error("unexpected response: {0}")]
    Payload(String),
}

/// Failure reported by a playback backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The media file could not be decoded
    #[error("cannot decode media: {0}")]
    Decode(String),

    /// No audio output device, or it refused the stream
    #[error("audio output unavailable: {0}")]
    Device(String),

    /// External player process could not be started
    #[error("failed to start external player: {0}")]
    Spawn(#[source] std::io::Error),

    /// Capability gap, never a real failure
    #[error("{0} is not supported in this playback mode")]
    Unsupported(&'static str),

    /// Operation requires a loaded file
    #[error("nothing loaded")]
    NotLoaded,
}

/// Failure of a single format repair step.
#[derive(Error, Debug)]
pub enum RepairError {
    #[error("{0} is not installed")]
    ToolUnavailable(String),

    #[error("{tool} exited with {status}")]
    ToolFailed { tool: String, status: String },

    #[error("no leading ID3v2 tag")]
    NoTag,

    #[error("tag size {declared} exceeds file length {actual}")]
    TruncatedTag { declared: usize, actual: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors surfaced to the user. `Display` is the user-facing message.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Network request failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Could not play this track, the file is not a valid stream: {0}")]
    Decode(String),

    #[error("{0} is not available in external player mode")]
    Unsupported(&'static str),

    #[error("Temporary file error: {0}")]
    Resource(#[source] std::io::Error),

    #[error("Playback failed: {0}")]
    Backend(#[from] BackendError),
}

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::BackendError;

/// How audio actually reaches the speakers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process mixer
    #[default]
    Embedded,
    /// Hand the file to the OS default application
    External,
}

impl BackendKind {
    pub fn capabilities(self) -> Capabilities {
        match self {
            Self::Embedded => Capabilities {
                pause: true,
                seek: true,
                volume: true,
                position_sync: true,
            },
            // Only process liveness is observable
            Self::External => Capabilities {
                pause: false,
                seek: false,
                volume: false,
                position_sync: false,
            },
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Embedded => Self::External,
            Self::External => Self::Embedded,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Embedded => write!(f, "embedded"),
            Self::External => write!(f, "external"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "embedded" | "internal" | "default" => Ok(Self::Embedded),
            "external" | "system" => Ok(Self::External),
            other => Err(format!("unknown playback mode '{}'", other)),
        }
    }
}

/// What a backend can do. The controller queries these instead of assuming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub pause: bool,
    pub seek: bool,
    pub volume: bool,
    /// Wall-clock position matches what is audible (drives lyric sync)
    pub position_sync: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendState {
    Idle,
    Loaded,
    Playing,
    Paused,
}

/// Uniform transport contract over both playback mechanisms.
///
/// `stop` is infallible and idempotent; `pause`/`resume` on a backend that is
/// not in the matching state are no-ops. Unsupported operations return
/// `BackendError::Unsupported`, which callers treat as a notice, not a failure.
pub trait PlaybackBackend {
    fn kind(&self) -> BackendKind;

    fn capabilities(&self) -> Capabilities {
        self.kind().capabilities()
    }

    fn state(&self) -> BackendState;

    /// Prepare `path` for playback. Malformed media yields `BackendError::Decode`.
    fn load(&mut self, path: &Path) -> Result<(), BackendError>;
    fn play(&mut self) -> Result<(), BackendError>;
    fn pause(&mut self) -> Result<(), BackendError>;
    fn resume(&mut self) -> Result<(), BackendError>;
    fn stop(&mut self);
    fn seek(&mut self, position: Duration) -> Result<(), BackendError>;
    /// `volume` in `0.0..=1.0`; applies immediately in any state.
    fn set_volume(&mut self, volume: f32) -> Result<(), BackendError>;
}

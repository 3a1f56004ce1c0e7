use std::path::PathBuf;

use crate::catalog::{Comment, CommentBatch, LyricsPayload, Track};
use crate::error::FetchError;
use crate::lyrics::LyricsView;
use crate::media::TransientMedia;
use crate::player::BackendKind;

use super::state::SessionState;

/// Results posted by background tasks to the loop that owns the controller.
/// Session-bound events carry the generation they were started under.
#[derive(Debug)]
pub enum EngineEvent {
    Tick {
        generation: u64,
    },
    LyricsFetched {
        generation: u64,
        result: Result<LyricsPayload, FetchError>,
    },
    MediaFetched {
        generation: u64,
        result: Result<TransientMedia, FetchError>,
    },
    /// The file handed to the repair chain, returned with the outcome.
    /// `reason` is the decode error that triggered the repair.
    Repaired {
        generation: u64,
        media: TransientMedia,
        repaired: bool,
        reason: String,
    },
    CommentsFetched {
        generation: u64,
        result: Result<CommentBatch, FetchError>,
    },
    /// Not tied to any session; always applied
    Saved {
        destination: PathBuf,
        result: Result<u64, FetchError>,
    },
}

impl EngineEvent {
    pub fn generation(&self) -> Option<u64> {
        match self {
            Self::Tick { generation }
            | Self::LyricsFetched { generation, .. }
            | Self::MediaFetched { generation, .. }
            | Self::Repaired { generation, .. }
            | Self::CommentsFetched { generation, .. } => Some(*generation),
            Self::Saved { .. } => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Tick { .. } => "tick",
            Self::LyricsFetched { .. } => "lyrics",
            Self::MediaFetched { .. } => "media",
            Self::Repaired { .. } => "repair",
            Self::CommentsFetched { .. } => "comments",
            Self::Saved { .. } => "save",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    /// 0.0..=1.0
    pub fraction: f64,
    pub elapsed: String,
    pub total: String,
}

/// Everything the presentation layer needs to render.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    StateChanged(SessionState),
    TrackChanged { index: usize, track: Track },
    Progress(Progress),
    Lyrics(LyricsView),
    ActiveLyric(Option<usize>),
    Comments {
        added: Vec<Comment>,
        reset: bool,
        loaded: usize,
        total: usize,
    },
    ModeChanged(BackendKind),
    /// Capability gap of the current backend; informational
    Restricted(String),
    Info(String),
    /// Terminal failure of an operation, user-displayable
    Error(String),
}

/// `MM:SS`; minutes are not capped at 99.
pub fn format_time(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

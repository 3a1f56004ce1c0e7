use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use tracing::warn;

use crate::catalog::Track;
use crate::media::TransientMedia;
use crate::player::BackendKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Playing,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing loaded
    Empty,
    /// Fetching lyrics and media for a new track
    Loading,
    Active(Transport),
}

impl SessionState {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active(_))
    }
}

/// Search results, replaced wholesale on each search.
#[derive(Debug, Default)]
pub struct Playlist {
    tracks: Vec<Arc<Track>>,
    cursor: Option<usize>,
}

impl Playlist {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self {
            tracks: tracks.into_iter().map(Arc::new).collect(),
            cursor: None,
        }
    }

    /// Swap in new tracks and clear the selection.
    pub fn replace(&mut self, tracks: Vec<Track>) {
        *self = Self::new(tracks);
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Track>> {
        self.tracks.get(index)
    }

    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter().map(|t| t.as_ref())
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Ignored unless `index` is in range.
    pub fn set_cursor(&mut self, index: usize) {
        if index < self.tracks.len() {
            self.cursor = Some(index);
        }
    }

    /// Circular neighbour of the cursor. `None` with fewer than two tracks.
    /// No selection counts as position -1.
    pub fn step(&self, delta: isize) -> Option<usize> {
        let len = self.tracks.len();
        if len < 2 {
            return None;
        }
        let current = self.cursor.map_or(-1, |c| c as isize);
        Some((current + delta).rem_euclid(len as isize) as usize)
    }
}

/// What is happening right now. Created once and mutated in place.
///
/// Elapsed time is `played` plus the wall-clock span since `running_since`.
/// Pausing folds the running span into `played`, seeking overwrites it.
#[derive(Debug)]
pub struct PlaybackSession {
    pub state: SessionState,
    pub track: Weak<Track>,
    pub backend_kind: BackendKind,
    /// Exclusively owned; deleted when superseded
    pub media: Option<TransientMedia>,
    /// Position accumulated up to `running_since`
    pub played: Duration,
    /// Set while the clock is running, `None` while paused or idle
    pub running_since: Option<Instant>,
    /// From catalog metadata, authoritative over anything a backend reports
    pub total: Duration,
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self {
            state: SessionState::Empty,
            track: Weak::new(),
            backend_kind: BackendKind::default(),
            media: None,
            played: Duration::ZERO,
            running_since: None,
            total: Duration::ZERO,
        }
    }
}

impl PlaybackSession {
    pub(crate) fn begin(&mut self, track: &Arc<Track>, kind: BackendKind) {
        self.state = SessionState::Loading;
        self.track = Arc::downgrade(track);
        self.backend_kind = kind;
        self.played = Duration::ZERO;
        self.running_since = None;
        self.total = track.duration();
    }

    pub(crate) fn activate(&mut self, now: Instant, kind: BackendKind) {
        self.state = SessionState::Active(Transport::Playing);
        self.backend_kind = kind;
        self.played = Duration::ZERO;
        self.running_since = Some(now);
    }

    pub(crate) fn pause(&mut self, now: Instant) {
        self.played = self.elapsed(now);
        self.running_since = None;
        self.state = SessionState::Active(Transport::Paused);
    }

    pub(crate) fn resume(&mut self, now: Instant) {
        self.running_since = Some(now);
        self.state = SessionState::Active(Transport::Playing);
    }

    pub(crate) fn clear(&mut self) {
        self.state = SessionState::Empty;
        self.track = Weak::new();
        self.played = Duration::ZERO;
        self.running_since = None;
        self.total = Duration::ZERO;
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        match self.running_since {
            Some(since) => self.played + now.saturating_duration_since(since),
            None => self.played,
        }
    }

    /// Make `elapsed` read `position` from `now` on. A paused session stays
    /// paused at the new position.
    pub(crate) fn rebase(&mut self, now: Instant, position: Duration) {
        self.played = position;
        if self.running_since.is_some() {
            self.running_since = Some(now);
        }
    }

    /// Delete the transient file. Failure is logged and never blocks the caller.
    pub(crate) fn release_media(&mut self) {
        if let Some(media) = self.media.take() {
            let path = media.path().display().to_string();
            if let Err(e) = media.release() {
                warn!(%path, "failed to remove transient media: {}", e);
            }
        }
    }
}

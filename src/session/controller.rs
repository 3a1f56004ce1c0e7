use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, Comment, CommentBatch, LyricsPayload, Track};
use crate::error::{BackendError, EngineError, FetchError};
use crate::lyrics::LyricsView;
use crate::media::{FormatRepair, MediaSource, TransientMedia};
use crate::player::{BackendFactory, BackendKind, PlaybackBackend};

use super::clock::{spawn_progress_clock, Clock};
use super::comments::{CommentPager, PageRefusal};
use super::events::{format_time, EngineEvent, Notice, Progress};
use super::state::{PlaybackSession, Playlist, SessionState, Transport};

/// Collaborators the controller drives.
pub struct SessionDeps {
    pub catalog: Arc<dyn Catalog>,
    pub media: Arc<dyn MediaSource>,
    pub backends: Box<dyn BackendFactory>,
    pub repair: FormatRepair,
    pub clock: Arc<dyn Clock>,
    /// Runs the progress clock and all blocking network and file work
    pub runtime: Handle,
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub mode: BackendKind,
    pub volume: f32,
    pub tick_interval: Duration,
    pub comment_page_size: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            mode: BackendKind::Embedded,
            volume: 0.7,
            tick_interval: Duration::from_secs(1),
            comment_page_size: 20,
        }
    }
}

/// The playback hub.
///
/// Lives on the thread that owns the UI loop. Blocking work goes to the
/// runtime's blocking pool and never touches the controller; workers post [`EngineEvent`]s tagged with the generation they were started under,
/// and [`SessionController::handle`] drops anything from an older generation.
pub struct SessionController {
    catalog: Arc<dyn Catalog>,
    media: Arc<dyn MediaSource>,
    backends: Box<dyn BackendFactory>,
    repair: Arc<FormatRepair>,
    clock: Arc<dyn Clock>,
    runtime: Handle,
    ticker: Option<JoinHandle<()>>,

    playlist: Playlist,
    session: PlaybackSession,
    backend: Option<Box<dyn PlaybackBackend>>,
    mode: BackendKind,
    volume: f32,
    tick_interval: Duration,

    lyrics: LyricsView,
    lyric_index: Option<usize>,
    pager: CommentPager,

    generation: Arc<AtomicU64>,
    events: UnboundedSender<EngineEvent>,
    notices: UnboundedSender<Notice>,
}

impl SessionController {
    pub fn new(
        deps: SessionDeps,
        options: SessionOptions,
        events: UnboundedSender<EngineEvent>,
        notices: UnboundedSender<Notice>,
    ) -> Self {
        let mut session = PlaybackSession::default();
        session.backend_kind = options.mode;
        Self {
            catalog: deps.catalog,
            media: deps.media,
            backends: deps.backends,
            repair: Arc::new(deps.repair),
            clock: deps.clock,
            runtime: deps.runtime,
            ticker: None,
            playlist: Playlist::default(),
            session,
            backend: None,
            mode: options.mode,
            volume: options.volume.clamp(0.0, 1.0),
            tick_interval: options.tick_interval,
            lyrics: LyricsView::Missing,
            lyric_index: None,
            pager: CommentPager::new(options.comment_page_size),
            generation: Arc::new(AtomicU64::new(0)),
            events,
            notices,
        }
    }

    // ---- accessors ----

    pub fn state(&self) -> SessionState {
        self.session.state
    }

    pub fn current_index(&self) -> Option<usize> {
        self.playlist.cursor()
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn current_track(&self) -> Option<Arc<Track>> {
        self.session.track.upgrade()
    }

    pub fn mode(&self) -> BackendKind {
        self.mode
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn lyrics(&self) -> &LyricsView {
        &self.lyrics
    }

    pub fn lyric_index(&self) -> Option<usize> {
        self.lyric_index
    }

    pub fn comments(&self) -> &[Comment] {
        self.pager.comments()
    }

    pub fn comments_total(&self) -> Option<usize> {
        self.pager.total()
    }

    pub fn media_path(&self) -> Option<&Path> {
        self.session.media.as_ref().map(|m| m.path())
    }

    pub fn elapsed(&self) -> Duration {
        self.session.elapsed(self.clock.now())
    }

    // ---- playlist ----

    /// Replace the track list. The current session keeps playing.
    pub fn set_playlist(&mut self, tracks: Vec<Track>) {
        info!(count = tracks.len(), "playlist replaced");
        self.playlist.replace(tracks);
    }

    // ---- transport ----

    pub fn play_track(&mut self, index: usize) {
        let Some(track) = self.playlist.get(index).cloned() else {
            debug!(index, "play_track ignored, index out of range");
            return;
        };

        self.halt();
        let generation = self.bump_generation();
        info!(index, id = track.id, name = %track.name, generation, "loading track");

        self.playlist.set_cursor(index);
        self.session.begin(&track, self.mode);
        self.notify(Notice::StateChanged(SessionState::Loading));
        self.notify(Notice::TrackChanged {
            index,
            track: track.as_ref().clone(),
        });

        self.lyrics = LyricsView::Loading;
        self.lyric_index = None;
        self.notify(Notice::Lyrics(LyricsView::Loading));

        self.pager.reset();
        self.notify(Notice::Comments {
            added: Vec::new(),
            reset: true,
            loaded: 0,
            total: 0,
        });

        let catalog = Arc::clone(&self.catalog);
        let media = Arc::clone(&self.media);
        let tx = self.events.clone();
        let track_id = track.id;
        self.runtime.spawn_blocking(move || {
            // Lyrics first; their failure never blocks the download
            let result = catalog.fetch_lyrics(track_id);
            let _ = tx.send(EngineEvent::LyricsFetched { generation, result });

            // If the loop is gone the undelivered file is removed on drop
            let result = media.resolve_and_fetch(track_id);
            let _ = tx.send(EngineEvent::MediaFetched { generation, result });
        });
    }

    pub fn toggle_play_pause(&mut self) {
        match self.session.state {
            SessionState::Empty => {
                if self.playlist.is_empty() {
                    self.notify(Notice::Info("Search for something to play first".to_string()));
                } else {
                    self.play_track(self.playlist.cursor().unwrap_or(0));
                }
            }
            SessionState::Loading => debug!("toggle ignored while loading"),
            SessionState::Active(Transport::Playing) => self.pause(),
            SessionState::Active(Transport::Paused) => self.resume(),
        }
    }

    pub fn pause(&mut self) {
        if self.session.state != SessionState::Active(Transport::Playing) {
            return;
        }
        let Some(backend) = self.backend.as_mut() else {
            return;
        };
        if !backend.capabilities().pause {
            self.restricted("pause");
            return;
        }
        match backend.pause() {
            Ok(()) => {
                self.session.pause(self.clock.now());
                self.notify(Notice::StateChanged(self.session.state));
            }
            Err(e) => self.backend_refused(e),
        }
    }

    pub fn resume(&mut self) {
        if self.session.state != SessionState::Active(Transport::Paused) {
            return;
        }
        let Some(backend) = self.backend.as_mut() else {
            return;
        };
        if !backend.capabilities().pause {
            self.restricted("resume");
            return;
        }
        match backend.resume() {
            Ok(()) => {
                self.session.resume(self.clock.now());
                self.notify(Notice::StateChanged(self.session.state));
            }
            Err(e) => self.backend_refused(e),
        }
    }

    pub fn next(&mut self) {
        match self.playlist.step(1) {
            Some(index) => self.play_track(index),
            None => debug!("next ignored, fewer than two tracks"),
        }
    }

    pub fn previous(&mut self) {
        match self.playlist.step(-1) {
            Some(index) => self.play_track(index),
            None => debug!("previous ignored, fewer than two tracks"),
        }
    }

    /// Jump to `fraction` of the catalog duration.
    pub fn seek(&mut self, fraction: f64) {
        if !self.session.state.is_active() {
            return;
        }
        let Some(backend) = self.backend.as_mut() else {
            return;
        };
        if !backend.capabilities().seek {
            self.restricted("seek");
            return;
        }

        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let position = self.session.total.mul_f64(fraction);
        if let Err(e) = backend.seek(position) {
            self.backend_refused(e);
            return;
        }

        let now = self.clock.now();
        self.session.rebase(now, position);
        debug!(position = position.as_secs_f64(), "seeked");
        self.sync_lyric(position);
        self.publish_progress(position);
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        let supported = match self.backend.as_ref() {
            Some(backend) => backend.capabilities().volume,
            None => self.mode.capabilities().volume,
        };
        if !supported {
            self.restricted("volume");
            return;
        }
        if let Some(backend) = self.backend.as_mut() {
            if let Err(e) = backend.set_volume(self.volume) {
                self.backend_refused(e);
            }
        }
    }

    /// Switching backends always ends the current session first.
    pub fn set_mode(&mut self, mode: BackendKind) {
        if mode == self.mode {
            return;
        }
        self.stop();
        if let Some(mut old) = self.backend.take() {
            old.stop();
        }
        self.mode = mode;
        self.session.backend_kind = mode;
        info!(%mode, "playback mode changed");
        self.notify(Notice::ModeChanged(mode));
    }

    pub fn toggle_mode(&mut self) {
        self.set_mode(self.mode.toggled());
    }

    pub fn stop(&mut self) {
        self.bump_generation();
        self.halt();
        self.pager.fail();
        self.lyric_index = None;
        if self.session.state != SessionState::Empty {
            self.session.clear();
            info!("playback stopped");
            self.notify(Notice::StateChanged(SessionState::Empty));
        }
    }

    /// Stop and let go of every OS resource, including the output device.
    pub fn shutdown(&mut self) {
        self.stop();
        if let Some(mut backend) = self.backend.take() {
            backend.stop();
        }
    }

    // ---- comments ----

    pub fn load_comments(&mut self, reset: bool) {
        let Some(track) = self.session.track.upgrade() else {
            self.notify(Notice::Info("No track selected".to_string()));
            return;
        };
        let request = match self.pager.begin(reset) {
            Ok(request) => request,
            Err(PageRefusal::InFlight) => {
                self.notify(Notice::Info("Comments are already loading".to_string()));
                return;
            }
            Err(PageRefusal::Exhausted) => {
                self.notify(Notice::Info(format!(
                    "All {} comments loaded",
                    self.pager.loaded()
                )));
                return;
            }
        };

        let generation = self.generation();
        let catalog = Arc::clone(&self.catalog);
        let tx = self.events.clone();
        let track_id = track.id;
        debug!(track_id, offset = request.offset, "fetching comments");
        self.runtime.spawn_blocking(move || {
            let result = catalog.fetch_comments(track_id, request.offset, request.limit);
            let _ = tx.send(EngineEvent::CommentsFetched { generation, result });
        });
    }

    // ---- save ----

    /// Download playlist entry `index` to `destination` in the background.
    pub fn save_track(&mut self, index: usize, destination: PathBuf) {
        let Some(track) = self.playlist.get(index) else {
            self.notify(Notice::Info(format!("No track #{}", index + 1)));
            return;
        };
        let track_id = track.id;
        let media = Arc::clone(&self.media);
        let tx = self.events.clone();
        self.runtime.spawn_blocking(move || {
            let result = media.save_to(track_id, &destination);
            let _ = tx.send(EngineEvent::Saved {
                destination,
                result,
            });
        });
    }

    // ---- event dispatch ----

    /// Apply a worker result. Anything from a superseded generation is
    /// discarded without touching state.
    pub fn handle(&mut self, event: EngineEvent) {
        if let Some(generation) = event.generation() {
            let current = self.generation();
            if generation != current {
                debug!(
                    kind = event.label(),
                    generation, current, "discarding stale event"
                );
                match event {
                    EngineEvent::MediaFetched {
                        result: Ok(media), ..
                    }
                    | EngineEvent::Repaired { media, .. } => release(media),
                    _ => {}
                }
                return;
            }
        }

        match event {
            EngineEvent::Tick { .. } => self.on_tick(),
            EngineEvent::LyricsFetched { result, .. } => self.on_lyrics(result),
            EngineEvent::MediaFetched { result, .. } => self.on_media(result),
            EngineEvent::Repaired {
                media,
                repaired,
                reason,
                ..
            } => self.on_repaired(media, repaired, reason),
            EngineEvent::CommentsFetched { result, .. } => self.on_comments(result),
            EngineEvent::Saved {
                destination,
                result,
            } => self.on_saved(destination, result),
        }
    }

    fn on_tick(&mut self) {
        if self.session.state != SessionState::Active(Transport::Playing) {
            return;
        }
        let elapsed = self.session.elapsed(self.clock.now());
        let total = self.session.total;

        if !total.is_zero() && elapsed >= total {
            info!("track finished");
            if self.playlist.len() >= 2 {
                self.next();
            } else {
                self.stop();
            }
            return;
        }

        self.publish_progress(elapsed);
        if self.backend.as_ref().is_some_and(|b| b.capabilities().position_sync) {
            self.sync_lyric(elapsed);
        }
    }

    fn on_lyrics(&mut self, result: Result<LyricsPayload, FetchError>) {
        let view = match result {
            Ok(payload) => LyricsView::from_payload(payload),
            Err(e) => {
                warn!("lyrics unavailable: {}", e);
                LyricsView::Missing
            }
        };
        self.lyrics = view.clone();
        self.lyric_index = None;
        self.notify(Notice::Lyrics(view));
    }

    fn on_media(&mut self, result: Result<TransientMedia, FetchError>) {
        if self.session.state != SessionState::Loading {
            if let Ok(media) = result {
                release(media);
            }
            return;
        }
        match result {
            Ok(media) => {
                self.session.media = Some(media);
                self.start_playback();
            }
            Err(e) => {
                warn!("media download failed: {}", e);
                self.fail(EngineError::Fetch(e));
            }
        }
    }

    fn on_repaired(&mut self, media: TransientMedia, repaired: bool, reason: String) {
        if self.session.state != SessionState::Loading {
            release(media);
            return;
        }
        self.session.media = Some(media);
        if repaired {
            self.attempt_playback(false);
        } else {
            self.fail(EngineError::Decode(reason));
        }
    }

    fn on_comments(&mut self, result: Result<CommentBatch, FetchError>) {
        match result {
            Ok(batch) => {
                let update = self.pager.complete(batch);
                debug!(loaded = update.loaded, total = update.total, "comments page applied");
                self.notify(Notice::Comments {
                    added: update.added,
                    reset: update.reset,
                    loaded: update.loaded,
                    total: update.total,
                });
            }
            Err(e) => {
                warn!("comments unavailable: {}", e);
                self.pager.fail();
                self.notify(Notice::Error(EngineError::Fetch(e).to_string()));
            }
        }
    }

    fn on_saved(&mut self, destination: PathBuf, result: Result<u64, FetchError>) {
        match result {
            Ok(bytes) => {
                info!(path = %destination.display(), bytes, "track saved");
                self.notify(Notice::Info(format!("Saved to {}", destination.display())));
            }
            Err(e) => {
                warn!(path = %destination.display(), "save failed: {}", e);
                self.notify(Notice::Error(EngineError::Fetch(e).to_string()));
            }
        }
    }

    // ---- internals ----

    fn start_playback(&mut self) {
        self.attempt_playback(true);
    }

    /// Load and play the session's file. A decode failure hands the file to
    /// the repair chain once; the retry comes back as `Repaired`.
    fn attempt_playback(&mut self, allow_repair: bool) {
        let Some(path) = self.media_path().map(Path::to_path_buf) else {
            return;
        };

        let mut outcome = self.load_and_play(&path);
        if let Err(BackendError::Spawn(e)) = &outcome {
            if self.mode == BackendKind::External {
                warn!("external player unavailable, falling back to embedded: {}", e);
                self.notify(Notice::Info(format!(
                    "External player unavailable ({}), playing in embedded mode",
                    e
                )));
                if let Some(mut old) = self.backend.take() {
                    old.stop();
                }
                self.mode = BackendKind::Embedded;
                self.notify(Notice::ModeChanged(self.mode));
                outcome = self.load_and_play(&path);
            }
        }

        match outcome {
            Ok(()) => {
                let now = self.clock.now();
                self.session.activate(now, self.mode);
                info!(mode = %self.mode, "playback started");
                self.notify(Notice::StateChanged(self.session.state));
                self.publish_progress(Duration::ZERO);

                let generation = self.generation();
                self.ticker = Some(spawn_progress_clock(
                    &self.runtime,
                    generation,
                    Arc::clone(&self.generation),
                    self.tick_interval,
                    self.events.clone(),
                ));
            }
            Err(BackendError::Decode(reason)) if allow_repair => self.spawn_repair(reason),
            Err(BackendError::Decode(reason)) => self.fail(EngineError::Decode(reason)),
            Err(e) => self.fail(EngineError::Backend(e)),
        }
    }

    fn load_and_play(&mut self, path: &Path) -> Result<(), BackendError> {
        self.ensure_backend();
        let Some(backend) = self.backend.as_mut() else {
            return Err(BackendError::NotLoaded);
        };
        backend.load(path)?;
        backend.play()
    }

    /// Transcoding can take a while, so the file leaves the session for the
    /// blocking pool and comes back with the outcome. State stays `Loading`.
    fn spawn_repair(&mut self, reason: String) {
        let Some(media) = self.session.media.take() else {
            return;
        };
        warn!("decode failed, attempting repair: {}", reason);
        let generation = self.generation();
        let repair = Arc::clone(&self.repair);
        let tx = self.events.clone();
        self.runtime.spawn_blocking(move || {
            let repaired = repair.repair(media.path());
            let _ = tx.send(EngineEvent::Repaired {
                generation,
                media,
                repaired,
                reason,
            });
        });
    }

    fn ensure_backend(&mut self) {
        if self.backend.as_ref().map(|b| b.kind()) == Some(self.mode) {
            return;
        }
        if let Some(mut old) = self.backend.take() {
            old.stop();
        }
        debug!(mode = %self.mode, "creating backend");
        self.backend = Some(self.backends.create(self.mode, self.volume));
    }

    /// End the current attempt and report why.
    fn fail(&mut self, error: EngineError) {
        warn!("play attempt failed: {}", error);
        self.stop();
        self.notify(Notice::Error(error.to_string()));
    }

    /// Stop the backend and drop the transient file. Leaves state alone.
    fn halt(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        if let Some(backend) = self.backend.as_mut() {
            backend.stop();
        }
        self.session.release_media();
    }

    fn bump_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn sync_lyric(&mut self, elapsed: Duration) {
        let Some(track) = self.lyrics.synced() else {
            return;
        };
        let index = track.resolve_active(elapsed.as_secs_f64(), self.lyric_index);
        if index != self.lyric_index {
            self.lyric_index = index;
            self.notify(Notice::ActiveLyric(index));
        }
    }

    fn publish_progress(&self, elapsed: Duration) {
        let total = self.session.total;
        let fraction = if total.is_zero() {
            0.0
        } else {
            (elapsed.as_secs_f64() / total.as_secs_f64()).min(1.0)
        };
        self.notify(Notice::Progress(Progress {
            fraction,
            elapsed: format_time(elapsed.as_secs()),
            total: format_time(total.as_secs()),
        }));
    }

    fn restricted(&self, operation: &'static str) {
        self.notify(Notice::Restricted(
            EngineError::Unsupported(operation).to_string(),
        ));
    }

    fn backend_refused(&self, error: BackendError) {
        match error {
            BackendError::Unsupported(op) => self.restricted(op),
            other => {
                warn!("backend refused: {}", other);
                self.notify(Notice::Error(EngineError::Backend(other).to_string()));
            }
        }
    }

    fn notify(&self, notice: Notice) {
        if self.notices.send(notice).is_err() {
            debug!("notice dropped, no listener");
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn release(media: TransientMedia) {
    let path = media.path().display().to_string();
    if let Err(e) = media.release() {
        warn!(%path, "failed to remove stale media: {}", e);
    }
}

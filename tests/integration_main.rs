use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempDir;
use tokio::runtime::Runtime;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

use cloudplay::catalog::{Catalog, Comment, CommentBatch, LyricsPayload, Track};
use cloudplay::error::{BackendError, FetchError, RepairError};
use cloudplay::lyrics::LyricsView;
use cloudplay::media::{FormatRepair, MediaSource, RepairStrategy, StripId3, TransientMedia};
use cloudplay::player::{BackendFactory, BackendKind, BackendState, PlaybackBackend};
use cloudplay::session::{
    Clock, EngineEvent, ManualClock, Notice, SessionController, SessionDeps, SessionOptions,
    SessionState, SystemClock, Transport,
};

type Log = Arc<Mutex<Vec<String>>>;

const GOOD_AUDIO: &[u8] = b"AUDIO-FRAMES-0123456789";
const PLAYING: SessionState = SessionState::Active(Transport::Playing);
const PAUSED: SessionState = SessionState::Active(Transport::Paused);

// ---- fakes ----

struct FakeCatalog {
    comment_total: usize,
    lyric_failures: HashSet<u64>,
}

impl Catalog for FakeCatalog {
    fn search(&self, _keyword: &str) -> Result<Vec<Track>, FetchError> {
        Ok(Vec::new())
    }

    fn fetch_lyrics(&self, track_id: u64) -> Result<LyricsPayload, FetchError> {
        if self.lyric_failures.contains(&track_id) {
            return Err(FetchError::Status(503));
        }
        // A line every 10 seconds
        let raw: String = (0..10)
            .map(|i| format!("[{:02}:{:02}.00]line {}\n", i * 10 / 60, i * 10 % 60, i))
            .collect();
        Ok(LyricsPayload::Timestamped(raw))
    }

    fn fetch_comments(
        &self,
        _track_id: u64,
        offset: usize,
        limit: usize,
    ) -> Result<CommentBatch, FetchError> {
        let end = (offset + limit).min(self.comment_total);
        let comments = (offset..end)
            .map(|i| Comment {
                user: format!("user{}", i),
                content: format!("comment {}", i),
                time_ms: 1_600_000_000_000 + i as i64,
                liked_count: i as u64,
            })
            .collect();
        Ok(CommentBatch {
            comments,
            total: self.comment_total,
        })
    }
}

struct FakeMedia {
    dir: PathBuf,
    payload: Vec<u8>,
    fail: bool,
    fetched: AtomicUsize,
}

impl MediaSource for FakeMedia {
    fn resolve_and_fetch(&self, _track_id: u64) -> Result<TransientMedia, FetchError> {
        if self.fail {
            return Err(FetchError::Status(404));
        }
        let (mut file, media) = TransientMedia::create(Some(self.dir.as_path()))?;
        file.write_all(&self.payload)?;
        self.fetched.fetch_add(1, Ordering::SeqCst);
        Ok(media)
    }

    fn save_to(&self, _track_id: u64, destination: &Path) -> Result<u64, FetchError> {
        fs::write(destination, &self.payload)?;
        Ok(self.payload.len() as u64)
    }
}

/// Accepts files that start with `AUDIO`; records every call.
struct FakeBackend {
    kind: BackendKind,
    state: BackendState,
    loaded: bool,
    spawn_fails: bool,
    log: Log,
}

impl FakeBackend {
    fn record(&self, op: &str) {
        self.log.lock().unwrap().push(format!("{}:{}", self.kind, op));
    }

    fn external_only(&self, op: &'static str) -> Result<(), BackendError> {
        if self.kind == BackendKind::External {
            return Err(BackendError::Unsupported(op));
        }
        self.record(op);
        Ok(())
    }
}

impl PlaybackBackend for FakeBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn state(&self) -> BackendState {
        self.state
    }

    fn load(&mut self, path: &Path) -> Result<(), BackendError> {
        self.record("load");
        let data = fs::read(path).map_err(|e| BackendError::Decode(e.to_string()))?;
        if !data.starts_with(b"AUDIO") {
            return Err(BackendError::Decode("no frame sync".to_string()));
        }
        self.loaded = true;
        self.state = BackendState::Loaded;
        Ok(())
    }

    fn play(&mut self) -> Result<(), BackendError> {
        self.record("play");
        if !self.loaded {
            return Err(BackendError::NotLoaded);
        }
        if self.kind == BackendKind::External && self.spawn_fails {
            return Err(BackendError::Spawn(io::Error::new(
                io::ErrorKind::NotFound,
                "xdg-open",
            )));
        }
        self.state = BackendState::Playing;
        Ok(())
    }

    fn pause(&mut self) -> Result<(), BackendError> {
        self.external_only("pause")?;
        self.state = BackendState::Paused;
        Ok(())
    }

    fn resume(&mut self) -> Result<(), BackendError> {
        self.external_only("resume")?;
        self.state = BackendState::Playing;
        Ok(())
    }

    fn stop(&mut self) {
        self.record("stop");
        self.loaded = false;
        self.state = BackendState::Idle;
    }

    fn seek(&mut self, position: Duration) -> Result<(), BackendError> {
        self.external_only("seek")?;
        self.record(&format!("seek {}", position.as_secs()));
        Ok(())
    }

    fn set_volume(&mut self, _volume: f32) -> Result<(), BackendError> {
        self.external_only("volume")
    }
}

struct FakeBackends {
    spawn_fails: bool,
    log: Log,
}

impl BackendFactory for FakeBackends {
    fn create(&self, kind: BackendKind, _volume: f32) -> Box<dyn PlaybackBackend> {
        Box::new(FakeBackend {
            kind,
            state: BackendState::Idle,
            loaded: false,
            spawn_fails: self.spawn_fails,
            log: Arc::clone(&self.log),
        })
    }
}

/// Tag strip that takes its time, like a real transcode.
struct SlowStrip {
    delay: Duration,
}

impl RepairStrategy for SlowStrip {
    fn name(&self) -> &'static str {
        "slow-strip"
    }

    fn apply(&self, path: &Path) -> Result<(), RepairError> {
        thread::sleep(self.delay);
        StripId3.apply(path)
    }
}

// ---- harness ----

struct Setup {
    durations: Vec<u64>,
    payload: Vec<u8>,
    mode: BackendKind,
    spawn_fails: bool,
    media_fails: bool,
    lyric_failures: HashSet<u64>,
    comment_total: usize,
    real_clock: Option<Duration>,
    repair_delay: Option<Duration>,
}

impl Default for Setup {
    fn default() -> Self {
        Self {
            durations: vec![10, 5, 8],
            payload: GOOD_AUDIO.to_vec(),
            mode: BackendKind::Embedded,
            spawn_fails: false,
            media_fails: false,
            lyric_failures: HashSet::new(),
            comment_total: 45,
            real_clock: None,
            repair_delay: None,
        }
    }
}

struct Harness {
    controller: SessionController,
    events: UnboundedReceiver<EngineEvent>,
    notices: UnboundedReceiver<Notice>,
    clock: Arc<ManualClock>,
    media: Arc<FakeMedia>,
    log: Log,
    // Dropped after the controller, before the directory goes away
    runtime: Runtime,
    dir: TempDir,
}

impl Harness {
    fn new(setup: Setup) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let log: Log = Arc::default();
        let clock = Arc::new(ManualClock::new());
        let media = Arc::new(FakeMedia {
            dir: dir.path().to_path_buf(),
            payload: setup.payload,
            fail: setup.media_fails,
            fetched: AtomicUsize::new(0),
        });

        let (clock_dep, tick_interval): (Arc<dyn Clock>, Duration) = match setup.real_clock {
            Some(period) => (Arc::new(SystemClock) as Arc<dyn Clock>, period),
            // Ticks are injected by hand
            None => (clock.clone() as Arc<dyn Clock>, Duration::from_secs(3600)),
        };

        let deps = SessionDeps {
            catalog: Arc::new(FakeCatalog {
                comment_total: setup.comment_total,
                lyric_failures: setup.lyric_failures,
            }),
            media: media.clone(),
            backends: Box::new(FakeBackends {
                spawn_fails: setup.spawn_fails,
                log: Arc::clone(&log),
            }),
            repair: match setup.repair_delay {
                Some(delay) => FormatRepair::with_strategies(vec![Box::new(SlowStrip { delay })]),
                None => FormatRepair::with_strategies(vec![Box::new(StripId3)]),
            },
            clock: clock_dep,
            runtime: runtime.handle().clone(),
        };
        let options = SessionOptions {
            mode: setup.mode,
            volume: 0.5,
            tick_interval,
            comment_page_size: 20,
        };

        let (events_tx, events) = unbounded_channel();
        let (notices_tx, notices) = unbounded_channel();
        let mut controller = SessionController::new(deps, options, events_tx, notices_tx);
        controller.set_playlist(
            setup
                .durations
                .iter()
                .enumerate()
                .map(|(i, d)| track(i as u64 + 1, *d))
                .collect(),
        );

        Self {
            controller,
            events,
            notices,
            clock,
            media,
            log,
            runtime,
            dir,
        }
    }

    /// Apply worker events until `pred` holds.
    fn pump_until(&mut self, timeout: Duration, pred: impl Fn(&Harness) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if pred(self) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            match self.events.try_recv() {
                Ok(event) => self.controller.handle(event),
                Err(_) => thread::sleep(Duration::from_millis(5)),
            }
        }
    }

    fn play_and_wait(&mut self, index: usize) {
        self.controller.play_track(index);
        assert!(
            self.pump_until(Duration::from_secs(5), |h| h.controller.state()
                != SessionState::Loading),
            "track {} never left Loading",
            index
        );
    }

    fn tick(&mut self) {
        let generation = self.controller.generation();
        self.controller.handle(EngineEvent::Tick { generation });
    }

    fn drain_notices(&mut self) -> Vec<Notice> {
        let mut out = Vec::new();
        while let Ok(n) = self.notices.try_recv() {
            out.push(n);
        }
        out
    }

    fn files(&self) -> usize {
        fs::read_dir(self.dir.path()).unwrap().count()
    }

    fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

fn track(id: u64, duration_secs: u64) -> Track {
    Track {
        id,
        name: format!("Song {}", id),
        artists: vec!["Artist".to_string()],
        album: "Album".to_string(),
        duration_secs,
        vip: false,
    }
}

fn has_restriction(notices: &[Notice], op: &str) -> bool {
    notices
        .iter()
        .any(|n| matches!(n, Notice::Restricted(msg) if msg.starts_with(op)))
}

// ---- lifecycle ----

#[test]
fn test_play_then_stop_leaves_no_files() {
    let mut h = Harness::new(Setup::default());
    for index in 0..3 {
        h.play_and_wait(index);
        assert_eq!(h.controller.state(), PLAYING);
        assert_eq!(h.files(), 1);
        h.controller.stop();
        assert_eq!(h.controller.state(), SessionState::Empty);
        assert_eq!(h.files(), 0);
    }
}

#[test]
fn test_track_change_replaces_transient_file() {
    let mut h = Harness::new(Setup::default());
    h.play_and_wait(0);
    let first = h.controller.media_path().unwrap().to_path_buf();
    h.play_and_wait(1);
    assert!(!first.exists());
    assert_eq!(h.files(), 1);
    assert_eq!(h.controller.current_index(), Some(1));
}

#[test]
fn test_stop_while_loading_discards_late_download() {
    let mut h = Harness::new(Setup::default());
    h.controller.play_track(0);
    assert_eq!(h.controller.state(), SessionState::Loading);
    h.controller.stop();
    assert_eq!(h.controller.state(), SessionState::Empty);

    let settled = h.pump_until(Duration::from_secs(5), |h| {
        h.media.fetched.load(Ordering::SeqCst) == 1 && h.files() == 0
    });
    assert!(settled);
    assert_eq!(h.controller.state(), SessionState::Empty);
    assert!(!h.calls().iter().any(|c| c.ends_with(":play")));
}

#[test]
fn test_shutdown_releases_everything() {
    let mut h = Harness::new(Setup::default());
    h.play_and_wait(0);
    h.controller.shutdown();
    assert_eq!(h.files(), 0);
    assert_eq!(h.controller.state(), SessionState::Empty);
    assert_eq!(h.calls().last().map(String::as_str), Some("embedded:stop"));
}

#[test]
fn test_out_of_range_play_is_ignored() {
    let mut h = Harness::new(Setup::default());
    let before = h.controller.generation();
    h.controller.play_track(3);
    assert_eq!(h.controller.generation(), before);
    assert_eq!(h.controller.state(), SessionState::Empty);
    assert!(h.drain_notices().is_empty());
}

#[test]
fn test_toggle_from_empty_starts_first_track() {
    let mut h = Harness::new(Setup::default());
    h.controller.toggle_play_pause();
    assert!(h.pump_until(Duration::from_secs(5), |h| h.controller.state() == PLAYING));
    assert_eq!(h.controller.current_index(), Some(0));
}

// ---- clock and advance ----

#[test]
fn test_stale_clock_cannot_touch_new_session() {
    let mut h = Harness::new(Setup::default());
    h.play_and_wait(0);
    let stale = h.controller.generation();

    h.controller.play_track(1);
    h.drain_notices();
    // Past the end of track 0; a live tick would advance
    h.clock.advance(Duration::from_secs(30));
    h.controller.handle(EngineEvent::Tick { generation: stale });
    assert_eq!(h.controller.state(), SessionState::Loading);
    assert_eq!(h.controller.current_index(), Some(1));
    assert!(h.drain_notices().is_empty());

    assert!(h.pump_until(Duration::from_secs(5), |h| h.controller.state() == PLAYING));
    h.drain_notices();
    h.controller.handle(EngineEvent::Tick { generation: stale });
    assert_eq!(h.controller.state(), PLAYING);
    assert_eq!(h.controller.current_index(), Some(1));
    assert!(h.drain_notices().is_empty());
}

#[test]
fn test_track_end_advances_to_next() {
    let mut h = Harness::new(Setup::default());
    h.play_and_wait(0);

    h.clock.advance(Duration::from_secs(4));
    h.drain_notices();
    h.tick();
    let progress = h.drain_notices().into_iter().find_map(|n| match n {
        Notice::Progress(p) => Some(p),
        _ => None,
    });
    let progress = progress.expect("tick should publish progress");
    assert!((progress.fraction - 0.4).abs() < 1e-9);
    assert_eq!(progress.elapsed, "00:04");
    assert_eq!(progress.total, "00:10");

    h.clock.advance(Duration::from_secs(6));
    h.tick();
    assert!(h.pump_until(Duration::from_secs(5), |h| h.controller.state() == PLAYING));
    assert_eq!(h.controller.current_index(), Some(1));
    assert_eq!(h.files(), 1);
}

#[test]
fn test_real_clock_advances_on_its_own() {
    let mut h = Harness::new(Setup {
        durations: vec![1, 1, 1],
        real_clock: Some(Duration::from_millis(50)),
        ..Setup::default()
    });
    h.play_and_wait(0);
    let advanced = h.pump_until(Duration::from_secs(10), |h| {
        h.controller.current_index() == Some(1) && h.controller.state() == PLAYING
    });
    assert!(advanced);
}

#[test]
fn test_last_track_with_single_entry_stops() {
    let mut h = Harness::new(Setup {
        durations: vec![3],
        ..Setup::default()
    });
    h.play_and_wait(0);
    h.clock.advance(Duration::from_secs(3));
    h.tick();
    assert_eq!(h.controller.state(), SessionState::Empty);
    assert_eq!(h.files(), 0);
}

#[test]
fn test_previous_wraps_to_last() {
    let mut h = Harness::new(Setup::default());
    h.play_and_wait(0);
    h.controller.previous();
    assert!(h.pump_until(Duration::from_secs(5), |h| h.controller.state() == PLAYING));
    assert_eq!(h.controller.current_index(), Some(2));

    h.controller.next();
    assert!(h.pump_until(Duration::from_secs(5), |h| h.controller.state() == PLAYING));
    assert_eq!(h.controller.current_index(), Some(0));
}

#[test]
fn test_next_is_noop_with_one_track() {
    let mut h = Harness::new(Setup {
        durations: vec![5],
        ..Setup::default()
    });
    h.play_and_wait(0);
    let generation = h.controller.generation();
    h.controller.next();
    h.controller.previous();
    assert_eq!(h.controller.generation(), generation);
    assert_eq!(h.controller.state(), PLAYING);
}

// ---- transport ----

#[test]
fn test_pause_freezes_progress() {
    let mut h = Harness::new(Setup::default());
    h.play_and_wait(0);
    h.clock.advance(Duration::from_secs(3));
    h.controller.toggle_play_pause();
    assert_eq!(h.controller.state(), PAUSED);

    // A paused session never reaches the end
    h.clock.advance(Duration::from_secs(60));
    h.drain_notices();
    h.tick();
    assert!(h.drain_notices().is_empty());
    assert_eq!(h.controller.elapsed(), Duration::from_secs(3));

    h.controller.toggle_play_pause();
    assert_eq!(h.controller.state(), PLAYING);
    h.clock.advance(Duration::from_secs(2));
    assert_eq!(h.controller.elapsed(), Duration::from_secs(5));
    assert!(h.calls().contains(&"embedded:pause".to_string()));
    assert!(h.calls().contains(&"embedded:resume".to_string()));
}

#[test]
fn test_seek_rebases_clock_and_lyrics() {
    let mut h = Harness::new(Setup {
        durations: vec![100, 100],
        ..Setup::default()
    });
    h.play_and_wait(0);
    assert!(h.controller.lyrics().synced().is_some());

    h.clock.advance(Duration::from_secs(50));
    h.tick();
    assert_eq!(h.controller.lyric_index(), Some(5));

    h.controller.seek(0.1);
    assert_eq!(h.controller.elapsed(), Duration::from_secs(10));
    assert_eq!(h.controller.lyric_index(), Some(1));
    assert!(h.calls().contains(&"embedded:seek 10".to_string()));

    h.clock.advance(Duration::from_secs(15));
    h.tick();
    assert_eq!(h.controller.lyric_index(), Some(2));
}

#[test]
fn test_mode_switch_while_playing_forces_stop() {
    let mut h = Harness::new(Setup::default());
    h.play_and_wait(0);
    h.controller.toggle_mode();
    assert_eq!(h.controller.state(), SessionState::Empty);
    assert_eq!(h.controller.mode(), BackendKind::External);
    assert_eq!(h.files(), 0);
    assert!(h
        .drain_notices()
        .contains(&Notice::ModeChanged(BackendKind::External)));

    h.play_and_wait(0);
    assert_eq!(h.controller.state(), PLAYING);
    assert!(h.calls().contains(&"external:play".to_string()));
}

// ---- external backend ----

#[test]
fn test_external_capability_gaps_are_notices() {
    let mut h = Harness::new(Setup {
        mode: BackendKind::External,
        ..Setup::default()
    });
    h.play_and_wait(0);
    h.drain_notices();

    h.controller.toggle_play_pause();
    h.controller.seek(0.5);
    h.controller.set_volume(0.2);
    let notices = h.drain_notices();
    assert!(has_restriction(&notices, "pause"));
    assert!(has_restriction(&notices, "seek"));
    assert!(has_restriction(&notices, "volume"));
    assert!(!notices.iter().any(|n| matches!(n, Notice::Error(_))));
    assert_eq!(h.controller.state(), PLAYING);
    assert_eq!(h.controller.elapsed(), Duration::ZERO);
}

#[test]
fn test_external_spawn_failure_falls_back_to_embedded() {
    let mut h = Harness::new(Setup {
        mode: BackendKind::External,
        spawn_fails: true,
        ..Setup::default()
    });
    h.play_and_wait(0);
    assert_eq!(h.controller.state(), PLAYING);
    assert_eq!(h.controller.mode(), BackendKind::Embedded);
    assert!(h
        .drain_notices()
        .contains(&Notice::ModeChanged(BackendKind::Embedded)));
    assert!(h.calls().contains(&"embedded:play".to_string()));
}

// ---- failure paths ----

#[test]
fn test_decode_failure_is_repaired_once() {
    let mut tagged = b"ID3\x04\x00\x00\x00\x00\x00\x05TAGXX".to_vec();
    tagged.extend_from_slice(GOOD_AUDIO);
    let mut h = Harness::new(Setup {
        payload: tagged,
        ..Setup::default()
    });
    h.play_and_wait(0);
    assert_eq!(h.controller.state(), PLAYING);
    let loads = h.calls().iter().filter(|c| *c == "embedded:load").count();
    assert_eq!(loads, 2);
    let repaired = fs::read(h.controller.media_path().unwrap()).unwrap();
    assert_eq!(repaired, GOOD_AUDIO);
}

#[test]
fn test_loop_stays_responsive_while_repairing() {
    let mut tagged = b"ID3\x04\x00\x00\x00\x00\x00\x05TAGXX".to_vec();
    tagged.extend_from_slice(GOOD_AUDIO);
    let mut h = Harness::new(Setup {
        payload: tagged,
        repair_delay: Some(Duration::from_millis(300)),
        ..Setup::default()
    });

    h.controller.play_track(0);
    assert!(h.pump_until(Duration::from_secs(5), |h| h
        .calls()
        .contains(&"embedded:load".to_string())));
    // The file is with the repair task; the controller still takes commands
    assert_eq!(h.controller.state(), SessionState::Loading);
    assert!(h.controller.media_path().is_none());
    h.controller.load_comments(true);
    assert!(h.pump_until(Duration::from_secs(5), |h| h.controller.comments().len() == 20));
    assert_eq!(h.controller.state(), SessionState::Loading);

    assert!(h.pump_until(Duration::from_secs(5), |h| h.controller.state() == PLAYING));
    assert_eq!(fs::read(h.controller.media_path().unwrap()).unwrap(), GOOD_AUDIO);
}

#[test]
fn test_stop_during_repair_removes_file() {
    let mut tagged = b"ID3\x04\x00\x00\x00\x00\x00\x05TAGXX".to_vec();
    tagged.extend_from_slice(GOOD_AUDIO);
    let mut h = Harness::new(Setup {
        payload: tagged,
        repair_delay: Some(Duration::from_millis(200)),
        ..Setup::default()
    });

    h.controller.play_track(0);
    assert!(h.pump_until(Duration::from_secs(5), |h| h
        .calls()
        .contains(&"embedded:load".to_string())));
    h.controller.stop();
    assert_eq!(h.controller.state(), SessionState::Empty);

    // The late repair result is discarded and its file deleted
    let started = Instant::now();
    h.pump_until(Duration::from_millis(800), |_| false);
    assert!(started.elapsed() >= Duration::from_millis(800));
    assert_eq!(h.files(), 0);
    assert_eq!(h.controller.state(), SessionState::Empty);
    assert!(!h.calls().iter().any(|c| c.ends_with(":play")));
}

#[test]
fn test_unrepairable_media_ends_in_empty() {
    let mut h = Harness::new(Setup {
        payload: b"JUNKJUNKJUNK".to_vec(),
        ..Setup::default()
    });
    h.play_and_wait(0);
    assert_eq!(h.controller.state(), SessionState::Empty);
    assert_eq!(h.files(), 0);
    let loads = h.calls().iter().filter(|c| *c == "embedded:load").count();
    assert_eq!(loads, 1);
    assert!(h.drain_notices().iter().any(
        |n| matches!(n, Notice::Error(msg) if msg.contains("not a valid stream"))
    ));

    // Ready for another attempt
    h.controller.play_track(1);
    assert_eq!(h.controller.state(), SessionState::Loading);
}

#[test]
fn test_download_failure_reports_and_stays_empty() {
    let mut h = Harness::new(Setup {
        media_fails: true,
        ..Setup::default()
    });
    h.play_and_wait(0);
    assert_eq!(h.controller.state(), SessionState::Empty);
    assert!(h.drain_notices().iter().any(
        |n| matches!(n, Notice::Error(msg) if msg.starts_with("Network request failed"))
    ));
    assert!(!h.calls().iter().any(|c| c.ends_with(":load")));
}

#[test]
fn test_lyrics_failure_does_not_block_playback() {
    let mut h = Harness::new(Setup {
        lyric_failures: [1].into_iter().collect(),
        ..Setup::default()
    });
    h.play_and_wait(0);
    assert_eq!(h.controller.state(), PLAYING);
    assert_eq!(h.controller.lyrics(), &LyricsView::Missing);
    h.clock.advance(Duration::from_secs(2));
    h.tick();
    assert_eq!(h.controller.lyric_index(), None);
}

// ---- comments ----

#[test]
fn test_comment_pages_accumulate() {
    let mut h = Harness::new(Setup::default());
    h.play_and_wait(0);
    h.drain_notices();

    h.controller.load_comments(true);
    h.controller.load_comments(false);
    assert!(h
        .drain_notices()
        .contains(&Notice::Info("Comments are already loading".to_string())));
    assert!(h.pump_until(Duration::from_secs(5), |h| h.controller.comments().len() == 20));

    for expected in [40, 45] {
        h.controller.load_comments(false);
        assert!(h.pump_until(Duration::from_secs(5), |h| h.controller.comments().len()
            == expected));
    }
    assert_eq!(h.controller.comments_total(), Some(45));
    assert_eq!(h.controller.comments()[44].content, "comment 44");

    h.drain_notices();
    h.controller.load_comments(false);
    assert!(h
        .drain_notices()
        .contains(&Notice::Info("All 45 comments loaded".to_string())));

    h.controller.load_comments(true);
    assert!(h.pump_until(Duration::from_secs(5), |h| h.controller.comments().len() == 20));
}

#[test]
fn test_track_change_resets_comments() {
    let mut h = Harness::new(Setup::default());
    h.play_and_wait(0);
    h.controller.load_comments(true);
    assert!(h.pump_until(Duration::from_secs(5), |h| h.controller.comments().len() == 20));
    h.play_and_wait(1);
    assert!(h.controller.comments().is_empty());
    assert_eq!(h.controller.comments_total(), None);
}

#[test]
fn test_new_playlist_keeps_session_but_drops_track() {
    let mut h = Harness::new(Setup::default());
    h.play_and_wait(0);
    h.controller.set_playlist(vec![track(9, 30)]);
    assert_eq!(h.controller.state(), PLAYING);
    assert_eq!(h.controller.current_index(), None);
    assert!(h.controller.current_track().is_none());

    h.drain_notices();
    h.controller.load_comments(true);
    assert!(h
        .drain_notices()
        .contains(&Notice::Info("No track selected".to_string())));
}

// ---- save ----

#[test]
fn test_save_track_writes_destination() {
    let mut h = Harness::new(Setup::default());
    let out = tempfile::tempdir().unwrap();
    let dest = out.path().join("keep.mp3");
    h.controller.save_track(1, dest.clone());
    let saved = h.pump_until(Duration::from_secs(5), |_| {
        fs::read(&dest).map_or(false, |data| data == GOOD_AUDIO)
    });
    assert!(saved);
    assert_eq!(h.files(), 0);
}

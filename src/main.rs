use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{info, warn};

use cloudplay::app::cli::Args;
use cloudplay::app::config::{AppConfig, UserConfig};
use cloudplay::app::input_handler::HELP;
use cloudplay::app::{logging, AppEvent, Command};
use cloudplay::catalog::{Catalog, HttpCatalog, Track};
use cloudplay::error::EngineError;
use cloudplay::lyrics::LyricsView;
use cloudplay::media::{FormatRepair, MediaAcquirer};
use cloudplay::player::{BackendKind, SystemBackends};
use cloudplay::session::{
    EngineEvent, Notice, Progress, SessionController, SessionDeps, SessionOptions, SessionState,
    SystemClock, Transport,
};

/// Last values worth showing on demand.
#[derive(Default)]
struct View {
    progress: Option<Progress>,
}

// Blocking HTTP clients must be built and dropped outside the async runtime,
// so setup and teardown happen here and only the event loop runs inside it.
// Blocking-pool threads are exempt, which is where the clients are used.
fn main() -> Result<()> {
    human_panic::setup_panic!();
    let args = Args::parse();

    if args.generate_config {
        println!("{}", AppConfig::render(&UserConfig::default())?);
        return Ok(());
    }

    let _log_guard = match logging::init(&AppConfig::get_log_dir(), args.verbose) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("logging disabled: {:#}", e);
            None
        }
    };

    let config = AppConfig::load(args.config.as_deref());
    let mode = if args.external {
        BackendKind::External
    } else {
        config.playback.mode
    };
    info!(%mode, "starting");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("starting runtime")?;

    let catalog: Arc<dyn Catalog> = Arc::new(
        HttpCatalog::new(&config.api, &config.network).context("building catalog client")?,
    );
    let media = Arc::new(
        MediaAcquirer::new(&config.api, &config.network).context("building media client")?,
    );
    let deps = SessionDeps {
        catalog: Arc::clone(&catalog),
        media,
        backends: Box::new(SystemBackends::new(config.playback.external_command.clone())),
        repair: FormatRepair::new(&config.playback.transcoder),
        clock: Arc::new(SystemClock),
        runtime: runtime.handle().clone(),
    };
    let options = SessionOptions {
        mode,
        volume: config.playback.volume,
        tick_interval: Duration::from_millis(config.playback.tick_interval_ms.max(50)),
        comment_page_size: config.network.comment_page_size,
    };

    let (engine_tx, engine_rx) = mpsc::unbounded_channel();
    let (notice_tx, notice_rx) = mpsc::unbounded_channel();
    let mut controller = SessionController::new(deps, options, engine_tx, notice_tx);

    println!("cloudplay ({} mode). Type 'help' for commands.", mode);
    runtime.block_on(event_loop(&mut controller, &catalog, engine_rx, notice_rx));
    // The stdin reader or a download may still be parked in a blocking call
    runtime.shutdown_background();

    controller.shutdown();
    info!("exiting");
    Ok(())
}

async fn event_loop(
    controller: &mut SessionController,
    catalog: &Arc<dyn Catalog>,
    mut engine_rx: UnboundedReceiver<EngineEvent>,
    mut notice_rx: UnboundedReceiver<Notice>,
) {
    let (app_tx, mut app_rx) = mpsc::unbounded_channel();
    let mut view = View::default();

    // 1. Input task
    let tx_input = app_tx.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx_input.send(AppEvent::Input(line)).is_err() {
                        break;
                    }
                }
                _ => {
                    let _ = tx_input.send(AppEvent::InputClosed);
                    break;
                }
            }
        }
    });

    prompt();

    // 2. User input, worker results, engine notices
    loop {
        tokio::select! {
            Some(event) = app_rx.recv() => match event {
                AppEvent::Input(line) => {
                    match Command::parse(&line) {
                        Ok(Some(Command::Quit)) => break,
                        Ok(Some(cmd)) => run_command(cmd, controller, catalog, &app_tx, &view),
                        Ok(None) => {}
                        Err(msg) => println!("{}", msg),
                    }
                    prompt();
                }
                AppEvent::InputClosed => break,
                AppEvent::SearchDone { keyword, result } => {
                    match result {
                        Ok(tracks) => {
                            info!(%keyword, count = tracks.len(), "search finished");
                            print_tracks(&tracks);
                            controller.set_playlist(tracks);
                        }
                        Err(e) => {
                            warn!(%keyword, "search failed: {}", e);
                            println!("error: {}", EngineError::Fetch(e));
                        }
                    }
                    prompt();
                }
            },
            Some(event) = engine_rx.recv() => controller.handle(event),
            Some(notice) = notice_rx.recv() => render(notice, controller, &mut view),
            else => break,
        }
    }
}

fn run_command(
    cmd: Command,
    controller: &mut SessionController,
    catalog: &Arc<dyn Catalog>,
    app_tx: &UnboundedSender<AppEvent>,
    view: &View,
) {
    match cmd {
        Command::Search(keyword) => {
            println!("searching '{}'...", keyword);
            let catalog = Arc::clone(catalog);
            let tx = app_tx.clone();
            tokio::task::spawn_blocking(move || {
                let result = catalog.search(&keyword);
                let _ = tx.send(AppEvent::SearchDone { keyword, result });
            });
        }
        Command::List => {
            let tracks: Vec<Track> = controller.playlist().tracks().cloned().collect();
            print_tracks(&tracks);
        }
        Command::Play(index) => {
            if index >= controller.playlist().len() {
                println!("no track #{}", index + 1);
            } else {
                controller.play_track(index);
            }
        }
        Command::Toggle => controller.toggle_play_pause(),
        Command::Next => controller.next(),
        Command::Previous => controller.previous(),
        Command::Stop => controller.stop(),
        Command::Seek(percent) => controller.seek(percent / 100.0),
        Command::Volume(percent) => {
            controller.set_volume(percent / 100.0);
            println!("volume {:.0}%", controller.volume() * 100.0);
        }
        Command::Mode(Some(mode)) => controller.set_mode(mode),
        Command::Mode(None) => controller.toggle_mode(),
        Command::Comments => controller.load_comments(true),
        Command::MoreComments => controller.load_comments(false),
        Command::Lyrics => print_lyrics(controller.lyrics(), controller.lyric_index()),
        Command::Save(index, path) => controller.save_track(index, path),
        Command::Status => print_status(controller, view),
        Command::Help => println!("{}", HELP),
        Command::Quit => {}
    }
}

fn render(notice: Notice, controller: &SessionController, view: &mut View) {
    match notice {
        Notice::StateChanged(state) => {
            if state == SessionState::Empty {
                view.progress = None;
            }
            println!("[{}]", state_label(state));
        }
        Notice::TrackChanged { index, track } => {
            println!(
                "{}. {} - {} ({})",
                index + 1,
                track.display_name(),
                track.artist_line(),
                cloudplay::session::format_time(track.duration_secs)
            );
        }
        Notice::Progress(progress) => view.progress = Some(progress),
        Notice::Lyrics(LyricsView::Plain(_)) => println!("(lyrics are not timed, type 'lyrics')"),
        Notice::Lyrics(LyricsView::Missing) => println!("(no lyrics)"),
        Notice::Lyrics(_) => {}
        Notice::ActiveLyric(Some(index)) => {
            if let Some(line) = controller
                .lyrics()
                .synced()
                .and_then(|t| t.lines().get(index))
            {
                println!("  \u{266a} {}", line.text);
            }
        }
        Notice::ActiveLyric(None) => {}
        Notice::Comments {
            added,
            reset,
            loaded,
            total,
        } => {
            if reset && added.is_empty() {
                return;
            }
            for c in &added {
                println!("  {} (\u{2665} {}): {}", c.user, c.liked_count, c.content);
            }
            if loaded < total {
                println!("[{}/{} comments, 'more' for more]", loaded, total);
            } else {
                println!("[{} comments]", loaded);
            }
        }
        Notice::ModeChanged(mode) => println!("mode: {}", mode),
        Notice::Restricted(msg) => println!("! {}", msg),
        Notice::Info(msg) => println!("{}", msg),
        Notice::Error(msg) => println!("error: {}", msg),
    }
}

fn state_label(state: SessionState) -> &'static str {
    match state {
        SessionState::Empty => "stopped",
        SessionState::Loading => "loading",
        SessionState::Active(Transport::Playing) => "playing",
        SessionState::Active(Transport::Paused) => "paused",
    }
}

fn print_tracks(tracks: &[Track]) {
    if tracks.is_empty() {
        println!("no results");
        return;
    }
    for (i, t) in tracks.iter().enumerate() {
        println!(
            "{:>3}. {} - {} [{}] {}",
            i + 1,
            t.display_name(),
            t.artist_line(),
            t.album,
            cloudplay::session::format_time(t.duration_secs)
        );
    }
}

fn print_lyrics(lyrics: &LyricsView, active: Option<usize>) {
    match lyrics {
        LyricsView::Loading => println!("(loading lyrics)"),
        LyricsView::Missing => println!("(no lyrics)"),
        LyricsView::Plain(lines) => lines.iter().for_each(|l| println!("  {}", l)),
        LyricsView::Synced(track) => {
            for (i, line) in track.lines().iter().enumerate() {
                let marker = if Some(i) == active { ">" } else { " " };
                println!("{} {}", marker, line.text);
            }
        }
    }
}

fn print_status(controller: &SessionController, view: &View) {
    let state = controller.state();
    let track = controller
        .current_track()
        .map(|t| format!("{} - {}", t.display_name(), t.artist_line()))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "[{}] {} | mode {} | volume {:.0}%",
        state_label(state),
        track,
        controller.mode(),
        controller.volume() * 100.0
    );
    if let Some(p) = &view.progress {
        const WIDTH: usize = 30;
        let filled = ((p.fraction * WIDTH as f64).round() as usize).min(WIDTH);
        println!(
            "{} [{}{}] {}",
            p.elapsed,
            "#".repeat(filled),
            "-".repeat(WIDTH - filled),
            p.total
        );
    }
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

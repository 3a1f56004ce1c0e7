use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::traits::{BackendKind, BackendState, PlaybackBackend};
use crate::error::BackendError;

const TERMINATE_GRACE: Duration = Duration::from_millis(500);

/// Delegates playback to an OS-level player process.
///
/// Only process liveness is observable, so pause, seek and volume are
/// reported as unsupported.
pub struct ExternalBackend {
    /// Program followed by its arguments; the media path is appended. Empty
    /// means the platform "open with default application" command.
    command: Vec<String>,
    path: Option<PathBuf>,
    child: Option<Child>,
    state: BackendState,
}

impl ExternalBackend {
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            path: None,
            child: None,
            state: BackendState::Idle,
        }
    }

    /// True while the spawned player process has not exited.
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.as_mut().map(|c| c.try_wait()), Some(Ok(None)))
    }

    fn open_command(&self, path: &Path) -> Command {
        if let Some((program, args)) = self.command.split_first() {
            let mut cmd = Command::new(program);
            cmd.args(args).arg(path);
            return cmd;
        }
        default_open_command(path)
    }
}

#[cfg(target_os = "windows")]
fn default_open_command(path: &Path) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.args(["/C", "start", ""]).arg(path);
    cmd
}

#[cfg(target_os = "macos")]
fn default_open_command(path: &Path) -> Command {
    let mut cmd = Command::new("open");
    cmd.arg(path);
    cmd
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn default_open_command(path: &Path) -> Command {
    let mut cmd = Command::new("xdg-open");
    cmd.arg(path);
    cmd
}

/// Ask the process to exit, then force it after a short grace period.
fn terminate(mut child: Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Err(e) = kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM) {
            debug!("SIGTERM failed: {}", e);
        }
        let deadline = Instant::now() + TERMINATE_GRACE;
        while Instant::now() < deadline {
            if let Ok(Some(_)) = child.try_wait() {
                return;
            }
            thread::sleep(Duration::from_millis(20));
        }
    }

    if let Err(e) = child.kill() {
        warn!("failed to kill external player: {}", e);
    }
    let _ = child.wait();
}

impl PlaybackBackend for ExternalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::External
    }

    fn state(&self) -> BackendState {
        self.state
    }

    fn load(&mut self, path: &Path) -> Result<(), BackendError> {
        self.stop();
        self.path = Some(path.to_path_buf());
        self.state = BackendState::Loaded;
        Ok(())
    }

    fn play(&mut self) -> Result<(), BackendError> {
        let path = self.path.clone().ok_or(BackendError::NotLoaded)?;
        if self.state == BackendState::Playing {
            return Ok(());
        }
        let child = self
            .open_command(&path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(BackendError::Spawn)?;
        debug!(pid = child.id(), path = %path.display(), "external player started");
        self.child = Some(child);
        self.state = BackendState::Playing;
        Ok(())
    }

    fn pause(&mut self) -> Result<(), BackendError> {
        Err(BackendError::Unsupported("pause"))
    }

    fn resume(&mut self) -> Result<(), BackendError> {
        Err(BackendError::Unsupported("resume"))
    }

    fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            match child.try_wait() {
                Ok(None) => terminate(child),
                // Already gone (launchers like xdg-open exit right away)
                Ok(Some(_)) => {}
                Err(e) => warn!("cannot query external player: {}", e),
            }
        }
        self.path = None;
        self.state = BackendState::Idle;
    }

    fn seek(&mut self, _position: Duration) -> Result<(), BackendError> {
        Err(BackendError::Unsupported("seek"))
    }

    fn set_volume(&mut self, _volume: f32) -> Result<(), BackendError> {
        Err(BackendError::Unsupported("volume"))
    }
}

impl Drop for ExternalBackend {
    fn drop(&mut self) {
        self.stop();
    }
}

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use tracing::debug;

use super::traits::{BackendKind, BackendState, PlaybackBackend};
use crate::error::BackendError;

type FileDecoder = Decoder<BufReader<File>>;

/// In-process playback through a rodio mixer.
///
/// The output device is opened lazily on the first successful decode and kept
/// for the lifetime of the backend.
pub struct EmbeddedBackend {
    output: Option<(OutputStream, OutputStreamHandle)>,
    sink: Option<Sink>,
    path: Option<PathBuf>,
    volume: f32,
    state: BackendState,
}

impl EmbeddedBackend {
    pub fn new(volume: f32) -> Self {
        Self {
            output: None,
            sink: None,
            path: None,
            volume: volume.clamp(0.0, 1.0),
            state: BackendState::Idle,
        }
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    fn output_handle(&mut self) -> Result<&OutputStreamHandle, BackendError> {
        let output = match self.output.take() {
            Some(output) => output,
            None => OutputStream::try_default().map_err(|e| BackendError::Device(e.to_string()))?,
        };
        Ok(&self.output.insert(output).1)
    }

    /// Build a paused sink for `path`, skipped forward to `start_at`.
    fn open_sink(&mut self, path: &Path, start_at: Duration) -> Result<Sink, BackendError> {
        // Decode before touching the device so malformed media is reported as such
        let source = decode(path)?;
        let volume = self.volume;
        let handle = self.output_handle()?;

        let sink = Sink::try_new(handle).map_err(|e| BackendError::Device(e.to_string()))?;
        sink.set_volume(volume);
        sink.pause();
        sink.append(source.skip_duration(start_at));
        Ok(sink)
    }
}

fn decode(path: &Path) -> Result<FileDecoder, BackendError> {
    let file = File::open(path).map_err(|e| BackendError::Decode(e.to_string()))?;
    Decoder::new(BufReader::new(file)).map_err(|e| BackendError::Decode(e.to_string()))
}

impl PlaybackBackend for EmbeddedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Embedded
    }

    fn state(&self) -> BackendState {
        self.state
    }

    fn load(&mut self, path: &Path) -> Result<(), BackendError> {
        self.stop();
        let sink = self.open_sink(path, Duration::ZERO)?;
        self.sink = Some(sink);
        self.path = Some(path.to_path_buf());
        self.state = BackendState::Loaded;
        Ok(())
    }

    fn play(&mut self) -> Result<(), BackendError> {
        let sink = self.sink.as_ref().ok_or(BackendError::NotLoaded)?;
        sink.play();
        self.state = BackendState::Playing;
        Ok(())
    }

    fn pause(&mut self) -> Result<(), BackendError> {
        if let (BackendState::Playing, Some(sink)) = (self.state, self.sink.as_ref()) {
            sink.pause();
            self.state = BackendState::Paused;
        }
        Ok(())
    }

    fn resume(&mut self) -> Result<(), BackendError> {
        if let (BackendState::Paused, Some(sink)) = (self.state, self.sink.as_ref()) {
            sink.play();
            self.state = BackendState::Playing;
        }
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        self.path = None;
        self.state = BackendState::Idle;
    }

    /// rodio 0.17 sinks cannot seek, so the source is reopened and skipped
    /// forward. The transport state is preserved.
    fn seek(&mut self, position: Duration) -> Result<(), BackendError> {
        let path = self.path.clone().ok_or(BackendError::NotLoaded)?;
        let sink = self.open_sink(&path, position)?;
        if self.state == BackendState::Playing {
            sink.play();
        }
        if let Some(old) = self.sink.replace(sink) {
            old.stop();
        }
        debug!(position_secs = position.as_secs_f64(), "embedded seek");
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) -> Result<(), BackendError> {
        self.volume = volume.clamp(0.0, 1.0);
        if let Some(sink) = self.sink.as_ref() {
            sink.set_volume(self.volume);
        }
        Ok(())
    }
}

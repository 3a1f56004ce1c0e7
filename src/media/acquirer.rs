use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use reqwest::blocking::Client;
use tempfile::{NamedTempFile, TempPath};
use tracing::{debug, warn};

use crate::app::config::{ApiConfig, NetworkConfig};
use crate::catalog::build_client;
use crate::error::FetchError;

/// Download buffer size. The response is never held in memory as a whole.
pub const CHUNK_SIZE: usize = 16 * 1024;

/// A session-owned local copy of a remote track. The file is removed when
/// this value is released or dropped.
#[derive(Debug)]
pub struct TransientMedia {
    path: TempPath,
}

impl TransientMedia {
    /// Create an empty transient file, in `dir` or the OS temp directory.
    pub fn create(dir: Option<&Path>) -> io::Result<(File, Self)> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("cloudplay-").suffix(".mp3");
        let named = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        let (file, path) = named.into_parts();
        Ok((file, Self { path }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file now, reporting failures instead of swallowing them.
    pub fn release(self) -> io::Result<()> {
        self.path.close()
    }
}

/// Turns a track id into a local file.
pub trait MediaSource: Send + Sync {
    fn resolve_and_fetch(&self, track_id: u64) -> Result<TransientMedia, FetchError>;

    /// Download a track to a permanent location. Nothing is left at
    /// `destination` unless the whole body arrived.
    fn save_to(&self, track_id: u64, destination: &Path) -> Result<u64, FetchError>;
}

pub struct MediaAcquirer {
    client: Client,
    url_template: String,
    temp_dir: Option<PathBuf>,
}

impl MediaAcquirer {
    pub fn new(api: &ApiConfig, network: &NetworkConfig) -> Result<Self, FetchError> {
        Ok(Self::with_client(
            build_client(api, network)?,
            &api.media_url_template,
            None,
        ))
    }

    pub fn with_client(client: Client, url_template: &str, temp_dir: Option<PathBuf>) -> Self {
        Self {
            client,
            url_template: url_template.to_string(),
            temp_dir,
        }
    }

    /// Direct media URL; plain substitution, no negotiation.
    pub fn media_url(&self, track_id: u64) -> String {
        self.url_template.replace("{id}", &track_id.to_string())
    }

    fn stream_to(&self, url: &str, out: &mut File) -> Result<u64, FetchError> {
        let mut resp = self.client.get(url).send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut written: u64 = 0;
        loop {
            let n = match resp.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(FetchError::Io(e)),
            };
            out.write_all(&buf[..n])?;
            written += n as u64;
        }
        out.flush()?;

        if written == 0 {
            return Err(FetchError::Payload("empty media body".to_string()));
        }
        Ok(written)
    }
}

impl MediaSource for MediaAcquirer {
    fn resolve_and_fetch(&self, track_id: u64) -> Result<TransientMedia, FetchError> {
        let url = self.media_url(track_id);
        let (mut file, media) = TransientMedia::create(self.temp_dir.as_deref())?;

        match self.stream_to(&url, &mut file) {
            Ok(bytes) => {
                debug!(track_id, bytes, path = %media.path().display(), "media downloaded");
                Ok(media)
            }
            Err(e) => {
                drop(file);
                if let Err(cleanup) = media.release() {
                    warn!("failed to remove partial download: {}", cleanup);
                }
                Err(e)
            }
        }
    }

    fn save_to(&self, track_id: u64, destination: &Path) -> Result<u64, FetchError> {
        let dir = destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut staging = NamedTempFile::new_in(dir)?;
        let written = self.stream_to(&self.media_url(track_id), staging.as_file_mut())?;
        staging
            .persist(destination)
            .map_err(|e| FetchError::Io(e.error))?;
        Ok(written)
    }
}

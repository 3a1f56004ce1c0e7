use serde::{Deserialize, Serialize};

use crate::player::BackendKind;

/// User-editable configuration, stored in `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
}

/// Remote catalog endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub search_url: String,
    pub lyric_url: String,
    /// Track id is appended
    pub comment_url: String,
    /// `{id}` is replaced with the track id
    pub media_url_template: String,
    pub user_agent: String,
    pub referer: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            search_url: "https://music.163.com/api/search/get".to_string(),
            lyric_url: "https://music.163.com/api/song/lyric".to_string(),
            comment_url: "https://music.163.com/api/v1/resource/comments/R_SO_4_".to_string(),
            media_url_template: "https://music.163.com/song/media/outer/url?id={id}.mp3"
                .to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3"
                .to_string(),
            referer: "https://music.163.com/".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub connect_timeout_secs: u64,
    /// Whole-request limit, downloads included
    pub request_timeout_secs: u64,
    pub search_limit: usize,
    pub comment_page_size: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            request_timeout_secs: 60,
            search_limit: 30,
            comment_page_size: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub mode: BackendKind,
    /// 0.0 - 1.0
    pub volume: f32,
    pub tick_interval_ms: u64,
    pub transcoder: String,
    /// Replaces the platform "open" command; the file path is appended
    pub external_command: Vec<String>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            mode: BackendKind::Embedded,
            volume: 0.7,
            tick_interval_ms: 1000,
            transcoder: "ffmpeg".to_string(),
            external_command: Vec::new(),
        }
    }
}

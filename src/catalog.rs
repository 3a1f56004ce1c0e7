use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, REFERER, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::app::config::{ApiConfig, NetworkConfig};
use crate::error::FetchError;
use crate::lyrics;

/// A catalog entry. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: u64,
    pub name: String,
    pub artists: Vec<String>,
    pub album: String,
    /// Whole seconds, as reported by the catalog
    pub duration_secs: u64,
    /// Paid track; may only stream a preview
    #[serde(default)]
    pub vip: bool,
}

impl Track {
    pub fn display_name(&self) -> String {
        if self.vip {
            format!("{} [VIP]", self.name)
        } else {
            self.name.clone()
        }
    }

    pub fn artist_line(&self) -> String {
        self.artists.join("/")
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub user: String,
    pub content: String,
    /// Unix epoch milliseconds
    pub time_ms: i64,
    pub liked_count: u64,
}

/// One page of comments plus the server-reported total.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommentBatch {
    pub comments: Vec<Comment>,
    pub total: usize,
}

/// Raw lyric text as delivered by the catalog.
#[derive(Debug, Clone, PartialEq)]
pub enum LyricsPayload {
    Timestamped(String),
    Plain(String),
    Missing,
}

impl LyricsPayload {
    pub fn from_raw(raw: Option<String>) -> Self {
        match raw {
            Some(text) if !text.trim().is_empty() => {
                if lyrics::has_timestamps(&text) {
                    Self::Timestamped(text)
                } else {
                    Self::Plain(text)
                }
            }
            _ => Self::Missing,
        }
    }
}

/// The remote catalog the engine consumes. Implementations block; callers run
/// them on worker threads.
pub trait Catalog: Send + Sync {
    fn search(&self, keyword: &str) -> Result<Vec<Track>, FetchError>;
    fn fetch_lyrics(&self, track_id: u64) -> Result<LyricsPayload, FetchError>;
    fn fetch_comments(
        &self,
        track_id: u64,
        offset: usize,
        limit: usize,
    ) -> Result<CommentBatch, FetchError>;
}

// --- Wire format ---

#[derive(Debug, Deserialize)]
struct SearchResponse {
    code: i64,
    result: Option<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    songs: Vec<SongDto>,
}

#[derive(Debug, Deserialize)]
struct SongDto {
    id: u64,
    name: String,
    #[serde(default)]
    artists: Vec<NamedDto>,
    album: Option<NamedDto>,
    /// Milliseconds
    #[serde(default)]
    duration: u64,
    #[serde(default)]
    fee: i64,
}

#[derive(Debug, Deserialize)]
struct NamedDto {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct LyricResponse {
    code: i64,
    lrc: Option<LyricBlock>,
    tlyric: Option<LyricBlock>,
    #[serde(default)]
    nolyric: bool,
}

#[derive(Debug, Deserialize)]
struct LyricBlock {
    lyric: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommentResponse {
    code: i64,
    #[serde(default)]
    comments: Vec<CommentDto>,
    #[serde(default)]
    total: usize,
}

#[derive(Debug, Deserialize)]
struct CommentDto {
    user: Option<UserDto>,
    #[serde(default)]
    content: String,
    #[serde(default)]
    time: i64,
    #[serde(rename = "likedCount", default)]
    liked_count: u64,
}

#[derive(Debug, Deserialize)]
struct UserDto {
    #[serde(default)]
    nickname: String,
}

fn check_code(code: i64) -> Result<(), FetchError> {
    if code == 200 {
        Ok(())
    } else {
        Err(FetchError::Api(code))
    }
}

fn tracks_from(resp: SearchResponse) -> Result<Vec<Track>, FetchError> {
    check_code(resp.code)?;
    let songs = resp.result.map(|r| r.songs).unwrap_or_default();
    Ok(songs
        .into_iter()
        .map(|s| Track {
            id: s.id,
            name: s.name,
            artists: s.artists.into_iter().map(|a| a.name).collect(),
            album: s.album.map(|a| a.name).unwrap_or_default(),
            duration_secs: s.duration / 1000,
            vip: s.fee > 0,
        })
        .collect())
}

fn lyrics_from(resp: LyricResponse) -> Result<LyricsPayload, FetchError> {
    check_code(resp.code)?;
    if resp.nolyric {
        return Ok(LyricsPayload::Missing);
    }
    let text = |b: Option<LyricBlock>| b.and_then(|b| b.lyric).filter(|t| !t.trim().is_empty());
    // Original lyrics first, translation as fallback
    let raw = text(resp.lrc).or_else(|| text(resp.tlyric));
    Ok(LyricsPayload::from_raw(raw))
}

fn comments_from(resp: CommentResponse) -> Result<CommentBatch, FetchError> {
    check_code(resp.code)?;
    Ok(CommentBatch {
        total: resp.total,
        comments: resp
            .comments
            .into_iter()
            .map(|c| Comment {
                user: c
                    .user
                    .map(|u| u.nickname)
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| "unknown".to_string()),
                content: c.content,
                time_ms: c.time,
                liked_count: c.liked_count,
            })
            .collect(),
    })
}

/// Blocking client for the fixed remote catalog API.
pub struct HttpCatalog {
    client: Client,
    api: ApiConfig,
    search_limit: usize,
}

impl HttpCatalog {
    pub fn new(api: &ApiConfig, network: &NetworkConfig) -> Result<Self, FetchError> {
        Ok(Self {
            client: build_client(api, network)?,
            api: api.clone(),
            search_limit: network.search_limit,
        })
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let resp = self.client.get(url).query(query).send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        resp.json::<T>()
            .map_err(|e| FetchError::Payload(e.to_string()))
    }
}

impl Catalog for HttpCatalog {
    fn search(&self, keyword: &str) -> Result<Vec<Track>, FetchError> {
        let query = [
            ("s", keyword.to_string()),
            ("type", "1".to_string()),
            ("offset", "0".to_string()),
            ("limit", self.search_limit.to_string()),
        ];
        tracks_from(self.get_json(&self.api.search_url, &query)?)
    }

    fn fetch_lyrics(&self, track_id: u64) -> Result<LyricsPayload, FetchError> {
        let query = [
            ("id", track_id.to_string()),
            ("lv", "-1".to_string()),
            ("kv", "-1".to_string()),
            ("tv", "-1".to_string()),
        ];
        lyrics_from(self.get_json(&self.api.lyric_url, &query)?)
    }

    fn fetch_comments(
        &self,
        track_id: u64,
        offset: usize,
        limit: usize,
    ) -> Result<CommentBatch, FetchError> {
        let url = format!("{}{}", self.api.comment_url, track_id);
        let query = [
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
            ("csrf_token", String::new()),
        ];
        comments_from(self.get_json(&url, &query)?)
    }
}

/// Shared client builder: browser-like headers plus bounded timeouts so a
/// stalled peer cannot wedge a worker.
pub fn build_client(api: &ApiConfig, network: &NetworkConfig) -> Result<Client, FetchError> {
    let mut headers = HeaderMap::new();
    if let Ok(v) = HeaderValue::from_str(&api.user_agent) {
        headers.insert(USER_AGENT, v);
    }
    if let Ok(v) = HeaderValue::from_str(&api.referer) {
        headers.insert(REFERER, v);
    }

    Ok(Client::builder()
        .default_headers(headers)
        .connect_timeout(Duration::from_secs(network.connect_timeout_secs))
        .timeout(Duration::from_secs(network.request_timeout_secs))
        .build()?)
}

use serde::{Deserialize, Serialize};

use crate::catalog::LyricsPayload;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyricLine {
    /// Seconds from the start of the track
    pub timestamp: f64,
    pub text: String,
}

/// Time-ordered lyric lines for one track. May be empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LyricTrack {
    lines: Vec<LyricLine>,
}

impl LyricTrack {
    /// Parse `[mm:ss.ff]text` lines. Lines without a timestamp prefix or with
    /// empty text are dropped. A line may carry several stacked timestamps.
    pub fn parse(raw: &str) -> Self {
        let mut lines = Vec::new();
        for line in raw.lines() {
            let (stamps, text) = split_timestamps(line);
            let text = text.trim();
            if stamps.is_empty() || text.is_empty() {
                continue;
            }
            for timestamp in stamps {
                lines.push(LyricLine {
                    timestamp,
                    text: text.to_string(),
                });
            }
        }
        // Source order is not trusted; stable sort keeps equal stamps in order
        lines.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        Self { lines }
    }

    pub fn lines(&self) -> &[LyricLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Greatest index whose timestamp is `<= elapsed`, or `None` before the
    /// first line.
    ///
    /// Scans forward from `last` while time keeps moving forward; if `elapsed`
    /// went back past `last` (a seek), the scan restarts from the top.
    pub fn resolve_active(&self, elapsed: f64, last: Option<usize>) -> Option<usize> {
        let first = self.lines.first()?;

        let mut idx = match last {
            Some(i) if i < self.lines.len() && self.lines[i].timestamp <= elapsed => i,
            _ => {
                if first.timestamp > elapsed {
                    return None;
                }
                0
            }
        };

        while idx + 1 < self.lines.len() && self.lines[idx + 1].timestamp <= elapsed {
            idx += 1;
        }
        Some(idx)
    }
}

/// What the lyric pane should show for the current track.
#[derive(Debug, Clone, PartialEq)]
pub enum LyricsView {
    Loading,
    Synced(LyricTrack),
    /// Unsynchronized text, shown as-is
    Plain(Vec<String>),
    Missing,
}

impl LyricsView {
    pub fn from_payload(payload: LyricsPayload) -> Self {
        match payload {
            LyricsPayload::Timestamped(raw) => {
                let track = LyricTrack::parse(&raw);
                if track.is_empty() {
                    Self::plain(&raw)
                } else {
                    Self::Synced(track)
                }
            }
            LyricsPayload::Plain(raw) => Self::plain(&raw),
            LyricsPayload::Missing => Self::Missing,
        }
    }

    fn plain(raw: &str) -> Self {
        let lines: Vec<String> = raw
            .lines()
            .map(|l| split_timestamps(l).1.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        if lines.is_empty() {
            Self::Missing
        } else {
            Self::Plain(lines)
        }
    }

    pub fn synced(&self) -> Option<&LyricTrack> {
        match self {
            Self::Synced(track) => Some(track),
            _ => None,
        }
    }
}

/// True when at least one line starts with a valid timestamp.
pub fn has_timestamps(raw: &str) -> bool {
    raw.lines().any(|l| !split_timestamps(l).0.is_empty())
}

/// Peel leading `[mm:ss.ff]` tags off a line.
fn split_timestamps(line: &str) -> (Vec<f64>, &str) {
    let mut stamps = Vec::new();
    let mut rest = line;
    while let Some(body) = rest.strip_prefix('[') {
        let Some(end) = body.find(']') else { break };
        let Some(ts) = parse_timestamp(&body[..end]) else { break };
        stamps.push(ts);
        rest = &body[end + 1..];
    }
    (stamps, rest)
}

/// `mm:ss.fraction` to seconds. Minutes may exceed 59; the fraction is required.
fn parse_timestamp(ts: &str) -> Option<f64> {
    let (min, sec) = ts.split_once(':')?;
    let (whole, frac) = sec.split_once('.')?;

    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(min) || !all_digits(whole) || !all_digits(frac) {
        return None;
    }

    let minutes: f64 = min.parse().ok()?;
    let seconds: f64 = sec.parse().ok()?;
    Some(minutes * 60.0 + seconds)
}

use std::path::PathBuf;

use crate::player::BackendKind;

/// One line of user input, parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Search(String),
    List,
    /// Zero-based playlist index
    Play(usize),
    Toggle,
    Next,
    Previous,
    Stop,
    /// Percent of the track, 0-100
    Seek(f64),
    /// Percent, 0-100
    Volume(f32),
    /// `None` toggles
    Mode(Option<BackendKind>),
    Comments,
    MoreComments,
    Lyrics,
    Save(usize, PathBuf),
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  search <words>      s <words>     search the catalog
  list                ls            show the results again
  play <n>            p <n>         play result n
  toggle              space         pause / resume (or start)
  next | prev                       skip around the list
  stop                              stop playback
  seek <0-100>                      jump to a percent of the track
  vol <0-100>                       set volume
  mode [embedded|external]          switch playback backend
  comments | more                   first / next page of comments
  lyrics                            show the lyrics
  save <n> <path>                   download result n to a file
  status                            what is playing
  quit                              exit";

impl Command {
    /// `Ok(None)` for a blank line; `Err` carries a message for the user.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        if line.is_empty() {
            return Ok(None);
        }
        // A line of nothing but spaces is the play/pause shortcut
        let line = line.trim();
        if line.is_empty() {
            return Ok(Some(Self::Toggle));
        }
        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((h, r)) => (h, r.trim()),
            None => (line, ""),
        };

        let cmd = match head.to_ascii_lowercase().as_str() {
            "search" | "s" | "/" => {
                if rest.is_empty() {
                    return Err("search needs keywords".to_string());
                }
                Self::Search(rest.to_string())
            }
            "list" | "ls" | "l" => Self::List,
            "play" | "p" => Self::Play(parse_index(rest)?),
            "toggle" | "pause" | "resume" | "t" => Self::Toggle,
            "next" | "n" => Self::Next,
            "prev" | "previous" | "b" => Self::Previous,
            "stop" | "x" => Self::Stop,
            "seek" => Self::Seek(parse_percent(rest)?),
            "vol" | "volume" => Self::Volume(parse_percent(rest)? as f32),
            "mode" | "m" => {
                if rest.is_empty() {
                    Self::Mode(None)
                } else {
                    Self::Mode(Some(rest.parse()?))
                }
            }
            "comments" | "c" => Self::Comments,
            "more" => Self::MoreComments,
            "lyrics" | "lrc" => Self::Lyrics,
            "save" => {
                let (index, path) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| "usage: save <n> <path>".to_string())?;
                let path = path.trim();
                if path.is_empty() {
                    return Err("usage: save <n> <path>".to_string());
                }
                Self::Save(parse_index(index)?, PathBuf::from(path))
            }
            "status" | "st" => Self::Status,
            "help" | "h" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            other => return Err(format!("unknown command '{}', try 'help'", other)),
        };
        Ok(Some(cmd))
    }
}

/// Users count from 1.
fn parse_index(s: &str) -> Result<usize, String> {
    match s.trim().parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n - 1),
        _ => Err(format!("expected a track number, got '{}'", s.trim())),
    }
}

fn parse_percent(s: &str) -> Result<f64, String> {
    match s.trim().trim_end_matches('%').parse::<f64>() {
        Ok(v) if (0.0..=100.0).contains(&v) => Ok(v),
        _ => Err(format!("expected 0-100, got '{}'", s.trim())),
    }
}

//! Playback session engine: transport state, progress clock, track advance,
//! transient media lifecycle and comment paging.

pub mod clock;
pub mod comments;
pub mod controller;
pub mod events;
pub mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use comments::{CommentPager, PageRefusal, PageRequest, PageUpdate};
pub use controller::{SessionController, SessionDeps, SessionOptions};
pub use events::{format_time, EngineEvent, Notice, Progress};
pub use state::{PlaybackSession, Playlist, SessionState, Transport};

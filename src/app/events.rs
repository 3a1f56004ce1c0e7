use crate::catalog::Track;
use crate::error::FetchError;

/// Front-end events that are not owned by the session engine.
#[derive(Debug)]
pub enum AppEvent {
    Input(String),
    /// stdin closed
    InputClosed,
    SearchDone {
        keyword: String,
        result: Result<Vec<Track>, FetchError>,
    },
}

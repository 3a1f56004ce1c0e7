pub mod embedded;
pub mod external;
pub mod traits;

pub use embedded::EmbeddedBackend;
pub use external::ExternalBackend;
pub use traits::{BackendKind, BackendState, Capabilities, PlaybackBackend};

/// Builds a backend for the requested mode.
pub trait BackendFactory {
    fn create(&self, kind: BackendKind, volume: f32) -> Box<dyn PlaybackBackend>;
}

/// Real backends: rodio for embedded, a spawned process for external.
#[derive(Debug, Clone, Default)]
pub struct SystemBackends {
    pub external_command: Vec<String>,
}

impl SystemBackends {
    pub fn new(external_command: Vec<String>) -> Self {
        Self { external_command }
    }
}

impl BackendFactory for SystemBackends {
    fn create(&self, kind: BackendKind, volume: f32) -> Box<dyn PlaybackBackend> {
        match kind {
            BackendKind::Embedded => Box::new(EmbeddedBackend::new(volume)),
            BackendKind::External => Box::new(ExternalBackend::new(self.external_command.clone())),
        }
    }
}

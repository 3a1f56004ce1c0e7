pub mod acquirer;
pub mod repair;

pub use acquirer::{MediaAcquirer, MediaSource, TransientMedia, CHUNK_SIZE};
pub use repair::{FormatRepair, RepairStrategy, StripId3, Transcode};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use super::events::EngineEvent;

/// Source of "now" for elapsed-time math.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut offset) = self.offset.lock() {
            *offset += by;
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = self.offset.lock().map(|o| *o).unwrap_or_default();
        self.base + offset
    }
}

/// Post `Tick { generation }` every `period` until the session generation
/// moves on or the loop hangs up.
///
/// Ticks are only a wake-up signal; all state is read and written by the loop
/// that receives them, so a tick from a superseded session changes nothing.
pub(crate) fn spawn_progress_clock(
    runtime: &Handle,
    generation: u64,
    current: Arc<AtomicU64>,
    period: Duration,
    tx: UnboundedSender<EngineEvent>,
) -> JoinHandle<()> {
    let period = period.max(Duration::from_millis(1));
    runtime.spawn(async move {
        debug!(generation, "progress clock started");
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick fires immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            if current.load(Ordering::SeqCst) != generation {
                break;
            }
            if tx.send(EngineEvent::Tick { generation }).is_err() {
                break;
            }
        }
        debug!(generation, "progress clock stopped");
    })
}

use chrono::Utc;
use vigil_core::Timestamp;
use vigil_ports::Clock;

/// Wall-clock time. Stamps events that arrive without a usable timestamp
/// and dates alerts and evidence packs.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

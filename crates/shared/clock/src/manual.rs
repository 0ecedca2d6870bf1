use chrono::Duration;
use std::sync::RwLock;
use vigil_core::Timestamp;
use vigil_ports::Clock;

/// Clock that only moves when told to
///
/// Replays drive it from event time so that inferred timestamps and
/// evidence creation times line up with the data being replayed.
pub struct ManualClock {
    current: RwLock<Timestamp>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            current: RwLock::new(start),
        }
    }

    /// Move the clock forward by `duration`
    pub fn advance(&self, duration: Duration) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current += duration;
    }

    /// Move the clock to `time` if that is later than the current time
    pub fn advance_to(&self, time: Timestamp) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        if time > *current {
            *current = time;
        }
    }

    /// Explicitly set the time, backwards jumps included
    pub fn set_time(&self, time: Timestamp) {
        let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
        *current = time;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.current.read().unwrap_or_else(|e| e.into_inner())
    }
}

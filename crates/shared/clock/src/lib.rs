//! Vigil Clock Infrastructure
//!
//! Time sources for the detector:
//!
//! ```text
//! SystemClock   wall-clock time, for live feeds
//! ManualClock   frozen until moved, for replays and tests
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use vigil_clock::{ManualClock, SystemClock};
//! use chrono::Duration;
//!
//! let clock = ManualClock::new(start);
//! clock.advance(Duration::seconds(5));
//! clock.advance_to(later); // never moves backwards
//! ```

mod manual;
mod system;

pub use manual::ManualClock;
pub use system::SystemClock;

// Re-export the Clock trait for convenience
pub use vigil_ports::Clock;

use vigil_core::Timestamp;

/// Port for time abstraction
///
/// The detector reads "now" only through this port:
/// - Real system time for live feeds
/// - A manually driven clock for replay and deterministic tests
pub trait Clock: Send + Sync {
    /// Get the current time according to this clock
    fn now(&self) -> Timestamp;
}

use vigil_core::EvidencePack;

use crate::error::SinkResult;

/// Port for evidence persistence
///
/// Storage is owned by the outer layers; the detector only hands packs over
/// and records the reference it gets back in the alert.
pub trait EvidenceSink: Send {
    /// Store the pack and return its reference (path, key, URL)
    fn persist(&mut self, pack: &EvidencePack) -> SinkResult<String>;
}

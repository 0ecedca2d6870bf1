use std::collections::BTreeMap;
use vigil_core::{AccountId, SignalName, Timestamp};

/// Everything a narrative writer gets to see about an alert
#[derive(Debug, Clone, PartialEq)]
pub struct NarrativeInput {
    /// Sorted account set
    pub accounts: Vec<AccountId>,
    /// Strongest weighted signal per account, with its value
    pub top_signals: BTreeMap<AccountId, (SignalName, f64)>,
    /// Timestamp of the earliest selected event
    pub first_event: Option<Timestamp>,
    /// Timestamp of the latest selected event
    pub last_event: Option<Timestamp>,
    pub alert_score: f64,
}

/// Port for turning alert data into investigator-facing prose
pub trait NarrativeComposer: Send + Sync {
    fn compose(&self, input: &NarrativeInput) -> String;
}

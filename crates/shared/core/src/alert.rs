//! Alert and evidence payloads
//!
//! Both serialize to the shapes consumed by the external persistence and
//! notification layers.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::events::Event;
use crate::signals::SignalSnapshot;
use crate::values::AccountId;

/// Unique identifier for an alert: `ALERT-` plus 8 hex digits
pub fn new_alert_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("ALERT-{}", &id[..8])
}

/// A raised cluster alert
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub alert_id: String,
    #[serde(serialize_with = "serialize_utc")]
    pub created_at: DateTime<Utc>,
    /// Account whose component was evaluated
    pub cluster_seed: AccountId,
    /// Top members by individual score, highest first
    pub cluster_accounts: Vec<AccountId>,
    pub cluster_score: f64,
    /// Every scored member of the component
    pub per_account_scores: BTreeMap<AccountId, f64>,
    /// Where the evidence pack lives. Holds the evidence id until a sink
    /// assigns a storage path.
    pub evidence_path: String,
}

impl Alert {
    /// Point the alert at its persisted evidence
    pub fn with_evidence_path(mut self, path: impl Into<String>) -> Self {
        self.evidence_path = path.into();
        self
    }
}

/// The bundle of chronological events and signal snapshots behind an alert
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvidencePack {
    pub evidence_id: String,
    #[serde(serialize_with = "serialize_utc")]
    pub created_at: DateTime<Utc>,
    /// Sorted account set
    pub accounts: Vec<AccountId>,
    pub alert_score: f64,
    /// Window events involving the accounts, oldest first
    pub events: Vec<Event>,
    pub contributing_signals: BTreeMap<AccountId, SignalSnapshot>,
    pub narrative: String,
    /// Rule-level explanations per account; never affects scoring
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub rule_flags: BTreeMap<AccountId, Vec<String>>,
}

fn serialize_utc<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&crate::events::format_timestamp(*ts))
}

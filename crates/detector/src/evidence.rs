//! Evidence pack assembly
//!
//! Selects the window events that involve an account set, orders them
//! chronologically and bundles them with signal snapshots, rule flags and a
//! narrative.

use std::collections::{BTreeMap, HashSet};
use vigil_core::{
    AccountId, Event, EvidencePack, SignalSnapshot, Timestamp, round3,
};
use vigil_ports::{NarrativeComposer, NarrativeInput};

use crate::cluster::MemberScore;
use crate::narrative::ChronologyNarrative;
use crate::rules::RuleBook;
use crate::window::SlidingWindow;

pub struct EvidenceBuilder {
    counter: u64,
    rules: RuleBook,
    narrative: Box<dyn NarrativeComposer>,
}

impl Default for EvidenceBuilder {
    fn default() -> Self {
        Self::new(RuleBook::default(), Box::new(ChronologyNarrative))
    }
}

impl EvidenceBuilder {
    pub fn new(rules: RuleBook, narrative: Box<dyn NarrativeComposer>) -> Self {
        Self {
            counter: 0,
            rules,
            narrative,
        }
    }

    pub fn set_narrative(&mut self, narrative: Box<dyn NarrativeComposer>) {
        self.narrative = narrative;
    }

    pub fn set_rules(&mut self, rules: RuleBook) {
        self.rules = rules;
    }

    pub fn rules(&self) -> &RuleBook {
        &self.rules
    }

    /// Assemble the pack for `accounts`. Members missing from `scores`
    /// contribute events but no signal snapshot.
    pub fn build(
        &mut self,
        accounts: &[AccountId],
        scores: &BTreeMap<AccountId, MemberScore>,
        alert_score: f64,
        window: &SlidingWindow,
        created_at: Timestamp,
    ) -> EvidencePack {
        self.counter += 1;
        let evidence_id = format!("EV-{:04}", self.counter);

        let mut sorted_accounts = accounts.to_vec();
        sorted_accounts.sort();
        sorted_accounts.dedup();

        let events = select_events(window, &sorted_accounts);

        let mut contributing_signals = BTreeMap::new();
        let mut rule_flags = BTreeMap::new();
        let mut top_signals = BTreeMap::new();
        for account in &sorted_accounts {
            let Some(member) = scores.get(account) else {
                continue;
            };
            let snapshot = SignalSnapshot::new(
                &member.signals,
                member.score.rule,
                member.score.anomaly,
                member.score.final_score,
            );
            let flags = self.rules.evaluate(&snapshot.signals, snapshot.anomaly_score);
            if !flags.is_empty() {
                rule_flags.insert(account.clone(), flags);
            }
            top_signals.insert(account.clone(), snapshot.signals.top_signal());
            contributing_signals.insert(account.clone(), snapshot);
        }

        let narrative = self.narrative.compose(&NarrativeInput {
            accounts: sorted_accounts.clone(),
            top_signals,
            first_event: events.first().map(|e| e.timestamp),
            last_event: events.last().map(|e| e.timestamp),
            alert_score,
        });

        EvidencePack {
            evidence_id,
            created_at,
            accounts: sorted_accounts,
            alert_score: round3(alert_score),
            events,
            contributing_signals,
            narrative,
            rule_flags,
        }
    }
}

/// Window events naming any of `accounts` in any participant field,
/// stably sorted by resolved timestamp
pub fn select_events(window: &SlidingWindow, accounts: &[AccountId]) -> Vec<Event> {
    let members: HashSet<&str> = accounts.iter().map(String::as_str).collect();
    let mut events: Vec<Event> = window
        .snapshot()
        .filter(|event| event.involves(|account| members.contains(account)))
        .cloned()
        .collect();
    events.sort_by_key(|event| event.timestamp);
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorer::ScoreBreakdown;
    use chrono::{Duration, TimeZone, Utc};
    use vigil_core::{CustodyTransferEvent, OrderEvent, SignalName, SignalVector, TradeEvent};

    fn at(secs: i64) -> Timestamp {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn order(account: &str, secs: i64) -> Event {
        Event::order(
            OrderEvent {
                account: Some(account.into()),
                ..Default::default()
            },
            at(secs),
        )
    }

    fn window(events: Vec<Event>) -> SlidingWindow {
        let mut window = SlidingWindow::new(3_600.0);
        for event in events {
            window.push(event);
        }
        window
    }

    fn member(round_trip: f64, score: f64) -> MemberScore {
        MemberScore {
            signals: SignalVector {
                round_trip_rate: round_trip,
                ..Default::default()
            },
            score: ScoreBreakdown {
                rule: score,
                anomaly: 0.0,
                final_score: score,
            },
        }
    }

    #[test]
    fn test_selection_sorts_by_timestamp() {
        let w = window(vec![order("A", 30), order("C", 10), order("B", 20), order("A", 5)]);
        let events = select_events(&w, &["A".to_string(), "B".to_string()]);

        let times: Vec<Timestamp> = events.iter().map(|e| e.timestamp).collect();
        assert_eq!(times, vec![at(5), at(20), at(30)]);
    }

    #[test]
    fn test_custody_receiver_is_selected() {
        let w = window(vec![
            Event::custody_transfer(
                CustodyTransferEvent {
                    from: Some("Q".into()),
                    to: Some("X".into()),
                    instrument: None,
                },
                at(1),
            ),
            Event::trade(
                TradeEvent {
                    buy_account: Some("Y".into()),
                    sell_account: Some("Z".into()),
                    ..Default::default()
                },
                at(2),
            ),
        ]);

        let events = select_events(&w, &["X".to_string()]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].label(), "custody_transfer");
    }

    #[test]
    fn test_pack_contents() {
        let w = window(vec![order("B", 2), order("A", 1)]);
        let scores = BTreeMap::from([
            ("A".to_string(), member(0.66666, 0.71234)),
            ("B".to_string(), member(0.1, 0.2)),
        ]);
        let mut builder = EvidenceBuilder::default();

        let pack = builder.build(
            &["B".to_string(), "A".to_string()],
            &scores,
            0.654321,
            &w,
            at(100),
        );

        assert_eq!(pack.evidence_id, "EV-0001");
        assert_eq!(pack.accounts, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(pack.alert_score, 0.654);
        assert_eq!(pack.events.len(), 2);
        assert_eq!(pack.events[0].timestamp, at(1));
        assert_eq!(pack.contributing_signals["A"].signals.round_trip_rate, 0.667);
        assert_eq!(pack.contributing_signals["A"].final_score, 0.712);
        assert!(pack.rule_flags.contains_key("A"));
        assert!(!pack.rule_flags.contains_key("B"));
        assert!(pack.narrative.contains(&format!("A {}=0.667", SignalName::RoundTripRate)));

        let second = builder.build(&["A".to_string()], &scores, 0.7, &w, at(101));
        assert_eq!(second.evidence_id, "EV-0002");
    }
}

//! Cluster evaluation
//!
//! Per scan cycle:
//!
//! ```text
//! seeds (top-K accounts by degree)
//!   │
//!   ▼
//! connected component ──► ≤ 1 account? ──► skip
//!   │
//!   ▼
//! score every account member
//!   │
//!   ▼
//! cluster score = 0.7·max + 0.3·mean ──► ≥ threshold? ──► alert + evidence
//! ```
//!
//! Seeds that share a component are evaluated independently, so one scan can
//! raise several alerts for the same accounts. Deduplication belongs to the
//! alert store.

use log::debug;
use std::collections::BTreeMap;
use vigil_core::{AccountId, Alert, EvidencePack, NodeId, SignalVector, round3};
use vigil_graph::RelationshipGraph;

use crate::config::DetectorConfig;
use crate::ledger::AccountLedger;
use crate::scorer::{ScoreBreakdown, Scorer};
use crate::signals::{ClusterShape, SignalComputer};
use crate::window::SlidingWindow;

/// Signals and score of one cluster member
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemberScore {
    pub signals: SignalVector,
    pub score: ScoreBreakdown,
}

/// Full-precision outcome of evaluating one seed
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterEvaluation {
    pub seed: AccountId,
    pub shape: ClusterShape,
    pub members: BTreeMap<AccountId, MemberScore>,
    pub cluster_score: f64,
}

impl ClusterEvaluation {
    /// Members by final score descending, ties by account id
    pub fn ranked(&self) -> Vec<(&AccountId, f64)> {
        let mut ranked: Vec<(&AccountId, f64)> = self
            .members
            .iter()
            .map(|(account, member)| (account, member.score.final_score))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked
    }

    /// The `n` highest-scoring members
    pub fn top_members(&self, n: usize) -> Vec<AccountId> {
        self.ranked()
            .into_iter()
            .take(n)
            .map(|(account, _)| account.clone())
            .collect()
    }
}

/// An alert together with the evidence behind it
#[derive(Debug, Clone, PartialEq)]
pub struct RaisedAlert {
    pub alert: Alert,
    pub evidence: EvidencePack,
}

#[derive(Debug, Clone)]
pub struct ClusterEvaluator {
    threshold: f64,
    seed_count: usize,
    top_members: usize,
}

impl ClusterEvaluator {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            threshold: config.alert_threshold,
            seed_count: config.seed_count,
            top_members: config.top_members,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn top_members(&self) -> usize {
        self.top_members
    }

    /// Highest-degree accounts, instruments excluded
    pub fn seeds(&self, graph: &RelationshipGraph) -> Vec<AccountId> {
        graph
            .top_nodes(self.seed_count, true)
            .into_iter()
            .filter_map(|(node, _)| node.as_account().map(str::to_string))
            .collect()
    }

    /// Score the component around `seed`.
    ///
    /// Returns None when the component has at most one account.
    pub fn evaluate(
        &self,
        seed: &str,
        graph: &RelationshipGraph,
        ledger: &AccountLedger,
        window: &SlidingWindow,
        computer: &SignalComputer,
        scorer: &Scorer,
    ) -> Option<ClusterEvaluation> {
        let component = graph.connected_component(&NodeId::account(seed));
        let shape = ClusterShape::of(&component, graph);
        if shape.size <= 1 {
            debug!("Seed {} has no linked accounts, skipping", seed);
            return None;
        }

        let members: BTreeMap<AccountId, MemberScore> = component
            .iter()
            .filter_map(NodeId::as_account)
            .map(|account| {
                let signals = computer.compute_in_cluster(account, shape, ledger, window);
                let score = scorer.score(&signals);
                (account.to_string(), MemberScore { signals, score })
            })
            .collect();

        let scores: Vec<f64> = members.values().map(|m| m.score.final_score).collect();
        Some(ClusterEvaluation {
            seed: seed.to_string(),
            shape,
            cluster_score: aggregate(&scores),
            members,
        })
    }

    pub fn should_alert(&self, evaluation: &ClusterEvaluation) -> bool {
        evaluation.cluster_score >= self.threshold
    }

    /// Alert payload for an evaluation; `evidence_ref` is the evidence id
    /// until a sink assigns a storage path
    pub fn build_alert(
        &self,
        evaluation: &ClusterEvaluation,
        evidence_ref: &str,
        created_at: vigil_core::Timestamp,
    ) -> Alert {
        Alert {
            alert_id: vigil_core::new_alert_id(),
            created_at,
            cluster_seed: evaluation.seed.clone(),
            cluster_accounts: evaluation.top_members(self.top_members),
            cluster_score: round3(evaluation.cluster_score),
            per_account_scores: evaluation
                .members
                .iter()
                .map(|(account, member)| (account.clone(), round3(member.score.final_score)))
                .collect(),
            evidence_path: evidence_ref.to_string(),
        }
    }
}

/// `0.7·max + 0.3·mean`; 0 for an empty slice
pub fn aggregate(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    0.7 * max + 0.3 * mean
}

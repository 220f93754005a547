//! Audit record persisted to the append-only JSONL sink.

use crate::evaluation::{EvaluationContext, TrustContext};
use crate::policy::{Action, MatchedPolicy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: uuid::Uuid,
    pub timestamp: i64,
    pub timestamp_iso: DateTime<Utc>,
    pub verdict: Action,
    pub reason: Option<String>,
    /// Redacted copy of the evaluation context (`toolParams` blacklist keys stripped).
    pub context: EvaluationContext,
    pub trust: TrustContext,
    pub risk: RiskLevel,
    pub matched_policies: Vec<MatchedPolicy>,
    pub controls: Vec<String>,
    pub elapsed_micros: u64,
}

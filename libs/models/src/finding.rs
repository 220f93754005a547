//! Findings produced by Signal Detectors, and their optional Classification.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Sort key for "critical > high > medium > low" ordering.
    pub fn rank(self) -> u8 {
        match self {
            Severity::Critical => 3,
            Severity::High => 2,
            Severity::Medium => 1,
            Severity::Low => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SignalKind {
    #[serde(rename = "SIG-DOOM-LOOP")]
    #[strum(serialize = "SIG-DOOM-LOOP")]
    DoomLoop,
    #[serde(rename = "SIG-HALLUCINATION")]
    #[strum(serialize = "SIG-HALLUCINATION")]
    Hallucination,
    #[serde(rename = "SIG-CORRECTION")]
    #[strum(serialize = "SIG-CORRECTION")]
    Correction,
    #[serde(rename = "SIG-DISSATISFACTION")]
    #[strum(serialize = "SIG-DISSATISFACTION")]
    Dissatisfaction,
    #[serde(rename = "SIG-UNVERIFIED-CLAIM")]
    #[strum(serialize = "SIG-UNVERIFIED-CLAIM")]
    UnverifiedClaim,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EventRange {
    pub start_index: usize,
    pub end_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub kind: SignalKind,
    pub severity: Severity,
    pub event_range: EventRange,
    pub summary: String,
    pub evidence: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActionType {
    SoulRule,
    GovernancePolicy,
    CortexPattern,
    ManualReview,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub root_cause: String,
    pub action_type: ActionType,
    pub action_text: String,
    pub confidence: f64,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub chain_id: String,
    pub agent: String,
    pub session: String,
    pub signal: Signal,
    pub detected_at: chrono::DateTime<chrono::Utc>,
    pub occurred_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedOutput {
    pub id: String,
    #[serde(rename = "type")]
    pub output_type: ActionType,
    pub content: serde_json::Value,
    pub source_findings: Vec<String>,
    pub observation_count: u32,
    pub confidence: f64,
}

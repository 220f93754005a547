//! Incremental processing state, persisted atomically between pipeline runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingState {
    pub last_processed_ts: i64,
    pub last_processed_seq: u64,
    pub total_events_processed: u64,
    pub total_findings: u64,
    pub updated_at: DateTime<Utc>,
}

impl Default for ProcessingState {
    fn default() -> Self {
        Self {
            last_processed_ts: 0,
            last_processed_seq: 0,
            total_events_processed: 0,
            total_findings: 0,
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalStats {
    pub by_kind: std::collections::HashMap<String, u64>,
    pub by_severity: std::collections::HashMap<String, u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    pub events_seen: u64,
    pub events_dropped: u64,
    pub chains_built: u64,
    pub chains_discarded_too_short: u64,
    pub findings_before_truncation: u64,
    pub findings_emitted: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleEffectiveness {
    /// signal kind -> (findings classified, findings dropped at triage)
    pub triage_keep_count: std::collections::HashMap<String, u64>,
    pub triage_drop_count: std::collections::HashMap<String, u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub stats: RunStats,
    pub signal_stats: SignalStats,
    pub findings: Vec<crate::finding::Finding>,
    pub generated_outputs: Vec<crate::finding::GeneratedOutput>,
    pub rule_effectiveness: RuleEffectiveness,
    pub processing_state: ProcessingState,
}

impl AnalysisReport {
    pub fn empty(processing_state: ProcessingState) -> Self {
        Self {
            version: 1,
            generated_at: Utc::now(),
            stats: RunStats::default(),
            signal_stats: SignalStats::default(),
            findings: Vec::new(),
            generated_outputs: Vec::new(),
            rule_effectiveness: RuleEffectiveness::default(),
            processing_state,
        }
    }
}

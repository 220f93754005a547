//! Triage stage: a fast/small model decides whether a finding is worth
//! deep analysis before the larger model is ever called.

use crate::openai::{parse_json, OpenAiClient};
use serde::Deserialize;
use trace_governance_common::config::TriageConfig;
use trace_governance_models::finding::Severity;

const SYSTEM_PROMPT: &str = "You triage agent governance findings. \
Reply with JSON {\"keep\": bool, \"severity\": \"low|medium|high|critical\", \"reason\": string}.";

#[derive(Debug, Clone, Deserialize)]
pub struct TriageResult {
    pub keep: bool,
    pub severity: Severity,
    pub reason: String,
}

pub struct TriageStage {
    client: OpenAiClient,
    config: TriageConfig,
}

impl TriageStage {
    pub fn new(client: OpenAiClient, config: TriageConfig) -> Self {
        Self { client, config }
    }

    /// Returns `None` on any transport/parse failure, meaning the caller
    /// should treat the finding as kept (fail open into deep analysis
    /// rather than silently dropping it on a triage hiccup).
    pub async fn triage(&self, signal_summary: &str, transcript: &str) -> Option<TriageResult> {
        let prompt = format!("Signal: {signal_summary}\n\nTranscript:\n{transcript}");
        let raw = self
            .client
            .complete_json(&self.config.model, SYSTEM_PROMPT, &prompt, 256, self.config.timeout_ms)
            .await
            .ok()?;
        parse_json(&raw)
    }
}

//! Optional external classifier (triage + deep analysis), Components 5/4.5.
//! The claim detector and LLM validator (Component 13) live in
//! [`claim`]/[`validator`].

pub mod claim;
mod deep;
mod openai;
mod transcript;
mod triage;
pub mod validator;

pub use deep::DeepStage;
pub use openai::OpenAiClient;
pub use triage::{TriageResult, TriageStage};

use serde_json::Value;
use trace_governance::RedactionEngine;
use trace_governance_common::config::LlmConfig;
use trace_governance_models::chain::ConversationChain;
use trace_governance_models::finding::Finding;

pub struct Classifier {
    triage: Option<TriageStage>,
    deep: Option<DeepStage>,
}

impl Classifier {
    pub fn new(triage: Option<TriageStage>, deep: Option<DeepStage>) -> Self {
        Self { triage, deep }
    }

    pub fn disabled() -> Self {
        Self { triage: None, deep: None }
    }

    pub fn from_config(config: &LlmConfig) -> trace_governance_common::error::Result<Self> {
        if !config.enabled {
            return Ok(Self::disabled());
        }
        let deep_client = OpenAiClient::new(config.endpoint.clone(), config.api_key.clone(), config.timeout_ms)?;
        let deep = Some(DeepStage::new(deep_client, config.clone()));
        let triage = match &config.triage {
            Some(triage_config) => {
                let triage_client = OpenAiClient::new(triage_config.endpoint.clone(), config.api_key.clone(), triage_config.timeout_ms)?;
                Some(TriageStage::new(triage_client, triage_config.clone()))
            }
            None => None,
        };
        Ok(Self::new(triage, deep))
    }

    /// Redacts the chain transcript, runs triage (if configured), and — if
    /// triage kept the finding or no triage stage exists — runs deep
    /// analysis. Returns `None` only when triage explicitly drops the
    /// finding; deep-analysis failures still return `Some(finding)` with
    /// `classification = None`.
    pub async fn classify(&self, mut finding: Finding, chain: &ConversationChain, redaction: &RedactionEngine) -> Option<Finding> {
        let Some(deep) = &self.deep else {
            return Some(finding);
        };

        let rendered = transcript::render(chain);
        let redacted = redaction
            .layer2_scan_outbound(&Value::String(rendered), None)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();

        if let Some(triage) = &self.triage {
            match triage.triage(&finding.signal.summary, &redacted).await {
                Some(result) if !result.keep => return None,
                _ => {}
            }
        }

        finding.classification = deep.classify(&finding.signal.summary, &redacted).await;
        Some(finding)
    }
}

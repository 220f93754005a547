//! Deep analysis stage: the larger model receives the full transcript and
//! returns a full Classification. Failures of any kind (parse, transport,
//! timeout) degrade to `classification = None` — the finding itself is
//! never dropped, only its classification.

use crate::openai::OpenAiClient;
use serde::Deserialize;
use std::str::FromStr;
use trace_governance_common::config::LlmConfig;
use trace_governance_models::finding::{ActionType, Classification};

const SYSTEM_PROMPT: &str = "You analyze an agent governance signal and propose a remediation. \
Reply with JSON {\"rootCause\": string, \"actionType\": \"soul_rule|governance_policy|cortex_pattern|manual_review\", \
\"actionText\": string, \"confidence\": number between 0 and 1}.";

/// Raw shape of the model's JSON reply, deserialized loosely so an
/// unrecognized `actionType` string or a missing `confidence` degrade to
/// their documented defaults instead of failing the whole parse.
#[derive(Debug, Deserialize)]
struct RawClassification {
    #[serde(rename = "rootCause", default)]
    root_cause: String,
    #[serde(rename = "actionType", default)]
    action_type: String,
    #[serde(rename = "actionText", default)]
    action_text: String,
    confidence: Option<f64>,
}

pub struct DeepStage {
    client: OpenAiClient,
    config: LlmConfig,
}

impl DeepStage {
    pub fn new(client: OpenAiClient, config: LlmConfig) -> Self {
        Self { client, config }
    }

    /// Returns `None` on transport/timeout/parse failure; the caller
    /// preserves the finding with a null classification in that case.
    pub async fn classify(&self, signal_summary: &str, transcript: &str) -> Option<Classification> {
        let prompt = format!("Signal: {signal_summary}\n\nTranscript:\n{transcript}");
        let raw = self
            .client
            .complete_json(&self.config.model, SYSTEM_PROMPT, &prompt, 512, self.config.timeout_ms)
            .await
            .ok()?;

        let parsed: RawClassification = serde_json::from_str(&raw).ok()?;
        let action_type = ActionType::from_str(&parsed.action_type).unwrap_or(ActionType::ManualReview);

        Some(Classification {
            root_cause: parsed.root_cause,
            action_type,
            action_text: parsed.action_text,
            confidence: parsed.confidence.unwrap_or(0.5),
            model: self.config.model.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_action_type_defaults_to_manual_review() {
        let raw = r#"{"rootCause": "x", "actionType": "something_new", "actionText": "y"}"#;
        let parsed: RawClassification = serde_json::from_str(raw).unwrap();
        let action_type = ActionType::from_str(&parsed.action_type).unwrap_or(ActionType::ManualReview);
        assert_eq!(action_type, ActionType::ManualReview);
        assert_eq!(parsed.confidence, None);
    }

    #[test]
    fn known_action_type_parses() {
        let raw = r#"{"rootCause": "x", "actionType": "soul_rule", "actionText": "y", "confidence": 0.9}"#;
        let parsed: RawClassification = serde_json::from_str(raw).unwrap();
        assert_eq!(ActionType::from_str(&parsed.action_type).unwrap(), ActionType::SoulRule);
        assert_eq!(parsed.confidence, Some(0.9));
    }
}

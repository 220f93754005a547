//! LLM Validator (Component 13, second half): consults an external model
//! with the candidate claims plus a registry of known facts, and returns
//! a pass/flag/block verdict, cached by `(text, facts-hash, externalFlag)`.

use crate::openai::OpenAiClient;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::RwLock;
use trace_governance_common::config::{FailMode, LlmValidatorConfig};
use trace_governance_models::finding::Severity;

const SYSTEM_PROMPT: &str = "You fact-check claims an agent made against a registry of known facts. \
Reply with JSON {\"issues\": [{\"category\": string, \"claim\": string, \"explanation\": string, \
\"severity\": \"low|medium|high|critical\"}]}.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub category: String,
    pub claim: String,
    pub explanation: String,
    pub severity: Severity,
}

#[derive(Debug, Deserialize)]
struct ValidatorResponse {
    #[serde(default)]
    issues: Vec<Issue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationVerdict {
    Pass,
    Flag,
    Block,
}

/// Any `critical` issue blocks; any `high`/`medium` flags; no issues pass.
fn verdict_for(issues: &[Issue]) -> ValidationVerdict {
    if issues.iter().any(|i| i.severity == Severity::Critical) {
        ValidationVerdict::Block
    } else if issues.iter().any(|i| matches!(i.severity, Severity::High | Severity::Medium)) {
        ValidationVerdict::Flag
    } else {
        ValidationVerdict::Pass
    }
}

struct CacheEntry {
    verdict: ValidationVerdict,
    issues: Vec<Issue>,
    expires_at: DateTime<Utc>,
}

fn cache_key(text: &str, facts_hash: &str, external: bool) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.update(b"|");
    hasher.update(facts_hash.as_bytes());
    hasher.update(b"|");
    hasher.update(if external { b"1" } else { b"0" });
    hasher.finalize().iter().map(|b| format!("{b:02x}")).collect()
}

pub fn facts_hash(facts: &[String]) -> String {
    let mut hasher = Sha256::new();
    for fact in facts {
        hasher.update(fact.as_bytes());
        hasher.update(b"\0");
    }
    hasher.finalize().iter().map(|b| format!("{b:02x}")).collect()
}

pub struct LlmValidator {
    client: Option<OpenAiClient>,
    config: LlmValidatorConfig,
    cache: RwLock<HashMap<String, CacheEntry>>,
}

impl LlmValidator {
    pub fn new(config: LlmValidatorConfig) -> trace_governance_common::error::Result<Self> {
        let client = if config.enabled {
            Some(OpenAiClient::new(config.endpoint.clone(), None, config.timeout_ms)?)
        } else {
            None
        };
        Ok(Self {
            client,
            config,
            cache: RwLock::new(HashMap::new()),
        })
    }

    pub fn external_channel_allowed(&self, channel: &str) -> bool {
        self.config.external_channels.iter().any(|c| c == channel)
    }

    /// Validates `text` against `facts`; `external` marks whether this is
    /// headed for a designated external channel/command. Errors degrade
    /// to `pass` or `block` per `failMode`.
    pub async fn validate(&self, text: &str, facts: &[String], external: bool) -> (ValidationVerdict, Vec<Issue>) {
        let facts_hash = facts_hash(facts);
        let key = cache_key(text, &facts_hash, external);

        if let Some(entry) = self.cache.read().unwrap().get(&key) {
            if entry.expires_at > Utc::now() {
                return (entry.verdict, entry.issues.clone());
            }
        }

        let Some(client) = &self.client else {
            return self.fail_mode_result();
        };

        let prompt = format!("Claims:\n{text}\n\nKnown facts:\n{}", facts.join("\n"));
        let result = client
            .complete_json(&self.config.model, SYSTEM_PROMPT, &prompt, self.config.max_tokens, self.config.timeout_ms)
            .await
            .ok()
            .and_then(|raw| serde_json::from_str::<ValidatorResponse>(&raw).ok());

        let (verdict, issues) = match result {
            Some(resp) => (verdict_for(&resp.issues), resp.issues),
            None => return self.fail_mode_result(),
        };

        self.cache.write().unwrap().insert(
            key,
            CacheEntry {
                verdict,
                issues: issues.clone(),
                expires_at: Utc::now() + Duration::seconds(self.config.cache_ttl_seconds as i64),
            },
        );

        (verdict, issues)
    }

    fn fail_mode_result(&self) -> (ValidationVerdict, Vec<Issue>) {
        match self.config.fail_mode {
            FailMode::Open => (ValidationVerdict::Pass, Vec::new()),
            FailMode::Closed => (ValidationVerdict::Block, Vec::new()),
        }
    }
}

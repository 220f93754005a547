//! Claim Detector (Component 13, first half): extracts candidate factual
//! claims from outbound text destined for designated external channels.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use trace_patterns::MergedPatternSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimCategory {
    SystemState,
    EntityName,
    Existence,
    OperationalStatus,
    SelfReferential,
}

impl ClaimCategory {
    pub fn config_key(self) -> &'static str {
        match self {
            ClaimCategory::SystemState => "system_state",
            ClaimCategory::EntityName => "entity_name",
            ClaimCategory::Existence => "existence",
            ClaimCategory::OperationalStatus => "operational_status",
            ClaimCategory::SelfReferential => "self_referential",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub category: ClaimCategory,
    pub text: String,
}

static ENTITY_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(named|called)\s+[A-Z][\w-]*").unwrap());
static EXISTENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(there (is|are|was|were) no|does not exist|doesn't exist|no such)\b").unwrap());
static OPERATIONAL_STATUS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(is (up|down|online|offline|healthy|degraded))\b").unwrap());
static SELF_REFERENTIAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(I (already|have|did|completed|verified|checked))\b").unwrap());

pub struct ClaimDetector {
    patterns: Arc<MergedPatternSet>,
    enabled: Vec<String>,
}

impl ClaimDetector {
    pub fn new(patterns: Arc<MergedPatternSet>, enabled: Vec<String>) -> Self {
        Self { patterns, enabled }
    }

    fn is_enabled(&self, category: ClaimCategory) -> bool {
        self.enabled.iter().any(|e| e == category.config_key())
    }

    pub fn extract(&self, text: &str) -> Vec<Claim> {
        let mut claims = Vec::new();

        if self.is_enabled(ClaimCategory::SystemState) {
            for pattern in &self.patterns.system_state_claims {
                if let Some(m) = pattern.find(text) {
                    claims.push(Claim {
                        category: ClaimCategory::SystemState,
                        text: m.as_str().to_string(),
                    });
                }
            }
        }
        for (category, regex) in [
            (ClaimCategory::EntityName, &*ENTITY_NAME),
            (ClaimCategory::Existence, &*EXISTENCE),
            (ClaimCategory::OperationalStatus, &*OPERATIONAL_STATUS),
            (ClaimCategory::SelfReferential, &*SELF_REFERENTIAL),
        ] {
            if !self.is_enabled(category) {
                continue;
            }
            if let Some(m) = regex.find(text) {
                claims.push(Claim {
                    category,
                    text: m.as_str().to_string(),
                });
            }
        }

        claims
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trace_governance_common::config::OutputValidationConfig;
    use trace_patterns::LanguageRegistry;

    fn loaded_registry() -> LanguageRegistry {
        let registry = LanguageRegistry::new();
        registry.load_builtin_sync().unwrap();
        registry
    }

    fn detector() -> ClaimDetector {
        let registry = loaded_registry();
        let patterns = registry.merged();
        ClaimDetector::new(patterns, OutputValidationConfig::default().enabled_detectors)
    }

    #[test]
    fn extracts_operational_status_claim() {
        let d = detector();
        let claims = d.extract("The payment service is down right now.");
        assert!(claims.iter().any(|c| c.category == ClaimCategory::OperationalStatus));
    }

    #[test]
    fn extracts_self_referential_claim() {
        let d = detector();
        let claims = d.extract("I already verified the deployment succeeded.");
        assert!(claims.iter().any(|c| c.category == ClaimCategory::SelfReferential));
    }

    #[test]
    fn disabled_category_is_skipped() {
        let registry = loaded_registry();
        let d = ClaimDetector::new(registry.merged(), vec!["system_state".into()]);
        let claims = d.extract("I already verified the deployment succeeded.");
        assert!(claims.is_empty());
    }
}

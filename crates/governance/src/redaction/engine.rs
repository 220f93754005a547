//! Redaction Engine (Component 12): deep-scans JSON-compatible values and
//! outbound text, replacing matched spans with vault placeholders.

use super::vault::RedactionVault;
use serde_json::Value;
use std::collections::HashSet;
use trace_governance_common::config::AllowlistConfig;
use trace_governance_common::error::{AppError, Result};
use trace_patterns::RedactionRegistry;
use trace_governance_models::vault::Category;

const MAX_DEPTH: usize = 32;

pub struct RedactionEngine {
    registry: RedactionRegistry,
    vault: RedactionVault,
    allowlist: AllowlistConfig,
}

impl RedactionEngine {
    pub fn new(registry: RedactionRegistry, vault: RedactionVault, allowlist: AllowlistConfig) -> Self {
        Self {
            registry,
            vault,
            allowlist,
        }
    }

    pub fn vault(&self) -> &RedactionVault {
        &self.vault
    }

    /// Redacts every matched span in `text`, unconditionally (used by
    /// Layer 1, the tool-result -> agent path, and for the always-redact
    /// credential case in Layer 2).
    fn redact_text(&self, text: &str) -> String {
        let matches = self.registry.scan(text);
        if matches.is_empty() {
            return text.to_string();
        }
        let mut out = String::with_capacity(text.len());
        let mut cursor = 0usize;
        for m in matches {
            out.push_str(&text[cursor..m.start]);
            out.push_str(&self.vault.format_placeholder(&m.text, m.category));
            cursor = m.end;
        }
        out.push_str(&text[cursor..]);
        out
    }

    /// Redacts `text`, skipping categories allow-listed for `channel`.
    /// Credentials are never allow-listable (hard invariant).
    fn redact_text_with_allowlist(&self, text: &str, channel: Option<&str>) -> String {
        let pii_allowed = channel
            .map(|c| self.allowlist.pii_allowed_channels.iter().any(|a| a == c))
            .unwrap_or(false);
        let financial_allowed = channel
            .map(|c| self.allowlist.financial_allowed_channels.iter().any(|a| a == c))
            .unwrap_or(false);

        let matches: Vec<_> = self
            .registry
            .scan(text)
            .into_iter()
            .filter(|m| match m.category {
                Category::Credential => true,
                Category::Pii => !pii_allowed,
                Category::Financial => !financial_allowed,
                Category::Custom => true,
            })
            .collect();

        if matches.is_empty() {
            return text.to_string();
        }
        let mut out = String::with_capacity(text.len());
        let mut cursor = 0usize;
        for m in matches {
            out.push_str(&text[cursor..m.start]);
            out.push_str(&self.vault.format_placeholder(&m.text, m.category));
            cursor = m.end;
        }
        out.push_str(&text[cursor..]);
        out
    }

    /// Layer 1 (tool -> agent): deep-scans a tool result value and
    /// replaces every matched span with a placeholder before the agent
    /// sees it. Strings that parse as JSON are treated as nested values.
    pub fn layer1_scan_tool_result(&self, value: &Value) -> Result<Value> {
        self.deep_scan(value, 0, &mut HashSet::new(), |text, _| self.redact_text(text))
    }

    /// Layer 2 (agent -> external): scans outbound content. Credentials
    /// are always redacted; PII/financial are redacted unless `channel`
    /// (or the originating tool/agent, folded in by the caller) is
    /// allow-listed.
    pub fn layer2_scan_outbound(&self, value: &Value, channel: Option<&str>) -> Result<Value> {
        self.deep_scan(value, 0, &mut HashSet::new(), |text, _| {
            self.redact_text_with_allowlist(text, channel)
        })
    }

    fn deep_scan(
        &self,
        value: &Value,
        depth: usize,
        seen: &mut HashSet<usize>,
        redact: impl Fn(&str, usize) -> String + Copy,
    ) -> Result<Value> {
        if depth > MAX_DEPTH {
            return Ok(value.clone());
        }

        match value {
            Value::String(s) => {
                if let Ok(nested) = serde_json::from_str::<Value>(s) {
                    if nested.is_object() || nested.is_array() {
                        let ptr = &nested as *const Value as usize;
                        if !seen.insert(ptr) {
                            return Ok(Value::String(redact(s, depth)));
                        }
                        let scanned = self.deep_scan(&nested, depth + 1, seen, redact)?;
                        return Ok(Value::String(serde_json::to_string(&scanned)?));
                    }
                }
                Ok(Value::String(redact(s, depth)))
            }
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.deep_scan(item, depth + 1, seen, redact)?);
                }
                Ok(Value::Array(out))
            }
            Value::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k.clone(), self.deep_scan(v, depth + 1, seen, redact)?);
                }
                Ok(Value::Object(out))
            }
            other => Ok(other.clone()),
        }
    }

    /// Resolves any placeholders present in `params` from the vault;
    /// returns `Err(VaultUnresolvable)` if any placeholder cannot be
    /// resolved, which blocks the call rather than forwarding a dangling
    /// reference.
    pub fn resolve_tool_params(&self, params: &Value) -> Result<Value> {
        self.resolve_value(params)
    }

    fn resolve_value(&self, value: &Value) -> Result<Value> {
        match value {
            Value::String(s) => {
                let (resolved, unresolved) = self.vault.resolve_all(s);
                if !unresolved.is_empty() {
                    return Err(AppError::VaultUnresolvable(unresolved.join(",")));
                }
                Ok(Value::String(resolved))
            }
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.resolve_value(item)?);
                }
                Ok(Value::Array(out))
            }
            Value::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k.clone(), self.resolve_value(v)?);
                }
                Ok(Value::Object(out))
            }
            other => Ok(other.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trace_patterns::RedactionRegistry;

    fn engine() -> RedactionEngine {
        RedactionEngine::new(
            RedactionRegistry::with_builtins(),
            RedactionVault::new(3_600),
            AllowlistConfig::default(),
        )
    }

    #[test]
    fn credential_is_redacted_regardless_of_allowlist() {
        let engine = engine();
        let value = serde_json::json!({"text": "key sk-ant-REDACTED"});
        let redacted = engine.layer2_scan_outbound(&value, Some("trusted-channel")).unwrap();
        let text = redacted["text"].as_str().unwrap();
        assert!(!text.contains("sk-ant-REDACTED"));
        assert!(text.contains("[REDACTED:credential:"));
    }

    #[test]
    fn pii_allowlisted_channel_passes_through() {
        let mut allowlist = AllowlistConfig::default();
        allowlist.pii_allowed_channels.push("internal".into());
        let engine = RedactionEngine::new(
            RedactionRegistry::with_builtins(),
            RedactionVault::new(3_600),
            allowlist,
        );
        let value = serde_json::json!({"text": "contact a@b.com"});
        let redacted = engine.layer2_scan_outbound(&value, Some("internal")).unwrap();
        assert_eq!(redacted["text"].as_str().unwrap(), "contact a@b.com");
    }

    #[test]
    fn unresolvable_placeholder_blocks_tool_call() {
        let engine = engine();
        let params = serde_json::json!({"arg": "[REDACTED:credential:deadbeef]"});
        let result = engine.resolve_tool_params(&params);
        assert!(result.is_err());
    }

    #[test]
    fn resolved_placeholder_round_trips_into_params() {
        let engine = engine();
        let placeholder = engine.vault().format_placeholder("sk-ant-REDACTED", Category::Credential);
        let params = serde_json::json!({"arg": placeholder});
        let resolved = engine.resolve_tool_params(&params).unwrap();
        assert_eq!(resolved["arg"], serde_json::json!("sk-ant-REDACTED"));
    }
}

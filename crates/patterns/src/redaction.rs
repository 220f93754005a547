//! The parallel registry governing redaction (spec.md §4.3), kept
//! separate from [`crate::lang`] because it matches against raw text
//! looking for secrets rather than sentiment.

use regex::Regex;
use std::time::{Duration, Instant};
use trace_governance_common::error::{AppError, Result};
use trace_governance_models::vault::Category;

#[derive(Clone)]
pub struct RedactionPattern {
    pub name: &'static str,
    pub category: Category,
    regex: Regex,
}

impl RedactionPattern {
    fn builtin(name: &'static str, category: Category, pattern: &str) -> Self {
        Self {
            name,
            category,
            regex: Regex::new(pattern).expect("builtin redaction pattern must compile"),
        }
    }
}

/// A match found in scanned text, with enough span information to
/// resolve overlaps downstream.
#[derive(Debug, Clone)]
pub struct RedactionMatch {
    pub name: String,
    pub category: Category,
    pub start: usize,
    pub end: usize,
    pub text: String,
}

fn builtin_patterns() -> Vec<RedactionPattern> {
    use Category::*;
    vec![
        RedactionPattern::builtin("openai_key", Credential, r"sk-[A-Za-z0-9]{20,}"),
        RedactionPattern::builtin("anthropic_key", Credential, r"sk-ant-[A-Za-z0-9_-]{20,}"),
        RedactionPattern::builtin(
            "google_api_key",
            Credential,
            r"AIza[0-9A-Za-z_-]{35}",
        ),
        RedactionPattern::builtin(
            "github_token",
            Credential,
            r"gh[pousr]_[A-Za-z0-9]{36,}",
        ),
        RedactionPattern::builtin(
            "gitlab_token",
            Credential,
            r"glpat-[A-Za-z0-9_-]{20,}",
        ),
        RedactionPattern::builtin(
            "aws_access_key_id",
            Credential,
            r"\b(AKIA|ASIA)[0-9A-Z]{16}\b",
        ),
        RedactionPattern::builtin(
            "aws_secret_key",
            Credential,
            r#"(?i)aws_secret_access_key\s*[=:]\s*['"]?[A-Za-z0-9/+=]{40}['"]?"#,
        ),
        RedactionPattern::builtin(
            "private_key_header",
            Credential,
            r"-----BEGIN (RSA |EC |OPENSSH )?PRIVATE KEY-----",
        ),
        RedactionPattern::builtin(
            "bearer_token",
            Credential,
            r"(?i)\bBearer\s+[A-Za-z0-9._~+/-]{10,}=*",
        ),
        RedactionPattern::builtin(
            "basic_auth",
            Credential,
            r"(?i)\bBasic\s+[A-Za-z0-9+/]{10,}=*",
        ),
        RedactionPattern::builtin(
            "key_value_secret",
            Credential,
            r#"(?i)\b(api[_-]?key|secret|token|password)\s*[=:]\s*['"]?[A-Za-z0-9._-]{8,}['"]?"#,
        ),
        RedactionPattern::builtin(
            "email",
            Pii,
            r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}",
        ),
        RedactionPattern::builtin(
            "phone_number",
            Pii,
            r"\b(?:\+?\d{1,3}[ -]?)?\(?\d{3}\)?[ -]?\d{3}[ -]?\d{4}\b",
        ),
        RedactionPattern::builtin("ssn", Pii, r"\b\d{3}-\d{2}-\d{4}\b"),
        RedactionPattern::builtin(
            "credit_card",
            Financial,
            r"\b(?:\d[ -]*?){13,16}\b",
        ),
        RedactionPattern::builtin(
            "iban",
            Financial,
            r"\b[A-Z]{2}\d{2}[A-Z0-9]{10,30}\b",
        ),
    ]
}

/// 10ms adversarial-input smoke test against a long single-character run.
/// `regex`'s automaton is linear-time so this can never actually time out
/// the way a backtracking engine would; the gate stays in place as a
/// contract check in case the underlying engine ever changes, and it
/// catches patterns compiled with pathological repetition bounds that
/// blow up the automaton's state count instead.
fn redos_probe_input() -> String {
    "a".repeat(5_000) + "!"
}

fn passes_redos_smoke_test(regex: &Regex) -> bool {
    let probe = redos_probe_input();
    let start = Instant::now();
    let _ = regex.is_match(&probe);
    start.elapsed() < Duration::from_millis(10)
}

pub struct RedactionRegistry {
    patterns: Vec<RedactionPattern>,
}

impl RedactionRegistry {
    /// Builtins are compiled ahead of time and trusted; only user-supplied
    /// patterns go through the ReDoS gate.
    pub fn with_builtins() -> Self {
        Self {
            patterns: builtin_patterns(),
        }
    }

    /// Appends a user pattern. Rejects it outright if it fails the ReDoS
    /// smoke test rather than silently dropping it from matching.
    pub fn add_user_pattern(
        &mut self,
        name: &'static str,
        category: Category,
        pattern: &str,
    ) -> Result<()> {
        let regex = Regex::new(pattern)
            .map_err(|e| AppError::Validation(format!("bad redaction pattern `{name}`: {e}")))?;
        if !passes_redos_smoke_test(&regex) {
            return Err(AppError::Validation(format!(
                "redaction pattern `{name}` failed ReDoS smoke test"
            )));
        }
        self.patterns.push(RedactionPattern {
            name,
            category,
            regex,
        });
        Ok(())
    }

    /// Scans `text`, returning all matches with overlaps resolved:
    /// longest match wins; ties broken by category priority
    /// (credential > financial > pii > custom).
    pub fn scan(&self, text: &str) -> Vec<RedactionMatch> {
        let mut candidates: Vec<RedactionMatch> = Vec::new();
        for pattern in &self.patterns {
            for m in pattern.regex.find_iter(text) {
                candidates.push(RedactionMatch {
                    name: pattern.name.to_string(),
                    category: pattern.category,
                    start: m.start(),
                    end: m.end(),
                    text: m.as_str().to_string(),
                });
            }
        }

        candidates.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then((b.end - b.start).cmp(&(a.end - a.start)))
                .then(b.category.priority().cmp(&a.category.priority()))
        });

        // Sweep in start order, keeping one representative per overlapping
        // cluster. Because candidates are visited in start order, only the
        // most recently accepted match can possibly overlap the next one —
        // anything accepted earlier already ended at or before it.
        let mut resolved: Vec<RedactionMatch> = Vec::new();
        for candidate in candidates {
            match resolved.last() {
                Some(last) if candidate.start < last.end => {
                    let extends_further = candidate.end > last.end;
                    let ties_with_higher_priority =
                        candidate.end == last.end && candidate.category.priority() > last.category.priority();
                    if extends_further || ties_with_higher_priority {
                        resolved.pop();
                        resolved.push(candidate);
                    }
                }
                _ => resolved.push(candidate),
            }
        }
        resolved
    }
}

impl Default for RedactionRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

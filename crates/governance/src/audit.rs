//! Audit Trail (Component 11): buffered JSONL append sink with retention,
//! toolParams redaction, and controls derivation.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use trace_governance_common::error::Result;
use trace_governance_models::audit::{AuditRecord, RiskLevel};
use trace_governance_models::evaluation::{EvaluationContext, Verdict};
use trace_governance_models::policy::Action;

const FLUSH_THRESHOLD: usize = 100;

/// Baseline incident controls unioned in for every `deny` verdict,
/// regardless of which policies matched.
const DENY_BASELINE_CONTROLS: [&str; 2] = ["A.5.24", "A.5.28"];

fn redact_tool_params(ctx: &mut EvaluationContext, blacklist: &[String]) {
    let Some(params) = ctx.tool_params.as_mut() else {
        return;
    };
    let Some(map) = params.as_object_mut() else {
        return;
    };
    for key in blacklist {
        if map.contains_key(key) {
            map.insert(key.clone(), serde_json::json!("[REDACTED]"));
        }
    }
}

fn risk_for(action: Action) -> RiskLevel {
    match action {
        Action::Deny => RiskLevel::High,
        Action::Warn => RiskLevel::Medium,
        Action::Audit | Action::Allow => RiskLevel::Low,
    }
}

fn controls_for(verdict: &Verdict) -> Vec<String> {
    let mut controls: HashSet<String> = verdict
        .matched_policies
        .iter()
        .flat_map(|m| m.controls.iter().cloned())
        .collect();
    if verdict.action == Action::Deny {
        controls.extend(DENY_BASELINE_CONTROLS.iter().map(|s| s.to_string()));
    }
    let mut out: Vec<String> = controls.into_iter().collect();
    out.sort();
    out
}

pub struct AuditSink {
    dir: PathBuf,
    buffer: Mutex<Vec<AuditRecord>>,
    redact_keys: Vec<String>,
    retention_days: u32,
}

impl AuditSink {
    pub fn new(dir: PathBuf, redact_keys: Vec<String>, retention_days: u32) -> Self {
        Self {
            dir,
            buffer: Mutex::new(Vec::new()),
            redact_keys,
            retention_days,
        }
    }

    /// Builds and buffers an `AuditRecord` from a verdict; flushes if the
    /// buffer has reached `FLUSH_THRESHOLD`.
    pub fn record(&self, verdict: &Verdict, elapsed_micros: u64) -> Result<()> {
        let mut ctx = verdict.enriched_ctx.clone();
        redact_tool_params(&mut ctx, &self.redact_keys);

        let record = AuditRecord {
            id: uuid::Uuid::new_v4(),
            timestamp: ctx.timestamp.timestamp_millis(),
            timestamp_iso: ctx.timestamp,
            verdict: verdict.action,
            reason: verdict.reason.clone(),
            context: ctx,
            trust: verdict.trust.clone(),
            risk: risk_for(verdict.action),
            matched_policies: verdict.matched_policies.clone(),
            controls: controls_for(verdict),
            elapsed_micros,
        };

        let should_flush = {
            let mut buffer = self.buffer.lock().unwrap();
            buffer.push(record);
            buffer.len() >= FLUSH_THRESHOLD
        };
        if should_flush {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        let mut buffer = self.buffer.lock().unwrap();
        if buffer.is_empty() {
            return Ok(());
        }

        std::fs::create_dir_all(&self.dir)?;
        let mut by_date: std::collections::HashMap<NaiveDate, Vec<&AuditRecord>> = std::collections::HashMap::new();
        for record in buffer.iter() {
            by_date.entry(record.timestamp_iso.date_naive()).or_default().push(record);
        }

        for (date, records) in by_date {
            let path = self.dir.join(format!("{}.jsonl", date.format("%Y-%m-%d")));
            let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
            for record in records {
                let line = serde_json::to_string(record)?;
                writeln!(file, "{line}")?;
            }
        }

        buffer.clear();
        Ok(())
    }

    pub fn pending_count(&self) -> usize {
        self.buffer.lock().unwrap().len()
    }

    /// Deletes JSONL files older than `retentionDays` based on filename date.
    pub fn enforce_retention(&self, now: DateTime<Utc>) -> Result<()> {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Ok(());
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Ok(date) = NaiveDate::parse_from_str(stem, "%Y-%m-%d") else {
                continue;
            };
            let age_days = (now.date_naive() - date).num_days();
            if age_days > self.retention_days as i64 {
                let _ = std::fs::remove_file(&path);
            }
        }
        Ok(())
    }

    /// Reads matching records from disk lazily by date filter.
    pub fn query(&self, since: Option<DateTime<Utc>>, until: Option<DateTime<Utc>>) -> Result<Vec<AuditRecord>> {
        let mut out = Vec::new();
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Ok(out);
        };
        let mut paths: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
        paths.sort();
        for path in paths {
            let Ok(contents) = std::fs::read_to_string(&path) else {
                continue;
            };
            for line in contents.lines() {
                if let Ok(record) = serde_json::from_str::<AuditRecord>(line) {
                    if since.map(|s| record.timestamp_iso >= s).unwrap_or(true)
                        && until.map(|u| record.timestamp_iso <= u).unwrap_or(true)
                    {
                        out.push(record);
                    }
                }
            }
        }
        Ok(out)
    }
}

pub fn path_for_workspace(workspace: &Path) -> PathBuf {
    workspace.join("governance").join("audit")
}

#[cfg(test)]
mod tests {
    use super::*;
    use trace_governance_models::evaluation::TrustContext;
    use trace_governance_models::policy::{MatchedPolicy, TrustTier};

    fn verdict(action: Action, matched: Vec<MatchedPolicy>) -> Verdict {
        Verdict {
            action,
            reason: None,
            matched_policies: matched,
            trust: TrustContext {
                score: 50.0,
                tier: TrustTier::Standard,
            },
            enriched_ctx: EvaluationContext {
                hook: "before_tool_call".into(),
                agent_id: "a".into(),
                session_key: "s".into(),
                timestamp: Utc::now(),
                trust: TrustContext {
                    score: 50.0,
                    tier: TrustTier::Standard,
                },
                tool_name: Some("exec".into()),
                tool_params: Some(serde_json::json!({"password": "hunter2", "path": "/tmp"})),
                message: None,
                cross_agent: None,
            },
        }
    }

    #[test]
    fn deny_controls_include_baseline() {
        let v = verdict(
            Action::Deny,
            vec![MatchedPolicy {
                policy_id: "p1".into(),
                rule_id: "r1".into(),
                effect: Action::Deny,
                controls: vec!["C-9".into()],
            }],
        );
        let controls = controls_for(&v);
        assert!(controls.contains(&"A.5.24".to_string()));
        assert!(controls.contains(&"A.5.28".to_string()));
        assert!(controls.contains(&"C-9".to_string()));
    }

    #[test]
    fn allow_has_no_baseline_controls() {
        let v = verdict(Action::Allow, vec![]);
        assert!(controls_for(&v).is_empty());
    }

    #[test]
    fn password_param_is_redacted_before_recording() {
        let dir = tempfile::tempdir().unwrap();
        let sink = AuditSink::new(dir.path().to_path_buf(), vec!["password".into()], 90);
        let v = verdict(Action::Allow, vec![]);
        sink.record(&v, 10).unwrap();
        sink.flush().unwrap();
        let records = sink.query(None, None).unwrap();
        assert_eq!(records.len(), 1);
        let params = records[0].context.tool_params.as_ref().unwrap();
        assert_eq!(params["password"], serde_json::json!("[REDACTED]"));
        assert_eq!(params["path"], serde_json::json!("/tmp"));
    }
}

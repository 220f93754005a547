//! Pipeline Driver (Component 7): a single `run(opts)` entry point that
//! loads incremental state, streams events, reconstructs chains, runs
//! detectors and the optional classifier, generates outputs, and persists
//! the report and updated state atomically.

mod persist;

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use trace_chain::ReconstructorConfig;
use trace_classifier::Classifier;
use trace_event_source::EventBus;
use trace_governance::RedactionEngine;
use trace_governance_common::error::Result;
use trace_governance_models::chain::ConversationChain;
use trace_governance_models::finding::{Finding, Signal};
use trace_governance_models::state::{AnalysisReport, ProcessingState, RuleEffectiveness, RunStats, SignalStats};
use trace_patterns::MergedPatternSet;

#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    pub full: bool,
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn finding_id(chain_id: &str, signal: &Signal) -> String {
    let mut hasher = Sha256::new();
    hasher.update(chain_id.as_bytes());
    hasher.update(b"|");
    hasher.update(signal.kind.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(signal.event_range.start_index.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(signal.event_range.end_index.to_string().as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex[..16].to_string()
}

fn build_finding(chain: &ConversationChain, signal: Signal) -> Finding {
    let id = finding_id(&chain.id, &signal);
    let occurred_at = chain
        .events
        .get(signal.event_range.start_index)
        .map(|e| e.ts)
        .unwrap_or(chain.start_ts);
    Finding {
        id,
        chain_id: chain.id.clone(),
        agent: chain.agent.clone(),
        session: chain.session.clone(),
        signal,
        detected_at: Utc::now(),
        occurred_at,
        classification: None,
    }
}

pub struct PipelineDriver {
    bus: Arc<dyn EventBus>,
    reconstructor: ReconstructorConfig,
    patterns: Arc<MergedPatternSet>,
    classifier: Classifier,
    redaction: RedactionEngine,
    max_findings: usize,
    incremental_window_minutes: i64,
    state_path: PathBuf,
    report_path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl PipelineDriver {
    pub fn new(
        bus: Arc<dyn EventBus>,
        reconstructor: ReconstructorConfig,
        patterns: Arc<MergedPatternSet>,
        classifier: Classifier,
        redaction: RedactionEngine,
        max_findings: usize,
        incremental_window_minutes: i64,
        state_path: PathBuf,
        report_path: PathBuf,
    ) -> Self {
        Self {
            bus,
            reconstructor,
            patterns,
            classifier,
            redaction,
            max_findings,
            incremental_window_minutes,
            state_path,
            report_path,
            lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Single entry point. Returns `Ok(None)` if a run is already in
    /// progress (single-concurrent-per-workspace guard); the event source
    /// is always closed in a deferred teardown, success or failure.
    pub async fn run(&self, opts: PipelineOptions) -> Result<Option<AnalysisReport>> {
        let Ok(_guard) = self.lock.try_lock() else {
            tracing::warn!("pipeline run already in progress, skipping");
            return Ok(None);
        };

        let result = self.run_locked(opts).await;

        if let Err(err) = self.bus.close().await {
            tracing::warn!(error = %err, "failed to close event source");
        }

        result.map(Some)
    }

    async fn run_locked(&self, opts: PipelineOptions) -> Result<AnalysisReport> {
        let previous_state = if opts.full {
            None
        } else {
            persist::read_json::<ProcessingState>(&self.state_path)
        };

        let end_ms = now_ms();
        let start_ms = match &previous_state {
            Some(state) => state.last_processed_ts - self.incremental_window_minutes * 60_000,
            None => 0,
        };

        let mut events = match self.bus.fetch_by_time_range(start_ms, end_ms).await {
            Ok(events) => events,
            // A connect-time failure (broker down before any event was
            // delivered) degrades to an empty report. A mid-stream failure
            // (events had already started flowing) must abort the run and
            // surface to the caller, not get silently swallowed.
            Err(err @ trace_governance_common::error::AppError::EventStreamInterrupted { .. }) => {
                tracing::error!(error = %err, "event stream interrupted mid-run, aborting");
                return Err(err);
            }
            Err(err) => {
                tracing::warn!(error = %err, "event source unavailable, writing empty report");
                let report = AnalysisReport::empty(previous_state.unwrap_or_default());
                persist::write_atomic(&self.report_path, &report)?;
                return Ok(report);
            }
        };
        events.sort_by_key(|e| e.order_key());

        let events_seen = events.len() as u64;
        let (last_ts, last_seq) = events
            .last()
            .map(|e| (e.ts, e.seq))
            .unwrap_or_else(|| (previous_state.as_ref().map(|s| s.last_processed_ts).unwrap_or(end_ms), 0));

        let chains = trace_chain::reconstruct(events, &self.reconstructor);
        let chains_built = chains.len() as u64;

        let mut findings = Vec::new();
        let mut signal_kind_counts: HashMap<String, u64> = HashMap::new();
        let mut signal_severity_counts: HashMap<String, u64> = HashMap::new();
        let mut triage_keep: HashMap<String, u64> = HashMap::new();
        let mut triage_drop: HashMap<String, u64> = HashMap::new();

        for chain in &chains {
            let signals = trace_detectors::detect_all(chain, &self.patterns);
            for signal in signals {
                let kind_key = signal.kind.to_string();
                *signal_kind_counts.entry(kind_key.clone()).or_insert(0) += 1;
                *signal_severity_counts.entry(signal.severity.to_string()).or_insert(0) += 1;

                let finding = build_finding(chain, signal);
                match self.classifier.classify(finding, chain, &self.redaction).await {
                    Some(classified) => {
                        *triage_keep.entry(kind_key).or_insert(0) += 1;
                        findings.push(classified);
                    }
                    None => {
                        *triage_drop.entry(kind_key).or_insert(0) += 1;
                    }
                }
            }
        }

        let findings_before_truncation = findings.len() as u64;
        findings.sort_by(|a, b| b.signal.severity.rank().cmp(&a.signal.severity.rank()));
        findings.truncate(self.max_findings);
        let findings_emitted = findings.len() as u64;

        let generated_outputs = trace_outputs::generate(&findings);

        let processing_state = ProcessingState {
            last_processed_ts: last_ts,
            last_processed_seq: last_seq,
            total_events_processed: previous_state.as_ref().map(|s| s.total_events_processed).unwrap_or(0) + events_seen,
            total_findings: previous_state.as_ref().map(|s| s.total_findings).unwrap_or(0) + findings_emitted,
            updated_at: Utc::now(),
        };

        let report = AnalysisReport {
            version: 1,
            generated_at: Utc::now(),
            stats: RunStats {
                events_seen,
                events_dropped: 0,
                chains_built,
                chains_discarded_too_short: 0,
                findings_before_truncation,
                findings_emitted,
            },
            signal_stats: SignalStats {
                by_kind: signal_kind_counts,
                by_severity: signal_severity_counts,
            },
            findings,
            generated_outputs,
            rule_effectiveness: RuleEffectiveness {
                triage_keep_count: triage_keep,
                triage_drop_count: triage_drop,
            },
            processing_state: processing_state.clone(),
        };

        persist::write_atomic(&self.state_path, &processing_state)?;
        persist::write_atomic(&self.report_path, &report)?;

        Ok(report)
    }
}

/// Test-only bus that simulates a broker dropping the connection after
/// already having delivered some events.
#[cfg(test)]
struct InterruptingBus;

#[cfg(test)]
#[async_trait::async_trait]
impl EventBus for InterruptingBus {
    async fn fetch_by_time_range(&self, _start_ms: i64, _end_ms: i64) -> Result<Vec<trace_governance_models::event::Event>> {
        Err(trace_governance_common::error::AppError::EventStreamInterrupted {
            events_seen: 3,
            source: "connection reset".into(),
        })
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trace_classifier::Classifier;
    use trace_event_source::MemoryEventBus;
    use trace_governance::RedactionVault;
    use trace_governance_common::config::AllowlistConfig;
    use trace_governance_models::event::{Event, EventPayload, EventType, Role};
    use trace_patterns::{LanguageRegistry, RedactionRegistry};

    fn event(id: &str, ts: i64, seq: u64, event_type: EventType, payload: EventPayload) -> Event {
        Event {
            id: id.into(),
            ts,
            seq,
            agent: "agent-1".into(),
            session: "session-1".into(),
            event_type,
            payload,
        }
    }

    fn driver(bus: Arc<dyn EventBus>, state_dir: &std::path::Path) -> PipelineDriver {
        let registry = LanguageRegistry::new();
        registry.load_builtin_sync().unwrap();
        let patterns = registry.merged();
        let redaction = RedactionEngine::new(RedactionRegistry::with_builtins(), RedactionVault::new(3_600), AllowlistConfig::default());
        PipelineDriver::new(
            bus,
            ReconstructorConfig::default(),
            patterns,
            Classifier::disabled(),
            redaction,
            500,
            60,
            state_dir.join("state.json"),
            state_dir.join("report.json"),
        )
    }

    #[tokio::test]
    async fn unavailable_source_yields_empty_persisted_report() {
        let dir = tempfile::tempdir().unwrap();
        let bus: Arc<dyn EventBus> = Arc::new(MemoryEventBus::unavailable());
        let driver = driver(bus, dir.path());
        let report = driver.run(PipelineOptions::default()).await.unwrap().unwrap();
        assert!(report.findings.is_empty());
        assert!(dir.path().join("report.json").exists());
    }

    #[tokio::test]
    async fn doom_loop_chain_produces_a_finding_with_no_classifier_configured() {
        let dir = tempfile::tempdir().unwrap();
        let mut events = vec![event(
            "0",
            0,
            0,
            EventType::MsgIn,
            EventPayload {
                role: Some(Role::User),
                content: Some("please restart the service".into()),
                ..Default::default()
            },
        )];
        for i in 0..5 {
            let base = (i * 2 + 1) as i64 * 1000;
            events.push(event(
                &format!("call-{i}"),
                base,
                (i * 2 + 1) as u64,
                EventType::ToolCall,
                EventPayload {
                    tool_name: Some("service_restart".into()),
                    tool_params: Some(serde_json::json!({"service": "api"})),
                    ..Default::default()
                },
            ));
            events.push(event(
                &format!("result-{i}"),
                base + 500,
                (i * 2 + 2) as u64,
                EventType::ToolResult,
                EventPayload {
                    tool_name: Some("service_restart".into()),
                    tool_result: Some(serde_json::json!({"ok": false})),
                    tool_is_error: Some(true),
                    ..Default::default()
                },
            ));
        }
        let bus: Arc<dyn EventBus> = Arc::new(MemoryEventBus::new(events));
        let driver = driver(bus, dir.path());
        let report = driver.run(PipelineOptions { full: true }).await.unwrap().unwrap();
        assert!(!report.findings.is_empty());
        assert!(report.findings.iter().any(|f| f.signal.kind.to_string() == "SIG-DOOM-LOOP"));
    }

    #[tokio::test]
    async fn second_concurrent_run_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let bus: Arc<dyn EventBus> = Arc::new(MemoryEventBus::new(Vec::new()));
        let driver = Arc::new(driver(bus, dir.path()));
        let held = driver.lock.try_lock().unwrap();
        let result = driver.run(PipelineOptions::default()).await.unwrap();
        assert!(result.is_none());
        drop(held);
    }

    #[tokio::test]
    async fn mid_stream_failure_aborts_the_run_instead_of_degrading() {
        let dir = tempfile::tempdir().unwrap();
        let bus: Arc<dyn EventBus> = Arc::new(InterruptingBus);
        let driver = driver(bus, dir.path());
        let result = driver.run(PipelineOptions::default()).await;
        assert!(matches!(
            result,
            Err(trace_governance_common::error::AppError::EventStreamInterrupted { .. })
        ));
    }
}

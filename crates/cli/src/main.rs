//! `tracegov` binary: `trace-analyze [--full]`, `trace-status`,
//! `governance status`, `eventstatus`.

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use trace_event_source::{BusConfig, EventBus, NatsCredentials, NatsEventBus};
use trace_governance::{RedactionEngine, RedactionVault, TrustManager};
use trace_governance_common::config::{load_config, PipelineConfig};
use trace_governance_common::response::ApiResponse;
use trace_governance_models::state::AnalysisReport;

/// Prints a command's result through the shared `ApiResponse` envelope:
/// JSON when `--json` is set, otherwise the envelope's human summary line.
fn emit<T: Serialize>(json: bool, response: ApiResponse<T>, human: impl FnOnce(&T) -> String) {
    if json {
        match serde_json::to_string(&response) {
            Ok(body) => println!("{body}"),
            Err(e) => eprintln!("failed to serialize response: {e}"),
        }
    } else {
        match (&response.data, &response.message) {
            (Some(data), _) => println!("{}", human(data)),
            (None, Some(message)) => println!("{message}"),
            (None, None) => {}
        }
    }
}

#[derive(Parser)]
#[command(name = "tracegov")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Agent-trace analysis and governance pipeline", long_about = None)]
struct Cli {
    /// Path to a JSON or TOML config file; falls back to defaults + env overrides.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Workspace root persisted state (trace-analyzer-state.json, trust.json, ...) lives under.
    #[arg(long, global = true, default_value = ".")]
    workspace: PathBuf,

    /// Emit the ApiResponse envelope as JSON instead of a human summary line.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one pipeline pass: reconstruct chains, detect, classify, generate outputs.
    TraceAnalyze {
        /// Ignore the persisted ProcessingState and reprocess from the beginning.
        #[arg(long)]
        full: bool,
    },
    /// Print the last persisted AnalysisReport's summary.
    TraceStatus,
    /// Print Trust Manager and Audit Trail status.
    Governance {
        #[command(subcommand)]
        command: GovernanceCommand,
    },
    /// Probe the event bus and report reachability.
    Eventstatus,
}

#[derive(Subcommand)]
enum GovernanceCommand {
    Status,
}

fn state_path(workspace: &std::path::Path) -> PathBuf {
    workspace.join("memory/reboot/trace-analyzer-state.json")
}

fn report_path(workspace: &std::path::Path, config: &PipelineConfig) -> PathBuf {
    let configured = PathBuf::from(&config.trace_analyzer.output.report_path);
    if configured.is_absolute() {
        configured
    } else {
        workspace.join(configured)
    }
}

fn trust_path(workspace: &std::path::Path) -> PathBuf {
    workspace.join("governance/trust.json")
}

fn bus_for(config: &PipelineConfig) -> Arc<dyn EventBus> {
    let nats = &config.trace_analyzer.nats;
    let credentials = nats.credentials.as_ref().map(|c| NatsCredentials {
        file_path: c.file_path.clone(),
        user: c.user.clone(),
        password: c.password.clone(),
    });
    Arc::new(NatsEventBus::new(BusConfig {
        url: nats.url.clone(),
        stream: nats.stream.clone(),
        subject_prefix: nats.subject_prefix.clone(),
        credentials,
    }))
}

#[derive(Serialize)]
struct TraceAnalyzeSummary {
    events_seen: u64,
    chains_built: u64,
    findings_emitted: u64,
    generated_outputs: usize,
}

#[derive(Serialize)]
struct TraceStatusSummary {
    version: u32,
    generated_at: chrono::DateTime<chrono::Utc>,
    findings: usize,
    last_processed_ts: i64,
}

#[derive(Serialize)]
struct AgentTrustSummary {
    agent: String,
    score: f64,
    tier: String,
}

#[derive(Serialize)]
struct GovernanceStatusSummary {
    agents: Vec<AgentTrustSummary>,
    audit_log_files: usize,
}

#[derive(Serialize)]
struct EventStatusSummary {
    reachable: bool,
}

async fn run_trace_analyze(cli: &Cli, config: PipelineConfig, full: bool) -> Result<i32> {
    let bus = bus_for(&config);
    let registry = trace_patterns::LanguageRegistry::new();
    registry.load_builtin_sync()?;
    registry.load_builtin_async().await?;
    let patterns = registry.merged();

    let redaction = RedactionEngine::new(
        trace_patterns::RedactionRegistry::with_builtins(),
        RedactionVault::new(config.redaction.vault_expiry_seconds),
        config.redaction.allowlist.clone(),
    );

    let classifier = trace_classifier::Classifier::from_config(&config.trace_analyzer.llm)?;

    let driver = trace_pipeline::PipelineDriver::new(
        bus,
        trace_chain::ReconstructorConfig::default(),
        patterns,
        classifier,
        redaction,
        config.trace_analyzer.output.max_findings as usize,
        config.trace_analyzer.incremental_context_window_minutes,
        state_path(&cli.workspace),
        report_path(&cli.workspace, &config),
    );

    match driver.run(trace_pipeline::PipelineOptions { full }).await? {
        Some(report) => {
            let summary = TraceAnalyzeSummary {
                events_seen: report.stats.events_seen,
                chains_built: report.stats.chains_built,
                findings_emitted: report.stats.findings_emitted,
                generated_outputs: report.generated_outputs.len(),
            };
            emit(cli.json, ApiResponse::success(summary), |s| {
                format!(
                    "trace-analyze: {} events seen, {} chains built, {} findings emitted ({} generated outputs)",
                    s.events_seen, s.chains_built, s.findings_emitted, s.generated_outputs,
                )
            });
            Ok(0)
        }
        None => {
            emit(
                cli.json,
                ApiResponse::<()>::error("a run is already in progress, skipped"),
                |_| String::new(),
            );
            Ok(0)
        }
    }
}

fn run_trace_status(cli: &Cli, config: &PipelineConfig) -> Result<i32> {
    let path = report_path(&cli.workspace, config);
    let Some(contents) = std::fs::read_to_string(&path).ok() else {
        emit(
            cli.json,
            ApiResponse::<()>::error(format!("no report found at {}", path.display())),
            |_| String::new(),
        );
        return Ok(0);
    };
    let report: AnalysisReport = serde_json::from_str(&contents)?;
    let summary = TraceStatusSummary {
        version: report.version,
        generated_at: report.generated_at,
        findings: report.findings.len(),
        last_processed_ts: report.processing_state.last_processed_ts,
    };
    emit(cli.json, ApiResponse::success(summary), |s| {
        format!(
            "trace-status: report v{} generated {}, {} findings, last processed ts {}",
            s.version, s.generated_at, s.findings, s.last_processed_ts,
        )
    });
    Ok(0)
}

fn run_governance_status(cli: &Cli, config: &PipelineConfig) -> Result<i32> {
    let trust = TrustManager::load_or_default(&trust_path(&cli.workspace), config.trust.clone());
    let snapshot = trust.snapshot();
    let mut agents: Vec<_> = snapshot.into_iter().collect();
    agents.sort_by(|a, b| a.0.cmp(&b.0));
    let agents: Vec<AgentTrustSummary> = agents
        .into_iter()
        .map(|(agent, record)| AgentTrustSummary {
            agent,
            score: record.score,
            tier: format!("{:?}", record.tier),
        })
        .collect();

    let audit_dir = trace_governance::path_for_workspace(&cli.workspace);
    let audit_log_files = std::fs::read_dir(&audit_dir).map(|d| d.count()).unwrap_or(0);

    let summary = GovernanceStatusSummary {
        agents,
        audit_log_files,
    };
    emit(cli.json, ApiResponse::success(summary), |s| {
        let mut lines = vec![format!("governance status: {} agent(s) tracked", s.agents.len())];
        for agent in &s.agents {
            lines.push(format!("  {}: score={:.1} tier={}", agent.agent, agent.score, agent.tier));
        }
        lines.push(format!("  audit log files: {}", s.audit_log_files));
        lines.join("\n")
    });
    Ok(0)
}

async fn run_eventstatus(cli: &Cli, config: &PipelineConfig) -> Result<i32> {
    let bus = bus_for(config);
    let reachable = bus.is_available().await;
    bus.close().await?;
    emit(
        cli.json,
        ApiResponse::success(EventStatusSummary { reachable }),
        |s| {
            if s.reachable {
                "eventstatus: event bus reachable".to_string()
            } else {
                "eventstatus: event bus unreachable (degraded, continuing)".to_string()
            }
        },
    );
    Ok(0)
}

#[tokio::main]
async fn main() -> Result<()> {
    trace_governance_common::logging::init_tracing();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref());

    let exit_code = match &cli.command {
        Commands::TraceAnalyze { full } => run_trace_analyze(&cli, config, *full).await?,
        Commands::TraceStatus => run_trace_status(&cli, &config)?,
        Commands::Governance { command } => match command {
            GovernanceCommand::Status => run_governance_status(&cli, &config)?,
        },
        Commands::Eventstatus => run_eventstatus(&cli, &config).await?,
    };

    std::process::exit(exit_code);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clap_parses_known_subcommands() {
        let cli = Cli::try_parse_from(["tracegov", "trace-analyze", "--full"]).expect("parse trace-analyze");
        assert!(matches!(cli.command, Commands::TraceAnalyze { full: true }));

        let cli = Cli::try_parse_from(["tracegov", "governance", "status"]).expect("parse governance status");
        assert!(matches!(cli.command, Commands::Governance { command: GovernanceCommand::Status }));

        let cli = Cli::try_parse_from(["tracegov", "eventstatus"]).expect("parse eventstatus");
        assert!(matches!(cli.command, Commands::Eventstatus));
    }

    #[test]
    fn trace_analyze_defaults_to_non_full() {
        let cli = Cli::try_parse_from(["tracegov", "trace-analyze"]).expect("parse");
        assert!(matches!(cli.command, Commands::TraceAnalyze { full: false }));
    }

    #[test]
    fn json_flag_defaults_off_and_parses_when_passed() {
        let cli = Cli::try_parse_from(["tracegov", "trace-status"]).expect("parse");
        assert!(!cli.json);

        let cli = Cli::try_parse_from(["tracegov", "--json", "trace-status"]).expect("parse");
        assert!(cli.json);
    }
}

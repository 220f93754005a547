//! Config Loader (§6, §14 of SPEC_FULL) — merges a JSON/TOML file with
//! environment overrides into the recognized option tree. Unknown keys are
//! ignored with a warning; invalid values fall back to field defaults
//! rather than failing the whole load.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

fn def_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecayConfig {
    pub enabled: bool,
    pub inactivity_days: f64,
    pub rate: f64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            inactivity_days: 14.0,
            rate: 0.95,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustConfig {
    pub enabled: bool,
    pub defaults: HashMap<String, f64>,
    pub persist_interval_seconds: u64,
    pub decay: DecayConfig,
    pub max_history_per_agent: u32,
    pub weights: HashMap<String, f64>,
}

impl Default for TrustConfig {
    fn default() -> Self {
        let mut defaults = HashMap::new();
        defaults.insert("*".to_string(), 40.0);
        Self {
            enabled: true,
            defaults,
            persist_interval_seconds: 30,
            decay: DecayConfig::default(),
            max_history_per_agent: 1000,
            weights: HashMap::new(),
        }
    }
}

impl TrustConfig {
    pub fn default_score_for(&self, agent: &str) -> f64 {
        self.defaults
            .get(agent)
            .copied()
            .unwrap_or_else(|| self.defaults.get("*").copied().unwrap_or(40.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailMode {
    Open,
    Closed,
}

impl Default for FailMode {
    fn default() -> Self {
        FailMode::Closed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditLevel {
    Minimal,
    Standard,
    Verbose,
}

impl Default for AuditLevel {
    fn default() -> Self {
        AuditLevel::Standard
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,
    pub retention_days: u32,
    pub level: AuditLevel,
    pub redact_patterns: Vec<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retention_days: 90,
            level: AuditLevel::Standard,
            redact_patterns: vec!["password".into(), "token".into(), "apiKey".into()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    pub max_eval_us: u64,
    pub max_context_messages: u32,
    pub frequency_buffer_size: u32,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            max_eval_us: 5_000,
            max_context_messages: 50,
            frequency_buffer_size: 256,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContradictionThresholds {
    pub flag_above: f64,
    pub block_below: f64,
}

impl Default for ContradictionThresholds {
    fn default() -> Self {
        Self {
            flag_above: 0.5,
            block_below: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmValidatorConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout_ms: u64,
    pub external_channels: Vec<String>,
    pub external_commands: Vec<String>,
    pub cache_ttl_seconds: u64,
    pub fail_mode: FailMode,
}

impl Default for LlmValidatorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: String::new(),
            model: "gpt-4o-mini".into(),
            max_tokens: 512,
            timeout_ms: 8_000,
            external_channels: Vec::new(),
            external_commands: Vec::new(),
            cache_ttl_seconds: 900,
            fail_mode: FailMode::Closed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputValidationConfig {
    pub enabled: bool,
    pub enabled_detectors: Vec<String>,
    pub fact_registries: Vec<String>,
    pub contradiction_thresholds: ContradictionThresholds,
    pub llm_validator: LlmValidatorConfig,
}

impl Default for OutputValidationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            enabled_detectors: vec![
                "system_state".into(),
                "entity_name".into(),
                "existence".into(),
                "operational_status".into(),
                "self_referential".into(),
            ],
            fact_registries: Vec::new(),
            contradiction_thresholds: ContradictionThresholds::default(),
            llm_validator: LlmValidatorConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AllowlistConfig {
    pub pii_allowed_channels: Vec<String>,
    pub financial_allowed_channels: Vec<String>,
    pub exempt_tools: Vec<String>,
    pub exempt_agents: Vec<String>,
}

impl Default for AllowlistConfig {
    fn default() -> Self {
        Self {
            pii_allowed_channels: Vec::new(),
            financial_allowed_channels: Vec::new(),
            exempt_tools: Vec::new(),
            exempt_agents: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactionConfig {
    pub enabled: bool,
    pub categories: Vec<String>,
    pub vault_expiry_seconds: u64,
    pub fail_mode: FailMode,
    pub custom_patterns: Vec<String>,
    pub allowlist: AllowlistConfig,
    pub performance_budget_ms: u64,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            categories: vec![
                "credential".into(),
                "pii".into(),
                "financial".into(),
                "custom".into(),
            ],
            vault_expiry_seconds: 3_600,
            fail_mode: FailMode::Closed,
            custom_patterns: Vec::new(),
            allowlist: AllowlistConfig::default(),
            performance_budget_ms: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub enabled: bool,
    pub interval_hours: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_hours: 6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub max_findings: u32,
    pub report_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            max_findings: 500,
            report_path: "memory/reboot/trace-analysis-report.json".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NatsCredentials {
    pub file_path: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl Default for NatsCredentials {
    fn default() -> Self {
        Self {
            file_path: None,
            user: None,
            password: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    pub url: String,
    pub stream: String,
    pub subject_prefix: String,
    pub credentials: Option<NatsCredentials>,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://127.0.0.1:4222".into(),
            stream: "openclaw-events".into(),
            subject_prefix: "openclaw.events".into(),
            credentials: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    pub endpoint: String,
    pub model: String,
    pub timeout_ms: u64,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            model: "gpt-4o-mini".into(),
            timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_ms: u64,
    pub batch_size: u32,
    pub triage: Option<TriageConfig>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: String::new(),
            model: "gpt-4o".into(),
            api_key: None,
            timeout_ms: 15_000,
            batch_size: 4,
            triage: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceAnalyzerConfig {
    pub enabled: bool,
    pub incremental_context_window_minutes: i64,
    pub schedule: ScheduleConfig,
    pub output: OutputConfig,
    pub nats: NatsConfig,
    pub llm: LlmConfig,
}

impl Default for TraceAnalyzerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            incremental_context_window_minutes: 60,
            schedule: ScheduleConfig::default(),
            output: OutputConfig::default(),
            nats: NatsConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    #[serde(default = "def_true")]
    pub enabled: bool,
    pub timezone: String,
    pub fail_mode: FailMode,
    pub trust: TrustConfig,
    pub audit: AuditConfig,
    pub performance: PerformanceConfig,
    pub output_validation: OutputValidationConfig,
    pub redaction: RedactionConfig,
    pub trace_analyzer: TraceAnalyzerConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timezone: "UTC".into(),
            fail_mode: FailMode::Closed,
            trust: TrustConfig::default(),
            audit: AuditConfig::default(),
            performance: PerformanceConfig::default(),
            output_validation: OutputValidationConfig::default(),
            redaction: RedactionConfig::default(),
            trace_analyzer: TraceAnalyzerConfig::default(),
        }
    }
}

/// Loads `PipelineConfig` from an optional file (JSON or TOML, inferred by
/// extension) layered with environment overrides prefixed `GOVERNANCE_`.
/// A missing file is not an error — the defaults (plus env overrides) are
/// used. A file that parses but fails to deserialize into `PipelineConfig`
/// logs a warning and falls back to `PipelineConfig::default()` rather than
/// aborting the caller, per §6 "invalid values fall back to documented
/// defaults".
pub fn load_config(path: Option<&Path>) -> PipelineConfig {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("GOVERNANCE")
            .separator("__")
            .try_parsing(true),
    );

    match builder.build() {
        Ok(raw) => match raw.try_deserialize::<PipelineConfig>() {
            Ok(cfg) => cfg,
            Err(err) => {
                tracing::warn!(error = %err, "config failed to deserialize, using defaults");
                PipelineConfig::default()
            }
        },
        Err(err) => {
            tracing::warn!(error = %err, "config build failed, using defaults");
            PipelineConfig::default()
        }
    }
}

//! Evaluation context and verdict exchanged with the Governance Engine.

use crate::policy::{Action, MatchedPolicy, TrustTier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustContext {
    pub score: f64,
    pub tier: TrustTier,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossAgentContext {
    pub parent_agent_id: String,
    pub parent_session_key: String,
    pub inherited_policy_ids: Vec<String>,
    pub trust_ceiling: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationContext {
    pub hook: String,
    pub agent_id: String,
    pub session_key: String,
    pub timestamp: DateTime<Utc>,
    pub trust: TrustContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_params: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cross_agent: Option<CrossAgentContext>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub action: Action,
    pub reason: Option<String>,
    pub matched_policies: Vec<MatchedPolicy>,
    pub trust: TrustContext,
    pub enriched_ctx: EvaluationContext,
}

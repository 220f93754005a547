//! Governance policy types: scope, rules, conditions, effects.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Action {
    Allow,
    Audit,
    Warn,
    Deny,
}

impl Action {
    /// `deny > warn > audit > allow`.
    pub fn precedence(self) -> u8 {
        match self {
            Action::Deny => 3,
            Action::Warn => 2,
            Action::Audit => 1,
            Action::Allow => 0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyScope {
    #[serde(default)]
    pub agents: Option<Vec<String>>,
    #[serde(default)]
    pub hooks: Option<Vec<String>>,
    #[serde(default)]
    pub tools: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCondition {
    pub name: String,
    #[serde(default)]
    pub param_key: Option<String>,
    #[serde(default)]
    pub param_regex: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustTier {
    Restricted,
    Standard,
    Trusted,
    Privileged,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustCondition {
    ScoreAtLeast(u8),
    ScoreBelow(u8),
    Tier(TrustTier),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeCondition {
    /// e.g. "night"
    pub name: String,
    pub start: String,
    pub end: String,
    pub timezone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrequencyCondition {
    pub max_count: u32,
    pub window_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextCondition {
    pub field: ContextField,
    #[serde(default)]
    pub contains: Option<String>,
    #[serde(default)]
    pub regex: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextField {
    Message,
    ToolParams,
    CrossAgent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    Tool(ToolCondition),
    Trust(TrustCondition),
    Time(TimeCondition),
    Frequency(FrequencyCondition),
    Context(ContextCondition),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Effect {
    pub action: Action,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub conditions: Vec<Condition>,
    pub effect: Effect,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    pub name: String,
    pub version: u32,
    #[serde(default)]
    pub scope: PolicyScope,
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub controls: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedPolicy {
    pub policy_id: String,
    pub rule_id: String,
    pub effect: Action,
    pub controls: Vec<String>,
}

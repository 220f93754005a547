//! Governance Engine: policy evaluation, trust scoring, cross-agent
//! inheritance, audit trail, and the redaction vault (Components 8-12).

pub mod audit;
pub mod cross_agent;
pub mod policy {
    pub mod conditions;
    pub mod evaluator;
}
pub mod redaction {
    pub mod engine;
    pub mod vault;
}
pub mod trust;

pub use audit::{path_for_workspace, AuditSink};
pub use cross_agent::CrossAgentManager;
pub use policy::evaluator::PolicyEvaluator;
pub use redaction::engine::RedactionEngine;
pub use redaction::vault::RedactionVault;
pub use trust::TrustManager;

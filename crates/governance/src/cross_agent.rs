//! Cross-Agent Manager (Component 10): parent/child session graph, policy
//! inheritance, and the trust ceiling applied to sub-agents.

use std::collections::HashMap;
use std::sync::RwLock;
use trace_governance_models::evaluation::{CrossAgentContext, EvaluationContext};
use trace_governance_models::policy::Policy;
use trace_governance_models::trust::TrustRecord;

#[derive(Debug, Clone)]
struct Lineage {
    parent_agent_id: String,
    parent_session_key: String,
}

/// Parses `agent:<parent>:subagent:<child>:<uuid>` session keys. A session
/// key alone is sufficient to infer parentage even without an explicit
/// `sessions_spawn` registration.
fn parse_session_key(session_key: &str) -> Option<(String, String)> {
    let parts: Vec<&str> = session_key.split(':').collect();
    if parts.len() >= 4 && parts[0] == "agent" && parts[2] == "subagent" {
        Some((parts[1].to_string(), parts[3].to_string()))
    } else {
        None
    }
}

pub struct CrossAgentManager {
    /// Keyed by child session key.
    graph: RwLock<HashMap<String, Lineage>>,
}

impl CrossAgentManager {
    pub fn new() -> Self {
        Self {
            graph: RwLock::new(HashMap::new()),
        }
    }

    pub fn register_spawn(&self, parent_agent_id: &str, parent_session_key: &str, child_session_key: &str) {
        self.graph.write().unwrap().insert(
            child_session_key.to_string(),
            Lineage {
                parent_agent_id: parent_agent_id.to_string(),
                parent_session_key: parent_session_key.to_string(),
            },
        );
    }

    fn lineage_for(&self, ctx: &EvaluationContext) -> Option<Lineage> {
        if let Some(lineage) = self.graph.read().unwrap().get(&ctx.session_key).cloned() {
            return Some(lineage);
        }
        let (parent_agent_id, _child) = parse_session_key(&ctx.session_key)?;
        Some(Lineage {
            parent_session_key: ctx.session_key.clone(),
            parent_agent_id,
        })
    }

    /// Attaches `crossAgent` metadata for sub-agents and caps the effective
    /// trust score at the parent's current score. Root agents pass through
    /// unmodified.
    pub fn enrich_context(&self, mut ctx: EvaluationContext, parent_trust: impl Fn(&str) -> TrustRecord) -> EvaluationContext {
        let Some(lineage) = self.lineage_for(&ctx) else {
            return ctx;
        };

        let parent_record = parent_trust(&lineage.parent_agent_id);
        let ceiling = parent_record.score;
        let capped_score = ctx.trust.score.min(ceiling);
        ctx.trust.score = capped_score;
        ctx.trust.tier = TrustRecord::tier_for_score(capped_score);

        ctx.cross_agent = Some(CrossAgentContext {
            parent_agent_id: lineage.parent_agent_id,
            parent_session_key: lineage.parent_session_key,
            inherited_policy_ids: Vec::new(),
            trust_ceiling: ceiling,
        });
        ctx
    }

    /// Global policies + policies scoped to `ctx.agentId` + (for sub-agents)
    /// policies scoped to any ancestor, walking the full inheritance chain.
    pub fn resolve_effective_policies<'a>(&self, ctx: &EvaluationContext, index: &'a [Policy]) -> Vec<&'a Policy> {
        let mut ancestors = vec![ctx.agent_id.clone()];
        let mut cursor = self.lineage_for(ctx);
        while let Some(lineage) = cursor {
            ancestors.push(lineage.parent_agent_id.clone());
            cursor = self
                .graph
                .read()
                .unwrap()
                .get(&lineage.parent_session_key)
                .cloned();
        }

        index
            .iter()
            .filter(|policy| match &policy.scope.agents {
                None => true,
                Some(agents) => agents.iter().any(|a| ancestors.contains(a)),
            })
            .collect()
    }
}

impl Default for CrossAgentManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use trace_governance_models::evaluation::TrustContext;
    use trace_governance_models::policy::TrustTier;

    fn ctx(session_key: &str, score: f64) -> EvaluationContext {
        EvaluationContext {
            hook: "before_tool_call".into(),
            agent_id: "child".into(),
            session_key: session_key.into(),
            timestamp: Utc::now(),
            trust: TrustContext {
                score,
                tier: TrustTier::Trusted,
            },
            tool_name: None,
            tool_params: None,
            message: None,
            cross_agent: None,
        }
    }

    #[test]
    fn session_key_alone_infers_parentage_and_caps_trust() {
        let manager = CrossAgentManager::new();
        let enriched = manager.enrich_context(ctx("agent:parent-1:subagent:child:uuid-1", 90.0), |agent| {
            TrustRecord::new(agent.to_string(), 40.0, Utc::now())
        });
        assert_eq!(enriched.trust.score, 40.0);
        assert_eq!(enriched.trust.tier, TrustTier::Standard);
        assert_eq!(enriched.cross_agent.unwrap().parent_agent_id, "parent-1");
    }

    #[test]
    fn root_agent_is_not_modified() {
        let manager = CrossAgentManager::new();
        let enriched = manager.enrich_context(ctx("plain-session", 90.0), |agent| {
            TrustRecord::new(agent.to_string(), 10.0, Utc::now())
        });
        assert_eq!(enriched.trust.score, 90.0);
        assert!(enriched.cross_agent.is_none());
    }
}

//! Policy Evaluator (Component 8): matches an [`EvaluationContext`] against
//! scoped policies and aggregates matched rules into a [`Verdict`].

use super::conditions;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use trace_governance_common::config::FailMode;
use trace_governance_models::evaluation::{EvaluationContext, Verdict};
use trace_governance_models::policy::{Action, Condition, MatchedPolicy, Policy};

fn scope_matches(policy: &Policy, ctx: &EvaluationContext) -> bool {
    let agent_ok = policy
        .scope
        .agents
        .as_ref()
        .map(|agents| agents.iter().any(|a| a == &ctx.agent_id))
        .unwrap_or(true);
    let hook_ok = policy
        .scope
        .hooks
        .as_ref()
        .map(|hooks| hooks.iter().any(|h| h == &ctx.hook))
        .unwrap_or(true);
    let tool_ok = policy
        .scope
        .tools
        .as_ref()
        .map(|tools| {
            ctx.tool_name
                .as_ref()
                .map(|t| tools.iter().any(|tool| tool == t))
                .unwrap_or(false)
        })
        .unwrap_or(true);
    agent_ok && hook_ok && tool_ok
}

/// A `(agent, hook)`-keyed ring buffer backing `frequency` conditions.
struct FrequencyTracker {
    observations: RwLock<HashMap<(String, String), VecDeque<chrono::DateTime<Utc>>>>,
}

impl FrequencyTracker {
    fn new() -> Self {
        Self {
            observations: RwLock::new(HashMap::new()),
        }
    }

    /// Records `now` and reports whether the count within `window_seconds`
    /// is still `<= max_count` (i.e. the condition is satisfied).
    fn observe(&self, agent: &str, hook: &str, now: chrono::DateTime<Utc>, max_count: u32, window_seconds: u64) -> bool {
        let mut map = self.observations.write().unwrap();
        let buf = map
            .entry((agent.to_string(), hook.to_string()))
            .or_insert_with(VecDeque::new);
        buf.push_back(now);
        while let Some(front) = buf.front() {
            if !conditions::within_window(now, *front, window_seconds) {
                buf.pop_front();
            } else {
                break;
            }
        }
        buf.len() as u32 <= max_count
    }
}

pub struct PolicyEvaluator {
    policies: Vec<Policy>,
    fail_mode: FailMode,
    frequency: FrequencyTracker,
}

impl PolicyEvaluator {
    pub fn new(policies: Vec<Policy>, fail_mode: FailMode) -> Self {
        Self {
            policies,
            fail_mode,
            frequency: FrequencyTracker::new(),
        }
    }

    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    /// Evaluates every in-scope policy, short-circuiting per policy on the
    /// first rule whose conditions all hold, then aggregates by action
    /// precedence (`deny > warn > audit > allow`).
    pub fn evaluate(&self, ctx: &EvaluationContext) -> Verdict {
        let mut matched = Vec::new();
        let mut had_fault = false;
        let mut best_action = Action::Allow;
        let mut reason = None;

        for policy in &self.policies {
            if !scope_matches(policy, ctx) {
                continue;
            }

            let mut policy_fault = false;
            for rule in &policy.rules {
                let mut all_hold = true;
                for condition in &rule.conditions {
                    let result = match condition {
                        Condition::Frequency(freq) => Ok(self.frequency.observe(
                            &ctx.agent_id,
                            &ctx.hook,
                            ctx.timestamp,
                            freq.max_count,
                            freq.window_seconds,
                        )),
                        other => conditions::evaluate(other, ctx),
                    };
                    match result {
                        Ok(true) => {}
                        Ok(false) => {
                            all_hold = false;
                            break;
                        }
                        Err(err) => {
                            tracing::warn!(policy = %policy.id, rule = %rule.id, error = %err, "condition evaluation faulted, skipping policy");
                            policy_fault = true;
                            all_hold = false;
                            break;
                        }
                    }
                }

                if policy_fault {
                    break;
                }

                if all_hold {
                    matched.push(MatchedPolicy {
                        policy_id: policy.id.clone(),
                        rule_id: rule.id.clone(),
                        effect: rule.effect.action,
                        controls: policy.controls.clone(),
                    });
                    if rule.effect.action.precedence() > best_action.precedence() {
                        best_action = rule.effect.action;
                    }
                    if matches!(rule.effect.action, Action::Deny | Action::Warn) && reason.is_none() {
                        reason = rule.effect.reason.clone();
                    }
                    break;
                }
            }

            if policy_fault {
                had_fault = true;
            }
        }

        if had_fault && self.fail_mode == FailMode::Closed && best_action.precedence() < Action::Deny.precedence() {
            best_action = Action::Deny;
            reason.get_or_insert_with(|| "policy evaluation fault under closed fail-mode".to_string());
        }

        Verdict {
            action: best_action,
            reason,
            matched_policies: matched,
            trust: ctx.trust.clone(),
            enriched_ctx: ctx.clone(),
        }
    }
}

//! Output Generator (Component 6): groups classified findings by
//! `(actionType, actionText)` and emits the artifact each action type
//! implies.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use trace_governance_models::finding::{ActionType, Finding, GeneratedOutput, SignalKind};
use trace_governance_models::policy::{Action, Effect, Policy, PolicyScope, Rule};

fn stable_id(action_type: ActionType, action_text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(action_type.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(action_text.as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("trace-gen-{}", &hex[..12])
}

/// Hook a generated policy's scope should restrict to, derived from the
/// signal kind that most of the group's findings originated from.
fn hook_for_signal(kind: SignalKind) -> &'static str {
    match kind {
        SignalKind::DoomLoop => "before_tool_call",
        SignalKind::Hallucination
        | SignalKind::Correction
        | SignalKind::Dissatisfaction
        | SignalKind::UnverifiedClaim => "message_sending",
    }
}

fn dominant_signal_kind(findings: &[&Finding]) -> SignalKind {
    let mut counts: HashMap<u8, (SignalKind, usize)> = HashMap::new();
    for f in findings {
        let kind = f.signal.kind;
        let entry = counts.entry(kind as u8).or_insert((kind, 0));
        entry.1 += 1;
    }
    counts
        .into_values()
        .max_by_key(|(_, n)| *n)
        .map(|(kind, _)| kind)
        .unwrap_or(SignalKind::DoomLoop)
}

fn soul_rule_output(action_text: &str, findings: &[&Finding]) -> GeneratedOutput {
    let ids: Vec<String> = findings.iter().map(|f| f.id.clone()).collect();
    let confidence = average_confidence(findings);
    let text = format!(
        "{action_text} ({}× beobachtet in Traces, siehe {})",
        findings.len(),
        ids.join(", ")
    );
    GeneratedOutput {
        id: stable_id(ActionType::SoulRule, action_text),
        output_type: ActionType::SoulRule,
        content: serde_json::json!(text),
        source_findings: ids,
        observation_count: findings.len() as u32,
        confidence,
    }
}

fn governance_policy_output(action_text: &str, findings: &[&Finding]) -> GeneratedOutput {
    let ids: Vec<String> = findings.iter().map(|f| f.id.clone()).collect();
    let confidence = average_confidence(findings);
    let id = stable_id(ActionType::GovernancePolicy, action_text);
    let hook = hook_for_signal(dominant_signal_kind(findings));

    let policy = Policy {
        id: id.clone(),
        name: format!("trace-generated: {action_text}"),
        version: 1,
        scope: PolicyScope {
            agents: None,
            hooks: Some(vec![hook.to_string()]),
            tools: None,
        },
        rules: vec![Rule {
            id: "auto-audit".into(),
            conditions: Vec::new(),
            effect: Effect {
                action: Action::Audit,
                reason: Some(action_text.to_string()),
            },
        }],
        controls: Vec::new(),
    };

    GeneratedOutput {
        id,
        output_type: ActionType::GovernancePolicy,
        content: serde_json::to_value(&policy).unwrap_or(serde_json::Value::Null),
        source_findings: ids,
        observation_count: findings.len() as u32,
        confidence,
    }
}

fn cortex_pattern_output(action_text: &str, findings: &[&Finding]) -> GeneratedOutput {
    let ids: Vec<String> = findings.iter().map(|f| f.id.clone()).collect();
    let confidence = average_confidence(findings);
    GeneratedOutput {
        id: stable_id(ActionType::CortexPattern, action_text),
        output_type: ActionType::CortexPattern,
        content: serde_json::json!(action_text),
        source_findings: ids,
        observation_count: findings.len() as u32,
        confidence,
    }
}

fn average_confidence(findings: &[&Finding]) -> f64 {
    let total: f64 = findings
        .iter()
        .filter_map(|f| f.classification.as_ref())
        .map(|c| c.confidence)
        .sum();
    let count = findings
        .iter()
        .filter(|f| f.classification.is_some())
        .count()
        .max(1);
    total / count as f64
}

/// Groups `findings` by `(actionType, actionText)` of their classification
/// and emits one artifact per group. Findings with no classification, and
/// groups whose actionType is `manual_review`, produce no artifact.
pub fn generate(findings: &[Finding]) -> Vec<GeneratedOutput> {
    let mut groups: HashMap<(ActionType, String), Vec<&Finding>> = HashMap::new();
    for finding in findings {
        let Some(classification) = &finding.classification else {
            continue;
        };
        groups
            .entry((classification.action_type, classification.action_text.clone()))
            .or_default()
            .push(finding);
    }

    let mut outputs = Vec::new();
    for ((action_type, action_text), group) in groups {
        let output = match action_type {
            ActionType::SoulRule => soul_rule_output(&action_text, &group),
            ActionType::GovernancePolicy => governance_policy_output(&action_text, &group),
            ActionType::CortexPattern => cortex_pattern_output(&action_text, &group),
            ActionType::ManualReview => continue,
        };
        outputs.push(output);
    }
    outputs
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use trace_governance_models::finding::{Classification, EventRange, Severity, Signal};

    fn finding(id: &str, kind: SignalKind, action_type: ActionType, action_text: &str, confidence: f64) -> Finding {
        Finding {
            id: id.into(),
            chain_id: "chain-1".into(),
            agent: "agent-1".into(),
            session: "session-1".into(),
            signal: Signal {
                kind,
                severity: Severity::High,
                event_range: EventRange { start_index: 0, end_index: 1 },
                summary: "summary".into(),
                evidence: Default::default(),
            },
            detected_at: Utc::now(),
            occurred_at: 0,
            classification: Some(Classification {
                root_cause: "root".into(),
                action_type,
                action_text: action_text.into(),
                confidence,
                model: "test-model".into(),
            }),
        }
    }

    #[test]
    fn soul_rule_groups_and_averages_confidence() {
        let findings = vec![
            finding("f1", SignalKind::DoomLoop, ActionType::SoulRule, "retry without backoff", 0.8),
            finding("f2", SignalKind::DoomLoop, ActionType::SoulRule, "retry without backoff", 0.6),
        ];
        let outputs = generate(&findings);
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].observation_count, 2);
        assert!((outputs[0].confidence - 0.7).abs() < 1e-9);
        let text = outputs[0].content.as_str().unwrap();
        assert!(text.contains("2×"));
        assert!(text.contains("f1"));
    }

    #[test]
    fn governance_policy_derives_hook_from_signal_kind() {
        let findings = vec![finding(
            "f1",
            SignalKind::Hallucination,
            ActionType::GovernancePolicy,
            "block unverified completion claims",
            0.9,
        )];
        let outputs = generate(&findings);
        assert_eq!(outputs.len(), 1);
        let policy: Policy = serde_json::from_value(outputs[0].content.clone()).unwrap();
        assert_eq!(policy.scope.hooks.unwrap(), vec!["message_sending".to_string()]);
        assert!(policy.id.starts_with("trace-gen-"));
    }

    #[test]
    fn manual_review_produces_no_artifact() {
        let findings = vec![finding("f1", SignalKind::Correction, ActionType::ManualReview, "", 0.5)];
        assert!(generate(&findings).is_empty());
    }

    #[test]
    fn unclassified_finding_is_ignored() {
        let mut f = finding("f1", SignalKind::Correction, ActionType::SoulRule, "x", 0.5);
        f.classification = None;
        assert!(generate(&[f]).is_empty());
    }
}

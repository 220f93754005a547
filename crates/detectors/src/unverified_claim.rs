//! Unverified Claim detector: a system-state claim in `msg.out` with no
//! preceding successful tool result substantiating it. Opinion-hedged
//! claims ("I think", "probably") are suppressed.

use std::collections::HashMap;
use trace_governance_models::chain::ConversationChain;
use trace_governance_models::event::EventType;
use trace_governance_models::finding::{EventRange, Severity, Signal, SignalKind};
use trace_patterns::MergedPatternSet;

pub fn detect(chain: &ConversationChain, patterns: &MergedPatternSet) -> Vec<Signal> {
    let mut signals = Vec::new();
    let mut any_successful_result = false;

    for (idx, event) in chain.events.iter().enumerate() {
        match event.event_type {
            EventType::ToolResult if !event.is_tool_error() => {
                any_successful_result = true;
            }
            EventType::MsgOut => {
                let Some(content) = &event.payload.content else {
                    continue;
                };
                if !MergedPatternSet::matches_any(&patterns.system_state_claims, content) {
                    continue;
                }
                if MergedPatternSet::matches_any(&patterns.opinion_exclusions, content) {
                    continue;
                }
                if any_successful_result {
                    continue;
                }

                let mut evidence = HashMap::new();
                evidence.insert("claim".to_string(), serde_json::json!(content));
                signals.push(Signal {
                    kind: SignalKind::UnverifiedClaim,
                    severity: Severity::Medium,
                    event_range: EventRange {
                        start_index: idx,
                        end_index: idx,
                    },
                    summary: "system-state claim with no substantiating tool result".to_string(),
                    evidence,
                });
            }
            _ => {}
        }
    }

    signals
}

#[cfg(test)]
mod tests {
    use super::*;
    use trace_governance_models::chain::BoundaryType;
    use trace_governance_models::event::{Event, EventPayload};
    use trace_patterns::LanguageRegistry;

    fn ev(idx: usize, event_type: EventType, content: Option<&str>, err: Option<bool>) -> Event {
        Event {
            id: format!("e{idx}"),
            ts: idx as i64,
            seq: idx as u64,
            agent: "a".into(),
            session: "s".into(),
            event_type,
            payload: EventPayload {
                content: content.map(String::from),
                tool_is_error: err,
                ..Default::default()
            },
        }
    }

    fn registry() -> LanguageRegistry {
        let registry = LanguageRegistry::new();
        registry.load_builtin_sync().unwrap();
        registry
    }

    #[test]
    fn claim_without_evidence_is_flagged() {
        let events = vec![ev(
            0,
            EventType::MsgOut,
            Some("The server is running fine."),
            None,
        )];
        let chain = ConversationChain::new("a".into(), "s".into(), events, BoundaryType::Gap);
        let reg = registry();
        let signals = detect(&chain, &reg.merged());
        assert_eq!(signals.len(), 1);
    }

    #[test]
    fn claim_after_successful_tool_result_is_not_flagged() {
        let events = vec![
            ev(0, EventType::ToolResult, None, Some(false)),
            ev(1, EventType::MsgOut, Some("The server is running."), None),
        ];
        let chain = ConversationChain::new("a".into(), "s".into(), events, BoundaryType::Gap);
        let reg = registry();
        let signals = detect(&chain, &reg.merged());
        assert!(signals.is_empty());
    }

    #[test]
    fn hedged_claim_is_suppressed() {
        let events = vec![ev(
            0,
            EventType::MsgOut,
            Some("I think the server is running."),
            None,
        )];
        let chain = ConversationChain::new("a".into(), "s".into(), events, BoundaryType::Gap);
        let reg = registry();
        let signals = detect(&chain, &reg.merged());
        assert!(signals.is_empty());
    }
}

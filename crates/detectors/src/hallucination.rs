//! Hallucination detector: a completion-claim `msg.out` following a tool
//! error with no intervening successful recovery of the same tool.

use std::collections::{HashMap, HashSet};
use trace_governance_models::chain::ConversationChain;
use trace_governance_models::event::EventType;
use trace_governance_models::finding::{EventRange, Severity, Signal, SignalKind};
use trace_patterns::MergedPatternSet;

pub fn detect(chain: &ConversationChain, patterns: &MergedPatternSet) -> Vec<Signal> {
    let mut signals = Vec::new();
    let mut failed_tools: HashSet<String> = HashSet::new();

    for (idx, event) in chain.events.iter().enumerate() {
        match event.event_type {
            EventType::ToolResult => {
                let Some(name) = event.payload.tool_name.clone() else {
                    continue;
                };
                if event.is_tool_error() {
                    failed_tools.insert(name);
                } else {
                    failed_tools.remove(&name);
                }
            }
            EventType::MsgOut => {
                let Some(content) = &event.payload.content else {
                    continue;
                };
                if failed_tools.is_empty() {
                    continue;
                }
                if MergedPatternSet::matches_any(&patterns.completion_claims, content) {
                    let mut evidence = HashMap::new();
                    evidence.insert(
                        "unrecoveredTools".to_string(),
                        serde_json::json!(failed_tools.iter().cloned().collect::<Vec<_>>()),
                    );
                    evidence.insert("claim".to_string(), serde_json::json!(content));
                    signals.push(Signal {
                        kind: SignalKind::Hallucination,
                        severity: Severity::High,
                        event_range: EventRange {
                            start_index: idx,
                            end_index: idx,
                        },
                        summary: "completion claim follows an unrecovered tool error".to_string(),
                        evidence,
                    });
                }
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

    fn ev(idx: usize, event_type: EventType, tool: Option<&str>, content: Option<&str>, err: Option<bool>) -> Event {
        Event {
            id: format!("e{idx}"),
            ts: idx as i64,
            seq: idx as u64,
            agent: "a".into(),
            session: "s".into(),
            event_type,
            payload: EventPayload {
                tool_name: tool.map(String::from),
                tool_is_error: err,
                content: content.map(String::from),
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
    fn completion_claim_after_unrecovered_error_is_flagged() {
        let events = vec![
            ev(0, EventType::ToolCall, Some("exec"), None, None),
            ev(1, EventType::ToolResult, Some("exec"), None, Some(true)),
            ev(2, EventType::MsgOut, None, Some("Disk looks fine."), None),
        ];
        let chain = ConversationChain::new("a".into(), "s".into(), events, BoundaryType::Gap);
        let reg = registry();
        let signals = detect(&chain, &reg.merged());
        assert_eq!(signals.len(), 1);
    }

    #[test]
    fn recovered_tool_suppresses_the_signal() {
        let events = vec![
            ev(0, EventType::ToolCall, Some("exec"), None, None),
            ev(1, EventType::ToolResult, Some("exec"), None, Some(true)),
            ev(2, EventType::ToolCall, Some("exec"), None, None),
            ev(3, EventType::ToolResult, Some("exec"), None, Some(false)),
            ev(4, EventType::MsgOut, None, Some("Task completed."), None),
        ];
        let chain = ConversationChain::new("a".into(), "s".into(), events, BoundaryType::Gap);
        let reg = registry();
        let signals = detect(&chain, &reg.merged());
        assert!(signals.is_empty());
    }
}

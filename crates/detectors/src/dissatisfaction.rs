//! Dissatisfaction detector: user dissatisfaction indicators, cancelled by
//! a satisfaction override in the same message, downgraded by a trailing
//! resolution indicator within a short window.

use std::collections::HashMap;
use trace_governance_models::chain::ConversationChain;
use trace_governance_models::event::{EventType, Role};
use trace_governance_models::finding::{EventRange, Severity, Signal, SignalKind};
use trace_patterns::MergedPatternSet;

/// How many subsequent user messages count as "a short trailing window"
/// for a resolution indicator to downgrade severity.
const RESOLUTION_WINDOW: usize = 2;

pub fn detect(chain: &ConversationChain, patterns: &MergedPatternSet) -> Vec<Signal> {
    let mut signals = Vec::new();
    let user_indices: Vec<usize> = chain
        .events
        .iter()
        .enumerate()
        .filter(|(_, e)| {
            e.event_type == EventType::MsgIn
                && (e.payload.role.is_none() || e.payload.role == Some(Role::User))
        })
        .map(|(i, _)| i)
        .collect();

    for (pos, &idx) in user_indices.iter().enumerate() {
        let event = &chain.events[idx];
        let Some(text) = &event.payload.content else {
            continue;
        };

        if !MergedPatternSet::matches_any(&patterns.dissatisfaction, text) {
            continue;
        }
        if MergedPatternSet::matches_any(&patterns.satisfaction_overrides, text) {
            continue;
        }

        let downgraded = user_indices[pos + 1..]
            .iter()
            .take(RESOLUTION_WINDOW)
            .any(|&later_idx| {
                chain.events[later_idx]
                    .payload
                    .content
                    .as_deref()
                    .map(|t| MergedPatternSet::matches_any(&patterns.resolution_indicators, t))
                    .unwrap_or(false)
            });

        let mut evidence = HashMap::new();
        evidence.insert("message".to_string(), serde_json::json!(text));
        evidence.insert("downgraded".to_string(), serde_json::json!(downgraded));

        signals.push(Signal {
            kind: SignalKind::Dissatisfaction,
            severity: if downgraded {
                Severity::Low
            } else {
                Severity::Medium
            },
            event_range: EventRange {
                start_index: idx,
                end_index: idx,
            },
            summary: "user expressed dissatisfaction".to_string(),
            evidence,
        });
    }

    signals
}

#[cfg(test)]
mod tests {
    use super::*;
    use trace_governance_models::chain::BoundaryType;
    use trace_governance_models::event::{Event, EventPayload};
    use trace_patterns::LanguageRegistry;

    fn msg(idx: usize, content: &str) -> Event {
        Event {
            id: format!("e{idx}"),
            ts: idx as i64,
            seq: idx as u64,
            agent: "a".into(),
            session: "s".into(),
            event_type: EventType::MsgIn,
            payload: EventPayload {
                content: Some(content.into()),
                role: Some(Role::User),
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
    fn dissatisfaction_without_override_is_medium() {
        let events = vec![msg(0, "This is still broken and I give up.")];
        let chain = ConversationChain::new("a".into(), "s".into(), events, BoundaryType::Gap);
        let reg = registry();
        let signals = detect(&chain, &reg.merged());
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].severity, Severity::Medium);
    }

    #[test]
    fn satisfaction_override_in_same_message_cancels_signal() {
        let events = vec![msg(
            0,
            "This is not working, but wait, that's it, thanks!",
        )];
        let chain = ConversationChain::new("a".into(), "s".into(), events, BoundaryType::Gap);
        let reg = registry();
        let signals = detect(&chain, &reg.merged());
        assert!(signals.is_empty());
    }

    #[test]
    fn trailing_resolution_downgrades_severity() {
        let events = vec![
            msg(0, "Still broken."),
            msg(1, "ok trying again"),
            msg(2, "fixed, thanks for waiting"),
        ];
        let chain = ConversationChain::new("a".into(), "s".into(), events, BoundaryType::Gap);
        let reg = registry();
        let signals = detect(&chain, &reg.merged());
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].severity, Severity::Low);
    }
}

//! Correction detector: a user correction (or unambiguous short negative)
//! immediately after an agent `msg.out`. An agent question absorbs a bare
//! short negative — it answers the question rather than correcting it.

use std::collections::HashMap;
use trace_governance_models::chain::ConversationChain;
use trace_governance_models::event::{EventType, Role};
use trace_governance_models::finding::{EventRange, Severity, Signal, SignalKind};
use trace_patterns::MergedPatternSet;

pub fn detect(chain: &ConversationChain, patterns: &MergedPatternSet) -> Vec<Signal> {
    let mut signals = Vec::new();

    for pair in chain.events.windows(2) {
        let (prev, current) = (&pair[0], &pair[1]);
        if prev.event_type != EventType::MsgOut || current.event_type != EventType::MsgIn {
            continue;
        }
        if current.payload.role.is_some() && current.payload.role != Some(Role::User) {
            continue;
        }
        let Some(user_text) = &current.payload.content else {
            continue;
        };
        let agent_text = prev.payload.content.as_deref().unwrap_or_default();

        let has_correction = MergedPatternSet::matches_any(&patterns.corrections, user_text);
        let is_short_negative = MergedPatternSet::matches_any(&patterns.short_negatives, user_text);
        let agent_asked_question = patterns.is_question(agent_text);

        let triggers = has_correction || (is_short_negative && !agent_asked_question);
        if !triggers {
            continue;
        }

        let mut evidence = HashMap::new();
        evidence.insert("agentAssertion".to_string(), serde_json::json!(agent_text));
        evidence.insert("userReply".to_string(), serde_json::json!(user_text));
        let idx = chain
            .events
            .iter()
            .position(|e| e.id == current.id)
            .unwrap_or(0);
        signals.push(Signal {
            kind: SignalKind::Correction,
            severity: Severity::Medium,
            event_range: EventRange {
                start_index: idx.saturating_sub(1),
                end_index: idx,
            },
            summary: "user corrected the agent's prior assertion".to_string(),
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

    fn msg(idx: usize, event_type: EventType, content: &str, role: Option<Role>) -> Event {
        Event {
            id: format!("e{idx}"),
            ts: idx as i64,
            seq: idx as u64,
            agent: "a".into(),
            session: "s".into(),
            event_type,
            payload: EventPayload {
                content: Some(content.into()),
                role,
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
    fn bare_no_after_assertion_is_a_correction() {
        let events = vec![
            msg(0, EventType::MsgOut, "I deployed the fix.", None),
            msg(1, EventType::MsgIn, "No.", Some(Role::User)),
        ];
        let chain = ConversationChain::new("a".into(), "s".into(), events, BoundaryType::Gap);
        let reg = registry();
        let signals = detect(&chain, &reg.merged());
        assert_eq!(signals.len(), 1);
    }

    #[test]
    fn bare_no_after_agent_question_is_not_a_correction() {
        let events = vec![
            msg(0, EventType::MsgOut, "Soll ich die Datei überschreiben?", None),
            msg(1, EventType::MsgIn, "no", Some(Role::User)),
        ];
        let chain = ConversationChain::new("a".into(), "s".into(), events, BoundaryType::Gap);
        let reg = registry();
        let signals = detect(&chain, &reg.merged());
        assert!(signals.is_empty());
    }
}

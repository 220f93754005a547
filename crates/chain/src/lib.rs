//! Chain Reconstructor (Component 2, spec.md §4.2).
//!
//! Consumes a lazy event sequence, groups by `(session, agent)`, orders by
//! `(ts, seq)`, deduplicates, and splits into chains on lifecycle
//! boundaries, inactivity gaps, the `run.end -> run.start` gap rule, or
//! the per-chain event cap.

use std::collections::HashMap;
use trace_governance_models::chain::{BoundaryType, ConversationChain};
use trace_governance_models::event::{Event, EventType};

#[derive(Debug, Clone)]
pub struct ReconstructorConfig {
    pub gap_minutes: i64,
    pub run_end_start_gap_minutes: i64,
    pub max_events_per_chain: usize,
}

impl Default for ReconstructorConfig {
    fn default() -> Self {
        Self {
            gap_minutes: 30,
            run_end_start_gap_minutes: 5,
            max_events_per_chain: 500,
        }
    }
}

/// Groups, dedups, and splits events into chains. Deterministic: the same
/// input multiset always yields the same chain ids and event ordering
/// (spec.md §4.2 "CPU-bound and deterministic").
pub fn reconstruct(events: Vec<Event>, config: &ReconstructorConfig) -> Vec<ConversationChain> {
    let mut by_key: HashMap<(String, String), Vec<Event>> = HashMap::new();
    for event in events {
        by_key
            .entry((event.session.clone(), event.agent.clone()))
            .or_default()
            .push(event);
    }

    let mut chains = Vec::new();
    let mut keys: Vec<_> = by_key.keys().cloned().collect();
    keys.sort();
    for key in keys {
        let mut group = by_key.remove(&key).unwrap();
        group.sort_by_key(|e| e.order_key());
        let deduped = dedup(group);
        chains.extend(split_into_chains(&key.1, &key.0, deduped, config));
    }
    chains
}

/// Collapses events sharing fingerprint `(type, content|toolName+toolParams,
/// agent, session, floor(ts/1000))`; on collision, the event with the
/// higher `seq` wins.
fn dedup(events: Vec<Event>) -> Vec<Event> {
    let mut best: HashMap<String, Event> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for event in events {
        let key = fingerprint(&event);
        match best.get(&key) {
            Some(existing) if existing.seq >= event.seq => {}
            Some(_) => {
                best.insert(key, event);
            }
            None => {
                order.push(key.clone());
                best.insert(key, event);
            }
        }
    }

    let mut out: Vec<Event> = order.into_iter().filter_map(|k| best.remove(&k)).collect();
    out.sort_by_key(|e| e.order_key());
    out
}

fn fingerprint(event: &Event) -> String {
    let content_or_tool = if let Some(content) = &event.payload.content {
        content.clone()
    } else {
        let name = event.payload.tool_name.clone().unwrap_or_default();
        let params = event
            .payload
            .tool_params
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_default();
        format!("{name}:{params}")
    };
    format!(
        "{}|{}|{}|{}|{}",
        event.event_type,
        content_or_tool,
        event.agent,
        event.session,
        event.ts / 1000
    )
}

fn split_into_chains(
    agent: &str,
    session: &str,
    events: Vec<Event>,
    config: &ReconstructorConfig,
) -> Vec<ConversationChain> {
    let mut chains = Vec::new();
    let mut current: Vec<Event> = Vec::new();
    let mut current_boundary = BoundaryType::Gap;
    let mut prev: Option<&Event> = None;

    let gap_ms = config.gap_minutes * 60_000;
    let run_gap_ms = config.run_end_start_gap_minutes * 60_000;

    for (idx, event) in events.iter().enumerate() {
        let mut should_split = false;
        let mut next_boundary = BoundaryType::Gap;

        if let Some(previous) = prev {
            if previous.event_type.is_lifecycle_boundary() || event.event_type.is_lifecycle_boundary() {
                should_split = true;
                next_boundary = BoundaryType::Lifecycle;
            } else if event.ts - previous.ts > gap_ms {
                should_split = true;
                next_boundary = BoundaryType::Gap;
            } else if previous.event_type.is_run_end()
                && event.event_type.is_run_start()
                && event.ts - previous.ts > run_gap_ms
            {
                should_split = true;
                next_boundary = BoundaryType::Gap;
            } else if current.len() >= config.max_events_per_chain {
                should_split = true;
                next_boundary = BoundaryType::Gap;
            }
        }

        if should_split && !current.is_empty() {
            flush(agent, session, &mut current, current_boundary, &mut chains);
            current_boundary = next_boundary;
        }

        current.push(event.clone());
        prev = Some(event);
        let _ = idx;
    }

    if !current.is_empty() {
        flush(agent, session, &mut current, current_boundary, &mut chains);
    }

    chains
}

fn flush(
    agent: &str,
    session: &str,
    current: &mut Vec<Event>,
    boundary: BoundaryType,
    chains: &mut Vec<ConversationChain>,
) {
    let events = std::mem::take(current);
    if events.len() < 2 {
        return;
    }
    chains.push(ConversationChain::new(
        agent.to_string(),
        session.to_string(),
        events,
        boundary,
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use trace_governance_models::event::{EventPayload, EventType};

    fn ev(id: &str, ts: i64, seq: u64, agent: &str, session: &str, event_type: EventType) -> Event {
        Event {
            id: id.into(),
            ts,
            seq,
            agent: agent.into(),
            session: session.into(),
            event_type,
            payload: EventPayload::default(),
        }
    }

    #[test]
    fn chains_are_at_least_two_events_and_ordered() {
        let events = vec![
            ev("1", 1000, 1, "a", "s", EventType::MsgIn),
            ev("2", 2000, 2, "a", "s", EventType::MsgOut),
        ];
        let chains = reconstruct(events, &ReconstructorConfig::default());
        assert_eq!(chains.len(), 1);
        assert!(chains[0].is_valid());
        assert!(chains[0].events.windows(2).all(|w| w[0].ts <= w[1].ts));
    }

    #[test]
    fn single_event_chain_is_dropped() {
        let events = vec![ev("1", 1000, 1, "a", "s", EventType::MsgIn)];
        let chains = reconstruct(events, &ReconstructorConfig::default());
        assert!(chains.is_empty());
    }

    #[test]
    fn inactivity_gap_splits_chain() {
        let events = vec![
            ev("1", 0, 1, "a", "s", EventType::MsgIn),
            ev("2", 1_000, 2, "a", "s", EventType::MsgOut),
            ev("3", 40 * 60_000, 3, "a", "s", EventType::MsgIn),
            ev("4", 41 * 60_000, 4, "a", "s", EventType::MsgOut),
        ];
        let chains = reconstruct(events, &ReconstructorConfig::default());
        assert_eq!(chains.len(), 2);
    }

    #[test]
    fn lifecycle_event_splits_and_tags_boundary() {
        let events = vec![
            ev("1", 0, 1, "a", "s", EventType::MsgIn),
            ev("2", 100, 2, "a", "s", EventType::MsgOut),
            ev("3", 200, 3, "a", "s", EventType::SessionEnd),
            ev("4", 300, 4, "a", "s", EventType::SessionStart),
            ev("5", 400, 5, "a", "s", EventType::MsgIn),
            ev("6", 500, 6, "a", "s", EventType::MsgOut),
        ];
        let chains = reconstruct(events, &ReconstructorConfig::default());
        assert_eq!(chains.len(), 2);
        assert_eq!(chains[1].boundary_type, BoundaryType::Lifecycle);
    }

    #[test]
    fn dedup_collapses_same_fingerprint_keeping_higher_seq() {
        let mut a = ev("1", 1000, 5, "a", "s", EventType::MsgIn);
        a.payload.content = Some("hello".into());
        let mut b = ev("2", 1000, 2, "a", "s", EventType::MsgIn);
        b.payload.content = Some("hello".into());
        let events = vec![b, a.clone()];
        let deduped = dedup(events);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].seq, 5);
    }

    #[test]
    fn chain_ids_are_deterministic() {
        let events = vec![
            ev("1", 0, 1, "a", "s", EventType::MsgIn),
            ev("2", 100, 2, "a", "s", EventType::MsgOut),
        ];
        let c1 = reconstruct(events.clone(), &ReconstructorConfig::default());
        let c2 = reconstruct(events, &ReconstructorConfig::default());
        assert_eq!(c1[0].id, c2[0].id);
    }
}

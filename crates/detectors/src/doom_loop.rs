//! Doom Loop detector: ≥3 consecutive same-tool calls above a param
//! similarity threshold where every result errors.

use crate::similarity::param_similarity;
use std::collections::HashMap;
use trace_governance_models::chain::ConversationChain;
use trace_governance_models::event::EventType;
use trace_governance_models::finding::{EventRange, Severity, Signal, SignalKind};

const SIMILARITY_THRESHOLD: f64 = 0.8;
const MIN_LOOP_SIZE: usize = 3;
const CRITICAL_LOOP_SIZE: usize = 5;

struct CallResult<'a> {
    index: usize,
    tool_name: &'a str,
    params: &'a serde_json::Value,
    is_error: bool,
}

/// Pairs each `tool.call` with the nearest following `tool.result` for the
/// same tool, in chain order. A successful result in between breaks any
/// run under construction, matching the spec's "single success breaks the
/// loop" rule.
fn call_results(chain: &ConversationChain) -> Vec<CallResult<'_>> {
    let mut pending: HashMap<&str, usize> = HashMap::new();
    let mut out = Vec::new();

    for (idx, event) in chain.events.iter().enumerate() {
        match event.event_type {
            EventType::ToolCall => {
                if let Some(name) = event.payload.tool_name.as_deref() {
                    pending.insert(name, idx);
                }
            }
            EventType::ToolResult => {
                if let Some(name) = event.payload.tool_name.as_deref() {
                    if let Some(call_idx) = pending.remove(name) {
                        out.push(CallResult {
                            index: call_idx,
                            tool_name: name,
                            params: chain.events[call_idx]
                                .payload
                                .tool_params
                                .as_ref()
                                .unwrap_or(&serde_json::Value::Null),
                            is_error: event.is_tool_error(),
                        });
                    }
                }
            }
            _ => {}
        }
    }

    out.sort_by_key(|c| c.index);
    out
}

pub fn detect(chain: &ConversationChain) -> Vec<Signal> {
    let results = call_results(chain);
    let mut signals = Vec::new();
    let mut run: Vec<&CallResult> = Vec::new();

    let mut flush = |run: &mut Vec<&CallResult>, signals: &mut Vec<Signal>| {
        if run.len() >= MIN_LOOP_SIZE {
            let severity = if run.len() >= CRITICAL_LOOP_SIZE {
                Severity::Critical
            } else {
                Severity::High
            };
            let start_index = run.first().unwrap().index;
            let end_index = run.last().unwrap().index;
            let mut evidence = HashMap::new();
            evidence.insert("loopSize".to_string(), serde_json::json!(run.len()));
            evidence.insert(
                "tool".to_string(),
                serde_json::json!(run.first().unwrap().tool_name),
            );
            signals.push(Signal {
                kind: SignalKind::DoomLoop,
                severity,
                event_range: EventRange {
                    start_index,
                    end_index,
                },
                summary: format!(
                    "{} consecutive failing calls to `{}`",
                    run.len(),
                    run.first().unwrap().tool_name
                ),
                evidence,
            });
        }
        run.clear();
    };

    for result in &results {
        if !result.is_error {
            flush(&mut run, &mut signals);
            continue;
        }

        match run.last() {
            Some(prev)
                if prev.tool_name == result.tool_name
                    && param_similarity(prev.params, result.params) >= SIMILARITY_THRESHOLD =>
            {
                run.push(result);
            }
            Some(_) => {
                flush(&mut run, &mut signals);
                run.push(result);
            }
            None => run.push(result),
        }
    }
    flush(&mut run, &mut signals);

    signals
}

#[cfg(test)]
mod tests {
    use super::*;
    use trace_governance_models::chain::BoundaryType;
    use trace_governance_models::event::{Event, EventPayload};

    fn tool_call(idx: usize, ts: i64, tool: &str, command: &str) -> Event {
        Event {
            id: format!("call-{idx}"),
            ts,
            seq: idx as u64,
            agent: "a".into(),
            session: "s".into(),
            event_type: EventType::ToolCall,
            payload: EventPayload {
                tool_name: Some(tool.into()),
                tool_params: Some(serde_json::json!({"command": command})),
                ..Default::default()
            },
        }
    }

    fn tool_result(idx: usize, ts: i64, tool: &str, is_error: bool) -> Event {
        Event {
            id: format!("result-{idx}"),
            ts,
            seq: idx as u64,
            agent: "a".into(),
            session: "s".into(),
            event_type: EventType::ToolResult,
            payload: EventPayload {
                tool_name: Some(tool.into()),
                tool_is_error: Some(is_error),
                ..Default::default()
            },
        }
    }

    fn chain_with(events: Vec<Event>) -> ConversationChain {
        ConversationChain::new("a".into(), "s".into(), events, BoundaryType::Gap)
    }

    #[test]
    fn three_failing_calls_yield_high_severity() {
        let mut events = Vec::new();
        for i in 0..3 {
            events.push(tool_call(i * 2, (i * 2) as i64, "exec", "ssh backup df -h"));
            events.push(tool_result(i * 2 + 1, (i * 2 + 1) as i64, "exec", true));
        }
        let chain = chain_with(events);
        let signals = detect(&chain);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].severity, Severity::High);
        assert_eq!(signals[0].evidence["loopSize"], serde_json::json!(3));
    }

    #[test]
    fn five_failing_calls_yield_critical_severity() {
        let mut events = Vec::new();
        for i in 0..5 {
            events.push(tool_call(i * 2, (i * 2) as i64, "exec", "ssh backup df -h"));
            events.push(tool_result(i * 2 + 1, (i * 2 + 1) as i64, "exec", true));
        }
        let chain = chain_with(events);
        let signals = detect(&chain);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].severity, Severity::Critical);
    }

    #[test]
    fn a_success_in_the_middle_breaks_the_loop() {
        let mut events = Vec::new();
        events.push(tool_call(0, 0, "exec", "ssh backup df -h"));
        events.push(tool_result(1, 1, "exec", true));
        events.push(tool_call(2, 2, "exec", "ssh backup df -h"));
        events.push(tool_result(3, 3, "exec", false));
        events.push(tool_call(4, 4, "exec", "ssh backup df -h"));
        events.push(tool_result(5, 5, "exec", true));
        events.push(tool_call(6, 6, "exec", "ssh backup df -h"));
        events.push(tool_result(7, 7, "exec", true));
        let chain = chain_with(events);
        let signals = detect(&chain);
        assert!(signals.is_empty());
    }
}

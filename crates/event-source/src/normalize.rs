//! Normalizes the two legacy envelope shapes into the canonical `Event`.
//!
//! Schema A carries fields at the top level with `ts`. Schema B nests
//! `{timestamp, payload: {data: {phase, name, ...}}, meta: {source}}`.
//! Events without a timestamp, or whose type doesn't map onto the
//! canonical `EventType` set, are dropped silently (counted by the
//! caller, per §7 "Input malformed").

use std::str::FromStr;
use trace_governance_models::event::{Event, EventPayload, EventType, Role};

/// Raw bytes as read off the bus subject, plus the sequence number the
/// broker assigned on publish (used only to break `ts` ties).
pub struct RawMessage {
    pub seq: u64,
    pub data: Vec<u8>,
}

pub fn normalize(raw: RawMessage) -> Option<Event> {
    let value: serde_json::Value = serde_json::from_slice(&raw.data).ok()?;

    if value.get("timestamp").is_some() && value.get("payload").and_then(|p| p.get("data")).is_some() {
        normalize_schema_b(value, raw.seq)
    } else {
        normalize_schema_a(value, raw.seq)
    }
}

fn normalize_schema_a(value: serde_json::Value, seq: u64) -> Option<Event> {
    let ts = value.get("ts")?.as_i64()?;
    let id = value
        .get("id")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let agent = value.get("agent")?.as_str()?.to_string();
    let session = value.get("session")?.as_str()?.to_string();
    let type_str = value.get("type")?.as_str()?;
    let event_type = parse_event_type(type_str)?;

    let payload_value = value.get("payload").cloned().unwrap_or(serde_json::Value::Null);
    let payload = build_payload(event_type, payload_value);

    Some(Event {
        id,
        ts,
        seq,
        agent,
        session,
        event_type,
        payload,
    })
}

fn normalize_schema_b(value: serde_json::Value, seq: u64) -> Option<Event> {
    let ts = value
        .get("timestamp")?
        .as_str()
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.timestamp_millis())
        .or_else(|| value.get("timestamp")?.as_i64())?;

    let data = value.get("payload")?.get("data")?.clone();
    let phase = data.get("phase").and_then(|v| v.as_str()).unwrap_or("");
    let name = data.get("name").and_then(|v| v.as_str()).unwrap_or("");
    let event_type = map_phase_name(phase, name)?;

    let source = value
        .get("meta")
        .and_then(|m| m.get("source"))
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();
    let session = value
        .get("meta")
        .and_then(|m| m.get("session"))
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();

    let id = value
        .get("id")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let payload = build_payload(event_type, data);

    Some(Event {
        id,
        ts,
        seq,
        agent: source,
        session,
        event_type,
        payload,
    })
}

fn parse_event_type(s: &str) -> Option<EventType> {
    let normalized = s.replace('.', "_");
    EventType::from_str(&normalized).ok()
}

/// Schema B names events by a `(phase, name)` pair rather than a single
/// dotted type string; map the pairs the legacy emitter actually produced
/// onto the canonical set.
fn map_phase_name(phase: &str, name: &str) -> Option<EventType> {
    match (phase, name) {
        ("lifecycle", "session_start") => Some(EventType::SessionStart),
        ("lifecycle", "session_end") => Some(EventType::SessionEnd),
        ("lifecycle", "gateway_start") => Some(EventType::GatewayStart),
        ("lifecycle", "gateway_stop") => Some(EventType::GatewayStop),
        ("lifecycle", "session_reset") => Some(EventType::SessionReset),
        ("compaction", "start") => Some(EventType::SessionCompactionStart),
        ("compaction", "end") => Some(EventType::SessionCompactionEnd),
        ("run", "start") => Some(EventType::RunStart),
        ("run", "end") => Some(EventType::RunEnd),
        ("run", "error") => Some(EventType::RunError),
        ("message", "in") => Some(EventType::MsgIn),
        ("message", "out") => Some(EventType::MsgOut),
        ("message", "sending") => Some(EventType::MsgSending),
        ("tool", "call") => Some(EventType::ToolCall),
        ("tool", "result") => Some(EventType::ToolResult),
        ("llm", "input") => Some(EventType::LlmInput),
        ("llm", "output") => Some(EventType::LlmOutput),
        _ => parse_event_type(name),
    }
}

fn build_payload(event_type: EventType, raw: serde_json::Value) -> EventPayload {
    let mut payload = EventPayload::default();
    let Some(obj) = raw.as_object() else {
        return payload;
    };

    match event_type {
        EventType::MsgIn => payload.role = Some(Role::User),
        EventType::MsgOut | EventType::MsgSending => payload.role = Some(Role::Assistant),
        _ => {}
    }

    if let Some(v) = obj.get("content").and_then(|v| v.as_str()) {
        payload.content = Some(v.to_string());
    }
    if let Some(v) = obj.get("toolName").or_else(|| obj.get("tool_name")).and_then(|v| v.as_str()) {
        payload.tool_name = Some(v.to_string());
    }
    if let Some(v) = obj.get("toolParams").or_else(|| obj.get("tool_params")) {
        payload.tool_params = Some(v.clone());
    }
    if let Some(v) = obj.get("toolResult").or_else(|| obj.get("tool_result")) {
        payload.tool_result = Some(v.clone());
    }
    let is_error = obj
        .get("toolIsError")
        .or_else(|| obj.get("tool_is_error"))
        .and_then(|v| v.as_bool())
        .or_else(|| obj.get("toolError").and_then(|v| v.as_bool()));
    if let Some(v) = is_error {
        payload.tool_is_error = Some(v);
    }
    // `toolError` is also accepted as the error message itself, not just a flag.
    if let Some(v) = obj.get("toolError").and_then(|v| v.as_str()) {
        payload.error = Some(v.to_string());
        payload.tool_is_error = Some(true);
    }
    if let Some(v) = obj.get("error").and_then(|v| v.as_str()) {
        payload.error = Some(v.to_string());
    }
    if let Some(v) = obj.get("reason").and_then(|v| v.as_str()) {
        payload.reason = Some(v.to_string());
    }

    for (k, v) in obj.iter() {
        if !KNOWN_PAYLOAD_KEYS.contains(&k.as_str()) {
            payload.extra.insert(k.clone(), v.clone());
        }
    }

    payload
}

const KNOWN_PAYLOAD_KEYS: &[&str] = &[
    "role",
    "content",
    "toolName",
    "tool_name",
    "toolParams",
    "tool_params",
    "toolResult",
    "tool_result",
    "toolIsError",
    "tool_is_error",
    "toolError",
    "error",
    "reason",
    "phase",
    "name",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_a_msg_in_gets_user_role() {
        let raw = RawMessage {
            seq: 1,
            data: serde_json::json!({
                "id": "e1", "ts": 100, "agent": "main", "session": "s1",
                "type": "msg.in", "payload": {"content": "hi"}
            })
            .to_string()
            .into_bytes(),
        };
        let event = normalize(raw).unwrap();
        assert_eq!(event.payload.role, Some(Role::User));
        assert_eq!(event.payload.content.as_deref(), Some("hi"));
    }

    #[test]
    fn schema_b_tool_result_maps_error_flag() {
        let raw = RawMessage {
            seq: 2,
            data: serde_json::json!({
                "timestamp": 200,
                "payload": {"data": {"phase": "tool", "name": "result", "toolIsError": true, "toolResult": {"code": 1}}},
                "meta": {"source": "main", "session": "s1"}
            })
            .to_string()
            .into_bytes(),
        };
        let event = normalize(raw).unwrap();
        assert_eq!(event.event_type, EventType::ToolResult);
        assert!(event.is_tool_error());
    }

    #[test]
    fn missing_timestamp_is_dropped() {
        let raw = RawMessage {
            seq: 3,
            data: serde_json::json!({"agent": "main", "session": "s1", "type": "msg.in"})
                .to_string()
                .into_bytes(),
        };
        assert!(normalize(raw).is_none());
    }

    #[test]
    fn unrecognized_type_is_dropped() {
        let raw = RawMessage {
            seq: 4,
            data: serde_json::json!({
                "id": "e4", "ts": 100, "agent": "main", "session": "s1",
                "type": "totally.unknown", "payload": {}
            })
            .to_string()
            .into_bytes(),
        };
        assert!(normalize(raw).is_none());
    }
}

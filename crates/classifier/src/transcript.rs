//! Renders a conversation chain into the plain-text transcript sent to
//! external models. Tool params/results are expected to already have
//! passed through the Redaction Engine by the time they reach here.

use trace_governance_models::chain::ConversationChain;
use trace_governance_models::event::EventType;

pub fn render(chain: &ConversationChain) -> String {
    let mut lines = Vec::with_capacity(chain.events.len());
    for event in &chain.events {
        let line = match event.event_type {
            EventType::MsgIn | EventType::MsgOut => {
                let role = event
                    .payload
                    .role
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| event.event_type.to_string());
                format!("[{role}] {}", event.payload.content.as_deref().unwrap_or(""))
            }
            EventType::ToolCall => format!(
                "[tool_call] {} {}",
                event.payload.tool_name.as_deref().unwrap_or("?"),
                event
                    .payload
                    .tool_params
                    .as_ref()
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
            ),
            EventType::ToolResult => format!(
                "[tool_result] {} error={} {}",
                event.payload.tool_name.as_deref().unwrap_or("?"),
                event.is_tool_error(),
                event
                    .payload
                    .tool_result
                    .as_ref()
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
            ),
            other => format!("[{other}]"),
        };
        lines.push(line);
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use trace_governance_models::chain::BoundaryType;
    use trace_governance_models::event::{Event, EventPayload, Role};

    fn event(event_type: EventType, payload: EventPayload) -> Event {
        Event {
            id: "e1".into(),
            ts: 0,
            seq: 0,
            agent: "a".into(),
            session: "s".into(),
            event_type,
            payload,
        }
    }

    #[test]
    fn renders_roles_and_tool_calls() {
        let chain = ConversationChain::new(
            "a".into(),
            "s".into(),
            vec![
                event(
                    EventType::MsgIn,
                    EventPayload {
                        role: Some(Role::User),
                        content: Some("hello".into()),
                        ..Default::default()
                    },
                ),
                event(
                    EventType::ToolCall,
                    EventPayload {
                        tool_name: Some("fs_read".into()),
                        tool_params: Some(serde_json::json!({"path": "/tmp"})),
                        ..Default::default()
                    },
                ),
            ],
            BoundaryType::Gap,
        );
        let rendered = render(&chain);
        assert!(rendered.contains("[user] hello"));
        assert!(rendered.contains("fs_read"));
    }
}

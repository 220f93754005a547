//! Canonical event shape produced by the Event Source after normalization.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The canonical set of event types the rest of the pipeline understands.
///
/// Anything that normalizes to a variant outside this set is dropped at the
/// Event Source boundary (see `trace-event-source`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventType {
    MsgIn,
    MsgOut,
    ToolCall,
    ToolResult,
    RunStart,
    RunEnd,
    RunError,
    SessionStart,
    SessionEnd,
    SessionCompactionStart,
    SessionCompactionEnd,
    SessionReset,
    GatewayStart,
    GatewayStop,
    LlmInput,
    LlmOutput,
    MsgSending,
}

impl EventType {
    /// `true` for the two events that bound a chain unconditionally.
    pub fn is_lifecycle_boundary(self) -> bool {
        matches!(self, EventType::SessionStart | EventType::SessionEnd)
    }

    pub fn is_run_start(self) -> bool {
        matches!(self, EventType::RunStart)
    }

    pub fn is_run_end(self) -> bool {
        matches!(self, EventType::RunEnd)
    }
}

/// Inferred conversational role, populated for `msg.in` / `msg.out`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// Tagged payload union, keyed by `Event::event_type`.
///
/// Kept as a flat struct with optional fields (rather than a Rust `enum`)
/// because the two legacy envelope shapes populate overlapping subsets of
/// these fields and the normalizer needs to merge them without a large
/// match over envelope variants at every call site.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_params: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_is_error: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Catch-all for fields neither schema names explicitly; preserved so
    /// detectors written against the original system's richer payloads
    /// still have something to read.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A single normalized event.
///
/// `ts` is the authoritative ordering key; `seq` only breaks ties between
/// events carrying the same `ts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub ts: i64,
    pub seq: u64,
    pub agent: String,
    pub session: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub payload: EventPayload,
}

impl Event {
    /// Ordering key used everywhere chains and detectors need `(ts, seq)`.
    pub fn order_key(&self) -> (i64, u64) {
        (self.ts, self.seq)
    }

    pub fn is_tool_error(&self) -> bool {
        self.payload.tool_is_error.unwrap_or(false) || self.payload.error.is_some()
    }
}

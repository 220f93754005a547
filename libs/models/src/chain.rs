//! Conversation Chain — a contiguous slice of events for one `(session, agent)`.

use crate::event::{Event, EventType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryType {
    Gap,
    Lifecycle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationChain {
    pub id: String,
    pub agent: String,
    pub session: String,
    pub start_ts: i64,
    pub end_ts: i64,
    pub events: Vec<Event>,
    pub type_counts: HashMap<EventType, u32>,
    pub boundary_type: BoundaryType,
}

impl ConversationChain {
    /// Deterministic chain id: `hash(session, agent, startTs)`.
    ///
    /// Uses the same sha256-prefix scheme as the redaction vault so chain
    /// ids and vault hashes read the same way across the codebase.
    pub fn derive_id(session: &str, agent: &str, start_ts: i64) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(session.as_bytes());
        hasher.update(b"|");
        hasher.update(agent.as_bytes());
        hasher.update(b"|");
        hasher.update(start_ts.to_string().as_bytes());
        let digest = hasher.finalize();
        hex_prefix(&digest, 16)
    }

    pub fn new(agent: String, session: String, events: Vec<Event>, boundary_type: BoundaryType) -> Self {
        let start_ts = events.first().map(|e| e.ts).unwrap_or_default();
        let end_ts = events.last().map(|e| e.ts).unwrap_or_default();
        let id = Self::derive_id(&session, &agent, start_ts);
        let mut type_counts: HashMap<EventType, u32> = HashMap::new();
        for e in &events {
            *type_counts.entry(e.event_type).or_insert(0) += 1;
        }
        Self {
            id,
            agent,
            session,
            start_ts,
            end_ts,
            events,
            type_counts,
            boundary_type,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.events.len() >= 2
    }
}

fn hex_prefix(bytes: &[u8], hex_chars: usize) -> String {
    let full = bytes.iter().map(|b| format!("{:02x}", b)).collect::<String>();
    full.chars().take(hex_chars).collect()
}

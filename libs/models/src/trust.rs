//! Per-agent trust record.

use crate::policy::TrustTier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrustSignals {
    pub success_count: u64,
    pub violation_count: u64,
    pub clean_streak: u64,
    pub age_days: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustRecord {
    pub agent: String,
    pub score: f64,
    pub tier: TrustTier,
    pub signals: TrustSignals,
    pub created: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl TrustRecord {
    pub fn tier_for_score(score: f64) -> TrustTier {
        if score < 25.0 {
            TrustTier::Restricted
        } else if score < 55.0 {
            TrustTier::Standard
        } else if score < 80.0 {
            TrustTier::Trusted
        } else {
            TrustTier::Privileged
        }
    }

    pub fn new(agent: String, default_score: f64, now: DateTime<Utc>) -> Self {
        Self {
            agent,
            score: default_score,
            tier: Self::tier_for_score(default_score),
            signals: TrustSignals::default(),
            created: now,
            last_activity: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustStore {
    pub version: u32,
    pub agents: std::collections::HashMap<String, TrustRecord>,
}

impl Default for TrustStore {
    fn default() -> Self {
        Self {
            version: 1,
            agents: std::collections::HashMap::new(),
        }
    }
}

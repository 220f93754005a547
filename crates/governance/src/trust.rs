//! Trust Manager (Component 9): per-agent tiered trust score with
//! recency decay and success/violation feedback.

use chrono::Utc;
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;
use trace_governance_common::config::TrustConfig;
use trace_governance_common::error::Result;
use trace_governance_models::trust::{TrustRecord, TrustStore};

const SUCCESS_DELTA: f64 = 1.0;
const CLEAN_STREAK_BONUS: f64 = 0.25;
const VIOLATION_DELTA: f64 = -5.0;
const AGE_TERM_PER_DAY: f64 = 0.01;
const AGE_TERM_CAP: f64 = 5.0;

pub struct TrustManager {
    store: RwLock<TrustStore>,
    config: TrustConfig,
    dirty: RwLock<bool>,
}

impl TrustManager {
    pub fn new(store: TrustStore, config: TrustConfig) -> Self {
        Self {
            store: RwLock::new(store),
            config,
            dirty: RwLock::new(false),
        }
    }

    pub fn load_or_default(path: &Path, config: TrustConfig) -> Self {
        let store = std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();
        let manager = Self::new(store, config);
        manager.refresh_age_days();
        manager
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let store = self.store.read().unwrap();
        let json = serde_json::to_string_pretty(&*store)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        *self.dirty.write().unwrap() = false;
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        *self.dirty.read().unwrap()
    }

    /// Returns the current record, creating one at the configured default
    /// score on first access.
    pub fn get(&self, agent: &str) -> TrustRecord {
        {
            let store = self.store.read().unwrap();
            if let Some(record) = store.agents.get(agent) {
                return record.clone();
            }
        }
        let mut store = self.store.write().unwrap();
        let record = store
            .agents
            .entry(agent.to_string())
            .or_insert_with(|| TrustRecord::new(agent.to_string(), self.config.default_score_for(agent), Utc::now()))
            .clone();
        *self.dirty.write().unwrap() = true;
        record
    }

    fn with_record(&self, agent: &str, f: impl FnOnce(&mut TrustRecord)) -> TrustRecord {
        let mut store = self.store.write().unwrap();
        let record = store
            .agents
            .entry(agent.to_string())
            .or_insert_with(|| TrustRecord::new(agent.to_string(), self.config.default_score_for(agent), Utc::now()));
        f(record);
        record.tier = TrustRecord::tier_for_score(record.score);
        record.last_activity = Utc::now();
        let cloned = record.clone();
        drop(store);
        *self.dirty.write().unwrap() = true;
        cloned
    }

    pub fn record_success(&self, agent: &str, _tool: &str) -> TrustRecord {
        self.with_record(agent, |record| {
            record.signals.success_count += 1;
            record.signals.clean_streak += 1;
            let bonus = SUCCESS_DELTA + CLEAN_STREAK_BONUS * (record.signals.clean_streak as f64).min(10.0);
            record.score = (record.score + bonus).clamp(0.0, 100.0);
        })
    }

    pub fn record_violation(&self, agent: &str, _tool: &str) -> TrustRecord {
        self.with_record(agent, |record| {
            record.signals.violation_count += 1;
            record.signals.clean_streak = 0;
            record.score = (record.score + VIOLATION_DELTA).clamp(0.0, 100.0);
        })
    }

    pub fn set_score(&self, agent: &str, score: f64) -> TrustRecord {
        let clamped = score.clamp(0.0, 100.0);
        self.with_record(agent, |record| {
            record.score = clamped;
        })
    }

    /// Recomputes `ageDays` for every agent from `created`; called on load.
    pub fn refresh_age_days(&self) {
        let now = Utc::now();
        let mut store = self.store.write().unwrap();
        for record in store.agents.values_mut() {
            record.signals.age_days = (now - record.created).num_seconds() as f64 / 86_400.0;
        }
    }

    /// Applies inactivity decay across all agents if enabled, multiplying
    /// score by `decay.rate` once inactivity has reached `decay.inactivityDays`.
    pub fn apply_decay(&self) {
        if !self.config.decay.enabled {
            return;
        }
        let now = Utc::now();
        let mut store = self.store.write().unwrap();
        for record in store.agents.values_mut() {
            let inactive_days = (now - record.last_activity).num_seconds() as f64 / 86_400.0;
            if inactive_days >= self.config.decay.inactivity_days {
                record.score = (record.score * self.config.decay.rate).clamp(0.0, 100.0);
                record.tier = TrustRecord::tier_for_score(record.score);
            }
        }
    }

    pub fn snapshot(&self) -> HashMap<String, TrustRecord> {
        self.store.read().unwrap().agents.clone()
    }
}

/// Score recalculation with an explicit age term, exposed for callers that
/// want to fold age into a freshly-loaded record without waiting for the
/// next success/violation event.
pub fn age_adjusted_score(base_score: f64, age_days: f64) -> f64 {
    (base_score + (age_days * AGE_TERM_PER_DAY).min(AGE_TERM_CAP)).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_only_increases_success_count_and_clean_streak() {
        let manager = TrustManager::new(TrustStore::default(), TrustConfig::default());
        manager.get("agent-1");
        let before = manager.get("agent-1");
        manager.record_success("agent-1", "fs_read");
        let after = manager.get("agent-1");
        assert!(after.signals.success_count > before.signals.success_count);
        assert!(after.signals.clean_streak > before.signals.clean_streak);
        assert_eq!(after.signals.violation_count, before.signals.violation_count);
    }

    #[test]
    fn violation_resets_clean_streak_and_lowers_score() {
        let manager = TrustManager::new(TrustStore::default(), TrustConfig::default());
        manager.record_success("agent-1", "fs_read");
        manager.record_success("agent-1", "fs_read");
        let before = manager.get("agent-1");
        let after = manager.record_violation("agent-1", "fs_write");
        assert_eq!(after.signals.clean_streak, 0);
        assert!(after.score < before.score);
    }

    #[test]
    fn score_is_clamped_to_bounds() {
        let manager = TrustManager::new(TrustStore::default(), TrustConfig::default());
        let record = manager.set_score("agent-1", 150.0);
        assert_eq!(record.score, 100.0);
        let record = manager.set_score("agent-1", -10.0);
        assert_eq!(record.score, 0.0);
    }

    #[test]
    fn tier_boundaries_match_spec() {
        assert_eq!(TrustRecord::tier_for_score(24.9), trace_governance_models::policy::TrustTier::Restricted);
        assert_eq!(TrustRecord::tier_for_score(54.9), trace_governance_models::policy::TrustTier::Standard);
        assert_eq!(TrustRecord::tier_for_score(79.9), trace_governance_models::policy::TrustTier::Trusted);
        assert_eq!(TrustRecord::tier_for_score(80.0), trace_governance_models::policy::TrustTier::Privileged);
    }
}

//! Bounded-TTL resolver vault: stores original values behind opaque
//! placeholders so the agent and any downstream call never sees live
//! secrets directly.

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::RwLock;
use trace_governance_models::vault::{Category, Placeholder, VaultEntry};

fn hash_hex(value: &str, hex_chars: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect::<String>()[..hex_chars].to_string()
}

pub struct RedactionVault {
    entries: RwLock<HashMap<String, VaultEntry>>,
    ttl: Duration,
}

impl RedactionVault {
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: Duration::seconds(ttl_seconds as i64),
        }
    }

    /// Stores `value` under `SHA-256(value)[0..8]`, extending to 12 hex
    /// chars on a genuine collision (same hash, different stored value).
    pub fn store(&self, value: &str, category: Category) -> String {
        let now = Utc::now();
        let expires_at = now + self.ttl;
        let mut entries = self.entries.write().unwrap();

        for hex_chars in [8usize, 12] {
            let hash = hash_hex(value, hex_chars);
            match entries.get(&hash) {
                Some(existing) if existing.original_value == value => {
                    return hash;
                }
                Some(_) => continue,
                None => {
                    entries.insert(
                        hash.clone(),
                        VaultEntry {
                            hash_hex: hash.clone(),
                            category,
                            original_value: value.to_string(),
                            stored_at: now,
                            expires_at,
                        },
                    );
                    return hash;
                }
            }
        }

        // Exhausted the 8->12 widening without finding a free slot; fall
        // back to the full digest, which cannot collide in practice.
        let hash = hash_hex(value, 64);
        entries.insert(
            hash.clone(),
            VaultEntry {
                hash_hex: hash.clone(),
                category,
                original_value: value.to_string(),
                stored_at: now,
                expires_at,
            },
        );
        hash
    }

    pub fn format_placeholder(&self, value: &str, category: Category) -> String {
        let hash = self.store(value, category);
        Placeholder::format(category, &hash)
    }

    /// Resolves a hash to its original value if present and unexpired.
    pub fn resolve(&self, hash: &str) -> Option<String> {
        let entries = self.entries.read().unwrap();
        let entry = entries.get(hash)?;
        if entry.expires_at < Utc::now() {
            return None;
        }
        Some(entry.original_value.clone())
    }

    /// Scans `text` for `[REDACTED:<category>:<hash>]` placeholders,
    /// substituting resolvable ones and returning the unresolved hashes.
    pub fn resolve_all(&self, text: &str) -> (String, Vec<String>) {
        let mut out = String::with_capacity(text.len());
        let mut unresolved = Vec::new();
        let mut rest = text;

        while let Some(start) = rest.find("[REDACTED:") {
            out.push_str(&rest[..start]);
            let Some(end_rel) = rest[start..].find(']') else {
                out.push_str(&rest[start..]);
                rest = "";
                break;
            };
            let token = &rest[start..start + end_rel + 1];
            match Placeholder::parse(token) {
                Some((_, hash)) => match self.resolve(hash) {
                    Some(value) => out.push_str(&value),
                    None => {
                        unresolved.push(hash.to_string());
                        out.push_str(token);
                    }
                },
                None => out.push_str(token),
            }
            rest = &rest[start + end_rel + 1..];
        }
        out.push_str(rest);

        (out, unresolved)
    }

    /// Drops expired entries; intended to run on a periodic timer.
    pub fn evict_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at >= now);
        before - entries.len()
    }

    /// Clears all stored secrets; called on shutdown (no persistence).
    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Used in tests to construct an already-expired entry deterministically.
#[cfg(test)]
pub(crate) fn expire_now(vault: &RedactionVault, hash: &str) {
    let mut entries = vault.entries.write().unwrap();
    if let Some(entry) = entries.get_mut(hash) {
        entry.expires_at = Utc::now() - chrono::Duration::seconds(1);
    }
}

//! Vault entry and redaction placeholder syntax.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Category {
    Credential,
    Pii,
    Financial,
    Custom,
}

impl Category {
    /// `credential > financial > pii` when resolving same-length overlaps.
    pub fn priority(self) -> u8 {
        match self {
            Category::Credential => 3,
            Category::Financial => 2,
            Category::Pii => 1,
            Category::Custom => 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultEntry {
    pub hash_hex: String,
    pub category: Category,
    pub original_value: String,
    pub stored_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Builds and parses the `[REDACTED:<category>:<hash>]` placeholder syntax.
pub struct Placeholder;

impl Placeholder {
    pub fn format(category: Category, hash_hex: &str) -> String {
        format!("[REDACTED:{}:{}]", category, hash_hex)
    }

    /// Parses `[REDACTED:<category>:<hash>]`, returning `(category, hash)`.
    pub fn parse(token: &str) -> Option<(Category, &str)> {
        let inner = token.strip_prefix("[REDACTED:")?.strip_suffix(']')?;
        let mut parts = inner.splitn(2, ':');
        let category_str = parts.next()?;
        let hash = parts.next()?;
        let category: Category = category_str.parse().ok()?;
        Some((category, hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_round_trips() {
        let token = Placeholder::format(Category::Credential, "abcd1234");
        assert_eq!(token, "[REDACTED:credential:abcd1234]");
        let (cat, hash) = Placeholder::parse(&token).unwrap();
        assert_eq!(cat, Category::Credential);
        assert_eq!(hash, "abcd1234");
    }

    #[test]
    fn placeholder_rejects_malformed() {
        assert!(Placeholder::parse("not a placeholder").is_none());
        assert!(Placeholder::parse("[REDACTED:unknown:abc]").is_none());
    }
}

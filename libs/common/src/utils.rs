use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub fn generate_id() -> Uuid {
    Uuid::new_v4()
}

pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

pub fn current_timestamp_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Full-length lowercase hex SHA-256 digest, used by the vault and the
/// audit checksum before either truncates to their own convention.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

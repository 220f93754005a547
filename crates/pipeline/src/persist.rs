//! Atomic (tmp + rename) JSON persistence for processing state and reports.

use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use trace_governance_common::error::Result;

pub fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let contents = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&contents).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        value: u32,
    }

    #[test]
    fn round_trips_through_tmp_and_rename() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        write_atomic(&path, &Sample { value: 7 }).unwrap();
        assert!(!dir.path().join("state.json.tmp").exists());
        let loaded: Sample = read_json(&path).unwrap();
        assert_eq!(loaded, Sample { value: 7 });
    }

    #[test]
    fn read_json_returns_none_for_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing: Option<Sample> = read_json(&dir.path().join("nope.json"));
        assert!(missing.is_none());
    }
}

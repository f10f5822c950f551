//! Source trust ledger
//!
//! One reliability weight per signal source, adjusted multiplicatively by
//! execution outcome and clamped to [0.10, 0.99]. The whole map is rewritten
//! to a flat JSON file on every update (write-through, no buffering).
//! Concurrent processes sharing the file are last-writer-wins; that is a
//! documented risk, not a guarantee.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const TRUST_DEFAULT: f64 = 0.50;
pub const TRUST_FLOOR: f64 = 0.10;
pub const TRUST_CEILING: f64 = 0.99;
const TRUST_GAIN: f64 = 1.05;
const TRUST_DECAY: f64 = 0.90;

pub struct TrustLedger {
    path: PathBuf,
    scores: Mutex<HashMap<String, f64>>,
}

impl TrustLedger {
    /// Load the ledger from `path`. A corrupt or missing file falls back to
    /// the seed defaults rather than failing startup.
    pub fn load(path: impl AsRef<Path>, seeds: HashMap<String, f64>) -> Self {
        let path = path.as_ref().to_path_buf();
        let scores = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<HashMap<String, f64>>(&raw) {
                Ok(map) => map
                    .into_iter()
                    .map(|(k, v)| (k, v.clamp(TRUST_FLOOR, TRUST_CEILING)))
                    .collect(),
                Err(e) => {
                    tracing::warn!("Trust file corrupt ({}), using seed defaults", e);
                    seeds
                }
            },
            Err(_) => seeds,
        };
        Self {
            path,
            scores: Mutex::new(scores),
        }
    }

    pub fn get(&self, source: &str) -> f64 {
        self.scores
            .lock()
            .get(source)
            .copied()
            .unwrap_or(TRUST_DEFAULT)
    }

    /// Apply the reinforcement rule and persist synchronously. Returns the
    /// new weight.
    pub fn update(&self, source: &str, success: bool) -> f64 {
        let updated = {
            let mut scores = self.scores.lock();
            let current = scores.get(source).copied().unwrap_or(TRUST_DEFAULT);
            let next = if success {
                (current * TRUST_GAIN).min(TRUST_CEILING)
            } else {
                (current * TRUST_DECAY).max(TRUST_FLOOR)
            };
            scores.insert(source.to_string(), next);
            next
        };
        self.persist();
        updated
    }

    pub fn snapshot(&self) -> HashMap<String, f64> {
        self.scores.lock().clone()
    }

    fn persist(&self) {
        let serialized = {
            let scores = self.scores.lock();
            serde_json::to_string_pretty(&*scores)
        };
        match serialized {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.path, json) {
                    tracing::warn!("Failed to persist trust file: {}", e);
                }
            }
            Err(e) => tracing::warn!("Failed to serialize trust map: {}", e),
        }
    }
}

/// Built-in seed weights used when no trust file exists yet.
pub fn default_seeds() -> HashMap<String, f64> {
    HashMap::from([
        ("discovery".to_string(), 0.50),
        ("cryptopanic".to_string(), 0.60),
        ("coindesk".to_string(), 0.55),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_ledger() -> (TrustLedger, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let ledger = TrustLedger::load(dir.path().join("trust.json"), HashMap::new());
        (ledger, dir)
    }

    #[test]
    fn test_unknown_source_defaults() {
        let (ledger, _dir) = temp_ledger();
        assert_eq!(ledger.get("nobody"), TRUST_DEFAULT);
    }

    #[test]
    fn test_success_never_decreases() {
        let (ledger, _dir) = temp_ledger();
        let mut prev = ledger.get("a");
        for _ in 0..100 {
            let next = ledger.update("a", true);
            assert!(next >= prev);
            prev = next;
        }
    }

    #[test]
    fn test_failure_never_increases() {
        let (ledger, _dir) = temp_ledger();
        let mut prev = ledger.get("a");
        for _ in 0..100 {
            let next = ledger.update("a", false);
            assert!(next <= prev);
            prev = next;
        }
    }

    #[test]
    fn test_weight_stays_in_bounds() {
        let (ledger, _dir) = temp_ledger();
        // Arbitrary success/failure sequence
        for i in 0..500 {
            let success = i % 7 != 0 && i % 3 == 0;
            let weight = ledger.update("a", success);
            assert!((TRUST_FLOOR..=TRUST_CEILING).contains(&weight));
        }
    }

    #[test]
    fn test_ceiling_and_floor() {
        let (ledger, _dir) = temp_ledger();
        for _ in 0..200 {
            ledger.update("up", true);
            ledger.update("down", false);
        }
        assert_eq!(ledger.get("up"), TRUST_CEILING);
        assert_eq!(ledger.get("down"), TRUST_FLOOR);
    }

    #[test]
    fn test_write_through_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trust.json");
        let ledger = TrustLedger::load(&path, HashMap::new());
        ledger.update("a", true);

        let raw = std::fs::read_to_string(&path).unwrap();
        let map: HashMap<String, f64> = serde_json::from_str(&raw).unwrap();
        assert!((map["a"] - 0.525).abs() < 1e-9);

        // A fresh ledger sees the persisted weight
        let reloaded = TrustLedger::load(&path, HashMap::new());
        assert!((reloaded.get("a") - 0.525).abs() < 1e-9);
    }

    #[test]
    fn test_corrupt_file_falls_back_to_seeds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trust.json");
        std::fs::write(&path, "{not json").unwrap();

        let seeds = HashMap::from([("known".to_string(), 0.70)]);
        let ledger = TrustLedger::load(&path, seeds);
        assert_eq!(ledger.get("known"), 0.70);
        assert_eq!(ledger.get("unknown"), TRUST_DEFAULT);
    }

    #[test]
    fn test_loaded_weights_are_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trust.json");
        std::fs::write(&path, r#"{"hot": 7.5, "cold": 0.0}"#).unwrap();

        let ledger = TrustLedger::load(&path, HashMap::new());
        assert_eq!(ledger.get("hot"), TRUST_CEILING);
        assert_eq!(ledger.get("cold"), TRUST_FLOOR);
    }
}

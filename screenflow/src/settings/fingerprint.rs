//! Settings fingerprints, the cache key of a pipeline run.

use super::SettingsSnapshot;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Deterministic digest of a [`SettingsSnapshot`]: 32 lowercase hex chars.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Returns the hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the first eight hex characters, for log lines.
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes the fingerprint of a snapshot.
///
/// MD5 over the snapshot's canonical JSON. Collision resistance only needs
/// to separate configurations, not resist an adversary.
#[must_use]
pub fn fingerprint(snapshot: &SettingsSnapshot) -> Fingerprint {
    let digest = Md5::digest(snapshot.canonical_json().as_bytes());
    Fingerprint(hex::encode(digest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;
    use rand::Rng;
    use serde_json::{json, Value};

    fn random_params(rng: &mut impl Rng) -> Vec<(String, Value)> {
        let count = rng.gen_range(1..12);
        (0..count)
            .map(|i| {
                let value = match rng.gen_range(0..4) {
                    0 => json!(rng.gen_range(0..1000)),
                    1 => json!(rng.gen_range(0.0..100.0)),
                    2 => json!(rng.gen_bool(0.5)),
                    _ => json!({
                        "first": rng.gen_bool(0.5),
                        "second": rng.gen_range(0..10),
                    }),
                };
                (format!("param_{i}"), value)
            })
            .collect()
    }

    fn build(params: &[(String, Value)]) -> SettingsSnapshot {
        params
            .iter()
            .fold(SettingsSnapshot::new(), |s, (k, v)| s.with(k.clone(), v.clone()))
    }

    #[test]
    fn test_fingerprint_format() {
        let fp = fingerprint(&SettingsSnapshot::new().with("min_rs", 80));
        assert_eq!(fp.as_str().len(), 32);
        assert!(fp.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(fp.short().len(), 8);
    }

    #[test]
    fn test_empty_snapshot_digest() {
        assert_eq!(
            fingerprint(&SettingsSnapshot::new()).as_str(),
            "99914b932bd37a50b983c5e7c90ae93b"
        );
    }

    #[test]
    fn test_insertion_order_never_changes_fingerprint() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let mut params = random_params(&mut rng);
            let original = fingerprint(&build(&params));
            params.shuffle(&mut rng);
            assert_eq!(fingerprint(&build(&params)), original);
        }
    }

    #[test]
    fn test_any_changed_value_changes_fingerprint() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let params = random_params(&mut rng);
            let original = fingerprint(&build(&params));

            let victim = rng.gen_range(0..params.len());
            let mut changed = params.clone();
            changed[victim].1 = json!(format!("changed-{}", rng.gen::<u32>()));

            assert_ne!(fingerprint(&build(&changed)), original);
        }
    }

    #[test]
    fn test_nested_order_never_changes_fingerprint() {
        let a: Value = serde_json::from_str(r#"{"x": true, "y": false}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"y": false, "x": true}"#).unwrap();
        assert_eq!(
            fingerprint(&SettingsSnapshot::new().with("trend", a)),
            fingerprint(&SettingsSnapshot::new().with("trend", b))
        );
    }
}

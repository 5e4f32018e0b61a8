use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::chain::{FileKind, StageKind};
use crate::config::ToolchainVersions;

/// Invalidation key for one transformation stage.
///
/// Factors are kept sorted, so insertion order never affects equality.
/// Watched files are recorded by name only; their contents are hashed by
/// the [`CacheStore`](super::CacheStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheFingerprint {
    pub stage: String,
    pub factors: BTreeMap<String, Value>,
    pub watched_files: Vec<String>,
}

impl CacheFingerprint {
    /// Build a fingerprint from `(name, value)` pairs.
    ///
    /// A name that appears twice keeps the later value.
    pub fn build<K, V, I>(stage: impl Into<String>, factors: I, watched_files: &[String]) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut map = BTreeMap::new();
        for (key, value) in factors {
            map.insert(key.into(), value.into());
        }
        Self {
            stage: stage.into(),
            factors: map,
            watched_files: watched_files.to_vec(),
        }
    }

    pub fn factor(&self, key: &str) -> Option<&Value> {
        self.factors.get(key)
    }

    /// Stable hex digest of the fingerprint
    pub fn identifier(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.stage.as_bytes());
        hasher.update(&[0]);
        for (key, value) in &self.factors {
            hasher.update(key.as_bytes());
            hasher.update(&[1]);
            hasher.update(value.to_string().as_bytes());
            hasher.update(&[0]);
        }
        for file in &self.watched_files {
            hasher.update(file.as_bytes());
            hasher.update(&[0]);
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// Produces the fingerprint for a chain's primary transform stage
pub trait FingerprintFactory {
    fn fingerprint(&self, kind: FileKind, primary: StageKind) -> CacheFingerprint;
}

/// Fingerprints from toolchain versions, the modern-build flag and the
/// target browser matrix
#[derive(Debug, Clone)]
pub struct ToolchainFingerprints {
    pub versions: ToolchainVersions,
    pub modern: bool,
    pub browserslist: Option<Value>,
    pub watched_files: Vec<String>,
}

impl FingerprintFactory for ToolchainFingerprints {
    fn fingerprint(&self, kind: FileKind, primary: StageKind) -> CacheFingerprint {
        let mut factors: Vec<(&str, Value)> = Vec::new();

        if primary == StageKind::SyntaxLower {
            if kind.is_typed() {
                // Engine and adapter both report under the stage name; the
                // adapter version is the one that survives.
                factors.push((StageKind::SyntaxLower.name(), self.versions.lowering_engine.clone().into()));
            } else {
                factors.push(("lowering-engine", self.versions.lowering_engine.clone().into()));
            }
            factors.push((StageKind::SyntaxLower.name(), self.versions.lowering_adapter.clone().into()));
        }
        if kind.is_typed() {
            factors.push((StageKind::TypeStrip.name(), self.versions.type_strip.clone().into()));
        }

        factors.push(("modern", self.modern.into()));
        factors.push(("browserslist", self.browserslist.clone().unwrap_or(Value::Null)));

        CacheFingerprint::build(primary.name(), factors, &self.watched_files)
    }
}

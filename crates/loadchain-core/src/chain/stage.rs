use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;

use super::FileKind;
use crate::cache::{self, CacheFingerprint, CacheStore};
use crate::exclusion::ExclusionPolicy;

/// Options handed to a transformation engine
pub type OptionsBag = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageKind {
    /// Returns the stored result on a fingerprint hit, skipping the rest
    CacheLookup,
    /// Fans following stages out over a worker pool
    ParallelWorker,
    /// Rewrites modern syntax for the target environment
    SyntaxLower,
    /// Removes type annotations without checking them
    TypeStrip,
}

impl StageKind {
    pub fn name(self) -> &'static str {
        match self {
            StageKind::CacheLookup => "cache-lookup",
            StageKind::ParallelWorker => "parallel-worker",
            StageKind::SyntaxLower => "syntax-lower",
            StageKind::TypeStrip => "type-strip",
        }
    }
}

/// One named step of a chain
#[derive(Debug, Clone, Serialize)]
pub struct Stage {
    name: String,
    kind: StageKind,
    position: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OptionsBag>,
    #[serde(skip)]
    guard: Option<Arc<ExclusionPolicy>>,
}

impl Stage {
    pub(crate) fn new(
        kind: StageKind,
        position: usize,
        options: Option<OptionsBag>,
        guard: Option<Arc<ExclusionPolicy>>,
    ) -> Self {
        Self {
            name: kind.name().to_string(),
            kind,
            position,
            options,
            guard,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> StageKind {
        self.kind
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn options(&self) -> Option<&OptionsBag> {
        self.options.as_ref()
    }

    pub fn option(&self, key: &str) -> Option<&Value> {
        self.options.as_ref().and_then(|o| o.get(key))
    }

    pub fn guard(&self) -> Option<&Arc<ExclusionPolicy>> {
        self.guard.as_ref()
    }

    /// False when the stage's exclusion guard skips `path`
    pub fn accepts(&self, path: &str) -> bool {
        self.guard.as_ref().map_or(true, |g| !g.should_skip(path))
    }
}

/// What happens to one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum FilePlan {
    /// The file never enters the chain
    Skipped,
    /// The cache-lookup stage hit; later stages do not run
    CacheHit { stage: String },
    /// Stages run in this order
    Run { stages: Vec<String> },
}

/// The ordered stages applied to files of one kind
#[derive(Debug, Clone, Serialize)]
pub struct StageChain {
    kind: FileKind,
    rule: String,
    test: String,
    stages: Vec<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fingerprint: Option<CacheFingerprint>,
    #[serde(skip)]
    policy: Arc<ExclusionPolicy>,
}

impl StageChain {
    pub(crate) fn new(
        kind: FileKind,
        stages: Vec<Stage>,
        fingerprint: Option<CacheFingerprint>,
        policy: Arc<ExclusionPolicy>,
    ) -> Self {
        Self {
            kind,
            rule: kind.rule_name().to_string(),
            test: kind.test_pattern().to_string(),
            stages,
            fingerprint,
            policy,
        }
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    pub fn rule(&self) -> &str {
        &self.rule
    }

    pub fn test(&self) -> &str {
        &self.test
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(Stage::name).collect()
    }

    pub fn stage(&self, kind: StageKind) -> Option<&Stage> {
        self.stages.iter().find(|s| s.kind == kind)
    }

    /// Fingerprint of the primary transform stage, when caching is on
    pub fn fingerprint(&self) -> Option<&CacheFingerprint> {
        self.fingerprint.as_ref()
    }

    pub fn policy(&self) -> &Arc<ExclusionPolicy> {
        &self.policy
    }

    /// True when the rule matches `path` and the exclusion policy keeps it
    pub fn applies_to(&self, path: &str) -> bool {
        FileKind::for_path(path) == Some(self.kind) && !self.policy.should_skip(path)
    }

    /// Stages `path` goes through; empty for excluded or unmatched files
    pub fn stages_for(&self, path: &str) -> &[Stage] {
        if self.applies_to(path) {
            &self.stages
        } else {
            &[]
        }
    }

    /// Resolve what the executor does with `source`
    pub fn plan(&self, source: &Path, cache: &dyn CacheStore) -> cache::Result<FilePlan> {
        let path = source.to_string_lossy();
        if !self.applies_to(&path) {
            return Ok(FilePlan::Skipped);
        }

        if let (Some(first), Some(fingerprint)) = (self.stages.first(), &self.fingerprint) {
            if first.kind == StageKind::CacheLookup
                && cache
                    .lookup(&fingerprint.stage, fingerprint, source)?
                    .is_some()
            {
                return Ok(FilePlan::CacheHit {
                    stage: fingerprint.stage.clone(),
                });
            }
        }

        Ok(FilePlan::Run {
            stages: self.stages.iter().map(|s| s.name.clone()).collect(),
        })
    }
}

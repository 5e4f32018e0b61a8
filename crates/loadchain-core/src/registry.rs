use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::chain::{FileKind, StageChain};
use crate::errors::{ComposeError, Result};

/// Bundler rules keyed by name, in registration order
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct RuleRegistry {
    rules: IndexMap<String, StageChain>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a chain under its rule name.
    ///
    /// Rule names and stage names within a rule must be unique.
    pub fn insert(&mut self, chain: StageChain) -> Result<()> {
        if self.rules.contains_key(chain.rule()) {
            return Err(ComposeError::invalid(format!(
                "rule '{}' is already registered",
                chain.rule()
            )));
        }

        let mut seen = FxHashSet::default();
        for stage in chain.stages() {
            if !seen.insert(stage.name()) {
                return Err(ComposeError::invalid(format!(
                    "stage '{}' appears twice in rule '{}'",
                    stage.name(),
                    chain.rule()
                )));
            }
        }

        self.rules.insert(chain.rule().to_string(), chain);
        Ok(())
    }

    pub fn get(&self, rule: &str) -> Option<&StageChain> {
        self.rules.get(rule)
    }

    pub fn for_kind(&self, kind: FileKind) -> Option<&StageChain> {
        self.rules.get(kind.rule_name())
    }

    /// Chain whose test matches `path`, whether or not it excludes the file
    pub fn rule_for(&self, path: &str) -> Option<&StageChain> {
        FileKind::for_path(path).and_then(|kind| self.for_kind(kind))
    }

    pub fn chains(&self) -> impl Iterator<Item = &StageChain> {
        self.rules.values()
    }

    pub fn kinds(&self) -> Vec<FileKind> {
        self.rules.values().map(StageChain::kind).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ToolchainFingerprints;
    use crate::chain::{assemble, AssemblyOptions};
    use crate::config::ToolchainVersions;
    use crate::exclusion::ExclusionPolicy;
    use crate::parallel::ParallelDecision;
    use crate::transpile_deps::DependencyMatcher;
    use std::sync::Arc;

    fn chain(kind: FileKind) -> StageChain {
        let policy = Arc::new(ExclusionPolicy::new(Arc::new(DependencyMatcher::default())));
        let fingerprints = ToolchainFingerprints {
            versions: ToolchainVersions::default(),
            modern: false,
            browserslist: None,
            watched_files: Vec::new(),
        };
        assemble(
            kind,
            &policy,
            &ParallelDecision::disabled(),
            &fingerprints,
            &AssemblyOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut registry = RuleRegistry::new();
        registry.insert(chain(FileKind::PlainScript)).unwrap();
        registry.insert(chain(FileKind::TypedScript)).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.kinds(),
            vec![FileKind::PlainScript, FileKind::TypedScript]
        );
        assert_eq!(
            registry.rule_for("src/a.ts").map(StageChain::kind),
            Some(FileKind::TypedScript)
        );
        assert!(registry.rule_for("src/a.tsx").is_none());
        assert!(registry.get("js").is_some());
    }

    #[test]
    fn test_duplicate_rule_rejected() {
        let mut registry = RuleRegistry::new();
        registry.insert(chain(FileKind::PlainScript)).unwrap();
        let err = registry.insert(chain(FileKind::PlainScript)).unwrap_err();
        assert!(matches!(err, ComposeError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_serializes_in_registration_order() {
        let mut registry = RuleRegistry::new();
        registry.insert(chain(FileKind::TypedScriptJsx)).unwrap();
        registry.insert(chain(FileKind::PlainScript)).unwrap();

        let json = serde_json::to_string(&registry).unwrap();
        let tsx = json.find("\"tsx\":").unwrap();
        let js = json.find("\"js\":").unwrap();
        assert!(tsx < js);
    }
}

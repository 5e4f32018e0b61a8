use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use super::{FileKind, OptionsBag, Stage, StageChain, StageKind};
use crate::cache::FingerprintFactory;
use crate::errors::{ComposeError, Result};
use crate::exclusion::ExclusionPolicy;
use crate::parallel::ParallelDecision;

/// Host capabilities that shape every chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssemblyOptions {
    /// A syntax-lowering engine is installed
    pub syntax_lowering: bool,
    /// Prepend a cache-lookup stage
    pub cache: bool,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            syntax_lowering: true,
            cache: true,
        }
    }
}

/// Core transform stages of a kind, in execution order
fn core_stages(kind: FileKind, options: &AssemblyOptions) -> Result<Vec<StageKind>> {
    match (kind.is_typed(), options.syntax_lowering) {
        (false, true) => Ok(vec![StageKind::SyntaxLower]),
        (false, false) => Err(ComposeError::invalid(format!(
            "{} files need a syntax-lowering engine",
            kind
        ))),
        (true, true) => Ok(vec![StageKind::SyntaxLower, StageKind::TypeStrip]),
        (true, false) => Ok(vec![StageKind::TypeStrip]),
    }
}

fn core_options(kind: StageKind, parallel: &ParallelDecision) -> Option<OptionsBag> {
    match kind {
        StageKind::TypeStrip => {
            let mut options = OptionsBag::new();
            options.insert("transpileOnly".to_string(), json!(true));
            // Type information is unavailable across worker boundaries
            options.insert("happyPackMode".to_string(), json!(parallel.enabled));
            Some(options)
        }
        _ => None,
    }
}

/// Build the stage chain for one file kind.
///
/// Order: cache lookup, parallel workers (only when enabled), then the
/// core transforms. Every stage carries `policy` as its guard.
pub fn assemble(
    kind: FileKind,
    policy: &Arc<ExclusionPolicy>,
    parallel: &ParallelDecision,
    fingerprints: &dyn FingerprintFactory,
    options: &AssemblyOptions,
) -> Result<StageChain> {
    parallel.validate()?;

    let core = core_stages(kind, options)?;
    let primary = core[0];
    let mut stages = Vec::with_capacity(core.len() + 2);
    let guard = || Some(Arc::clone(policy));

    let fingerprint = options.cache.then(|| fingerprints.fingerprint(kind, primary));
    if let Some(fp) = &fingerprint {
        let mut cache_options = OptionsBag::new();
        cache_options.insert("stage".to_string(), json!(fp.stage));
        cache_options.insert("cacheIdentifier".to_string(), json!(fp.identifier()));
        cache_options.insert("watchedFiles".to_string(), json!(fp.watched_files));
        stages.push(Stage::new(
            StageKind::CacheLookup,
            stages.len(),
            Some(cache_options),
            guard(),
        ));
    }

    if parallel.enabled {
        let worker_options = parallel.worker_count.map(|workers| {
            let mut options = OptionsBag::new();
            options.insert("workers".to_string(), json!(workers));
            options
        });
        stages.push(Stage::new(
            StageKind::ParallelWorker,
            stages.len(),
            worker_options,
            guard(),
        ));
    }

    for stage_kind in core {
        stages.push(Stage::new(
            stage_kind,
            stages.len(),
            core_options(stage_kind, parallel),
            guard(),
        ));
    }

    let chain = StageChain::new(kind, stages, fingerprint, Arc::clone(policy));
    debug!("Assembled {} chain: {:?}", kind, chain.stage_names());
    Ok(chain)
}

/// Like [`assemble`], for a kind given by name
pub fn assemble_named(
    name: &str,
    policy: &Arc<ExclusionPolicy>,
    parallel: &ParallelDecision,
    fingerprints: &dyn FingerprintFactory,
    options: &AssemblyOptions,
) -> Result<StageChain> {
    let kind: FileKind = name.parse()?;
    assemble(kind, policy, parallel, fingerprints, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheStore, MemoryCacheStore, ToolchainFingerprints};
    use crate::chain::FilePlan;
    use crate::config::ToolchainVersions;
    use crate::transpile_deps::{DependencyMatcher, TranspileDependencySpec};
    use std::path::Path;

    fn policy(specs: &[TranspileDependencySpec]) -> Arc<ExclusionPolicy> {
        Arc::new(ExclusionPolicy::new(Arc::new(
            DependencyMatcher::compile(specs).unwrap(),
        )))
    }

    fn fingerprints() -> ToolchainFingerprints {
        ToolchainFingerprints {
            versions: ToolchainVersions::default(),
            modern: false,
            browserslist: None,
            watched_files: vec!["babel.config.js".to_string()],
        }
    }

    fn enabled(workers: Option<usize>) -> ParallelDecision {
        ParallelDecision {
            enabled: true,
            worker_count: workers,
        }
    }

    #[test]
    fn test_plain_script_full_chain() {
        let chain = assemble(
            FileKind::PlainScript,
            &policy(&[]),
            &enabled(Some(2)),
            &fingerprints(),
            &AssemblyOptions::default(),
        )
        .unwrap();

        assert_eq!(
            chain.stage_names(),
            vec!["cache-lookup", "parallel-worker", "syntax-lower"]
        );
        assert_eq!(
            chain.stage(StageKind::ParallelWorker).unwrap().option("workers"),
            Some(&json!(2))
        );
        for (i, stage) in chain.stages().iter().enumerate() {
            assert_eq!(stage.position(), i);
            assert!(stage.guard().is_some());
        }
        assert_eq!(chain.rule(), "js");
    }

    #[test]
    fn test_parallel_stage_absent_when_disabled() {
        let chain = assemble(
            FileKind::TypedScript,
            &policy(&[]),
            &ParallelDecision::disabled(),
            &fingerprints(),
            &AssemblyOptions::default(),
        )
        .unwrap();

        assert_eq!(
            chain.stage_names(),
            vec!["cache-lookup", "syntax-lower", "type-strip"]
        );
        assert_eq!(
            chain.stage(StageKind::TypeStrip).unwrap().option("happyPackMode"),
            Some(&json!(false))
        );
    }

    #[test]
    fn test_parallel_without_worker_count_has_no_options() {
        let chain = assemble(
            FileKind::TypedScriptJsx,
            &policy(&[]),
            &enabled(None),
            &fingerprints(),
            &AssemblyOptions::default(),
        )
        .unwrap();

        let worker = chain.stage(StageKind::ParallelWorker).unwrap();
        assert_eq!(worker.position(), 1);
        assert!(worker.options().is_none());
    }

    #[test]
    fn test_typed_without_lowering_strips_only() {
        let options = AssemblyOptions {
            syntax_lowering: false,
            cache: true,
        };
        let chain = assemble(
            FileKind::TypedScript,
            &policy(&[]),
            &ParallelDecision::disabled(),
            &fingerprints(),
            &options,
        )
        .unwrap();

        assert_eq!(chain.stage_names(), vec!["cache-lookup", "type-strip"]);
        assert_eq!(chain.fingerprint().unwrap().stage, "type-strip");
    }

    #[test]
    fn test_plain_without_lowering_is_invalid() {
        let options = AssemblyOptions {
            syntax_lowering: false,
            cache: true,
        };
        let err = assemble(
            FileKind::PlainScriptJsx,
            &policy(&[]),
            &ParallelDecision::disabled(),
            &fingerprints(),
            &options,
        )
        .unwrap_err();
        assert!(matches!(err, ComposeError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_cache_disabled() {
        let options = AssemblyOptions {
            syntax_lowering: true,
            cache: false,
        };
        let chain = assemble(
            FileKind::PlainScript,
            &policy(&[]),
            &enabled(None),
            &fingerprints(),
            &options,
        )
        .unwrap();

        assert_eq!(chain.stage_names(), vec!["parallel-worker", "syntax-lower"]);
        assert!(chain.fingerprint().is_none());
    }

    #[test]
    fn test_cache_stage_carries_fingerprint_identifier() {
        let chain = assemble(
            FileKind::PlainScript,
            &policy(&[]),
            &ParallelDecision::disabled(),
            &fingerprints(),
            &AssemblyOptions::default(),
        )
        .unwrap();

        let fp = chain.fingerprint().unwrap();
        let cache = chain.stage(StageKind::CacheLookup).unwrap();
        assert_eq!(cache.option("cacheIdentifier"), Some(&json!(fp.identifier())));
        assert_eq!(cache.option("stage"), Some(&json!("syntax-lower")));
    }

    #[test]
    fn test_malformed_decision_rejected() {
        let err = assemble(
            FileKind::PlainScript,
            &policy(&[]),
            &enabled(Some(0)),
            &fingerprints(),
            &AssemblyOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ComposeError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_assemble_named_unknown_kind() {
        let err = assemble_named(
            "coffee",
            &policy(&[]),
            &ParallelDecision::disabled(),
            &fingerprints(),
            &AssemblyOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ComposeError::UnsupportedFileKind(_)));
    }

    #[test]
    fn test_excluded_file_enters_no_stage() {
        let chain = assemble(
            FileKind::PlainScript,
            &policy(&[]),
            &enabled(Some(2)),
            &fingerprints(),
            &AssemblyOptions::default(),
        )
        .unwrap();

        let path = "/app/node_modules/foo/index.js";
        assert!(!chain.applies_to(path));
        assert!(chain.stages_for(path).is_empty());
        assert!(chain.stages().iter().all(|s| !s.accepts(path)));
        assert_eq!(chain.stages_for("/app/src/main.js").len(), 3);
        assert!(chain.stages_for("/app/src/main.ts").is_empty());
    }

    #[test]
    fn test_plan_short_circuits_on_cache_hit() {
        let chain = assemble(
            FileKind::PlainScript,
            &policy(&[]),
            &ParallelDecision::disabled(),
            &fingerprints(),
            &AssemblyOptions::default(),
        )
        .unwrap();
        let cache = MemoryCacheStore::new();
        let source = Path::new("/app/src/main.js");

        assert_eq!(
            chain.plan(source, &cache).unwrap(),
            FilePlan::Run {
                stages: vec!["cache-lookup".to_string(), "syntax-lower".to_string()]
            }
        );

        let fp = chain.fingerprint().unwrap();
        cache.store(&fp.stage, fp, source, b"out").unwrap();
        assert_eq!(
            chain.plan(source, &cache).unwrap(),
            FilePlan::CacheHit {
                stage: "syntax-lower".to_string()
            }
        );

        assert_eq!(
            chain
                .plan(Path::new("/app/node_modules/x/y.js"), &cache)
                .unwrap(),
            FilePlan::Skipped
        );
    }
}

//! Build-pipeline rule composer.
//!
//! Given a project's source-language mix and a handful of declarative
//! options, loadchain describes the ordered, conditional chain of
//! transformation stages a bundler applies to each source file. It never
//! runs a transformation itself.

pub mod cache;
pub mod chain;
pub mod command;
pub mod composer;
pub mod config;
pub mod diagnostics;
pub mod errors;
pub mod exclusion;
pub mod parallel;
pub mod registry;
pub mod transpile_deps;

pub use cache::{CacheFingerprint, CacheStore, DiskCacheStore, FingerprintFactory, MemoryCacheStore};
pub use chain::{assemble, FilePlan, FileKind, Stage, StageChain, StageKind};
pub use command::{register_if_absent, CommandHost, CommandSpec, CommandTable};
pub use composer::{Composer, Composition, SideChannel};
pub use config::{BuildEnv, ComposerConfig};
pub use diagnostics::{Diagnostic, DiagnosticHandler, DiagnosticLevel};
pub use errors::ComposeError;
pub use exclusion::{should_skip, ExclusionPolicy};
pub use parallel::{decide, ParallelDecision, ParallelOption};
pub use registry::RuleRegistry;
pub use transpile_deps::{DependencyMatcher, TranspileDependencySpec};

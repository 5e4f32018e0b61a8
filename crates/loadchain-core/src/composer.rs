//! Host-level wiring: turns a [`ComposerConfig`] and a [`BuildEnv`] into
//! the full set of rules, side channels and entry adjustments.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::ToolchainFingerprints;
use crate::chain::{assemble, AssemblyOptions, FileKind, OptionsBag, StageChain};
use crate::command::{register_lint_fallback, CommandHandler, CommandHost};
use crate::config::{BuildEnv, ComposerConfig, BABEL_PLUGIN, ESLINT_PLUGIN, TYPESCRIPT_PLUGIN};
use crate::errors::Result;
use crate::exclusion::ExclusionPolicy;
use crate::parallel::{decide, ParallelDecision};
use crate::registry::RuleRegistry;
use crate::transpile_deps::DependencyMatcher;

/// Name of the type-checking side channel
pub const TYPE_CHECK_CHANNEL: &str = "type-check";

/// Default entry name and the typed JSX entry file
pub const APP_ENTRY: &str = "app";
pub const TYPED_JSX_ENTRY: &str = "./src/main.tsx";

const BASE_EXTENSIONS: [&str; 5] = [".mjs", ".js", ".jsx", ".json", ".wasm"];
const TYPED_EXTENSIONS: [&str; 2] = [".ts", ".tsx"];

/// A checker that runs beside the chains and reports diagnostics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SideChannel {
    pub name: String,
    /// Failures fail production builds
    pub blocking: bool,
    pub options: OptionsBag,
}

/// Replacement of the bundle's default entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryOverride {
    pub name: String,
    pub path: String,
}

/// Everything the composer hands to the bundler
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Composition {
    pub env: BuildEnv,
    pub parallel: ParallelDecision,
    pub rules: RuleRegistry,
    pub side_channels: Vec<SideChannel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<EntryOverride>,
    pub resolve_extensions: Vec<String>,
}

impl Composition {
    pub fn side_channel(&self, name: &str) -> Option<&SideChannel> {
        self.side_channels.iter().find(|c| c.name == name)
    }

    pub fn chain_for(&self, path: &str) -> Option<&StageChain> {
        self.rules.rule_for(path)
    }
}

/// Validated composer state. All configuration errors surface from
/// [`Composer::new`], before any chain is built.
#[derive(Debug, Clone)]
pub struct Composer {
    config: ComposerConfig,
    env: BuildEnv,
    policy: Arc<ExclusionPolicy>,
    parallel: ParallelDecision,
    options: AssemblyOptions,
}

impl Composer {
    pub fn new(config: ComposerConfig, env: BuildEnv) -> Result<Self> {
        let matcher = Arc::new(DependencyMatcher::compile(&config.transpile_dependencies)?);
        let parallel = decide(env.production, config.parallel.as_ref())?;

        let mut policy = ExclusionPolicy::new(matcher);
        if let Some(root) = &config.runtime_root {
            policy = policy.with_runtime_root(root);
        }

        let options = AssemblyOptions {
            syntax_lowering: config.has_plugin(BABEL_PLUGIN),
            cache: true,
        };

        info!(
            "Composer ready: production={}, modern={}, parallel={}",
            env.production, env.modern, parallel.enabled
        );

        Ok(Self {
            config,
            env,
            policy: Arc::new(policy),
            parallel,
            options,
        })
    }

    /// Turn the cache-lookup stage on or off
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.options.cache = enabled;
        self
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    pub fn env(&self) -> &BuildEnv {
        &self.env
    }

    pub fn policy(&self) -> &Arc<ExclusionPolicy> {
        &self.policy
    }

    pub fn parallel(&self) -> &ParallelDecision {
        &self.parallel
    }

    /// Kinds provided by the installed integrations
    pub fn enabled_kinds(&self) -> Vec<FileKind> {
        let babel = self.config.has_plugin(BABEL_PLUGIN);
        let typescript = self.config.has_plugin(TYPESCRIPT_PLUGIN);
        FileKind::ALL
            .into_iter()
            .filter(|kind| if kind.is_typed() { typescript } else { babel })
            .collect()
    }

    pub fn fingerprints(&self) -> ToolchainFingerprints {
        ToolchainFingerprints {
            versions: self.config.toolchain.clone(),
            modern: self.env.modern,
            browserslist: self.config.browserslist.clone(),
            watched_files: self.config.cache.watched_files.clone(),
        }
    }

    pub fn assemble(&self, kind: FileKind) -> Result<StageChain> {
        assemble(
            kind,
            &self.policy,
            &self.parallel,
            &self.fingerprints(),
            &self.options,
        )
    }

    pub fn compose(&self) -> Result<Composition> {
        let kinds = self.enabled_kinds();
        let mut rules = RuleRegistry::new();
        for kind in &kinds {
            rules.insert(self.assemble(*kind)?)?;
        }

        let typed = kinds.iter().any(|k| k.is_typed());
        let mut side_channels = Vec::new();
        if typed {
            if self.env.test {
                debug!("Test mode: type-check side channel not installed");
            } else {
                side_channels.push(self.type_check_channel());
            }
        }

        let entry = if kinds.contains(&FileKind::TypedScriptJsx) && !self.config.is_multi_page() {
            Some(EntryOverride {
                name: APP_ENTRY.to_string(),
                path: TYPED_JSX_ENTRY.to_string(),
            })
        } else {
            None
        };

        let mut resolve_extensions: Vec<String> =
            BASE_EXTENSIONS.iter().map(|e| e.to_string()).collect();
        if typed {
            for ext in TYPED_EXTENSIONS {
                if !resolve_extensions.iter().any(|e| e == ext) {
                    resolve_extensions.push(ext.to_string());
                }
            }
        }

        Ok(Composition {
            env: self.env,
            parallel: self.parallel,
            rules,
            side_channels,
            entry,
            resolve_extensions,
        })
    }

    fn type_check_channel(&self) -> SideChannel {
        let mut options = OptionsBag::new();
        // Syntax errors are not reported by stripping stages running in workers
        options.insert("checkSyntacticErrors".to_string(), json!(self.parallel.enabled));
        options.insert(
            "version".to_string(),
            json!(self.config.toolchain.type_checker),
        );
        SideChannel {
            name: TYPE_CHECK_CHANNEL.to_string(),
            blocking: self.config.type_check.blocking,
            options,
        }
    }

    /// Register the fallback lint command when `typescript` is installed
    /// without `eslint`
    pub fn register_commands(&self, host: &mut dyn CommandHost, lint: CommandHandler) -> bool {
        if !self.config.has_plugin(TYPESCRIPT_PLUGIN) {
            debug!("No typed-script integration; lint fallback not offered");
            return false;
        }
        register_lint_fallback(host, self.config.has_plugin(ESLINT_PLUGIN), lint)
    }

    /// Entries of a multi-page build, if any
    pub fn pages(&self) -> Option<&IndexMap<String, String>> {
        self.config.pages.as_ref()
    }
}

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use crate::cache::CACHE_DIR_NAME;
use crate::errors::{ComposeError, Result};
use crate::parallel::ParallelOption;
use crate::transpile_deps::TranspileDependencySpec;

/// Integration providing syntax lowering and the plain-script chains
pub const BABEL_PLUGIN: &str = "babel";
/// Integration providing the typed-script chains and type checking
pub const TYPESCRIPT_PLUGIN: &str = "typescript";
/// A richer lint integration that replaces the fallback lint command
pub const ESLINT_PLUGIN: &str = "eslint";

/// Versions of the transformation engines, used for cache fingerprints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolchainVersions {
    pub lowering_engine: String,
    pub lowering_adapter: String,
    pub type_strip: String,
    pub type_checker: String,
}

impl Default for ToolchainVersions {
    fn default() -> Self {
        Self {
            lowering_engine: "7.4.0".to_string(),
            lowering_adapter: "8.0.5".to_string(),
            type_strip: "5.4.5".to_string(),
            type_checker: "1.0.0".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheOptions {
    /// Cache directory, relative to the project root
    pub directory: String,

    /// Configuration files whose content invalidates cached results
    pub watched_files: Vec<String>,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            directory: CACHE_DIR_NAME.to_string(),
            watched_files: vec!["babel.config.js".to_string(), ".browserslistrc".to_string()],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TypeCheckOptions {
    /// Type errors fail production builds (default: false)
    pub blocking: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LintOptions {
    /// Linter executable run by the fallback lint command
    pub program: String,
}

impl Default for LintOptions {
    fn default() -> Self {
        Self {
            program: "tslint".to_string(),
        }
    }
}

/// Project configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposerConfig {
    /// Packages under node_modules that are transformed anyway
    #[serde(default)]
    pub transpile_dependencies: Vec<TranspileDependencySpec>,

    /// Parallel workers for production builds: true, false or a worker count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel: Option<ParallelOption>,

    /// Multi-page build entries. When set, the default entry is left alone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<IndexMap<String, String>>,

    /// Installed integrations
    #[serde(default = "default_plugins")]
    pub plugins: Vec<String>,

    #[serde(default)]
    pub toolchain: ToolchainVersions,

    /// Target browser matrix, recorded in cache fingerprints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browserslist: Option<Value>,

    #[serde(default)]
    pub cache: CacheOptions,

    #[serde(default)]
    pub type_check: TypeCheckOptions,

    #[serde(default)]
    pub lint: LintOptions,

    /// Path of the build tool's own runtime package, never transformed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_root: Option<String>,
}

fn default_plugins() -> Vec<String> {
    vec![BABEL_PLUGIN.to_string(), TYPESCRIPT_PLUGIN.to_string()]
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            transpile_dependencies: Vec::new(),
            parallel: None,
            pages: None,
            plugins: default_plugins(),
            toolchain: ToolchainVersions::default(),
            browserslist: None,
            cache: CacheOptions::default(),
            type_check: TypeCheckOptions::default(),
            lint: LintOptions::default(),
            runtime_root: None,
        }
    }
}

impl ComposerConfig {
    /// Load configuration from a JSON or YAML file, chosen by extension
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        if is_yaml(path) {
            Self::from_yaml(&content)
        } else {
            Self::from_json(&content)
        }
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| ComposeError::Config(e.to_string()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| ComposeError::Config(e.to_string()))
    }

    /// Create a default configuration and write it to a file
    pub fn init_file(path: &Path) -> Result<()> {
        let config = ComposerConfig::default();
        let text = if is_yaml(path) {
            serde_yaml::to_string(&config).map_err(|e| ComposeError::Config(e.to_string()))?
        } else {
            serde_json::to_string_pretty(&config)
                .map_err(|e| ComposeError::Config(e.to_string()))?
        };
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn has_plugin(&self, name: &str) -> bool {
        self.plugins.iter().any(|p| p == name)
    }

    pub fn is_multi_page(&self) -> bool {
        self.pages.is_some()
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Environment-derived build flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildEnv {
    pub production: bool,
    /// Building the modern-browser bundle
    pub modern: bool,
    /// Running under the test/CI harness; disables side-channel checkers
    pub test: bool,
}

impl BuildEnv {
    /// Read the build flags through `lookup`.
    ///
    /// * `NODE_ENV=production` marks a production build
    /// * `LOADCHAIN_MODERN_BUILD` (any non-empty value) marks a modern build
    /// * `LOADCHAIN_TEST` (any non-empty value) marks test mode
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |name: &str| lookup(name).is_some_and(|v| !v.is_empty());
        Self {
            production: lookup("NODE_ENV").as_deref() == Some("production"),
            modern: set("LOADCHAIN_MODERN_BUILD"),
            test: set("LOADCHAIN_TEST"),
        }
    }

    /// Development builds report side-channel failures without failing
    pub fn is_interactive(&self) -> bool {
        !self.production
    }
}

//! Compiles the `transpileDependencies` list into a single path matcher.
//!
//! Code under `node_modules` is normally left alone. Entries in this list
//! opt individual packages back into transformation, either by package
//! name or by a raw regular expression.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{ComposeError, Result};

/// Folder holding third-party packages
pub const VENDOR_ROOT: &str = "node_modules";

/// Matches either path separator
const SEPARATOR: &str = r"[\\/]";

/// One entry of the `transpileDependencies` list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TranspileDependencySpec {
    /// A package name such as `lodash-es` or `@scope/pkg`
    Literal(String),
    /// A regular expression matched against the whole file path
    Pattern {
        pattern: String,
    },
}

impl TranspileDependencySpec {
    pub fn literal(name: impl Into<String>) -> Self {
        TranspileDependencySpec::Literal(name.into())
    }

    pub fn pattern(source: impl Into<String>) -> Self {
        TranspileDependencySpec::Pattern {
            pattern: source.into(),
        }
    }

    /// Regex source for this entry
    fn fragment(&self) -> Result<String> {
        match self {
            TranspileDependencySpec::Literal(name) => literal_fragment(name),
            TranspileDependencySpec::Pattern { pattern } => {
                Regex::new(pattern).map_err(|e| {
                    ComposeError::invalid(format!(
                        "transpileDependencies pattern '{}' is not a valid regex: {}",
                        pattern, e
                    ))
                })?;
                Ok(pattern.clone())
            }
        }
    }
}

/// `node_modules/<name>/` with every separator accepting `/` or `\`.
///
/// Empty and `.` segments are dropped. `..` would leave the package folder.
fn literal_fragment(name: &str) -> Result<String> {
    let segments: Vec<&str> = name
        .split(['/', '\\'])
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    if segments.contains(&"..") {
        return Err(ComposeError::invalid(format!(
            "transpileDependencies entry '{}' points outside {}",
            name, VENDOR_ROOT
        )));
    }
    if segments.is_empty() {
        return Err(ComposeError::invalid(format!(
            "transpileDependencies entry '{}' is not a package name",
            name
        )));
    }

    let mut fragment = String::from(VENDOR_ROOT);
    for segment in segments {
        fragment.push_str(SEPARATOR);
        fragment.push_str(&regex::escape(segment));
    }
    fragment.push_str(SEPARATOR);
    Ok(fragment)
}

/// Matcher over file paths built from a list of [`TranspileDependencySpec`].
///
/// An empty list produces a matcher that never matches.
#[derive(Debug, Clone, Default)]
pub struct DependencyMatcher {
    regex: Option<Regex>,
}

impl DependencyMatcher {
    /// Union every entry into one alternation
    pub fn compile(specs: &[TranspileDependencySpec]) -> Result<Self> {
        let mut fragments: Vec<String> = Vec::with_capacity(specs.len());
        for spec in specs {
            let fragment = spec.fragment()?;
            if !fragments.contains(&fragment) {
                fragments.push(fragment);
            }
        }

        if fragments.is_empty() {
            debug!("No transpileDependencies configured");
            return Ok(Self::default());
        }

        let source = fragments.join("|");
        debug!("Compiled transpileDependencies matcher: {}", source);
        let regex = Regex::new(&source).map_err(|e| {
            ComposeError::invalid(format!("transpileDependencies matcher: {}", e))
        })?;

        Ok(Self { regex: Some(regex) })
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.as_ref().is_some_and(|re| re.is_match(path))
    }

    /// True when no entries were supplied
    pub fn is_empty(&self) -> bool {
        self.regex.is_none()
    }

    pub fn source(&self) -> Option<&str> {
        self.regex.as_ref().map(Regex::as_str)
    }
}

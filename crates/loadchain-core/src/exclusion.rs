use std::sync::Arc;

use crate::transpile_deps::{DependencyMatcher, VENDOR_ROOT};

/// Decides, per file path, whether a chain transforms the file.
///
/// Shared read-only by every stage of every chain. Holds no mutable
/// state, so it can be evaluated from any number of worker threads.
#[derive(Debug, Clone)]
pub struct ExclusionPolicy {
    matcher: Arc<DependencyMatcher>,
    /// The build tool's own runtime package, separator-normalized
    runtime_root: Option<String>,
}

impl ExclusionPolicy {
    pub fn new(matcher: Arc<DependencyMatcher>) -> Self {
        Self {
            matcher,
            runtime_root: None,
        }
    }

    /// Files under `root` are always skipped
    pub fn with_runtime_root(mut self, root: impl AsRef<str>) -> Self {
        let normalized = normalize_separators(root.as_ref());
        let trimmed = normalized.trim_end_matches('/');
        self.runtime_root = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
        self
    }

    pub fn matcher(&self) -> &Arc<DependencyMatcher> {
        &self.matcher
    }

    pub fn runtime_root(&self) -> Option<&str> {
        self.runtime_root.as_deref()
    }

    /// Returns true when the file must not be transformed
    pub fn should_skip(&self, path: &str) -> bool {
        if let Some(root) = &self.runtime_root {
            if is_under(&normalize_separators(path), root) {
                return true;
            }
        }
        should_skip(path, &self.matcher)
    }
}

/// Vendor code is skipped unless the matcher opts it back in
pub fn should_skip(path: &str, matcher: &DependencyMatcher) -> bool {
    if matcher.is_match(path) {
        return false;
    }
    is_vendor_path(path)
}

/// True when any path segment is the vendor root
pub fn is_vendor_path(path: &str) -> bool {
    path.split(['/', '\\']).any(|segment| segment == VENDOR_ROOT)
}

fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

fn is_under(path: &str, root: &str) -> bool {
    path.strip_prefix(root)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

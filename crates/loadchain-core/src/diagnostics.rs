use std::fmt;
use std::sync::{Mutex, PoisonError};
use tracing::warn;

use crate::composer::SideChannel;
use crate::config::BuildEnv;
use crate::errors::{ComposeError, Result};

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Error,
    Warning,
    Info,
}

impl fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DiagnosticLevel::Error => "error",
            DiagnosticLevel::Warning => "warning",
            DiagnosticLevel::Info => "info",
        })
    }
}

/// A message reported by a stage or side channel, optionally tied to a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub source: String,
    pub file: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn error(source: &str, file: Option<&str>, message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Error, source, file, message)
    }

    pub fn warning(source: &str, file: Option<&str>, message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Warning, source, file, message)
    }

    fn new(
        level: DiagnosticLevel,
        source: &str,
        file: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            level,
            source: source.to_string(),
            file: file.map(str::to_string),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{} [{}] {}: {}", self.level, self.source, file, self.message),
            None => write!(f, "{} [{}] {}", self.level, self.source, self.message),
        }
    }
}

/// Trait for handling diagnostics
pub trait DiagnosticHandler: Send + Sync {
    fn report(&self, diagnostic: Diagnostic);

    fn get_diagnostics(&self) -> Vec<Diagnostic>;

    fn error_count(&self) -> usize {
        self.get_diagnostics()
            .iter()
            .filter(|d| d.level == DiagnosticLevel::Error)
            .count()
    }

    fn warning_count(&self) -> usize {
        self.get_diagnostics()
            .iter()
            .filter(|d| d.level == DiagnosticLevel::Warning)
            .count()
    }

    fn has_errors(&self) -> bool {
        self.error_count() > 0
    }
}

/// Prints diagnostics to stderr as they arrive
pub struct ConsoleDiagnosticHandler {
    diagnostics: Mutex<Vec<Diagnostic>>,
    pretty: bool,
}

impl ConsoleDiagnosticHandler {
    pub fn new(pretty: bool) -> Self {
        Self {
            diagnostics: Mutex::new(Vec::new()),
            pretty,
        }
    }
}

impl DiagnosticHandler for ConsoleDiagnosticHandler {
    fn report(&self, diagnostic: Diagnostic) {
        if self.pretty {
            eprintln!("\x1b[1m{}\x1b[0m", diagnostic);
        } else {
            eprintln!("{}", diagnostic);
        }
        self.diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(diagnostic);
    }

    fn get_diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Collects all diagnostics without printing
#[derive(Default)]
pub struct CollectingDiagnosticHandler {
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl CollectingDiagnosticHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DiagnosticHandler for CollectingDiagnosticHandler {
    fn report(&self, diagnostic: Diagnostic) {
        self.diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(diagnostic);
    }

    fn get_diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Report a failure from a side-channel checker.
///
/// The failure is always reported. It only fails the build when the
/// channel is blocking and the build is not interactive.
pub fn report_tooling_failure(
    handler: &dyn DiagnosticHandler,
    channel: &SideChannel,
    env: &BuildEnv,
    file: Option<&str>,
    message: &str,
) -> Result<()> {
    let fatal = channel.blocking && !env.is_interactive();
    let diagnostic = if fatal {
        Diagnostic::error(&channel.name, file, message)
    } else {
        Diagnostic::warning(&channel.name, file, message)
    };
    handler.report(diagnostic);

    if fatal {
        return Err(ComposeError::upstream(&channel.name, message));
    }
    warn!("{} reported problems; continuing", channel.name);
    Ok(())
}

/// Report a per-file transformation failure. Never aborts other files.
pub fn report_stage_failure(handler: &dyn DiagnosticHandler, stage: &str, file: &str, message: &str) {
    handler.report(Diagnostic::error(stage, Some(file), message));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn type_check(blocking: bool) -> SideChannel {
        SideChannel {
            name: "type-check".to_string(),
            blocking,
            options: Map::new(),
        }
    }

    fn env(production: bool) -> BuildEnv {
        BuildEnv {
            production,
            ..BuildEnv::default()
        }
    }

    #[test]
    fn test_diagnostic_display() {
        let diag = Diagnostic::error("type-check", Some("src/a.ts"), "Type 'x' is not assignable");
        assert_eq!(
            diag.to_string(),
            "error [type-check] src/a.ts: Type 'x' is not assignable"
        );
    }

    #[test]
    fn test_collecting_handler_counts() {
        let handler = CollectingDiagnosticHandler::new();
        handler.report(Diagnostic::error("syntax-lower", None, "boom"));
        handler.report(Diagnostic::warning("type-check", None, "careful"));

        assert!(handler.has_errors());
        assert_eq!(handler.error_count(), 1);
        assert_eq!(handler.warning_count(), 1);
    }

    #[test]
    fn test_non_blocking_channel_never_fails() {
        let handler = CollectingDiagnosticHandler::new();
        for production in [true, false] {
            report_tooling_failure(&handler, &type_check(false), &env(production), None, "2 errors")
                .unwrap();
        }
        assert_eq!(handler.warning_count(), 2);
        assert!(!handler.has_errors());
    }

    #[test]
    fn test_blocking_channel_interactive_build_continues() {
        let handler = CollectingDiagnosticHandler::new();
        report_tooling_failure(&handler, &type_check(true), &env(false), Some("a.ts"), "bad")
            .unwrap();
        assert_eq!(handler.warning_count(), 1);
    }

    #[test]
    fn test_blocking_channel_production_build_fails() {
        let handler = CollectingDiagnosticHandler::new();
        let err = report_tooling_failure(&handler, &type_check(true), &env(true), Some("a.ts"), "bad")
            .unwrap_err();
        assert!(matches!(err, ComposeError::UpstreamTooling { ref tool, .. } if tool == "type-check"));
        assert!(handler.has_errors());
    }

    #[test]
    fn test_stage_failure_is_reported_per_file() {
        let handler = CollectingDiagnosticHandler::new();
        report_stage_failure(&handler, "syntax-lower", "src/a.js", "Unexpected token");
        report_stage_failure(&handler, "syntax-lower", "src/b.js", "Unexpected token");

        let files: Vec<_> = handler
            .get_diagnostics()
            .into_iter()
            .filter_map(|d| d.file)
            .collect();
        assert_eq!(files, vec!["src/a.js", "src/b.js"]);
    }
}

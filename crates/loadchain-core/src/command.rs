//! Auxiliary commands.
//!
//! The only command loadchain contributes is a fallback `lint`, and only
//! when no richer lint integration is installed.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info};

use crate::errors::Result;

/// Name of the fallback lint command
pub const LINT_COMMAND: &str = "lint";

/// One row of a command's options table, e.g. `--format [formatter]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionSpec {
    pub flag: String,
    pub help: String,
}

impl OptionSpec {
    pub fn new(flag: &str, help: &str) -> Self {
        Self {
            flag: flag.to_string(),
            help: help.to_string(),
        }
    }

    /// Flag name without dashes or value placeholder: `format`
    pub fn long(&self) -> &str {
        let name = self.flag.split_whitespace().next().unwrap_or("");
        name.trim_start_matches('-')
    }

    /// Placeholder of a value-taking flag: `formatter`
    pub fn value_name(&self) -> Option<&str> {
        self.flag
            .split_whitespace()
            .nth(1)
            .map(|v| v.trim_matches(['[', ']', '<', '>']))
    }

    /// `[value]` may be omitted on the command line
    pub fn value_is_optional(&self) -> bool {
        self.flag
            .split_whitespace()
            .nth(1)
            .is_some_and(|v| v.starts_with('['))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandSpec {
    pub name: String,
    pub description: String,
    pub usage: String,
    pub options: Vec<OptionSpec>,
}

impl CommandSpec {
    pub fn option(&self, long: &str) -> Option<&OptionSpec> {
        self.options.iter().find(|o| o.long() == long)
    }
}

pub type CommandHandler = Box<dyn Fn(&[String]) -> Result<()> + Send + Sync>;

/// Host accepting command registrations
pub trait CommandHost {
    fn register_command(&mut self, spec: CommandSpec, handler: CommandHandler);
}

/// Registered commands, in registration order
#[derive(Default)]
pub struct CommandTable {
    commands: IndexMap<String, (CommandSpec, CommandHandler)>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    pub fn spec(&self, name: &str) -> Option<&CommandSpec> {
        self.commands.get(name).map(|(spec, _)| spec)
    }

    pub fn specs(&self) -> impl Iterator<Item = &CommandSpec> {
        self.commands.values().map(|(spec, _)| spec)
    }

    /// Run a registered command; `None` when no command has that name
    pub fn run(&self, name: &str, args: &[String]) -> Option<Result<()>> {
        self.commands.get(name).map(|(_, handler)| handler(args))
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl CommandHost for CommandTable {
    fn register_command(&mut self, spec: CommandSpec, handler: CommandHandler) {
        debug!("Registering command '{}'", spec.name);
        self.commands.insert(spec.name.clone(), (spec, handler));
    }
}

/// Run `register` unless a richer lint integration is already active.
///
/// Returns whether `register` ran.
pub fn register_if_absent<F: FnOnce()>(has_rich_lint_integration: bool, register: F) -> bool {
    if has_rich_lint_integration {
        info!("Lint integration already active; skipping fallback lint command");
        return false;
    }
    register();
    true
}

/// The fallback lint command
pub fn lint_command() -> CommandSpec {
    CommandSpec {
        name: LINT_COMMAND.to_string(),
        description: "lint source files with TSLint".to_string(),
        usage: "loadchain lint [options] [...files]".to_string(),
        options: vec![
            OptionSpec::new("--format [formatter]", "specify formatter (default: codeFrame)"),
            OptionSpec::new("--no-fix", "do not fix errors"),
            OptionSpec::new("--formatters-dir [dir]", "formatter directory"),
            OptionSpec::new("--rules-dir [dir]", "rules directory"),
        ],
    }
}

/// Register the fallback lint command on `host` unless a richer
/// integration is installed
pub fn register_lint_fallback(
    host: &mut dyn CommandHost,
    has_rich_lint_integration: bool,
    handler: CommandHandler,
) -> bool {
    register_if_absent(has_rich_lint_integration, || {
        host.register_command(lint_command(), handler)
    })
}

/// Parsed arguments of the lint command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintArgs {
    pub format: String,
    pub fix: bool,
    pub formatters_dir: Option<String>,
    pub rules_dir: Option<String>,
    pub files: Vec<String>,
}

impl Default for LintArgs {
    fn default() -> Self {
        Self {
            format: "codeFrame".to_string(),
            fix: true,
            formatters_dir: None,
            rules_dir: None,
            files: Vec::new(),
        }
    }
}

/// Command line for the external linter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintInvocation {
    pub program: String,
    pub args: Vec<String>,
}

impl LintInvocation {
    /// Translate lint arguments for `program`.
    ///
    /// With no files the default source globs are linted.
    pub fn new(program: &str, lint: &LintArgs) -> Self {
        let mut args = vec!["--format".to_string(), lint.format.clone()];
        if lint.fix {
            args.push("--fix".to_string());
        }
        if let Some(dir) = &lint.formatters_dir {
            args.push("--formatters-dir".to_string());
            args.push(dir.clone());
        }
        if let Some(dir) = &lint.rules_dir {
            args.push("--rules-dir".to_string());
            args.push(dir.clone());
        }
        if lint.files.is_empty() {
            args.extend(
                ["src/**/*.ts", "src/**/*.tsx", "tests/**/*.ts", "tests/**/*.tsx"]
                    .into_iter()
                    .map(String::from),
            );
        } else {
            args.extend(lint.files.iter().cloned());
        }
        Self {
            program: program.to_string(),
            args,
        }
    }
}

use anyhow::Context;
use clap::{Arg, ArgAction, Parser, Subcommand, ValueEnum};
use loadchain_core::cache::DiskCacheStore;
use loadchain_core::chain::FilePlan;
use loadchain_core::command::{CommandSpec, CommandTable, LintArgs, LintInvocation};
use loadchain_core::composer::{Composer, Composition};
use loadchain_core::config::{BuildEnv, ComposerConfig};
use loadchain_core::diagnostics::{report_stage_failure, ConsoleDiagnosticHandler, DiagnosticHandler};
use loadchain_core::errors::ComposeError;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Configuration files looked up in the current directory, in order
const DEFAULT_CONFIG_FILES: [&str; 3] = ["loadchain.yaml", "loadchain.yml", "loadchain.json"];

/// loadchain - composes the transformation stages a bundler runs per file
#[derive(Parser, Debug)]
#[command(name = "loadchain")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to loadchain.yaml or loadchain.json
    #[arg(short, long, value_name = "FILE", global = true)]
    project: Option<PathBuf>,

    /// Build mode. Defaults to NODE_ENV.
    #[arg(long, value_enum, value_name = "MODE", global = true)]
    mode: Option<Mode>,

    /// Build the modern-browser bundle
    #[arg(long, global = true)]
    modern: bool,

    /// Test mode: skip side-channel checkers
    #[arg(long, global = true)]
    test: bool,

    /// Leave out the cache-lookup stage
    #[arg(long, global = true)]
    no_cache: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Development,
    Production,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize a loadchain.yaml in the current directory
    Init,

    /// Print the composed rules as JSON
    Compose,

    /// Show which stages apply to the given files
    Check {
        #[arg(value_name = "FILE", required = true)]
        files: Vec<String>,
    },

    /// Classify every source file under a directory
    Plan {
        #[arg(value_name = "DIR", default_value = "src")]
        dir: PathBuf,
    },

    /// Commands registered by integrations, e.g. `lint`
    #[command(external_subcommand)]
    External(Vec<String>),
}

fn main() -> anyhow::Result<()> {
    // Set RUST_LOG=debug for detailed logs
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Command::Init = cli.command {
        return init_project();
    }

    let config = load_config(&cli)?;
    let env = build_env(&cli);
    debug!("Build environment: {:?}", env);

    let composer = Composer::new(config, env)
        .context("Invalid loadchain configuration")?
        .with_cache(!cli.no_cache);

    match &cli.command {
        Command::Init => Ok(()),
        Command::Compose => {
            let composition = composer.compose()?;
            println!("{}", serde_json::to_string_pretty(&composition)?);
            Ok(())
        }
        Command::Check { files } => {
            let composition = composer.compose()?;
            check_files(&composition, files);
            Ok(())
        }
        Command::Plan { dir } => plan_directory(&composer, dir),
        Command::External(args) => run_registered(&composer, args),
    }
}

/// Write a default configuration file
fn init_project() -> anyhow::Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILES[0]);
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }

    ComposerConfig::init_file(path)?;
    println!("Created {}", path.display());
    Ok(())
}

/// Load configuration from `--project` or the first default file present
fn load_config(cli: &Cli) -> anyhow::Result<ComposerConfig> {
    if let Some(path) = &cli.project {
        return ComposerConfig::from_file(path)
            .with_context(|| format!("Failed to load config file {}", path.display()));
    }

    for name in DEFAULT_CONFIG_FILES {
        let path = Path::new(name);
        if path.exists() {
            info!("Using configuration from {}", name);
            return ComposerConfig::from_file(path)
                .with_context(|| format!("Failed to load {}", name));
        }
    }

    Ok(ComposerConfig::default())
}

/// Process environment, overridden by command-line flags
fn build_env(cli: &Cli) -> BuildEnv {
    let mut env = BuildEnv::from_vars(|name| std::env::var(name).ok());
    if let Some(mode) = cli.mode {
        env.production = mode == Mode::Production;
    }
    env.modern |= cli.modern;
    env.test |= cli.test;
    env
}

fn check_files(composition: &Composition, files: &[String]) {
    for file in files {
        match composition.chain_for(file) {
            None => println!("{}: no rule", file),
            Some(chain) => {
                let stages = chain.stages_for(file);
                if stages.is_empty() {
                    println!("{}: skipped ({})", file, chain.rule());
                } else {
                    let names: Vec<&str> = stages.iter().map(|s| s.name()).collect();
                    println!("{}: {} -> {}", file, chain.rule(), names.join(", "));
                }
            }
        }
    }
}

fn plan_directory(composer: &Composer, dir: &Path) -> anyhow::Result<()> {
    let composition = composer.compose()?;
    let project_root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let store = DiskCacheStore::new(&project_root, Path::new(&composer.config().cache.directory));
    let handler = ConsoleDiagnosticHandler::new(true);

    let files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| composition.chain_for(&path.to_string_lossy()).is_some())
        .collect();

    // Worker count is fixed before the first file is planned
    let parallel = composer.parallel();
    let mut pool = rayon::ThreadPoolBuilder::new();
    if !parallel.enabled {
        pool = pool.num_threads(1);
    } else if let Some(workers) = parallel.worker_count {
        pool = pool.num_threads(workers);
    }
    let pool = pool.build().context("Failed to start worker pool")?;
    info!("Planning {} file(s) on {} worker(s)", files.len(), pool.current_num_threads());

    let plans: Vec<(PathBuf, Option<FilePlan>)> = pool.install(|| {
        files
            .par_iter()
            .map(|file| {
                let path = file.to_string_lossy();
                let plan = composition.chain_for(&path).and_then(|chain| {
                    match chain.plan(file, &store) {
                        Ok(plan) => Some(plan),
                        Err(e) => {
                            report_stage_failure(&handler, "cache-lookup", &path, &e.to_string());
                            None
                        }
                    }
                });
                (file.clone(), plan)
            })
            .collect()
    });

    let (mut run, mut cached, mut skipped) = (0, 0, 0);
    for (file, plan) in &plans {
        match plan {
            Some(FilePlan::Run { stages }) => {
                run += 1;
                println!("{}: {}", file.display(), stages.join(", "));
            }
            Some(FilePlan::CacheHit { stage }) => {
                cached += 1;
                println!("{}: cached ({})", file.display(), stage);
            }
            Some(FilePlan::Skipped) => {
                skipped += 1;
                println!("{}: skipped", file.display());
            }
            None => {}
        }
    }

    println!(
        "{} file(s): {} transformed, {} cached, {} skipped, {} failed",
        plans.len(),
        run,
        cached,
        skipped,
        handler.error_count()
    );
    Ok(())
}

/// Dispatch a command registered by an integration
fn run_registered(composer: &Composer, args: &[String]) -> anyhow::Result<()> {
    let Some((name, rest)) = args.split_first() else {
        anyhow::bail!("No command given. Use --help for usage information.");
    };

    let mut table = CommandTable::new();
    let program = composer.config().lint.program.clone();
    composer.register_commands(&mut table, Box::new(move |args| run_lint(&program, args)));

    match table.run(name, rest) {
        Some(result) => result.with_context(|| format!("{} failed", name)),
        None => {
            let available: Vec<&str> = table.specs().map(|spec| spec.name.as_str()).collect();
            if available.is_empty() {
                anyhow::bail!("unknown command '{}'", name);
            }
            anyhow::bail!(
                "unknown command '{}' (available: {})",
                name,
                available.join(", ")
            )
        }
    }
}

/// Build a clap parser from a registered command's options table
fn command_parser(spec: &CommandSpec) -> clap::Command {
    let mut command = clap::Command::new(spec.name.clone())
        .about(spec.description.clone())
        .override_usage(spec.usage.clone());

    for option in &spec.options {
        let arg = Arg::new(option.long().to_string())
            .long(option.long().to_string())
            .help(option.help.clone());
        let arg = match option.value_name() {
            Some(value) => arg.value_name(value.to_string()).action(ArgAction::Set),
            None => arg.action(ArgAction::SetTrue),
        };
        // `[value]` may be left out, `<value>` may not
        let arg = if option.value_is_optional() {
            arg.num_args(0..=1)
        } else {
            arg
        };
        command = command.arg(arg);
    }

    command.arg(
        Arg::new("files")
            .value_name("FILE")
            .num_args(0..)
            .action(ArgAction::Append),
    )
}

fn parse_lint_args(spec: &CommandSpec, args: &[String]) -> Result<Option<LintArgs>, ComposeError> {
    let argv = std::iter::once(spec.name.clone()).chain(args.iter().cloned());
    let matches = match command_parser(spec).try_get_matches_from(argv) {
        Ok(matches) => matches,
        Err(e) if matches!(e.kind(), clap::error::ErrorKind::DisplayHelp) => {
            print!("{}", e.render());
            return Ok(None);
        }
        Err(e) => return Err(ComposeError::invalid(e.to_string())),
    };

    let defaults = LintArgs::default();
    Ok(Some(LintArgs {
        format: matches
            .get_one::<String>("format")
            .cloned()
            .unwrap_or(defaults.format),
        fix: !matches.get_flag("no-fix"),
        formatters_dir: matches.get_one::<String>("formatters-dir").cloned(),
        rules_dir: matches.get_one::<String>("rules-dir").cloned(),
        files: matches
            .get_many::<String>("files")
            .map(|files| files.cloned().collect())
            .unwrap_or_default(),
    }))
}

fn run_lint(program: &str, args: &[String]) -> Result<(), ComposeError> {
    let spec = loadchain_core::command::lint_command();
    let Some(lint_args) = parse_lint_args(&spec, args)? else {
        return Ok(());
    };

    let invocation = LintInvocation::new(program, &lint_args);
    debug!("Running {} {:?}", invocation.program, invocation.args);

    let status = std::process::Command::new(&invocation.program)
        .args(&invocation.args)
        .status()
        .map_err(|e| ComposeError::upstream(program, format!("could not be started: {}", e)))?;

    if !status.success() {
        return Err(ComposeError::upstream(program, format!("exited with {}", status)));
    }
    Ok(())
}

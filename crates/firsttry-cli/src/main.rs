//! FirstTry - local quality gate CLI
//!
//! The `firsttry` command answers one question: is the tree healthy?
//!
//! ## Commands
//!
//! - `run`: the full pipeline (provision, lint, format, typecheck, test, delegate)
//! - `delegate`: only the secondary validator
//! - `test`: only this codebase's tests
//! - `plan`: print the steps without running them
//! - `doctor`: check which tools are reachable
//! - `dev`: start the local development server
//! - `install-hooks`: run `test` before each commit and `run` before each push

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};

use firsttry_core::exec::{CommandExecutor, ProcessExecutor};
use firsttry_core::{
    build_plan, build_subset, exit_codes, git, install_hooks, plan_digest, report, run_doctor, telemetry,
    BuiltinStep, CancelToken, ConsoleProgress, ExecError, GateConfig, GateError, Invocation,
    ModeConfig, Orchestrator, PathProbe, Step, StepRunner,
};

#[derive(Parser, Debug)]
#[command(name = "firsttry")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Local quality gate: one verdict for lint, format, types, tests and the delegate validator", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Repository root; firsttry.toml is read from here
    #[arg(short = 'C', long = "dir", global = true, default_value = ".")]
    dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the full gate pipeline
    Run {
        /// Let the linter fix what it can (same as AUTOFIX=1)
        #[arg(long)]
        autofix: bool,

        /// Enforce the coverage threshold on the test step
        #[arg(long)]
        strict: bool,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Run only the delegate validator
    Delegate {
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Run only the test step
    Test {
        /// Enforce the coverage threshold
        #[arg(long)]
        strict: bool,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Print the ordered steps without running anything
    Plan {
        /// Show the autofix variant
        #[arg(long)]
        autofix: bool,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that every tool the plan needs is reachable
    Doctor,

    /// Start the development server with the dev feature flag set
    Dev,

    /// Install git pre-commit and pre-push hooks that call firsttry
    InstallHooks {
        /// Replace hooks that were not written by firsttry
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug, Default)]
struct OutputArgs {
    /// Print the run report as JSON on stdout (progress moves to stderr)
    #[arg(long)]
    json: bool,

    /// Also write the JSON run report to this file
    #[arg(long)]
    report: Option<PathBuf>,
}

/// Resolved repository, configuration and mode for one invocation.
struct Workspace {
    root: PathBuf,
    config: GateConfig,
    mode: ModeConfig,
}

impl Workspace {
    fn load(dir: &Path, autofix: bool, strict: bool) -> Result<Self> {
        let root = resolve_root(dir)?;

        let mode = ModeConfig::resolve()?.or_autofix(autofix);
        let mut config = GateConfig::load(&root).context("Failed to load gate configuration")?;
        if strict {
            config.coverage.strict = true;
        }

        info!(root = ?root, mode = mode.label(), strict = config.coverage.strict, "Workspace loaded");
        Ok(Self { root, config, mode })
    }

    fn plan(&self) -> Result<Vec<Step>> {
        Ok(build_plan(&self.config, self.mode, &self.root)?)
    }

    fn subset(&self, only: &[BuiltinStep]) -> Result<Vec<Step>> {
        Ok(build_subset(&self.config, self.mode, &self.root, only)?)
    }
}

fn resolve_root(dir: &Path) -> Result<PathBuf> {
    if !dir.is_dir() {
        return Err(GateError::InvalidConfig(format!("{:?} is not a directory", dir)).into());
    }
    dir.canonicalize()
        .with_context(|| format!("Failed to resolve {:?}", dir))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    telemetry::init_tracing(cli.log_json, telemetry::level_for(cli.verbose));

    match dispatch(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("firsttry: {:#}", e);
            ExitCode::from(error_exit_code(&e))
        }
    }
}

async fn dispatch(cli: Cli) -> Result<u8> {
    match cli.command {
        Commands::Run {
            autofix,
            strict,
            output,
        } => {
            let ws = Workspace::load(&cli.dir, autofix, strict)?;
            let steps = ws.plan()?;
            cmd_run(&ws, &steps, &output).await
        }
        Commands::Delegate { output } => {
            let ws = Workspace::load(&cli.dir, false, false)?;
            let steps = ws.subset(&[BuiltinStep::Delegate])?;
            cmd_run(&ws, &steps, &output).await
        }
        Commands::Test { strict, output } => {
            let ws = Workspace::load(&cli.dir, false, strict)?;
            let steps = ws.subset(&[BuiltinStep::Test])?;
            cmd_run(&ws, &steps, &output).await
        }
        Commands::Plan { autofix, json } => {
            let ws = Workspace::load(&cli.dir, autofix, false)?;
            let steps = ws.plan()?;
            let mut stdout = std::io::stdout();
            cmd_plan(&ws, &steps, json, &mut stdout)?;
            Ok(exit_codes::OK)
        }
        Commands::Doctor => {
            let ws = Workspace::load(&cli.dir, false, false)?;
            cmd_doctor(&ws)
        }
        Commands::Dev => {
            let ws = Workspace::load(&cli.dir, false, false)?;
            cmd_dev(&ws).await
        }
        Commands::InstallHooks { force } => {
            let root = resolve_root(&cli.dir)?;
            let mut stdout = std::io::stdout();
            cmd_install_hooks(&root, force, &mut stdout)
        }
    }
}

/// Configuration problems exit with the usage status; anything else is a
/// plain failure.
fn error_exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<GateError>() {
        Some(e) if e.is_config() => exit_codes::INVALID,
        _ => exit_codes::FAILED,
    }
}

/// Trip `cancel` on Ctrl-C.
fn cancel_on_interrupt(cancel: CancelToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling");
            cancel.cancel();
        }
    });
}

async fn cmd_run(ws: &Workspace, steps: &[Step], output: &OutputArgs) -> Result<u8> {
    let cancel = CancelToken::new();
    cancel_on_interrupt(cancel.clone());

    let runner =
        StepRunner::new(Arc::new(ProcessExecutor)).with_timeout(ws.config.step_timeout());
    let orchestrator = Orchestrator::new(Arc::new(PathProbe::new()), runner).with_cancel(cancel);

    let sink: Box<dyn Write> = if output.json {
        Box::new(std::io::stderr())
    } else {
        Box::new(std::io::stdout())
    };
    let mut progress = ConsoleProgress::new(sink);

    let mut run_report = orchestrator.run(ws.mode, steps, &mut progress).await;
    run_report.git_sha = git::head_sha(&ws.root);

    if let Some(path) = &output.report {
        report::write_json_report(path, &run_report)
            .with_context(|| format!("Failed to write report to {:?}", path))?;
        info!(path = ?path, "Wrote run report");
    }
    if output.json {
        println!("{}", report::to_json(&run_report)?);
    }

    Ok(run_report.exit_code())
}

fn cmd_plan(ws: &Workspace, steps: &[Step], json: bool, out: &mut dyn Write) -> Result<()> {
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(steps)?)?;
        return Ok(());
    }

    writeln!(
        out,
        "Plan: {} steps, {} mode (digest {})",
        steps.len(),
        ws.mode.label(),
        &plan_digest(steps)[..12]
    )?;
    for (i, step) in steps.iter().enumerate() {
        writeln!(
            out,
            "  {}. {:<10} {:<8} {:<8} {}",
            i + 1,
            step.name,
            step.severity.as_str(),
            step.capability.as_deref().unwrap_or("-"),
            step.invocation.command_line()
        )?;
    }
    Ok(())
}

fn cmd_doctor(ws: &Workspace) -> Result<u8> {
    let steps = ws.plan()?;
    let doctor = run_doctor(&steps, &PathProbe::new());
    print!("{}", doctor.render());

    if doctor.ready() {
        Ok(exit_codes::OK)
    } else {
        println!("Some required tools are missing; `firsttry run` will be blocked.");
        Ok(exit_codes::FAILED)
    }
}

fn cmd_install_hooks(root: &Path, force: bool, out: &mut dyn Write) -> Result<u8> {
    let installed = install_hooks(root, force)?;
    writeln!(out, "Installed Git hooks:")?;
    for path in &installed {
        writeln!(out, "  {}", path.display())?;
    }
    Ok(exit_codes::OK)
}

/// Development server invocation: the configured command with the feature
/// flag variable set, run from the repository root.
fn dev_invocation(ws: &Workspace) -> Result<Invocation> {
    let dev = &ws.config.dev;
    let invocation = Invocation::from_argv(&dev.command)
        .ok_or_else(|| GateError::EmptyCommand("dev".to_string()))?
        .with_env(dev.flag_env.clone(), dev.flag_value.clone())
        .with_cwd(ws.root.clone());
    Ok(invocation)
}

async fn cmd_dev(ws: &Workspace) -> Result<u8> {
    let invocation = dev_invocation(ws)?;
    println!(
        "==> dev: {}={} {}",
        ws.config.dev.flag_env,
        ws.config.dev.flag_value,
        invocation.command_line()
    );

    let cancel = CancelToken::new();
    cancel_on_interrupt(cancel.clone());

    match ProcessExecutor.run(&invocation, None, &cancel).await {
        Ok(exit) => Ok(exit
            .code
            .and_then(|c| u8::try_from(c).ok())
            .unwrap_or(exit_codes::FAILED)),
        Err(ExecError::Cancelled) => Ok(exit_codes::CANCELLED),
        Err(e) => Err(e).context("Failed to start development server"),
    }
}

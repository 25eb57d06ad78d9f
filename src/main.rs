use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

use dtrust_deploy::artifact::{ArtifactRegistry, BuildDirRegistry, InMemoryRegistry};
use dtrust_deploy::config::{ether_to_wei, parse_address, Config};
use dtrust_deploy::core::{presets, DeploymentPlan, RunReport};
use dtrust_deploy::deployer::LocalChain;
use dtrust_deploy::{
    dlog, dlog_error, dlog_warn, AddressLog, Error, Result, Sequencer, SequencerEvent,
};

/// Deploy the DTRUST contract suite in dependency order
#[derive(Parser, Debug)]
#[command(name = "dtrust-deploy")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    DTRUST_DEBUG=1     Enable debug logging (alternative to --debug)\n    DTRUST_LOG=<lvl>   Set the log level explicitly (error|warn|info|debug|trace)")]
pub struct Cli {
    /// Enable debug logging (writes to ~/.dtrust/deploy.log)
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Deploy a plan to the local chain and save the address log
    Run {
        /// Preset name or path to a .toml plan file
        #[arg(short, long)]
        plan: Option<String>,

        /// Manager address substituted for $manager
        #[arg(short, long)]
        manager: Option<String>,

        /// Directory of compiled artifacts (<Contract>.json)
        #[arg(short, long)]
        artifacts: Option<PathBuf>,

        /// Also write the address log to this file
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Confirmation delay per deployment, in milliseconds
        #[arg(long)]
        block_time_ms: Option<u64>,

        /// Starting deployer balance in ether (fresh chains only)
        #[arg(long)]
        balance: Option<u64>,
    },

    /// Check a plan and print it in deployment order
    Validate {
        /// Preset name or path to a .toml plan file
        #[arg(short, long)]
        plan: Option<String>,

        /// Manager address substituted for $manager
        #[arg(short, long)]
        manager: Option<String>,
    },

    /// List the built-in plans
    Presets,

    /// Print a saved address log
    Show {
        /// Run ID or prefix (uses latest if not specified)
        run_id: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    dtrust_deploy::log::init_with_debug(cli.debug);
    dlog!("dtrust-deploy starting: {:?}", cli.command);
    if dtrust_deploy::log::is_debug() {
        if let Some(path) = dtrust_deploy::log::log_path() {
            eprintln!("Debug log: {}", path.display());
        }
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            dlog_error!("{}", e);
            eprintln!("{}", error_message(&e));
            ExitCode::FAILURE
        }
    }
}

/// Display form only; the address log already lists confirmed contracts.
fn error_message(error: &Error) -> String {
    format!("Error: {}", error)
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;

    match cli.command {
        Command::Run {
            plan,
            manager,
            artifacts,
            out,
            block_time_ms,
            balance,
        } => run_plan(
            &config,
            RunOptions {
                plan,
                manager,
                artifacts,
                out,
                block_time_ms,
                balance,
            },
        ),
        Command::Validate { plan, manager } => run_validate(&config, plan, manager),
        Command::Presets => run_presets(),
        Command::Show { run_id } => run_show(&config, run_id),
    }
}

struct RunOptions {
    plan: Option<String>,
    manager: Option<String>,
    artifacts: Option<PathBuf>,
    out: Option<PathBuf>,
    block_time_ms: Option<u64>,
    balance: Option<u64>,
}

fn build_plan(config: &Config, plan: Option<String>, manager: Option<String>) -> Result<DeploymentPlan> {
    let manager = match manager {
        Some(manager) => parse_address(&manager)?,
        None => config.manager_address()?,
    };
    let plan = plan.unwrap_or_else(|| config.effective_plan().to_string());
    DeploymentPlan::from_name_or_path(&plan, manager)
}

fn build_registry(
    config: &Config,
    artifacts: Option<PathBuf>,
    plan: &DeploymentPlan,
) -> Result<Arc<dyn ArtifactRegistry>> {
    match artifacts.or_else(|| config.artifacts_dir()) {
        Some(dir) => {
            dlog!("Reading artifacts from {}", dir.display());
            Ok(Arc::new(BuildDirRegistry::new(&dir)?))
        }
        None => {
            println!("No artifacts directory configured, deploying placeholder bytecode");
            Ok(Arc::new(InMemoryRegistry::with_placeholders(
                plan.tasks.iter().map(|t| t.contract.as_str()),
            )))
        }
    }
}

/// Execute a plan against the persisted local chain.
fn run_plan(config: &Config, options: RunOptions) -> Result<()> {
    let plan = build_plan(config, options.plan, options.manager)?;
    let registry = build_registry(config, options.artifacts, &plan)?;

    let mut chain_config = config.chain_config()?;
    if let Some(ms) = options.block_time_ms {
        chain_config.block_time = Duration::from_millis(ms);
    }
    if let Some(ether) = options.balance {
        chain_config.balance = ether_to_wei(ether)?;
    }
    let chain_path = Config::chain_state_path()?;
    let chain = Arc::new(LocalChain::load_or_new(&chain_path, chain_config)?);

    println!("Deploying plan {} ({} tasks)", plan.name, plan.len());
    println!("Deployer: {}", chain.deployer());
    println!();

    let rt = tokio::runtime::Runtime::new()?;
    let (event_tx, mut event_rx) = mpsc::channel(32);
    let sequencer = Sequencer::new(registry, chain.clone()).with_events(event_tx);

    let (report, ()) = rt.block_on(async {
        let run = async {
            // The sequencer owns the sender; dropping it ends the printer.
            let sequencer = sequencer;
            sequencer.execute(&plan).await
        };
        let printer = async {
            while let Some(event) = event_rx.recv().await {
                print_event(&event);
            }
        };
        tokio::join!(run, printer)
    });

    let snapshot = rt.block_on(chain.snapshot());
    if let Err(e) = snapshot.save(&chain_path) {
        dlog_warn!("Failed to save chain snapshot: {}", e);
    }

    let report = report?;
    save_address_log(config, &report, options.out.as_deref())?;
    report.into_result().map(|_| ())
}

fn print_event(event: &SequencerEvent) {
    match event {
        SequencerEvent::TaskSubmitted { .. } => {}
        SequencerEvent::TaskConfirmed { name, address, .. } => {
            println!("  {} deployed at {}", name, address);
        }
        SequencerEvent::TaskFailed {
            position,
            name,
            error,
        } => {
            println!("  {} (task #{}) failed: {}", name, position, error);
        }
        SequencerEvent::RunComplete {
            run_id,
            confirmed,
            success,
        } => {
            println!();
            if *success {
                println!("Run {} complete: {} contracts deployed", run_id.short(), confirmed);
            } else {
                println!(
                    "Run {} stopped after {} confirmed deployments",
                    run_id.short(),
                    confirmed
                );
            }
        }
    }
}

/// Save the confirmed part of a run, complete or not.
fn save_address_log(config: &Config, report: &RunReport, out: Option<&std::path::Path>) -> Result<()> {
    let mut log = AddressLog::new(report.run_id, &report.plan, &report.deployed);
    if let Some((position, _)) = &report.failure {
        if let Some(record) = report.records.get(*position) {
            log = log.failed_at(&record.name);
        }
    }

    let path = log.save_in(&config.runs_dir()?)?;
    println!("Address log: {}", path.display());
    if let Some(out) = out {
        log.save(out)?;
        println!("Address log: {}", out.display());
    }
    Ok(())
}

fn run_validate(config: &Config, plan: Option<String>, manager: Option<String>) -> Result<()> {
    let plan = build_plan(config, plan, manager)?;
    let graph = plan.validate()?;

    println!(
        "Plan {} is valid: {} tasks, {} dependencies",
        plan.name,
        graph.task_count(),
        graph.dependency_count()
    );
    println!();
    for (position, task) in plan.tasks.iter().enumerate() {
        let args = task
            .args
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        if task.contract == task.name {
            println!("  {}. {}({})", position, task.name, args);
        } else {
            println!("  {}. {} = {}({})", position, task.name, task.contract, args);
        }
        for (dependency, kind) in graph.dependencies_of(&task.name) {
            println!("       after {} ({})", dependency, kind);
        }
    }
    Ok(())
}

fn run_presets() -> Result<()> {
    println!("Built-in plans:");
    for preset in presets::PRESETS {
        let marker = if preset.name == presets::DEFAULT_PRESET {
            " (default)"
        } else {
            ""
        };
        println!("  {:12} {}{}", preset.name, preset.description, marker);
    }
    Ok(())
}

fn run_show(config: &Config, run_id: Option<String>) -> Result<()> {
    let runs_dir = config.runs_dir()?;
    let log = match run_id {
        Some(id) => AddressLog::find(&runs_dir, &id)?,
        None => AddressLog::latest(&runs_dir)?,
    };

    println!("Run:     {}", log.run_id);
    println!("Plan:    {}", log.plan);
    println!("Created: {}", log.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    if let Some(task) = &log.failed_task {
        println!("Status:  stopped at {}", task);
    }
    println!();
    for line in log.lines() {
        println!("  {}", line);
    }
    Ok(())
}

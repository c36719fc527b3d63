//! converge binary: restart confirmation and forced revision rollout for the
//! control plane of a node restored after a rollback.

use anyhow::Context;
use clap::{Parser, Subcommand};
use converge::{
    Baseline, ClusterProbe, LogProgress, ProgressReporter, RecoveryConfig, RecoveryPlan,
    RecoveryRunner, StderrProgress, TokioCommandRunner,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "converge",
    version,
    about = "Confirm control-plane restart and revision rollout after a restore"
)]
struct Args {
    #[arg(short = 'c', long = "config", help = "Config file (default: ./converge.toml or /etc/converge/converge.toml)")]
    config: Option<PathBuf>,

    #[arg(short = 'q', long = "quiet", help = "Do not print progress dots")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the current container id for a name (empty if none)
    Identity { name: String },

    /// Record identities of all configured containers before a runtime restart
    Capture {
        #[arg(short = 'o', long = "output")]
        output: PathBuf,
    },

    /// Wait until a container runs under a new identity
    WaitRestart {
        name: String,
        #[arg(
            long = "prior",
            help = "Container id recorded before the restart (pass \"\" if none existed)"
        )]
        prior: String,
        #[arg(long = "timeout", help = "Timeout in seconds")]
        timeout: Option<u64>,
    },

    /// Force a new revision for an operator and wait until it is applied
    Reconcile {
        name: String,
        #[arg(long = "timeout", help = "Timeout in seconds")]
        timeout: Option<u64>,
    },

    /// Run the full configured plan
    Run {
        #[arg(long = "baseline", help = "Baseline written by `capture`")]
        baseline: PathBuf,
        #[arg(long = "json", help = "Print the report as JSON")]
        json: bool,
    },
}

fn main() {
    // Default to info level if RUST_LOG not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to start tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = rt.block_on(run(args)) {
        tracing::error!("converge failed: {:#}", e);
        eprintln!("converge failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = RecoveryConfig::load(args.config.as_deref()).context("loading configuration")?;

    let progress: Arc<dyn ProgressReporter> = if args.quiet {
        Arc::new(LogProgress)
    } else {
        Arc::new(StderrProgress::new())
    };
    let runner = Arc::new(TokioCommandRunner::new(config.command_timeout()));
    let cluster = Arc::new(ClusterProbe::from_config(&config, runner));
    let recovery = RecoveryRunner::new(
        cluster.clone(),
        cluster,
        progress,
        config.poll_interval(),
    );
    let timeout_or_default =
        |timeout: Option<u64>| timeout.map(Duration::from_secs).unwrap_or(config.default_timeout());

    match args.command {
        Command::Identity { name } => {
            let identity = recovery
                .watcher()
                .capture_identity(&name)
                .await
                .with_context(|| format!("reading identity of {}", name))?;
            println!("{}", identity.instance_id_or_empty());
        }

        Command::Capture { output } => {
            let plan = RecoveryPlan::from_config(&config);
            let baseline = recovery
                .capture_baseline(&plan)
                .await
                .context("capturing baseline")?;
            baseline
                .save(&output)
                .with_context(|| format!("writing baseline to {}", output.display()))?;
            info!(
                "Baseline for {} containers written to {}",
                baseline.identities.len(),
                output.display()
            );
        }

        Command::WaitRestart {
            name,
            prior,
            timeout,
        } => {
            let identity = recovery
                .watcher()
                .wait_for_restart(&name, &prior, timeout_or_default(timeout))
                .await?;
            println!("{}", identity.instance_id_or_empty());
        }

        Command::Reconcile { name, timeout } => {
            let revision = recovery
                .reconciler()
                .trigger_and_confirm(&name, timeout_or_default(timeout))
                .await?;
            println!("{}", revision);
        }

        Command::Run {
            baseline: baseline_path,
            json,
        } => {
            let plan = RecoveryPlan::from_config(&config);
            let baseline = Baseline::load(&baseline_path)
                .with_context(|| format!("reading baseline {}", baseline_path.display()))?;

            let outcome = recovery.run(&plan, &baseline).await;
            let report = match &outcome {
                Ok(report) => report,
                Err(e) => &e.report,
            };
            if json {
                println!("{}", serde_json::to_string_pretty(report)?);
            } else {
                for target in &report.targets {
                    println!(
                        "{:<8} {:<28} {:<10} {}s{}",
                        match target.stage {
                            converge::Stage::Restart => "restart",
                            converge::Stage::Revision => "revision",
                        },
                        target.name,
                        if target.converged { "ok" } else { "FAILED" },
                        target.elapsed_secs,
                        target
                            .applied_revision
                            .map(|r| format!(" (revision {})", r))
                            .unwrap_or_default()
                    );
                }
            }
            outcome?;
        }
    }

    Ok(())
}

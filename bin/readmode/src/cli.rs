//! Contains the CLI for `readmode`.

use std::path::PathBuf;

use clap::{ArgAction, Parser};
use readmode_cluster::{ClusterManager, Fleet};
use readmode_config::HarnessConfig;
use readmode_scenarios::{Outcome, RunReport, RunnerConfig, ScenarioRunner, builtin_suite};
use readmode_sim::{SimChainConfig, SimFault, SimFleet};

/// CLI arguments for the read-mode harness.
#[derive(Parser, Debug)]
#[command(name = "readmode")]
#[command(about = "Checks ledger node read-mode transitions across kill, relaunch and replay")]
pub(crate) struct Cli {
    /// Path to the configuration file (TOML or JSON).
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase logging verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Run against a simulated fleet instead of node processes.
    #[arg(long)]
    pub simulate: bool,

    /// Fault to inject into the simulated fleet. Repeatable.
    #[arg(long, value_name = "FAULT", requires = "simulate")]
    pub inject: Vec<SimFault>,

    /// Fail scenarios whose relaunch failed without a known fault signature.
    #[arg(long)]
    pub strict: bool,

    /// Exit non-zero if any scenario did not pass.
    #[arg(long)]
    pub fail_on_error: bool,

    /// Write the report as JSON to this file.
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Keep node data directories after shutdown.
    #[arg(long)]
    pub keep_data: bool,

    /// Override the node executable from config.
    #[arg(long, value_name = "PATH")]
    pub node_binary: Option<PathBuf>,
}

impl Cli {
    /// Log level used when `RUST_LOG` is not set.
    pub(crate) const fn default_log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// Load the harness configuration, applying CLI overrides.
    pub(crate) fn load_config(&self) -> eyre::Result<HarnessConfig> {
        let mut config = HarnessConfig::load(self.config.as_deref())?;

        // Apply CLI overrides
        if let Some(ref binary) = self.node_binary {
            config.node_binary = binary.clone();
        }
        config.strict |= self.strict;
        config.keep_data |= self.keep_data;

        config.validate()?;
        Ok(config)
    }

    /// Launch the fleet, run the built-in suite and report.
    pub(crate) async fn run(self) -> eyre::Result<()> {
        self.run_until(tokio::signal::ctrl_c()).await
    }

    /// [`Self::run`], abandoning the run when `interrupt` completes first.
    /// Launched nodes are torn down either way.
    async fn run_until(
        self,
        interrupt: impl Future<Output = std::io::Result<()>>,
    ) -> eyre::Result<()> {
        let config = self.load_config()?;
        tracing::debug!(?config, "Full configuration");
        tokio::pin!(interrupt);

        let report = if self.simulate {
            tracing::info!(faults = ?self.inject, "Running against a simulated fleet");
            let mut fleet =
                SimFleet::from_config(&config, SimChainConfig::default(), self.inject.iter().copied())?;
            drive(&mut fleet, &config, &mut interrupt).await
        } else {
            tracing::info!(
                binary = %config.node_binary.display(),
                nodes = config.topology.total_nodes,
                "Launching cluster"
            );
            // Dropping a half-launched cluster kills the nodes it spawned.
            let mut cluster = tokio::select! {
                cluster = ClusterManager::launch(config.clone()) => cluster?,
                signal = &mut interrupt => return Err(interrupted(signal)),
            };
            let report = drive(&mut cluster, &config, &mut interrupt).await;
            cluster.shutdown().await;
            report
        }?;

        println!("{report}");
        if let Some(ref path) = self.report {
            std::fs::write(path, report.to_json()?)?;
            tracing::info!(path = %path.display(), "Wrote report");
        }

        if self.fail_on_error && !report.all_passed() {
            eyre::bail!(
                "{} of {} scenarios did not pass",
                report.results.len() - report.count(Outcome::Pass),
                report.results.len()
            );
        }
        Ok(())
    }
}

/// Let production advance LIB, then run every built-in scenario.
async fn drive<F: Fleet>(
    fleet: &mut F,
    config: &HarnessConfig,
    interrupt: &mut (impl Future<Output = std::io::Result<()>> + Unpin),
) -> eyre::Result<RunReport> {
    let suite = async {
        let warmup = config.timing.warmup();
        tracing::info!(?warmup, "Waiting for production to warm up");
        fleet.settle(warmup).await;
        ScenarioRunner::new(fleet, RunnerConfig::from(config)).run_all(&builtin_suite()).await
    };
    tokio::select! {
        biased;
        signal = interrupt => Err(interrupted(signal)),
        report = suite => Ok(report?),
    }
}

fn interrupted(signal: std::io::Result<()>) -> eyre::Report {
    match signal {
        Ok(()) => {
            tracing::warn!("Interrupted, tearing down");
            eyre::eyre!("interrupted")
        }
        Err(e) => eyre::eyre!("failed to listen for interrupts: {e}"),
    }
}

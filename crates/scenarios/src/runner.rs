//! Scenario execution.

use std::{collections::HashMap, time::Duration};

use readmode_cluster::{ClusterError, Fleet, RelaunchOutcome};
use readmode_config::HarnessConfig;
use readmode_domain::{NodeId, StatusSnapshot};
use tracing::{debug, info, warn};

use crate::{Checkpoint, Outcome, RunReport, Settle, Step, Strictness, TestResult, TestScenario};

/// Timing and policy for a [`ScenarioRunner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Time a relaunched node has to become ready.
    pub relaunch_timeout: Duration,
    /// Wait after production actually stopped.
    pub pause_settle: Duration,
    /// Duration of [`Settle::Replay`].
    pub replay_settle: Duration,
    /// Duration of [`Settle::Production`].
    pub production_settle: Duration,
    /// Treat every scenario as [`Strictness::Strict`].
    pub strict: bool,
}

impl From<&HarnessConfig> for RunnerConfig {
    fn from(config: &HarnessConfig) -> Self {
        let timing = &config.timing;
        Self {
            relaunch_timeout: timing.relaunch_timeout(),
            pause_settle: timing.pause_settle(),
            replay_settle: timing.replay_settle(),
            production_settle: timing.production_settle(),
            strict: config.strict,
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::from(&HarnessConfig::default())
    }
}

/// Errors that stop a suite before it starts.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A scenario targets a node the fleet does not have.
    #[error("scenario {scenario} targets node {node}, but the fleet has {total} nodes")]
    UnknownTarget {
        /// Scenario name.
        scenario: String,
        /// Requested node.
        node: NodeId,
        /// Fleet size.
        total: usize,
    },
}

/// Why a procedure stopped early.
#[derive(Debug)]
enum Interrupt {
    /// A relaunch did not produce a ready node.
    Relaunch { step: String, outcome: RelaunchOutcome },
    /// The fleet reported an error.
    Fleet { step: String, source: ClusterError },
}

/// Drives scenarios against a fleet, one at a time.
#[derive(Debug)]
pub struct ScenarioRunner<'a, F> {
    fleet: &'a mut F,
    config: RunnerConfig,
}

impl<'a, F: Fleet> ScenarioRunner<'a, F> {
    /// Runner over `fleet`.
    pub const fn new(fleet: &'a mut F, config: RunnerConfig) -> Self {
        Self { fleet, config }
    }

    /// Run every scenario in order and collect the results.
    ///
    /// Targets are checked up front; after that, no scenario outcome stops the run.
    pub async fn run_all(&mut self, scenarios: &[TestScenario]) -> Result<RunReport, RunnerError> {
        let total = self.fleet.node_ids().len();
        if let Some(scenario) = scenarios.iter().find(|s| !self.fleet.contains(s.target)) {
            return Err(RunnerError::UnknownTarget {
                scenario: scenario.name.clone(),
                node: scenario.target,
                total,
            });
        }

        let mut report = RunReport::default();
        for scenario in scenarios {
            report.results.push(self.run(scenario).await);
        }
        info!(
            passed = report.count(Outcome::Pass),
            failed = report.count(Outcome::Fail),
            errors = report.count(Outcome::Error),
            "suite finished"
        );
        Ok(report)
    }

    /// Run one scenario: relaunch the target with its baseline flags, run the
    /// procedure, check the expectations, then kill the target.
    pub async fn run(&mut self, scenario: &TestScenario) -> TestResult {
        let started = std::time::Instant::now();
        let name = &scenario.name;
        let target = scenario.target;
        info!(scenario = %name, node = %target, "running scenario");

        let missing = scenario.missing_checkpoints();
        let result = if !missing.is_empty() {
            TestResult::error(name, target, format!("checkpoints never captured: {missing:?}"))
        } else {
            match self.execute(scenario).await {
                Ok(snapshots) => Self::evaluate(scenario, &snapshots),
                Err(interrupt) => self.interrupted(scenario, interrupt),
            }
        };
        self.cleanup(scenario).await;

        match result.outcome {
            Outcome::Pass => info!(scenario = %name, "scenario passed"),
            outcome => warn!(
                scenario = %name,
                %outcome,
                bug = ?result.bug,
                message = %result.message,
                "scenario did not pass"
            ),
        }
        result.with_elapsed(started.elapsed())
    }

    async fn execute(
        &mut self,
        scenario: &TestScenario,
    ) -> Result<HashMap<Checkpoint, StatusSnapshot>, Interrupt> {
        let target = scenario.target;
        let baseline = |source| Interrupt::Fleet { step: "baseline relaunch".into(), source };

        if self.fleet.is_alive(target).map_err(baseline)? {
            self.fleet.kill(target).await.map_err(baseline)?;
        }
        self.fleet.reset_flags(target).map_err(baseline)?;
        let outcome = self
            .fleet
            .relaunch(target, &[], self.config.relaunch_timeout)
            .await
            .map_err(baseline)?;
        if !outcome.is_ready() {
            return Err(Interrupt::Relaunch { step: "baseline relaunch".into(), outcome });
        }

        let mut snapshots = HashMap::new();
        for step in &scenario.procedure {
            debug!(scenario = %scenario.name, %step, "step");
            self.step(target, step, &mut snapshots).await?;
        }
        Ok(snapshots)
    }

    async fn step(
        &mut self,
        target: NodeId,
        step: &Step,
        snapshots: &mut HashMap<Checkpoint, StatusSnapshot>,
    ) -> Result<(), Interrupt> {
        let fleet_error = |source| Interrupt::Fleet { step: step.to_string(), source };
        match step {
            Step::PauseProduction => {
                // LIB only needs time to settle if production actually stopped.
                if self.fleet.pause_production().await.map_err(fleet_error)? {
                    let duration = self.config.pause_settle;
                    self.fleet.settle(duration).await;
                }
            }
            Step::ResumeProduction => {
                self.fleet.resume_production().await.map_err(fleet_error)?;
            }
            Step::Kill => self.fleet.kill(target).await.map_err(fleet_error)?,
            Step::Relaunch(mutations) => {
                let outcome = self
                    .fleet
                    .relaunch(target, mutations, self.config.relaunch_timeout)
                    .await
                    .map_err(fleet_error)?;
                if !outcome.is_ready() {
                    return Err(Interrupt::Relaunch { step: step.to_string(), outcome });
                }
            }
            Step::PurgeReversibleBlocks => {
                self.fleet.purge_reversible_blocks(target).map_err(fleet_error)?;
            }
            Step::Settle(window) => {
                let duration = self.settle_duration(*window);
                self.fleet.settle(duration).await;
            }
            Step::Snapshot(checkpoint) => {
                let snapshot = self.fleet.status(target).await.map_err(fleet_error)?;
                debug!(node = %target, %checkpoint, %snapshot, "captured status");
                snapshots.insert(*checkpoint, snapshot);
            }
        }
        Ok(())
    }

    const fn settle_duration(&self, window: Settle) -> Duration {
        match window {
            Settle::Pause => self.config.pause_settle,
            Settle::Replay => self.config.replay_settle,
            Settle::Production => self.config.production_settle,
            Settle::Fixed(duration) => duration,
        }
    }

    fn evaluate(
        scenario: &TestScenario,
        snapshots: &HashMap<Checkpoint, StatusSnapshot>,
    ) -> TestResult {
        let mut broken = Vec::new();
        for expectation in &scenario.expected {
            let (Some(before), Some(after)) =
                (snapshots.get(&expectation.before), snapshots.get(&expectation.after))
            else {
                return TestResult::error(
                    &scenario.name,
                    scenario.target,
                    format!("{} was not evaluated: missing snapshot", expectation.invariant),
                );
            };
            let verdict = expectation.invariant.check(before, after);
            if !verdict.is_satisfied() {
                broken.push(format!(
                    "{} ({} {before} -> {} {after}): {verdict}",
                    expectation.invariant, expectation.before, expectation.after
                ));
            }
        }
        if broken.is_empty() {
            TestResult::pass(&scenario.name, scenario.target)
        } else {
            TestResult::fail(&scenario.name, scenario.target, None, broken.join("; "))
        }
    }

    fn interrupted(&self, scenario: &TestScenario, interrupt: Interrupt) -> TestResult {
        let (step, outcome) = match interrupt {
            Interrupt::Fleet { step, source } => {
                return TestResult::error(&scenario.name, scenario.target, format!("{step}: {source}"));
            }
            Interrupt::Relaunch { step, outcome } => (step, outcome),
        };
        let target = scenario.target;
        let what = format!("{step}: node {outcome}");

        if let Some(bug) = scenario.known_bug {
            match self.fleet.contains_signature(target, bug.signature()) {
                Ok(true) => {
                    let message =
                        format!("{what}; stderr shows {:?}", bug.signature().pattern);
                    return TestResult::fail(&scenario.name, target, Some(bug), message);
                }
                Ok(false) => {}
                Err(e) => warn!(node = %target, error = %e, "failed to scan stderr"),
            }
        }
        match self.fleet.classify_fault(target) {
            Ok(Some(signature)) => {
                let message = format!("{what}; stderr shows {:?}", signature.pattern);
                return TestResult::fail(&scenario.name, target, Some(signature.bug), message);
            }
            Ok(None) => {}
            Err(e) => {
                let message = format!("{what}; stderr could not be scanned: {e}");
                return TestResult::error(&scenario.name, target, message);
            }
        }

        let message = format!("{what}; no known fault signature in stderr");
        if self.config.strict || scenario.strictness == Strictness::Strict {
            TestResult::fail(&scenario.name, target, None, message)
        } else {
            TestResult::error(&scenario.name, target, message)
        }
    }

    /// Kill the target and restart production if the scenario stopped it.
    async fn cleanup(&mut self, scenario: &TestScenario) {
        if let Err(e) = self.fleet.kill(scenario.target).await {
            warn!(node = %scenario.target, error = %e, "failed to kill scenario target");
        }
        if scenario.pauses_production() {
            if let Err(e) = self.fleet.resume_production().await {
                warn!(error = %e, "failed to resume block production");
            }
        }
    }
}

//! Scenario tests driven against the simulated fleet.

mod runner;

use std::time::Duration;

use readmode_cluster::{ClusterError, Fleet, RelaunchOutcome};
use readmode_config::HarnessConfig;
use readmode_domain::{FaultSignature, FlagMutation, NodeId, ReadMode, StatusSnapshot};
use readmode_sim::{SimChainConfig, SimFault, SimFleet};

use crate::{RunReport, RunnerConfig, ScenarioRunner, TestScenario, builtin_suite};

/// Default eight node fleet with node 0 producing and nodes 4 and 6 irreversible.
fn sim(faults: &[SimFault]) -> SimFleet {
    SimFleet::from_config(&HarnessConfig::default(), SimChainConfig::default(), faults.iter().copied())
        .unwrap()
}

async fn run(fleet: &mut impl Fleet, scenarios: &[TestScenario]) -> RunReport {
    ScenarioRunner::new(fleet, RunnerConfig::default()).run_all(scenarios).await.unwrap()
}

async fn run_builtin(faults: &[SimFault]) -> RunReport {
    run(&mut sim(faults), &builtin_suite()).await
}

/// Wraps a fleet and makes flag-changing relaunches of one node end with a
/// fixed outcome, without the node writing anything to stderr.
struct Unresponsive<F> {
    inner: F,
    node: NodeId,
    outcome: RelaunchOutcome,
}

impl<F: Fleet> Fleet for Unresponsive<F> {
    fn node_ids(&self) -> Vec<NodeId> {
        self.inner.node_ids()
    }

    fn is_alive(&mut self, id: NodeId) -> Result<bool, ClusterError> {
        self.inner.is_alive(id)
    }

    fn read_mode(&self, id: NodeId) -> Result<Option<ReadMode>, ClusterError> {
        self.inner.read_mode(id)
    }

    async fn kill(&mut self, id: NodeId) -> Result<(), ClusterError> {
        self.inner.kill(id).await
    }

    async fn relaunch(
        &mut self,
        id: NodeId,
        mutations: &[FlagMutation],
        timeout: Duration,
    ) -> Result<RelaunchOutcome, ClusterError> {
        if id == self.node && !mutations.is_empty() {
            return Ok(self.outcome);
        }
        self.inner.relaunch(id, mutations, timeout).await
    }

    fn reset_flags(&mut self, id: NodeId) -> Result<(), ClusterError> {
        self.inner.reset_flags(id)
    }

    async fn status(&mut self, id: NodeId) -> Result<StatusSnapshot, ClusterError> {
        self.inner.status(id).await
    }

    fn purge_reversible_blocks(&mut self, id: NodeId) -> Result<(), ClusterError> {
        self.inner.purge_reversible_blocks(id)
    }

    fn contains_signature(
        &self,
        id: NodeId,
        signature: &FaultSignature,
    ) -> Result<bool, ClusterError> {
        self.inner.contains_signature(id, signature)
    }

    async fn pause_production(&mut self) -> Result<bool, ClusterError> {
        self.inner.pause_production().await
    }

    async fn resume_production(&mut self) -> Result<bool, ClusterError> {
        self.inner.resume_production().await
    }

    async fn settle(&mut self, duration: Duration) {
        self.inner.settle(duration).await;
    }
}

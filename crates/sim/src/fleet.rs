//! Simulated fleet.

use std::{collections::BTreeSet, time::Duration};

use readmode_cluster::{
    ClusterError, ControllerError, Fleet, InvalidTransition, Lifecycle, LifecycleEvent,
    ProbeError, RelaunchOutcome,
};
use readmode_config::HarnessConfig;
use readmode_domain::{
    FaultSignature, FlagMutation, FlagSet, KnownBug, NodeId, REPLAY_FLAG, ReadMode, StatusSnapshot,
};
use tracing::{debug, info};

use crate::{SimChainConfig, SimFault, chain::SimChain};

const FIRST_PID: u32 = 10_000;

/// Exit code of a node that aborted on a chain error.
const ABORT_CODE: i32 = 2;

/// One simulated node process and the chain state it keeps on disk.
#[derive(Debug, Clone)]
struct SimNode {
    flags: FlagSet,
    baseline: FlagSet,
    lifecycle: Lifecycle,
    /// Mode of the last launch; the on-disk state follows it.
    running_mode: ReadMode,
    fork_db_head: u64,
    lib: u64,
    /// Subtracted from the reported LIB.
    lib_skew: u64,
    reversible_present: bool,
    stalled: bool,
    /// stderr of every launch, oldest first.
    captures: Vec<Vec<String>>,
}

impl SimNode {
    const fn head(&self) -> u64 {
        match self.running_mode {
            ReadMode::Speculative => self.fork_db_head,
            ReadMode::Irreversible => self.lib,
        }
    }

    fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot::new(self.head(), self.lib.saturating_sub(self.lib_skew), self.fork_db_head)
    }

    fn sync(&mut self, chain: &SimChain) {
        if self.stalled {
            return;
        }
        self.fork_db_head = self.fork_db_head.max(chain.head());
        self.lib = self.lib.max(chain.lib());
    }
}

/// A fleet whose nodes are state machines over a shared simulated chain.
///
/// Time is virtual: [`Fleet::settle`] advances it instantly, producing one
/// block per block interval while any producer node is alive. Relaunches
/// finish immediately. Injected [`SimFault`]s make the nodes misbehave the
/// way the scenarios expect to detect.
#[derive(Debug, Clone)]
pub struct SimFleet {
    nodes: Vec<SimNode>,
    producers: Vec<NodeId>,
    chain: SimChain,
    faults: BTreeSet<SimFault>,
    elapsed: Duration,
    next_pid: u32,
}

impl SimFleet {
    /// Launch a fleet where node `i` starts with `flags[i]` and every node is
    /// synced to the chain's initial head.
    pub fn new(
        flags: Vec<FlagSet>,
        producers: impl IntoIterator<Item = NodeId>,
        chain: SimChainConfig,
        faults: impl IntoIterator<Item = SimFault>,
    ) -> Result<Self, ClusterError> {
        let chain = SimChain::new(chain);
        let mut nodes = Vec::with_capacity(flags.len());
        for (id, flags) in flags.into_iter().enumerate() {
            let running_mode = flags
                .read_mode()
                .map_err(|source| ControllerError::Flags { node: NodeId(id), source })?;
            nodes.push(SimNode {
                baseline: flags.clone(),
                flags,
                lifecycle: Lifecycle::new(),
                running_mode,
                fork_db_head: chain.head(),
                lib: chain.lib(),
                lib_skew: 0,
                reversible_present: false,
                stalled: false,
                captures: Vec::new(),
            });
        }
        let producers = producers.into_iter().filter(|id| id.0 < nodes.len()).collect();
        let mut fleet = Self {
            nodes,
            producers,
            chain,
            faults: faults.into_iter().collect(),
            elapsed: Duration::ZERO,
            next_pid: FIRST_PID,
        };
        for id in 0..fleet.nodes.len() {
            let outcome = fleet.launch(NodeId(id), &[])?;
            if !outcome.is_ready() {
                return Err(ClusterError::Launch { node: NodeId(id), outcome });
            }
        }
        info!(nodes = fleet.nodes.len(), faults = ?fleet.faults, "simulated fleet ready");
        Ok(fleet)
    }

    /// Fleet shaped by a harness configuration.
    pub fn from_config(
        config: &HarnessConfig,
        chain: SimChainConfig,
        faults: impl IntoIterator<Item = SimFault>,
    ) -> Result<Self, ClusterError> {
        config.validate()?;
        let topology = &config.topology;
        let flags = (0..topology.total_nodes)
            .map(|id| topology.extra_flags_for(NodeId(id)))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(flags, topology.producers(), chain, faults)
    }

    /// Injected faults.
    pub const fn faults(&self) -> &BTreeSet<SimFault> {
        &self.faults
    }

    /// Virtual time spent settling.
    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Head of the producing network.
    pub const fn network_head(&self) -> u64 {
        self.chain.head()
    }

    /// LIB of the producing network.
    pub const fn network_lib(&self) -> u64 {
        self.chain.lib()
    }

    /// Whether the node's reversible block database exists.
    pub fn has_reversible_blocks(&self, id: NodeId) -> Result<bool, ClusterError> {
        Ok(self.node(id)?.reversible_present)
    }

    fn node(&self, id: NodeId) -> Result<&SimNode, ClusterError> {
        let total = self.nodes.len();
        self.nodes.get(id.0).ok_or(ClusterError::UnknownNode { node: id, total })
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut SimNode, ClusterError> {
        let total = self.nodes.len();
        self.nodes.get_mut(id.0).ok_or(ClusterError::UnknownNode { node: id, total })
    }

    fn producing(&self) -> bool {
        self.producers.iter().any(|id| self.nodes[id.0].lifecycle.is_alive())
    }

    fn has_fault(&self, fault: SimFault) -> bool {
        self.faults.contains(&fault)
    }

    fn launch(
        &mut self,
        id: NodeId,
        mutations: &[FlagMutation],
    ) -> Result<RelaunchOutcome, ClusterError> {
        let pid = self.next_pid;
        self.next_pid += 1;
        let duplicate_on_replay = self.has_fault(SimFault::DuplicateBlockOnReplay);
        let lib_one_behind = self.has_fault(SimFault::LibOneBehind);
        let fork_db_lost = self.has_fault(SimFault::ForkDbLostOnSwitch);
        let stall = self.has_fault(SimFault::StallAfterSwitch);
        let unlinkable = self.has_fault(SimFault::UnlinkableBlockOnSwitch) && self.producing();
        let chain = self.chain.clone();

        let node = self.node_mut(id)?;
        let from = node.lifecycle.state();
        if !from.can_launch() {
            let source = InvalidTransition { from, event: "spawned" };
            return Err(ControllerError::Lifecycle { node: id, source }.into());
        }
        let mut flags = node.flags.clone();
        for mutation in mutations {
            flags.apply(mutation);
        }
        let mode =
            flags.read_mode().map_err(|source| ControllerError::Flags { node: id, source })?;
        let replay = flags.contains(REPLAY_FLAG);
        node.flags = flags;

        node.lifecycle
            .apply(LifecycleEvent::Spawned(pid))
            .map_err(|source| ControllerError::Lifecycle { node: id, source })?;
        let mut log = vec![format!("info  node {id} starting: {}", node.flags)];
        node.lib_skew = 0;
        node.stalled = false;

        if replay && node.reversible_present {
            if mode == ReadMode::Irreversible && duplicate_on_replay {
                log.push(format!(
                    "error controller.cpp  {} #{}",
                    KnownBug::DuplicateBlock.signature().pattern,
                    node.lib + 1
                ));
                node.captures.push(log);
                node.lifecycle
                    .apply(LifecycleEvent::Exited)
                    .map_err(|source| ControllerError::Lifecycle { node: id, source })?;
                debug!(node = %id, "replay aborted");
                return Ok(RelaunchOutcome::Exited { code: Some(ABORT_CODE) });
            }
        } else if replay {
            // Only irreversible blocks survive a purged replay.
            node.fork_db_head = node.lib;
            if mode == ReadMode::Irreversible && lib_one_behind {
                node.lib_skew = 1;
            }
        }

        if mode != node.running_mode {
            log.push(format!("info  switching read-mode from {} to {mode}", node.running_mode));
            if unlinkable {
                log.push(format!(
                    "error net_plugin.cpp  {} #{}",
                    KnownBug::UnlinkableBlock.signature().pattern,
                    chain.head() + 1
                ));
                node.captures.push(log);
                node.lifecycle
                    .apply(LifecycleEvent::Exited)
                    .map_err(|source| ControllerError::Lifecycle { node: id, source })?;
                debug!(node = %id, "read-mode switch aborted");
                return Ok(RelaunchOutcome::Exited { code: Some(ABORT_CODE) });
            }
            if fork_db_lost {
                node.fork_db_head = node.lib;
                node.stalled = true;
            }
            if stall {
                node.stalled = true;
            }
        }
        node.running_mode = mode;
        node.reversible_present = true;
        node.sync(&chain);
        node.lifecycle
            .apply(LifecycleEvent::BecameReady)
            .map_err(|source| ControllerError::Lifecycle { node: id, source })?;
        log.push(format!("info  node {id} ready: {}", node.snapshot()));
        node.captures.push(log);
        debug!(node = %id, %mode, replay, "simulated node ready");
        Ok(RelaunchOutcome::Ready)
    }

    fn stop(&mut self, id: NodeId) -> Result<bool, ClusterError> {
        let node = self.node_mut(id)?;
        let was_alive = node.lifecycle.is_alive();
        node.lifecycle
            .apply(LifecycleEvent::Killed)
            .map_err(|source| ControllerError::Lifecycle { node: id, source })?;
        Ok(was_alive)
    }
}

impl Fleet for SimFleet {
    fn node_ids(&self) -> Vec<NodeId> {
        (0..self.nodes.len()).map(NodeId).collect()
    }

    fn is_alive(&mut self, id: NodeId) -> Result<bool, ClusterError> {
        Ok(self.node(id)?.lifecycle.is_alive())
    }

    fn read_mode(&self, id: NodeId) -> Result<Option<ReadMode>, ClusterError> {
        Ok(self.node(id)?.flags.read_mode().ok())
    }

    async fn kill(&mut self, id: NodeId) -> Result<(), ClusterError> {
        if self.stop(id)? {
            debug!(node = %id, "simulated node killed");
        }
        Ok(())
    }

    async fn relaunch(
        &mut self,
        id: NodeId,
        mutations: &[FlagMutation],
        _timeout: Duration,
    ) -> Result<RelaunchOutcome, ClusterError> {
        self.launch(id, mutations)
    }

    fn reset_flags(&mut self, id: NodeId) -> Result<(), ClusterError> {
        let node = self.node_mut(id)?;
        node.flags = node.baseline.clone();
        Ok(())
    }

    async fn status(&mut self, id: NodeId) -> Result<StatusSnapshot, ClusterError> {
        let node = self.node(id)?;
        if !node.lifecycle.is_alive() {
            return Err(ProbeError::NodeDown(id).into());
        }
        Ok(node.snapshot())
    }

    fn purge_reversible_blocks(&mut self, id: NodeId) -> Result<(), ClusterError> {
        let node = self.node_mut(id)?;
        if node.lifecycle.is_alive() {
            return Err(ClusterError::NodeRunning(id));
        }
        node.reversible_present = false;
        Ok(())
    }

    fn contains_signature(
        &self,
        id: NodeId,
        signature: &FaultSignature,
    ) -> Result<bool, ClusterError> {
        let latest = self.node(id)?.captures.last();
        Ok(latest.is_some_and(|lines| lines.iter().any(|line| signature.matches(line))))
    }

    async fn pause_production(&mut self) -> Result<bool, ClusterError> {
        let mut changed = false;
        for id in self.producers.clone() {
            changed |= self.stop(id)?;
        }
        Ok(changed)
    }

    async fn resume_production(&mut self) -> Result<bool, ClusterError> {
        let mut changed = false;
        for id in self.producers.clone() {
            if self.node(id)?.lifecycle.is_alive() {
                continue;
            }
            let outcome = self.launch(id, &[])?;
            if !outcome.is_ready() {
                return Err(ClusterError::ProductionResume { node: id, outcome });
            }
            changed = true;
        }
        Ok(changed)
    }

    async fn settle(&mut self, duration: Duration) {
        let producing = self.producing();
        let blocks = self.chain.advance(duration, producing);
        self.elapsed += duration;
        let chain = self.chain.clone();
        for node in self.nodes.iter_mut().filter(|node| node.lifecycle.is_alive()) {
            node.sync(&chain);
        }
        debug!(?duration, blocks, head = chain.head(), "settled");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn fleet(faults: &[SimFault]) -> SimFleet {
        let flags = vec![
            FlagSet::new(),
            FlagSet::new(),
            FlagSet::parse("--read-mode irreversible").unwrap(),
        ];
        SimFleet::new(flags, [NodeId(0)], SimChainConfig::default(), faults.iter().copied())
            .unwrap()
    }

    #[tokio::test]
    async fn test_launch_syncs_every_node() {
        let mut fleet = fleet(&[]);
        let spec = fleet.status(NodeId(1)).await.unwrap();
        assert_eq!((spec.head(), spec.lib(), spec.fork_db_head()), (1050, 1000, 1050));
        let irr = fleet.status(NodeId(2)).await.unwrap();
        assert_eq!((irr.head(), irr.lib(), irr.fork_db_head()), (1000, 1000, 1050));
    }

    #[tokio::test]
    async fn test_production_follows_producers() {
        let mut fleet = fleet(&[]);
        fleet.settle(Duration::from_secs(5)).await;
        assert_eq!(fleet.network_head(), 1060);
        assert_eq!(fleet.status(NodeId(1)).await.unwrap().head(), 1060);

        assert!(fleet.pause_production().await.unwrap());
        assert!(!fleet.pause_production().await.unwrap());
        fleet.settle(Duration::from_secs(5)).await;
        assert_eq!(fleet.network_head(), 1060);

        assert!(fleet.resume_production().await.unwrap());
        assert!(!fleet.resume_production().await.unwrap());
        fleet.settle(Duration::from_secs(1)).await;
        assert_eq!(fleet.network_head(), 1062);
        assert_eq!(fleet.elapsed(), Duration::from_secs(11));
    }

    #[tokio::test]
    async fn test_dead_node_keeps_its_state() {
        let mut fleet = fleet(&[]);
        fleet.kill(NodeId(1)).await.unwrap();
        fleet.kill(NodeId(1)).await.unwrap();
        let err = fleet.status(NodeId(1)).await.unwrap_err();
        assert!(err.is_probe());

        fleet.pause_production().await.unwrap();
        fleet.resume_production().await.unwrap();
        fleet.settle(Duration::from_secs(10)).await;
        assert_eq!(fleet.nodes[1].fork_db_head, 1050);

        fleet.relaunch(NodeId(1), &[], TIMEOUT).await.unwrap();
        assert_eq!(fleet.status(NodeId(1)).await.unwrap().head(), 1070);
    }

    #[tokio::test]
    async fn test_relaunch_running_node_is_rejected() {
        let mut fleet = fleet(&[]);
        let err = fleet.relaunch(NodeId(1), &[], TIMEOUT).await.unwrap_err();
        assert!(matches!(err, ClusterError::Controller(ControllerError::Lifecycle { .. })));
    }

    #[tokio::test]
    async fn test_rejected_flags_are_not_kept() {
        let mut fleet = fleet(&[]);
        fleet.kill(NodeId(2)).await.unwrap();
        let err = fleet
            .relaunch(NodeId(2), &[FlagMutation::set("--read-mode", "head")], TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, ClusterError::Controller(ControllerError::Flags { .. })));
        assert_eq!(fleet.read_mode(NodeId(2)).unwrap(), Some(ReadMode::Irreversible));

        let outcome = fleet.relaunch(NodeId(2), &[], TIMEOUT).await.unwrap();
        assert!(outcome.is_ready());
    }

    #[tokio::test]
    async fn test_purge_requires_stopped_node() {
        let mut fleet = fleet(&[]);
        assert!(matches!(
            fleet.purge_reversible_blocks(NodeId(1)),
            Err(ClusterError::NodeRunning(NodeId(1)))
        ));
        fleet.kill(NodeId(1)).await.unwrap();
        fleet.purge_reversible_blocks(NodeId(1)).unwrap();
        assert!(!fleet.has_reversible_blocks(NodeId(1)).unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_block_fault_crashes_replay() {
        let mut fleet = fleet(&[SimFault::DuplicateBlockOnReplay]);
        fleet.kill(NodeId(1)).await.unwrap();
        let outcome = fleet
            .relaunch(
                NodeId(1),
                &[FlagMutation::read_mode(ReadMode::Irreversible), FlagMutation::replay()],
                TIMEOUT,
            )
            .await
            .unwrap();
        assert_eq!(outcome, RelaunchOutcome::Exited { code: Some(ABORT_CODE) });
        assert!(!fleet.is_alive(NodeId(1)).unwrap());
        assert_eq!(
            fleet.classify_fault(NodeId(1)).unwrap(),
            Some(*KnownBug::DuplicateBlock.signature())
        );

        // A speculative replay is unaffected and leaves a clean capture.
        fleet.reset_flags(NodeId(1)).unwrap();
        let outcome =
            fleet.relaunch(NodeId(1), &[FlagMutation::replay()], TIMEOUT).await.unwrap();
        assert!(outcome.is_ready());
        assert_eq!(fleet.classify_fault(NodeId(1)).unwrap(), None);
    }

    #[tokio::test]
    async fn test_lib_fault_skews_purged_replay() {
        let mut fleet = fleet(&[SimFault::LibOneBehind]);
        fleet.pause_production().await.unwrap();
        fleet.kill(NodeId(1)).await.unwrap();
        fleet.purge_reversible_blocks(NodeId(1)).unwrap();
        fleet
            .relaunch(
                NodeId(1),
                &[FlagMutation::read_mode(ReadMode::Irreversible), FlagMutation::replay()],
                TIMEOUT,
            )
            .await
            .unwrap();
        let after = fleet.status(NodeId(1)).await.unwrap();
        assert_eq!((after.head(), after.lib()), (1000, 999));
    }

    #[tokio::test]
    async fn test_fork_db_fault_loses_reversible_state() {
        let mut fleet = fleet(&[SimFault::ForkDbLostOnSwitch]);
        fleet.pause_production().await.unwrap();
        fleet.kill(NodeId(2)).await.unwrap();
        fleet
            .relaunch(NodeId(2), &[FlagMutation::read_mode(ReadMode::Speculative)], TIMEOUT)
            .await
            .unwrap();
        let after = fleet.status(NodeId(2)).await.unwrap();
        assert_eq!((after.head(), after.lib(), after.fork_db_head()), (1000, 1000, 1000));
    }

    #[tokio::test]
    async fn test_unknown_node() {
        let mut fleet = fleet(&[]);
        assert!(!fleet.contains(NodeId(3)));
        let err = fleet.kill(NodeId(3)).await.unwrap_err();
        assert!(matches!(err, ClusterError::UnknownNode { node: NodeId(3), total: 3 }));
    }

    #[test]
    fn test_from_config_applies_node_flags() {
        let fleet =
            SimFleet::from_config(&HarnessConfig::default(), SimChainConfig::default(), []).unwrap();
        assert_eq!(fleet.node_ids().len(), 8);
        assert_eq!(fleet.read_mode(NodeId(4)).unwrap(), Some(ReadMode::Irreversible));
        assert_eq!(fleet.read_mode(NodeId(5)).unwrap(), Some(ReadMode::Speculative));
        assert!(fleet.has_reversible_blocks(NodeId(5)).unwrap());
    }
}

//! Fleet launch and teardown.

use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use nix::sys::signal::Signal;
use readmode_config::{AuxiliaryService, HarnessConfig};
use readmode_domain::{FaultSignature, FlagMutation, NodeId, ReadMode, StatusSnapshot};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::{
    ClusterError, ControllerTiming, Fleet, LogScanner, NodeHandle, ProcessController,
    RelaunchOutcome, StatusProbe, process,
};

/// Signal used to stop nodes. Nodes flush their state on SIGTERM.
const KILL_SIGNAL: Signal = Signal::SIGTERM;

/// Arguments every launch of `id` carries, whatever its flags.
///
/// Data and config directories, endpoints, peers and producer settings are
/// owned by the cluster and are not subject to [`FlagMutation`]s.
pub fn node_args(config: &HarnessConfig, id: NodeId) -> Vec<String> {
    let topology = &config.topology;
    let endpoints = &config.endpoints;
    let data_dir = node_data_dir(&config.data_root, id);

    let mut args = vec![
        "--data-dir".to_string(),
        data_dir.display().to_string(),
        "--config-dir".to_string(),
        data_dir.join("config").display().to_string(),
        "--http-server-address".to_string(),
        endpoints.http_addr(id.port_offset()),
        "--p2p-listen-endpoint".to_string(),
        endpoints.p2p_addr(id.port_offset()),
    ];
    for peer in topology.shape.peers_of(id, topology.total_nodes) {
        args.push("--p2p-peer-address".to_string());
        args.push(endpoints.p2p_addr(peer.port_offset()));
    }
    if topology.is_producer(id) {
        if id == NodeId(0) {
            args.push("--enable-stale-production".to_string());
        }
        for name in topology.producer_names(id) {
            args.push("--producer-name".to_string());
            args.push(name);
        }
    }
    args
}

fn node_data_dir(root: &Path, id: NodeId) -> PathBuf {
    root.join(id.dir_name())
}

/// A running helper process.
#[derive(Debug)]
struct AuxiliaryProcess {
    name: String,
    child: Child,
}

/// Owns every process of a launched cluster.
///
/// Dropping the manager kills any process still running. Call
/// [`shutdown`](Self::shutdown) for an orderly stop and data cleanup.
#[derive(Debug)]
pub struct ClusterManager {
    config: HarnessConfig,
    controllers: Vec<ProcessController>,
    auxiliary: Vec<AuxiliaryProcess>,
    shut_down: bool,
}

impl ClusterManager {
    /// Launch auxiliary services and every node, then wait for the fleet to be ready.
    ///
    /// Fails with [`ClusterError::Launch`] if any node does not become ready
    /// within the launch timeout; everything already started is shut down first.
    pub async fn launch(config: HarnessConfig) -> Result<Self, ClusterError> {
        config.validate()?;
        clear_previous_run(&config).await?;
        std::fs::create_dir_all(&config.data_root)
            .map_err(|e| ClusterError::io(format!("create {}", config.data_root.display()), e))?;

        let probe = StatusProbe::new(config.timing.probe_timeout())?;
        let timing = ControllerTiming::from(&config.timing);
        let mut controllers = Vec::with_capacity(config.topology.total_nodes);
        for id in (0..config.topology.total_nodes).map(NodeId) {
            let flags = config.topology.extra_flags_for(id)?;
            let handle = NodeHandle::new(
                id,
                node_data_dir(&config.data_root, id),
                config.endpoints.status_url(id.port_offset()),
                flags,
            );
            controllers.push(ProcessController::new(
                handle,
                config.node_binary.clone(),
                node_args(&config, id),
                probe.clone(),
                timing,
            ));
        }

        let mut manager = Self { config, controllers, auxiliary: Vec::new(), shut_down: false };
        if let Err(e) = manager.start_all().await {
            manager.shutdown().await;
            return Err(e);
        }
        info!(
            nodes = manager.controllers.len(),
            producers = manager.config.topology.producer_nodes,
            "cluster ready"
        );
        Ok(manager)
    }

    async fn start_all(&mut self) -> Result<(), ClusterError> {
        for service in self.config.auxiliary.clone() {
            let child = spawn_auxiliary(&self.config.data_root, &service)?;
            info!(name = %service.name, pid = child.id(), "started auxiliary service");
            self.auxiliary.push(AuxiliaryProcess { name: service.name, child });
        }
        for controller in &mut self.controllers {
            controller.start()?;
        }

        // Nodes come up concurrently; the deadline covers the whole fleet.
        let deadline = tokio::time::Instant::now() + self.config.timing.launch_timeout();
        for controller in &mut self.controllers {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let outcome = controller.wait_ready(remaining).await?;
            if !outcome.is_ready() {
                return Err(ClusterError::Launch { node: controller.handle().id(), outcome });
            }
        }
        Ok(())
    }

    /// The configuration the cluster was launched with.
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Handle of node `id`.
    pub fn node(&self, id: NodeId) -> Result<&NodeHandle, ClusterError> {
        self.controller(id).map(ProcessController::handle)
    }

    /// Handles of every node.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeHandle> {
        self.controllers.iter().map(ProcessController::handle)
    }

    fn controller(&self, id: NodeId) -> Result<&ProcessController, ClusterError> {
        let total = self.controllers.len();
        self.controllers.get(id.0).ok_or(ClusterError::UnknownNode { node: id, total })
    }

    /// Controller of node `id`, for driving it outside the [`Fleet`] surface.
    pub fn controller_mut(&mut self, id: NodeId) -> Result<&mut ProcessController, ClusterError> {
        let total = self.controllers.len();
        self.controllers.get_mut(id.0).ok_or(ClusterError::UnknownNode { node: id, total })
    }

    /// Stop every node and auxiliary service, then remove data unless kept.
    ///
    /// Safe to call more than once. Failures are logged, never returned.
    pub async fn shutdown(&mut self) {
        if self.shut_down {
            debug!("cluster already shut down");
            return;
        }
        self.shut_down = true;
        info!("shutting down cluster");

        for controller in &mut self.controllers {
            if let Err(e) = controller.kill(KILL_SIGNAL).await {
                warn!(node = %controller.handle().id(), error = %e, "failed to stop node");
            }
        }
        let grace = self.config.timing.kill_timeout();
        for mut service in self.auxiliary.drain(..) {
            if let Err(e) = process::terminate(&mut service.child, KILL_SIGNAL, grace).await {
                warn!(name = %service.name, error = ?e, "failed to stop auxiliary service");
            }
        }

        if self.config.keep_data {
            info!(root = %self.config.data_root.display(), "keeping node data");
            return;
        }
        for controller in &self.controllers {
            let dir = controller.handle().data_dir();
            if let Err(e) = remove_dir_if_present(dir) {
                warn!(dir = %dir.display(), error = %e, "failed to remove node data");
            }
        }
    }

    async fn relaunch_producer(
        &mut self,
        id: NodeId,
        timeout: Duration,
    ) -> Result<bool, ClusterError> {
        let controller = self.controller_mut(id)?;
        if controller.refresh()? {
            return Ok(false);
        }
        let outcome = controller.relaunch(&[], timeout).await?;
        if !outcome.is_ready() {
            return Err(ClusterError::ProductionResume { node: id, outcome });
        }
        Ok(true)
    }
}

impl Fleet for ClusterManager {
    fn node_ids(&self) -> Vec<NodeId> {
        self.nodes().map(NodeHandle::id).collect()
    }

    fn is_alive(&mut self, id: NodeId) -> Result<bool, ClusterError> {
        Ok(self.controller_mut(id)?.refresh()?)
    }

    fn read_mode(&self, id: NodeId) -> Result<Option<ReadMode>, ClusterError> {
        Ok(self.node(id)?.read_mode())
    }

    async fn kill(&mut self, id: NodeId) -> Result<(), ClusterError> {
        Ok(self.controller_mut(id)?.kill(KILL_SIGNAL).await?)
    }

    async fn relaunch(
        &mut self,
        id: NodeId,
        mutations: &[FlagMutation],
        timeout: Duration,
    ) -> Result<RelaunchOutcome, ClusterError> {
        Ok(self.controller_mut(id)?.relaunch(mutations, timeout).await?)
    }

    fn reset_flags(&mut self, id: NodeId) -> Result<(), ClusterError> {
        self.controller_mut(id)?.reset_flags();
        Ok(())
    }

    async fn status(&mut self, id: NodeId) -> Result<StatusSnapshot, ClusterError> {
        Ok(self.controller_mut(id)?.status().await?)
    }

    fn purge_reversible_blocks(&mut self, id: NodeId) -> Result<(), ClusterError> {
        let controller = self.controller_mut(id)?;
        if controller.refresh()? {
            return Err(ClusterError::NodeRunning(id));
        }
        let dir = controller.handle().reversible_blocks_dir();
        remove_dir_if_present(&dir)
            .map_err(|e| ClusterError::io(format!("remove {}", dir.display()), e))?;
        info!(node = %id, dir = %dir.display(), "purged reversible blocks");
        Ok(())
    }

    fn contains_signature(
        &self,
        id: NodeId,
        signature: &FaultSignature,
    ) -> Result<bool, ClusterError> {
        let dir = self.node(id)?.data_dir();
        LogScanner::contains_signature(dir, signature)
            .map_err(|e| ClusterError::io(format!("scan stderr of node {id}"), e))
    }

    async fn pause_production(&mut self) -> Result<bool, ClusterError> {
        let mut changed = false;
        let producers: Vec<_> = self.config.topology.producers().collect();
        for id in producers {
            let controller = self.controller_mut(id)?;
            if controller.refresh()? {
                controller.kill(KILL_SIGNAL).await?;
                changed = true;
            }
        }
        if changed {
            info!("block production paused");
        }
        Ok(changed)
    }

    async fn resume_production(&mut self) -> Result<bool, ClusterError> {
        let mut changed = false;
        let timeout = self.config.timing.relaunch_timeout();
        let producers: Vec<_> = self.config.topology.producers().collect();
        for id in producers {
            changed |= self.relaunch_producer(id, timeout).await?;
        }
        if changed {
            info!("block production resumed");
        }
        Ok(changed)
    }

    async fn settle(&mut self, duration: Duration) {
        debug!(?duration, "settling");
        tokio::time::sleep(duration).await;
    }
}

fn spawn_auxiliary(root: &Path, service: &AuxiliaryService) -> Result<Child, ClusterError> {
    let log_path = root.join(format!("{}.stderr.txt", service.name));
    let log = File::create(&log_path)
        .map_err(|e| ClusterError::io(format!("create {}", log_path.display()), e))?;
    Command::new(&service.binary)
        .args(&service.args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::from(log))
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ClusterError::io(format!("spawn auxiliary service {}", service.name), e))
}

/// Kill nodes an earlier run left behind, then remove their data.
async fn clear_previous_run(config: &HarnessConfig) -> Result<(), ClusterError> {
    let grace = config.timing.kill_timeout();
    for id in (0..config.topology.total_nodes).map(NodeId) {
        let dir = node_data_dir(&config.data_root, id);
        process::kill_leftover(&dir, grace)
            .await
            .map_err(|e| ClusterError::io(format!("kill leftover node in {}", dir.display()), e))?;
        remove_dir_if_present(&dir)
            .map_err(|e| ClusterError::io(format!("remove stale {}", dir.display()), e))?;
    }
    Ok(())
}

fn remove_dir_if_present(dir: &Path) -> io::Result<()> {
    match std::fs::remove_dir_all(dir) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

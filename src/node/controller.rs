use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::rpc::{run_with_timeout, CliRpc, RpcEndpoint};
use super::{NodeLifecycle, RpcTransport};
use crate::error::ControllerError;

/// Written by the daemon into the scratch dir while it runs.
const PID_FILE: &str = "bitcoind.pid";

/// Static settings for one reference-node run.
#[derive(Clone, Debug)]
pub struct NodeConfig {
    pub daemon: PathBuf,
    pub cli: PathBuf,
    /// Parent directory handed to the daemon as its data dir. Only the
    /// network-specific `regtest/` child is owned (and deleted) by the controller.
    pub data_dir: PathBuf,
    pub rpc_user: String,
    pub rpc_password: String,
    pub poll_interval: Duration,
    pub startup_timeout: Duration,
    pub call_timeout: Duration,
    pub shutdown_timeout: Duration,
}

impl NodeConfig {
    pub fn new(daemon: impl Into<PathBuf>, cli: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            daemon: daemon.into(),
            cli: cli.into(),
            data_dir: data_dir.into(),
            rpc_user: "bench".to_string(),
            rpc_password: "bench".to_string(),
            poll_interval: Duration::from_secs(1),
            startup_timeout: Duration::from_secs(20),
            call_timeout: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(10),
        }
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.data_dir.join("regtest")
    }
}

/// Picks the control-channel port as `base + offset`, offset drawn from
/// `1..=span`. Seeded allocators are fully deterministic.
#[derive(Clone, Debug)]
pub struct PortAllocator {
    base: u16,
    span: u16,
    rng: ChaCha8Rng,
}

impl PortAllocator {
    pub const DEFAULT_BASE: u16 = 18444;
    pub const DEFAULT_SPAN: u16 = 1000;

    pub fn seeded(base: u16, span: u16, seed: u64) -> Self {
        Self {
            base,
            span: span.max(1),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy(base: u16, span: u16) -> Self {
        Self {
            base,
            span: span.max(1),
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    pub fn next_port(&mut self) -> u16 {
        let offset = self.rng.gen_range(1..=self.span);
        self.base.saturating_add(offset)
    }
}

impl Default for PortAllocator {
    fn default() -> Self {
        Self::from_entropy(Self::DEFAULT_BASE, Self::DEFAULT_SPAN)
    }
}

/// A live, answering reference node.
#[derive(Clone, Debug)]
pub struct NodeHandle {
    rpc: CliRpc,
}

impl NodeHandle {
    pub fn port(&self) -> u16 {
        self.rpc.endpoint().port
    }

    pub fn rpc(&self) -> &CliRpc {
        &self.rpc
    }
}

impl RpcTransport for NodeHandle {
    fn call(&self, method: &str, args: &[Value]) -> Option<Value> {
        self.rpc.call(method, args)
    }
}

/// Starts and stops real reference-node processes.
#[derive(Debug)]
pub struct ProcessController {
    config: NodeConfig,
    ports: PortAllocator,
}

impl ProcessController {
    pub fn new(config: NodeConfig, ports: PortAllocator) -> Self {
        Self { config, ports }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    fn check_binary(path: &Path) -> Result<(), ControllerError> {
        if is_executable(path) {
            Ok(())
        } else {
            Err(ControllerError::BinaryNotFound(path.to_path_buf()))
        }
    }

    /// Wipe state left by earlier runs and recreate an empty scratch dir.
    fn prepare_scratch(&self) -> Result<(), ControllerError> {
        fs::create_dir_all(&self.config.data_dir).map_err(ControllerError::Scratch)?;
        let scratch = self.config.scratch_dir();
        if scratch.exists() {
            debug!(path = %scratch.display(), "removing stale scratch directory");
            fs::remove_dir_all(&scratch).map_err(ControllerError::Scratch)?;
        }
        fs::create_dir_all(&scratch).map_err(ControllerError::Scratch)
    }

    fn launch(&self, endpoint: &RpcEndpoint) -> Result<(), ControllerError> {
        let mut cmd = Command::new(&self.config.daemon);
        cmd.args(endpoint.connection_args()).args([
            "-server",
            "-daemon",
            "-listen=0",
            "-fallbackfee=0.00001",
            "-txindex=0",
            "-prune=0",
        ]);

        match run_with_timeout(&mut cmd, self.config.startup_timeout) {
            Ok(Some(output)) if output.status.success() => Ok(()),
            Ok(Some(output)) => {
                let mut stderr = output.stderr.trim().to_string();
                if stderr.is_empty() {
                    stderr = format!("daemon exited with {}", output.status);
                }
                Err(ControllerError::LaunchFailed { stderr })
            }
            Ok(None) => Err(ControllerError::LaunchFailed {
                stderr: format!(
                    "daemon launcher did not detach within {:?}",
                    self.config.startup_timeout
                ),
            }),
            Err(err) => Err(ControllerError::LaunchFailed {
                stderr: err.to_string(),
            }),
        }
    }

    /// Poll the liveness call until it answers or the startup bound runs out.
    fn wait_ready(&self, rpc: &CliRpc) -> bool {
        let deadline = Instant::now() + self.config.startup_timeout;
        let started = Instant::now();
        loop {
            thread::sleep(self.config.poll_interval);
            let remaining = deadline.saturating_duration_since(Instant::now());
            let bound = remaining.min(self.config.call_timeout).max(self.config.poll_interval);
            if rpc.call_with_timeout("getblockcount", &[], bound).is_some() {
                info!(after = ?started.elapsed(), "reference node is answering");
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
        }
    }

    fn shutdown(&self, rpc: &CliRpc) {
        match rpc.call_with_timeout("stop", &[], self.config.shutdown_timeout) {
            Some(_) => debug!(port = rpc.endpoint().port, "reference node stopping"),
            None => debug!(
                port = rpc.endpoint().port,
                "stop call got no answer; node already gone or still exiting"
            ),
        }
    }

    /// Poll until the node stops answering and its pid file is gone, bounded
    /// by the shutdown timeout. The daemon keeps writing to the scratch dir
    /// after acknowledging `stop`.
    fn wait_stopped(&self, rpc: &CliRpc) -> bool {
        let deadline = Instant::now() + self.config.shutdown_timeout;
        let pid_file = self.config.scratch_dir().join(PID_FILE);
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let bound = remaining.min(self.config.call_timeout).max(self.config.poll_interval);
            let answering = rpc.call_with_timeout("getblockcount", &[], bound).is_some();
            if !answering && !pid_file.exists() {
                debug!(port = rpc.endpoint().port, "reference node has exited");
                return true;
            }
            if Instant::now() >= deadline {
                warn!(
                    port = rpc.endpoint().port,
                    answering,
                    waited = ?self.config.shutdown_timeout,
                    "reference node still running after shutdown bound"
                );
                return false;
            }
            thread::sleep(self.config.poll_interval);
        }
    }

    fn shutdown_and_wait(&self, rpc: &CliRpc) {
        self.shutdown(rpc);
        self.wait_stopped(rpc);
    }
}

impl NodeLifecycle for ProcessController {
    type Node = NodeHandle;

    fn start(&mut self) -> Result<NodeHandle, ControllerError> {
        Self::check_binary(&self.config.daemon)?;
        Self::check_binary(&self.config.cli)?;
        self.prepare_scratch()?;

        let endpoint = RpcEndpoint {
            data_dir: self.config.data_dir.clone(),
            port: self.ports.next_port(),
            user: self.config.rpc_user.clone(),
            password: self.config.rpc_password.clone(),
        };
        info!(port = endpoint.port, daemon = %self.config.daemon.display(), "starting reference node");
        self.launch(&endpoint)?;

        let rpc = CliRpc::new(&self.config.cli, endpoint, self.config.call_timeout);
        if self.wait_ready(&rpc) {
            Ok(NodeHandle { rpc })
        } else {
            warn!("reference node launched but never answered; attempting shutdown");
            self.shutdown_and_wait(&rpc);
            Err(ControllerError::Unresponsive {
                waited: self.config.startup_timeout,
            })
        }
    }

    fn stop(&mut self, node: &NodeHandle) {
        self.shutdown_and_wait(&node.rpc);
    }

    fn remove_scratch(&mut self) {
        let scratch = self.config.scratch_dir();
        if !scratch.exists() {
            return;
        }
        match fs::remove_dir_all(&scratch) {
            Ok(()) => debug!(path = %scratch.display(), "scratch directory removed"),
            Err(err) => warn!(path = %scratch.display(), error = %err, "failed to remove scratch directory"),
        }
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, warn};

use super::RpcTransport;

const WAIT_POLL: Duration = Duration::from_millis(5);

/// How long pipe readers may lag behind the child's exit.
pub const PIPE_DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Output of a child process that finished inside its time bound.
#[derive(Debug)]
pub struct CapturedOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Run `cmd` to completion, killing and reaping it once `timeout` elapses.
///
/// `Ok(None)` means the bound was hit. Spawn failures surface as `Err`.
/// Pipe readers get at most [`PIPE_DRAIN_GRACE`] after the child is gone; a
/// descendant still holding the pipes open is abandoned along with its output.
pub fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> io::Result<Option<CapturedOutput>> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let (tx, rx) = mpsc::channel();
    spawn_reader(child.stdout.take(), Pipe::Stdout, tx.clone());
    spawn_reader(child.stderr.take(), Pipe::Stderr, tx);

    let status = wait_with_deadline(&mut child, timeout);

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let drain_deadline = Instant::now() + PIPE_DRAIN_GRACE;
    for _ in 0..2 {
        let remaining = drain_deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok((Pipe::Stdout, buf)) => stdout = buf,
            Ok((Pipe::Stderr, buf)) => stderr = buf,
            Err(_) => {
                debug!("pipes still held open after exit; abandoning readers");
                break;
            }
        }
    }

    match status? {
        Some(status) => Ok(Some(CapturedOutput {
            status,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })),
        None => Ok(None),
    }
}

#[derive(Clone, Copy, Debug)]
enum Pipe {
    Stdout,
    Stderr,
}

fn spawn_reader<R: Read + Send + 'static>(
    stream: Option<R>,
    pipe: Pipe,
    tx: mpsc::Sender<(Pipe, Vec<u8>)>,
) {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut stream) = stream {
            let _ = stream.read_to_end(&mut buf);
        }
        let _ = tx.send((pipe, buf));
    });
}

fn wait_with_deadline(child: &mut Child, timeout: Duration) -> io::Result<Option<ExitStatus>> {
    let started = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Some(status)),
            Ok(None) => {}
            Err(err) => {
                terminate_and_reap(child);
                return Err(err);
            }
        }
        if started.elapsed() >= timeout {
            terminate_and_reap(child);
            return Ok(None);
        }
        thread::sleep(WAIT_POLL);
    }
}

fn terminate_and_reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// JSON when the text parses as JSON, otherwise the trimmed text itself.
pub fn decode_output(stdout: &str) -> Value {
    let trimmed = stdout.trim();
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string()))
}

/// Positional argument as the command-line client expects it: strings raw,
/// everything else as JSON text.
fn render_arg(arg: &Value) -> String {
    match arg {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Where and how to reach the node's private control channel.
#[derive(Clone, Debug)]
pub struct RpcEndpoint {
    pub data_dir: PathBuf,
    pub port: u16,
    pub user: String,
    pub password: String,
}

impl RpcEndpoint {
    /// Flags shared by the daemon and the client so both agree on the channel.
    pub fn connection_args(&self) -> Vec<String> {
        vec![
            "-regtest".to_string(),
            format!("-datadir={}", self.data_dir.display()),
            format!("-rpcport={}", self.port),
            format!("-rpcuser={}", self.user),
            format!("-rpcpassword={}", self.password),
        ]
    }
}

/// Control-channel client that shells out to the node's command-line client.
#[derive(Clone, Debug)]
pub struct CliRpc {
    cli: PathBuf,
    endpoint: RpcEndpoint,
    timeout: Duration,
}

impl CliRpc {
    pub fn new(cli: impl Into<PathBuf>, endpoint: RpcEndpoint, timeout: Duration) -> Self {
        Self {
            cli: cli.into(),
            endpoint,
            timeout,
        }
    }

    pub fn cli_path(&self) -> &Path {
        &self.cli
    }

    pub fn endpoint(&self) -> &RpcEndpoint {
        &self.endpoint
    }

    pub fn call_with_timeout(&self, method: &str, args: &[Value], timeout: Duration) -> Option<Value> {
        let mut cmd = Command::new(&self.cli);
        cmd.args(self.endpoint.connection_args())
            .arg(method)
            .args(args.iter().map(render_arg));

        match run_with_timeout(&mut cmd, timeout) {
            Ok(Some(output)) if output.status.success() => Some(decode_output(&output.stdout)),
            Ok(Some(output)) => {
                debug!(
                    method,
                    status = %output.status,
                    stderr = output.stderr.trim(),
                    "rpc call failed"
                );
                None
            }
            Ok(None) => {
                warn!(method, timeout = ?timeout, "rpc call timed out");
                None
            }
            Err(err) => {
                warn!(method, error = %err, "rpc client could not be spawned");
                None
            }
        }
    }
}

impl RpcTransport for CliRpc {
    fn call(&self, method: &str, args: &[Value]) -> Option<Value> {
        self.call_with_timeout(method, args, self.timeout)
    }
}

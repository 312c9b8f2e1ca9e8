//! Reference-node process control.
//!
//! The reference implementation is only reachable as a separate daemon, so it
//! is modelled as a capability: something that can be started, stopped and
//! asked control-channel questions. [`ProcessController`] backs it with real
//! processes; tests substitute recording doubles.

pub mod controller;
pub mod rpc;

use serde_json::Value;

use crate::error::ControllerError;

pub use controller::{NodeConfig, NodeHandle, PortAllocator, ProcessController};
pub use rpc::{decode_output, run_with_timeout, CapturedOutput, CliRpc, RpcEndpoint};

/// Issues one control-channel call and decodes the answer.
///
/// `None` covers every failure mode (non-zero exit, timeout, spawn error);
/// callers treat it as a skipped sample.
pub trait RpcTransport {
    fn call(&self, method: &str, args: &[Value]) -> Option<Value>;
}

impl<T: RpcTransport + ?Sized> RpcTransport for &T {
    fn call(&self, method: &str, args: &[Value]) -> Option<Value> {
        (**self).call(method, args)
    }
}

/// Lifecycle of one ephemeral reference node and its scratch directory.
pub trait NodeLifecycle {
    type Node: RpcTransport;

    fn start(&mut self) -> Result<Self::Node, ControllerError>;

    /// Graceful shutdown. Stopping a node that is already gone is not an error.
    fn stop(&mut self, node: &Self::Node);

    /// Delete the scratch directory created by `start`, if any.
    fn remove_scratch(&mut self);
}

//! Reference-node workloads and the scoped runner that drives them.

pub mod hash;

use serde_json::Value;
use tracing::{info, warn};

use crate::error::{ControllerError, WorkloadError};
use crate::harness::BenchConfig;
use crate::node::{NodeLifecycle, RpcTransport};
use crate::schema::CanonicalStat;

/// The fixed set of measured reference-node operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Workload {
    TransactionValidation,
    BlockValidation,
    HashProxy,
}

impl Workload {
    pub const ALL: [Workload; 3] = [
        Workload::TransactionValidation,
        Workload::BlockValidation,
        Workload::HashProxy,
    ];

    /// Native operation name: the control-channel call being timed.
    pub fn native_name(&self) -> &'static str {
        match self {
            Workload::TransactionValidation => transaction::OPERATION,
            Workload::BlockValidation => block::OPERATION,
            Workload::HashProxy => hash::OPERATION,
        }
    }

    pub fn run<N: RpcTransport + ?Sized>(
        &self,
        node: &N,
        cfg: &BenchConfig,
    ) -> Result<CanonicalStat, WorkloadError> {
        match self {
            Workload::TransactionValidation => transaction::run(node, cfg),
            Workload::BlockValidation => block::run(node, cfg),
            Workload::HashProxy => hash::run(node, cfg),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct WorkloadResult {
    pub workload: Workload,
    pub outcome: Result<CanonicalStat, WorkloadError>,
}

/// Holds a started node; stops it and removes the scratch directory when
/// dropped, including during unwinding.
struct NodeScope<'a, L: NodeLifecycle> {
    lifecycle: &'a mut L,
    node: Option<L::Node>,
}

impl<'a, L: NodeLifecycle> NodeScope<'a, L> {
    fn node(&self) -> Option<&L::Node> {
        self.node.as_ref()
    }
}

impl<'a, L: NodeLifecycle> Drop for NodeScope<'a, L> {
    fn drop(&mut self) {
        if let Some(node) = self.node.take() {
            self.lifecycle.stop(&node);
        }
        self.lifecycle.remove_scratch();
    }
}

/// Start a node, run every workload in order, then tear the node down.
///
/// Process-level failures abort with `Err` after cleanup. Workload failures
/// are reported per workload and never stop the ones after them.
pub fn run_suite<L: NodeLifecycle>(
    lifecycle: &mut L,
    cfg: &BenchConfig,
) -> Result<Vec<WorkloadResult>, ControllerError> {
    let node = match lifecycle.start() {
        Ok(node) => node,
        Err(err) => {
            lifecycle.remove_scratch();
            return Err(err);
        }
    };
    let scope = NodeScope {
        lifecycle,
        node: Some(node),
    };

    let mut results = Vec::with_capacity(Workload::ALL.len());
    if let Some(node) = scope.node() {
        for workload in Workload::ALL {
            info!(operation = workload.native_name(), "running workload");
            let outcome = workload.run(node, cfg);
            if let Err(err) = &outcome {
                warn!(operation = workload.native_name(), error = %err, "workload produced no statistic");
            }
            results.push(WorkloadResult { workload, outcome });
        }
    }
    drop(scope);

    Ok(results)
}

/// Empty strings, arrays and objects, `null` and `false` count as "no result".
/// Numbers always count, so a chain height of 0 is a real answer.
pub(crate) fn non_empty(value: Option<Value>) -> Option<Value> {
    value.filter(|v| match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Number(_) => true,
    })
}

pub(crate) fn new_address<N: RpcTransport + ?Sized>(node: &N) -> Result<String, WorkloadError> {
    non_empty(node.call("getnewaddress", &[]))
        .and_then(|v| v.as_str().map(str::to_string))
        .ok_or_else(|| WorkloadError::setup("Failed to get a new address"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_non_empty_follows_truthiness() {
        assert!(non_empty(None).is_none());
        assert!(non_empty(Some(json!(null))).is_none());
        assert!(non_empty(Some(json!([]))).is_none());
        assert!(non_empty(Some(json!(""))).is_none());
        assert!(non_empty(Some(json!({}))).is_none());
        assert!(non_empty(Some(json!(0))).is_some());
        assert!(non_empty(Some(json!(["hash"]))).is_some());
    }

    #[test]
    fn test_native_names_are_distinct() {
        let mut names: Vec<_> = Workload::ALL.iter().map(|w| w.native_name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), Workload::ALL.len());
    }
}

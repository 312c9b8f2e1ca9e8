use serde_json::json;
use tracing::{info, warn};

use super::{new_address, non_empty};
use crate::error::WorkloadError;
use crate::harness::{sample_calls, BenchConfig};
use crate::node::RpcTransport;
use crate::schema::CanonicalStat;

pub const OPERATION: &str = "getblockhash";

/// Attached to every hash-proxy statistic. The node has no hashing endpoint,
/// so this times an indexed lookup of an already computed block hash.
pub const PROXY_NOTE: &str =
    "Reference measures cached getblockhash lookups (index read), not SHA256 computation";

/// Time block-hash lookups over a fixed height range as a hashing proxy.
pub fn run<N: RpcTransport + ?Sized>(
    node: &N,
    cfg: &BenchConfig,
) -> Result<CanonicalStat, WorkloadError> {
    ensure_height(node, cfg.min_height());

    sample_calls(OPERATION, cfg.hash_heights(), |height| {
        non_empty(node.call(OPERATION, &[json!(height)]))
    })
    .summarize()
    .map(|stat| stat.with_note(PROXY_NOTE))
}

/// Mine up to `min_height` blocks if the chain is shorter. A failed extension
/// is only logged: lookups below the reached height still produce samples.
fn ensure_height<N: RpcTransport + ?Sized>(node: &N, min_height: u64) {
    let height = node.call("getblockcount", &[]).and_then(|v| v.as_u64());
    if matches!(height, Some(h) if h >= min_height) {
        return;
    }
    info!(?height, min_height, "extending chain for hash-proxy workload");
    let extended = new_address(node).ok().and_then(|address| {
        non_empty(node.call("generatetoaddress", &[json!(min_height), json!(address)]))
    });
    if extended.is_none() {
        warn!(min_height, "could not extend chain; timing lookups at existing heights");
    }
}

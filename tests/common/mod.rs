#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use consensus_compare_bench::error::ControllerError;
use consensus_compare_bench::node::{NodeLifecycle, RpcTransport};
use serde_json::{json, Value};

/// Answers control-channel calls from a fixed script.
#[derive(Clone, Debug, Default)]
pub struct FakeNode {
    responses: HashMap<String, Value>,
    panic_on: Option<String>,
    calls: Rc<RefCell<Vec<String>>>,
}

impl FakeNode {
    /// A node whose every workload succeeds.
    pub fn healthy() -> Self {
        let mut node = FakeNode::default();
        node.respond("getnewaddress", json!("bcrt1qbench"))
            .respond("getblockcount", json!(150))
            .respond("generatetoaddress", json!(["00ab"]))
            .respond(
                "listunspent",
                json!([{ "txid": "f00d", "vout": 0, "amount": 50.0 }]),
            )
            .respond("createrawtransaction", json!("0200raw"))
            .respond(
                "signrawtransactionwithwallet",
                json!({ "hex": "0200signed", "complete": true }),
            )
            .respond("testmempoolaccept", json!([{ "txid": "f00d", "allowed": true }]))
            .respond("getblockhash", json!("0f9188f1"));
        node
    }

    pub fn respond(&mut self, method: &str, value: Value) -> &mut Self {
        self.responses.insert(method.to_string(), value);
        self
    }

    pub fn silence(&mut self, method: &str) -> &mut Self {
        self.responses.remove(method);
        self
    }

    pub fn panic_on(&mut self, method: &str) -> &mut Self {
        self.panic_on = Some(method.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, method: &str) -> usize {
        self.calls.borrow().iter().filter(|m| *m == method).count()
    }
}

impl RpcTransport for FakeNode {
    fn call(&self, method: &str, _args: &[Value]) -> Option<Value> {
        self.calls.borrow_mut().push(method.to_string());
        if self.panic_on.as_deref() == Some(method) {
            panic!("scripted panic in {method}");
        }
        self.responses.get(method).cloned()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    Start,
    Stop,
    RemoveScratch,
}

/// Lifecycle double that hands out a [`FakeNode`] and records every
/// lifecycle transition.
#[derive(Debug)]
pub struct RecordingLifecycle {
    pub node: FakeNode,
    pub fail_start: bool,
    pub events: Rc<RefCell<Vec<Event>>>,
}

impl RecordingLifecycle {
    pub fn new(node: FakeNode) -> Self {
        Self {
            node,
            fail_start: false,
            events: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn failing() -> Self {
        let mut lifecycle = Self::new(FakeNode::default());
        lifecycle.fail_start = true;
        lifecycle
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }
}

impl NodeLifecycle for RecordingLifecycle {
    type Node = FakeNode;

    fn start(&mut self) -> Result<FakeNode, ControllerError> {
        self.events.borrow_mut().push(Event::Start);
        if self.fail_start {
            return Err(ControllerError::LaunchFailed {
                stderr: "scripted launch failure".to_string(),
            });
        }
        Ok(self.node.clone())
    }

    fn stop(&mut self, _node: &FakeNode) {
        self.events.borrow_mut().push(Event::Stop);
    }

    fn remove_scratch(&mut self) {
        self.events.borrow_mut().push(Event::RemoveScratch);
    }
}

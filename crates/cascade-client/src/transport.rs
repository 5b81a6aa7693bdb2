use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::trace;

use cascade_node::StorageNode;
use cascade_proto::{CascadeCodec, Request};
use cascade_types::NodeAddr;

use crate::completion::CompletionRegistry;
use crate::error::{ClientError, ClientResult};

/// Transport interface to remote storage nodes.
///
/// Sending is fire-and-forget: reply frames come back out of band through
/// the [`CompletionRegistry`] the transport was built with, keyed by the
/// transaction id.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, addr: &NodeAddr, trans: u64, request: Request) -> ClientResult<()>;
}

/// In-process transport hosting storage nodes directly.
///
/// Requests still go through the full wire codec so framing is exercised
/// on every call, but dispatch is a function call instead of a socket.
pub struct LoopbackTransport {
    nodes: RwLock<HashMap<NodeAddr, Arc<StorageNode>>>,
    registry: Arc<CompletionRegistry>,
}

impl LoopbackTransport {
    pub fn new(registry: Arc<CompletionRegistry>) -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
            registry,
        }
    }

    /// Host a node, making its address routable.
    pub fn host(&self, node: Arc<StorageNode>) {
        self.nodes
            .write()
            .expect("lock poisoned")
            .insert(node.addr().clone(), node);
    }

    pub fn node(&self, addr: &NodeAddr) -> Option<Arc<StorageNode>> {
        self.nodes.read().expect("lock poisoned").get(addr).cloned()
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&self, addr: &NodeAddr, trans: u64, request: Request) -> ClientResult<()> {
        let node = self
            .node(addr)
            .ok_or_else(|| ClientError::Transport(format!("no route to {addr}")))?;

        // Round-trip through the codec so malformed requests fail here
        // the same way they would on a real wire.
        let encoded = CascadeCodec::encode(&request)?;
        let (decoded, _) = CascadeCodec::decode(&encoded)?;
        trace!(%addr, trans, op = decoded.type_name(), "loopback send");

        for frame in node.handle(trans, decoded) {
            self.registry.deliver(&frame);
        }
        Ok(())
    }
}

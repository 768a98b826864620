//! In-process peer transport.
//!
//! A [`LoopbackHub`] holds any number of registered nodes and routes
//! [`PeerTransport`] calls between them without touching a socket. Fork
//! and convergence scenarios that would need a cluster run as plain
//! multi-node tests this way, against the same service code the HTTP
//! transport drives in production.

use crate::ports::inbound::SyncApi;
use crate::ports::outbound::{LedgerGateway, PeerTransport};
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{ChainTip, FinalizedBlock, LedgerFault, NetworkError, Page};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// One registered node: its ledger for reads, its synchronizer for pushes.
#[derive(Clone)]
struct NodeHandle {
    ledger: Arc<dyn LedgerGateway>,
    sync: Arc<dyn SyncApi>,
}

/// Routing table connecting in-process nodes by address.
#[derive(Default)]
pub struct LoopbackHub {
    nodes: RwLock<HashMap<String, NodeHandle>>,
    /// Addresses currently unreachable in either direction.
    offline: RwLock<HashSet<String>>,
}

impl LoopbackHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Attach a node under `addr`, replacing any previous registration.
    pub fn register(&self, addr: &str, ledger: Arc<dyn LedgerGateway>, sync: Arc<dyn SyncApi>) {
        self.nodes
            .write()
            .insert(addr.to_string(), NodeHandle { ledger, sync });
    }

    /// Partition `addr` off the network, or heal it.
    pub fn set_offline(&self, addr: &str, offline: bool) {
        if offline {
            self.offline.write().insert(addr.to_string());
        } else {
            self.offline.write().remove(addr);
        }
    }

    /// Transport endpoint for the node registered as `self_addr`.
    pub fn transport_for(self: &Arc<Self>, self_addr: &str) -> Arc<LoopbackTransport> {
        Arc::new(LoopbackTransport {
            hub: Arc::clone(self),
            self_addr: self_addr.to_string(),
        })
    }

    fn route(&self, from: &str, to: &str) -> Result<NodeHandle, NetworkError> {
        let offline = self.offline.read();
        if offline.contains(from) || offline.contains(to) {
            return Err(NetworkError::PeerUnreachable(to.to_string()));
        }
        drop(offline);
        self.nodes
            .read()
            .get(to)
            .cloned()
            .ok_or_else(|| NetworkError::PeerUnreachable(to.to_string()))
    }
}

/// A node's outbound side of the hub.
pub struct LoopbackTransport {
    hub: Arc<LoopbackHub>,
    self_addr: String,
}

fn as_response(peer: &str, fault: LedgerFault) -> NetworkError {
    NetworkError::MalformedResponse {
        peer: peer.to_string(),
        detail: fault.to_string(),
    }
}

#[async_trait]
impl PeerTransport for LoopbackTransport {
    async fn health(&self, addr: &str) -> Result<ChainTip, NetworkError> {
        let node = self.hub.route(&self.self_addr, addr)?;
        node.ledger.tip().map_err(|fault| as_response(addr, fault))
    }

    async fn chain_info(&self, addr: &str) -> Result<ChainTip, NetworkError> {
        self.health(addr).await
    }

    async fn fetch_pages(
        &self,
        addr: &str,
        from: u64,
        to: u64,
    ) -> Result<Vec<Page>, NetworkError> {
        let node = self.hub.route(&self.self_addr, addr)?;
        node.ledger
            .pages_in(from, to)
            .map_err(|fault| as_response(addr, fault))
    }

    async fn send_block(&self, addr: &str, block: &FinalizedBlock) -> Result<(), NetworkError> {
        let node = self.hub.route(&self.self_addr, addr)?;
        match node.sync.receive_block(&self.self_addr, block.clone()).await {
            Ok(_) => Ok(()),
            Err(fault) => Err(NetworkError::Rejected {
                peer: addr.to_string(),
                reason: fault.to_string(),
            }),
        }
    }

    async fn peer_list(&self, addr: &str) -> Result<Vec<String>, NetworkError> {
        let node = self.hub.route(&self.self_addr, addr)?;
        Ok(node.sync.peers().into_iter().map(|p| p.addr).collect())
    }
}

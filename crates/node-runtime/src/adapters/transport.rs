//! HTTP peer transport speaking the wire shapes in [`crate::wire`].
//!
//! Every node serves the same four routes this client calls, so any node
//! can sync from any other. Transport failures are folded into
//! `NetworkError` so the synchronizer's retry and health logic never
//! sees HTTP-level detail.

use crate::wire::{BlockEnvelope, ChainInfoBody, ErrorBody, HealthBody, PeerSummary, CORRELATION_HEADER};
use async_trait::async_trait;
use cl_05_sync::PeerTransport;
use reqwest::Client;
use shared_types::{ChainTip, FinalizedBlock, Hash, NetworkError, Page};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

pub struct HttpPeerTransport {
    client: Client,
    self_addr: String,
    timeout_ms: u64,
}

impl HttpPeerTransport {
    /// `self_addr` is stamped on outgoing block envelopes so receivers
    /// know whom to sync from; `timeout_ms` bounds every request.
    pub fn new(self_addr: impl Into<String>, timeout_ms: u64) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(Duration::from_millis(timeout_ms)).build()?;
        Ok(Self { client, self_addr: self_addr.into(), timeout_ms })
    }

    fn url(peer: &str, path: &str) -> String {
        format!("http://{peer}{path}")
    }

    fn classify(&self, peer: &str, error: reqwest::Error) -> NetworkError {
        if error.is_timeout() {
            NetworkError::Timeout { peer: peer.to_string(), ms: self.timeout_ms }
        } else if error.is_connect() {
            NetworkError::PeerUnreachable(peer.to_string())
        } else {
            NetworkError::MalformedResponse { peer: peer.to_string(), detail: error.to_string() }
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        peer: &str,
        path: &str,
    ) -> Result<T, NetworkError> {
        let correlation = Uuid::new_v4();
        let response = self
            .client
            .get(Self::url(peer, path))
            .header(CORRELATION_HEADER, correlation.to_string())
            .send()
            .await
            .map_err(|e| self.classify(peer, e))?;
        if !response.status().is_success() {
            debug!(peer, path, %correlation, status = %response.status(), "Peer request refused");
            return Err(NetworkError::MalformedResponse {
                peer: peer.to_string(),
                detail: format!("status {}", response.status()),
            });
        }
        response.json().await.map_err(|e| self.classify(peer, e))
    }

    fn parse_tip(peer: &str, height: u64, tip_hash: &str) -> Result<ChainTip, NetworkError> {
        let hash = decode_hash(tip_hash).ok_or_else(|| NetworkError::MalformedResponse {
            peer: peer.to_string(),
            detail: format!("bad tip hash {tip_hash:?}"),
        })?;
        Ok(ChainTip { height, hash })
    }
}

fn decode_hash(hex_hash: &str) -> Option<Hash> {
    hex::decode(hex_hash).ok()?.try_into().ok()
}

#[async_trait]
impl PeerTransport for HttpPeerTransport {
    async fn health(&self, addr: &str) -> Result<ChainTip, NetworkError> {
        let body: HealthBody = self.get_json(addr, "/health").await?;
        Self::parse_tip(addr, body.height, &body.tip_hash)
    }

    async fn chain_info(&self, addr: &str) -> Result<ChainTip, NetworkError> {
        let body: ChainInfoBody = self.get_json(addr, "/chain/info").await?;
        Self::parse_tip(addr, body.height, &body.tip_hash)
    }

    async fn fetch_pages(
        &self,
        addr: &str,
        from: u64,
        to: u64,
    ) -> Result<Vec<Page>, NetworkError> {
        self.get_json(addr, &format!("/pages?from={from}&to={to}")).await
    }

    async fn send_block(&self, addr: &str, block: &FinalizedBlock) -> Result<(), NetworkError> {
        let correlation = Uuid::new_v4();
        let envelope = BlockEnvelope { from: self.self_addr.clone(), block: block.clone() };
        let response = self
            .client
            .post(Self::url(addr, "/block"))
            .header(CORRELATION_HEADER, correlation.to_string())
            .json(&envelope)
            .send()
            .await
            .map_err(|e| self.classify(addr, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let reason = response
            .json::<ErrorBody>()
            .await
            .map(|body| body.error)
            .unwrap_or_else(|_| format!("status {status}"));
        debug!(peer = addr, %correlation, %status, reason, "Block push refused");
        Err(NetworkError::Rejected { peer: addr.to_string(), reason })
    }

    async fn peer_list(&self, addr: &str) -> Result<Vec<String>, NetworkError> {
        let peers: Vec<PeerSummary> = self.get_json(addr, "/peers").await?;
        Ok(peers.into_iter().map(|p| p.addr).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::ZERO_HASH;

    #[test]
    fn test_hash_decoding() {
        assert_eq!(decode_hash(&hex::encode(ZERO_HASH)), Some(ZERO_HASH));
        assert_eq!(decode_hash("not-hex"), None);
        assert_eq!(decode_hash("abcd"), None);
    }

    #[test]
    fn test_urls_point_at_peer_routes() {
        assert_eq!(HttpPeerTransport::url("127.0.0.1:9301", "/health"), "http://127.0.0.1:9301/health");
    }
}

//! # Peer HTTP Surface
//!
//! The routes every node serves to its peers: liveness, chain position,
//! Page ranges for catch-up, the known-peer list for gossip discovery,
//! and block push. [`crate::adapters::HttpPeerTransport`] is the client
//! side of exactly these routes.

use crate::container::NodeContainer;
use crate::wire::{BlockEnvelope, ChainInfoBody, ErrorBody, HealthBody, PeerSummary, CORRELATION_HEADER};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use cl_03_ledger::LedgerApi;
use cl_05_sync::{ReceiveOutcome, SyncApi};
use serde::Deserialize;
use shared_types::LedgerFault;
use std::sync::Arc;
use tracing::warn;

/// Widest Page span one `/pages` request may ask for.
const MAX_PAGE_SPAN: u64 = 4_096;

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    node: Arc<NodeContainer>,
}

/// Build the peer-facing router.
pub fn build_router(node: Arc<NodeContainer>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/chain/info", get(chain_info))
        .route("/pages", get(pages))
        .route("/peers", get(peers))
        .route("/block", post(receive_block))
        .with_state(AppState { node })
}

async fn health(State(state): State<AppState>) -> Response {
    match state.node.chain_tip() {
        Ok(tip) => (
            StatusCode::OK,
            Json(HealthBody {
                status: "ok".into(),
                height: tip.height,
                tip_hash: hex::encode(tip.hash),
            }),
        )
            .into_response(),
        Err(fault) => fault_response(StatusCode::SERVICE_UNAVAILABLE, &fault),
    }
}

async fn chain_info(State(state): State<AppState>) -> Response {
    match state.node.chain_tip() {
        Ok(tip) => (
            StatusCode::OK,
            Json(ChainInfoBody {
                height: tip.height,
                tip_hash: hex::encode(tip.hash),
                active_validators: state.node.active_validator_count(),
            }),
        )
            .into_response(),
        Err(fault) => fault_response(StatusCode::SERVICE_UNAVAILABLE, &fault),
    }
}

#[derive(Deserialize)]
struct RangeParams {
    from: u64,
    to: u64,
}

async fn pages(State(state): State<AppState>, Query(range): Query<RangeParams>) -> Response {
    if range.from > range.to || range.to - range.from >= MAX_PAGE_SPAN {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: format!("page range {}..={} is empty or too wide", range.from, range.to),
            }),
        )
            .into_response();
    }
    match state.node.ledger().pages_in(range.from, range.to) {
        Ok(pages) => (StatusCode::OK, Json(pages)).into_response(),
        Err(fault) => fault_response(StatusCode::INTERNAL_SERVER_ERROR, &fault),
    }
}

async fn peers(State(state): State<AppState>) -> Json<Vec<PeerSummary>> {
    let peers = state
        .node
        .sync()
        .peers()
        .into_iter()
        .map(|p| PeerSummary {
            addr: p.addr,
            healthy: p.healthy,
            height: p.height,
            tip_hash: hex::encode(p.tip),
            last_seen_ms: p.last_seen_ms,
        })
        .collect();
    Json(peers)
}

async fn receive_block(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(envelope): Json<BlockEnvelope>,
) -> Response {
    let peer = envelope.from.clone();
    match state.node.sync().receive_block(&envelope.from, envelope.block).await {
        Ok(outcome) => {
            if matches!(outcome, ReceiveOutcome::NeedsSync { .. }) {
                // The sender is ahead of us. Pull their chain in the
                // background instead of holding their request open.
                let node = state.node.clone();
                tokio::spawn(async move {
                    if let Err(error) = node.sync().sync(&peer).await {
                        warn!(%error, peer, "Catch-up sync failed");
                    }
                });
            }
            (StatusCode::ACCEPTED, Json(outcome)).into_response()
        }
        Err(fault) => {
            let correlation = headers
                .get(CORRELATION_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-");
            warn!(peer, correlation, %fault, "Pushed block refused");
            (StatusCode::CONFLICT, Json(ErrorBody { error: fault.to_string() })).into_response()
        }
    }
}

fn fault_response(status: StatusCode, fault: &LedgerFault) -> Response {
    (status, Json(ErrorBody { error: fault.to_string() })).into_response()
}

//! Per-client admission for the upload route.
//!
//! Runs before multipart parsing, so a denied request never reaches
//! validation, recognition or translation.

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::api::state::AppState;
use crate::error::ScanslateError;
use crate::ratelimit::Admission;

const FORWARDED_FOR: &str = "x-forwarded-for";
const UNKNOWN_CLIENT: &str = "unknown";

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_key(
        request.headers(),
        peer,
        state.config.server.trust_forwarded_for,
    );

    let policy = &state.config.rate_limit.policy;
    match state.limiter.admit(&client, policy.limit, policy.window) {
        Admission::Allowed { remaining } => {
            tracing::trace!(client = %client, remaining, "Request admitted");
            next.run(request).await
        }
        Admission::Denied { retry_after } => {
            tracing::info!(client = %client, limit = %policy, "Rate limit exceeded");
            let retry_after_secs = retry_after.as_secs_f64().ceil().max(1.0) as u64;
            ScanslateError::RateLimited { retry_after_secs }.into_response()
        }
    }
}

/// Peer IP, or the first `X-Forwarded-For` hop when the proxy is trusted.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = headers
            .get(FORWARDED_FOR)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty());
        if let Some(forwarded) = forwarded {
            return forwarded.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

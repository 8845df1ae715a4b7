use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose, Engine as _};
use sha2::{Digest, Sha256};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::warn;

use crate::cache::{Penalty, RateDecision};
use crate::error::ApiError;
use crate::middleware::{bearer_token, verify_token};
use crate::AppState;

static LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
static REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
static RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");
static PENALTY: HeaderName = HeaderName::from_static("x-ratelimit-penalty");

fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "127.0.0.1".to_string())
}

/// Short stable digest of the user agent, so clients behind one address
/// do not all share a bucket.
pub fn user_agent_hash(user_agent: &str) -> String {
    let digest = Sha256::digest(user_agent.as_bytes());
    let mut encoded = general_purpose::URL_SAFE_NO_PAD.encode(digest);
    encoded.truncate(12);
    encoded
}

/// Bucket key: the user when the request carries a valid token, otherwise
/// the client address plus user agent.
pub fn client_key(state: &AppState, headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(claims) = bearer_token(headers).and_then(|t| verify_token(&state.config.auth, t).ok()) {
        return format!("user:{}", claims.sub);
    }
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");
    format!("anon:{}:{}", client_ip(headers, peer), user_agent_hash(user_agent))
}

fn apply_headers(headers: &mut HeaderMap, decision: &RateDecision) {
    let reset_at = chrono::Utc::now().timestamp().max(0) as u64 + decision.reset_secs;
    headers.insert(LIMIT.clone(), HeaderValue::from(decision.limit));
    headers.insert(REMAINING.clone(), HeaderValue::from(decision.remaining));
    headers.insert(RESET.clone(), HeaderValue::from(reset_at));
    if decision.penalty != Penalty::None {
        headers.insert(PENALTY.clone(), HeaderValue::from_static(decision.penalty.as_str()));
    }
}

/// Fixed-window limiter in front of the API. Redis being down lets the
/// request through.
pub async fn rate_limit(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    if !state.config.features.enable_rate_limiting {
        return next.run(req).await;
    }

    let peer = req.extensions().get::<ConnectInfo<SocketAddr>>().map(|info| info.0);
    let key = client_key(&state, req.headers(), peer);
    let limits = &state.config.rate_limit;

    match state.cache.hit_rate_limit(&key, limits.max_requests, limits.window_secs).await {
        Ok(decision) if !decision.allowed => {
            warn!(
                key = %key,
                path = %req.uri().path(),
                penalty = decision.penalty.as_str(),
                "Rate limit exceeded"
            );
            let retry_after = decision.retry_after.unwrap_or(limits.window_secs);
            let mut response = ApiError::RateLimited { retry_after }.into_response();
            apply_headers(response.headers_mut(), &decision);
            response
        }
        Ok(decision) => {
            let mut response = next.run(req).await;
            apply_headers(response.headers_mut(), &decision);
            response
        }
        Err(e) => {
            warn!("Rate limiter unavailable, letting request through: {:?}", e);
            next.run(req).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_hash_is_short_and_stable() {
        let a = user_agent_hash("Mozilla/5.0");
        assert_eq!(a.len(), 12);
        assert_eq!(a, user_agent_hash("Mozilla/5.0"));
        assert_ne!(a, user_agent_hash("curl/8.0"));
    }

    #[test]
    fn client_ip_prefers_forwarded_headers() {
        let mut headers = HeaderMap::new();
        let peer: SocketAddr = "10.0.0.9:5000".parse().unwrap();
        assert_eq!(client_ip(&headers, Some(peer)), "10.0.0.9");
        assert_eq!(client_ip(&headers, None), "127.0.0.1");

        headers.insert("x-real-ip", HeaderValue::from_static("192.0.2.7"));
        assert_eq!(client_ip(&headers, Some(peer)), "192.0.2.7");

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.5, 10.0.0.1"));
        assert_eq!(client_ip(&headers, Some(peer)), "203.0.113.5");
    }
}

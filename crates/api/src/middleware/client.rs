//! Client metadata extractor.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::USER_AGENT;
use axum::http::request::Parts;
use gatekeep_auth::sessions::ClientMeta;

use crate::state::AppState;

/// Header set by the reverse proxy in front of the server.
const FORWARDED_FOR: &str = "x-forwarded-for";

/// Client IP and user agent of the current request.
///
/// The IP is the socket peer address. When `trust_forwarded_for` is enabled
/// the first `X-Forwarded-For` hop takes precedence.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    /// Key used for per-client rate limiting.
    pub fn rate_limit_key(&self) -> &str {
        self.ip.as_deref().unwrap_or("unknown")
    }

    pub fn into_meta(self) -> ClientMeta {
        ClientMeta {
            ip: self.ip,
            device: self.user_agent.clone(),
            user_agent: self.user_agent,
        }
    }
}

impl FromRequestParts<AppState> for ClientInfo {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let forwarded = if state.config.trust_forwarded_for {
            parts
                .headers
                .get(FORWARDED_FOR)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(|ip| ip.trim().to_string())
                .filter(|ip| !ip.is_empty())
        } else {
            None
        };

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(ClientInfo {
            ip: forwarded.or(peer),
            user_agent,
        })
    }
}

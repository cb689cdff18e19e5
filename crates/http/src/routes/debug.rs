//! Proxy diagnostics

use crate::middleware::ClientIp;
use crate::state::AppState;
use axum::{Json, Router, http::HeaderMap, routing::get};
use serde_json::{Value, json};
use tracing::instrument;

/// Headers a reverse proxy may set, echoed back verbatim
const PROXY_HEADERS: &[(&str, &str)] = &[
    ("x_forwarded_for", "x-forwarded-for"),
    ("x_real_ip", "x-real-ip"),
    ("x_forwarded_proto", "x-forwarded-proto"),
    ("x_forwarded_host", "x-forwarded-host"),
    ("x_forwarded_port", "x-forwarded-port"),
    ("x_forwarded_prefix", "x-forwarded-prefix"),
];

pub fn router() -> Router<AppState> {
    Router::new().route("/debug-ip", get(debug_ip))
}

/// Show how the visitor's address was resolved
#[instrument(skip_all)]
pub async fn debug_ip(client_ip: ClientIp, headers: HeaderMap) -> Json<Value> {
    let mut body = json!({
        "remote_addr": client_ip.peer.map(|peer| peer.ip().to_string()),
        "client_ip": client_ip.ip.map(|ip| ip.to_string()),
    });

    for (key, header) in PROXY_HEADERS {
        let value = headers
            .get(*header)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        body[*key] = json!(value);
    }

    Json(body)
}

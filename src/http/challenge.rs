//! Unencrypted ACME challenge responder.
//!
//! Runs on port 80 alongside the auto-TLS listener. Requests under the
//! well-known challenge path are answered here; everything else is redirected
//! to HTTPS. Failures are logged and never reach the primary listener.

use std::net::SocketAddr;

use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{any, get};
use axum::Router;
use axum_extra::extract::Host;

/// Path prefix of HTTP-01 challenge requests
pub const CHALLENGE_PATH_PREFIX: &str = "/.well-known/acme-challenge/";

/// Spawn the challenge responder in the background.
pub fn spawn_challenge_responder(http_port: u16, https_port: u16) {
    tokio::spawn(async move {
        let addr = SocketAddr::from(([0, 0, 0, 0], http_port));

        tracing::info!(
            http_port = %http_port,
            https_port = %https_port,
            "Starting ACME challenge responder"
        );

        match axum_server::bind(addr)
            .serve(challenge_router(https_port).into_make_service())
            .await
        {
            Ok(()) => {
                tracing::debug!("ACME challenge responder stopped");
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to serve autocert http server");
            }
        }
    });
}

/// Router answering challenge requests and redirecting the rest.
pub fn challenge_router(https_port: u16) -> Router {
    Router::new()
        .route("/.well-known/acme-challenge/{token}", get(challenge_token))
        .fallback(any(move |method: Method, Host(host): Host, uri: Uri| async move {
            redirect_to_https(&method, &host, &uri, https_port)
        }))
}

/// Certificates are validated over TLS-ALPN-01, so no HTTP-01 token is ever outstanding.
async fn challenge_token(axum::extract::Path(token): axum::extract::Path<String>) -> StatusCode {
    tracing::debug!(token = %token, "unknown ACME challenge token");
    StatusCode::NOT_FOUND
}

/// Redirect GET/HEAD requests to the same path over HTTPS.
fn redirect_to_https(method: &Method, host: &str, uri: &Uri, https_port: u16) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return (StatusCode::BAD_REQUEST, "Use HTTPS").into_response();
    }

    let https_url = https_url(host, uri, https_port);
    tracing::debug!(from = %uri, to = %https_url, "Redirecting HTTP to HTTPS");
    Redirect::permanent(&https_url).into_response()
}

fn https_url(host: &str, uri: &Uri, https_port: u16) -> String {
    let host_without_port = host.split(':').next().unwrap_or(host);
    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");

    if https_port == 443 {
        format!("https://{host_without_port}{path}")
    } else {
        format!("https://{host_without_port}:{https_port}{path}")
    }
}

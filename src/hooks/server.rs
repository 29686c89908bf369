//! Hook receiver built on tiny_http.
//!
//! Endpoints:
//! - `POST /hook` - agent CLI hook payload
//! - `GET /ping` - health check

use std::io::Read;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Result};
use tiny_http::{Response, Server};
use tracing::{debug, error, info};

use super::{AUTH_HEADER, MAX_BODY_BYTES};
use crate::registry::SessionRegistry;
use crate::HookEvent;

/// Running hook server. Stops when dropped.
pub struct HookServer {
    addr: SocketAddr,
    server: Arc<Server>,
    thread: Option<JoinHandle<()>>,
}

impl HookServer {
    /// Address actually bound (useful with port 0)
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Stop accepting requests and wait for the server thread
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.server.unblock();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for HookServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Bind `127.0.0.1:<port>` and serve hook events in a background thread
pub fn start_hook_server(
    registry: SessionRegistry,
    port: u16,
    auth_token: Option<String>,
) -> Result<HookServer> {
    let bind_addr = format!("127.0.0.1:{}", port);
    let server = Server::http(&bind_addr)
        .map_err(|e| anyhow!("Failed to start hook server on {}: {}", bind_addr, e))?;
    let addr = server
        .server_addr()
        .to_ip()
        .ok_or_else(|| anyhow!("Hook server is not bound to an IP address"))?;

    let auth_enabled = auth_token.as_deref().is_some_and(|t| !t.trim().is_empty());
    info!(
        "[agentwatch:hooks] Server listening on http://{} (auth: {})",
        addr,
        if auth_enabled { "enabled" } else { "disabled" }
    );

    let server = Arc::new(server);
    let worker = server.clone();
    let thread = thread::Builder::new()
        .name("agentwatch-hooks".into())
        .spawn(move || serve(&worker, &registry, auth_token.as_deref()))?;

    Ok(HookServer {
        addr,
        server,
        thread: Some(thread),
    })
}

fn serve(server: &Server, registry: &SessionRegistry, auth_token: Option<&str>) {
    for mut request in server.incoming_requests() {
        let method = request.method().to_string();
        let url = request.url().to_string();
        let path = url.split('?').next().unwrap_or(url.as_str());

        if !is_authorized(&request, auth_token) {
            respond_json(request, 401, serde_json::json!({ "error": "unauthorized" }));
            continue;
        }

        match (method.as_str(), path) {
            ("POST", "/hook") => {
                let body = match read_request_body(&mut request) {
                    Ok(body) => body,
                    Err(response) => {
                        let _ = request.respond(response);
                        continue;
                    }
                };
                handle_hook_request(registry, &body, request);
            }
            ("GET", "/ping") => {
                respond_json(
                    request,
                    200,
                    serde_json::json!({
                        "status": "ok",
                        "version": env!("CARGO_PKG_VERSION"),
                    }),
                );
            }
            _ => respond_json(request, 404, serde_json::json!({ "error": "not_found" })),
        }
    }
    debug!("[agentwatch:hooks] Server stopped");
}

fn handle_hook_request(registry: &SessionRegistry, body: &str, request: tiny_http::Request) {
    match HookEvent::from_json(body) {
        Ok(Some(event)) => {
            let session_id = registry.handle_hook(&event);
            respond_json(
                request,
                200,
                serde_json::json!({
                    "status": if session_id.is_some() { "ok" } else { "unmatched" },
                    "event": event.kind.as_str(),
                    "session_id": session_id,
                }),
            );
        }
        Ok(None) => {
            debug!("[agentwatch:hooks] Ignoring untracked hook event");
            respond_json(request, 200, serde_json::json!({ "status": "ignored" }));
        }
        Err(e) => {
            error!("[agentwatch:hooks] Invalid hook JSON: {}", e);
            respond_json(
                request,
                400,
                serde_json::json!({ "error": "invalid_json", "message": e.to_string() }),
            );
        }
    }
}

fn is_authorized(request: &tiny_http::Request, expected: Option<&str>) -> bool {
    let Some(expected) = expected.filter(|t| !t.trim().is_empty()) else {
        return true;
    };

    request
        .headers()
        .iter()
        .find(|h| h.field.equiv(AUTH_HEADER))
        .is_some_and(|h| h.value.as_str() == expected)
}

fn json_content_type() -> tiny_http::Header {
    tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap()
}

fn read_request_body(
    request: &mut tiny_http::Request,
) -> Result<String, Response<std::io::Cursor<Vec<u8>>>> {
    let mut body = String::new();
    let mut reader = request.as_reader().take((MAX_BODY_BYTES + 1) as u64);
    if let Err(e) = reader.read_to_string(&mut body) {
        error!("[agentwatch:hooks] Failed to read body: {}", e);
        return Err(Response::from_string("{\"error\":\"bad_request\"}")
            .with_status_code(400)
            .with_header(json_content_type()));
    }

    if body.len() > MAX_BODY_BYTES {
        return Err(Response::from_string("{\"error\":\"payload_too_large\"}")
            .with_status_code(413)
            .with_header(json_content_type()));
    }

    Ok(body)
}

fn respond_json(request: tiny_http::Request, status_code: u16, value: serde_json::Value) {
    let body =
        serde_json::to_string(&value).unwrap_or_else(|_| "{\"error\":\"serialize\"}".to_string());
    let response = Response::from_string(body)
        .with_status_code(status_code)
        .with_header(json_content_type());
    let _ = request.respond(response);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::hooks::{forward_hook, ping};
    use crate::notify::LogNotifier;
    use crate::process::SystemProcessLocator;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(
            Config::default(),
            Arc::new(LogNotifier),
            Arc::new(SystemProcessLocator::new("claude")),
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_hook_round_trip() {
        let registry = registry();
        registry.register_session("s1", "/work/proj", None).unwrap();
        let server = start_hook_server(registry.clone(), 0, Some("secret".into())).unwrap();
        let port = server.port();

        let reply = tokio::task::spawn_blocking(move || {
            forward_hook(
                port,
                Some("secret"),
                r#"{"hook_event_name":"Stop","cwd":"/work/proj","session_id":"abc"}"#,
            )
        })
        .await
        .unwrap()
        .unwrap();
        assert_eq!(reply["status"], "ok");
        assert_eq!(reply["session_id"], "s1");

        registry.flush().await;
        let session = registry.session("s1").unwrap();
        assert!(session.is_waiting);
        assert_eq!(session.sub_session_id.as_deref(), Some("abc"));
        server.shutdown();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_rejects_wrong_token_and_bad_json() {
        let registry = registry();
        let server = start_hook_server(registry, 0, Some("secret".into())).unwrap();
        let port = server.port();

        let (unauthorized, invalid, untracked, pong) = tokio::task::spawn_blocking(move || {
            (
                forward_hook(port, Some("wrong"), "{}"),
                forward_hook(port, Some("secret"), "not json"),
                forward_hook(port, Some("secret"), r#"{"hook_event_name":"Notification","cwd":"/x"}"#),
                ping(port, Some("secret")),
            )
        })
        .await
        .unwrap();

        assert!(unauthorized.unwrap_err().to_string().contains("401"));
        assert!(invalid.unwrap_err().to_string().contains("400"));
        assert_eq!(untracked.unwrap()["status"], "ignored");
        assert_eq!(pong.unwrap()["status"], "ok");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unmatched_hook_is_acknowledged() {
        let server = start_hook_server(registry(), 0, None).unwrap();
        let port = server.port();

        let reply = tokio::task::spawn_blocking(move || {
            forward_hook(port, None, r#"{"hook_event_name":"Stop","cwd":"/nowhere"}"#)
        })
        .await
        .unwrap()
        .unwrap();
        assert_eq!(reply["status"], "unmatched");
        assert!(reply["session_id"].is_null());
    }
}

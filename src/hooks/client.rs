//! HTTP client side of the hook channel

use anyhow::{Context, Result};

use super::AUTH_HEADER;

fn format_http_error(code: u16, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return format!("HTTP {code}");
    }

    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return format!("HTTP {code}: {body}");
    };

    let error = value
        .get("error")
        .and_then(|v| v.as_str())
        .unwrap_or("http_error");
    match value.get("message").and_then(|v| v.as_str()) {
        Some(details) => format!("HTTP {code} {error}: {details}"),
        None => format!("HTTP {code} {error}"),
    }
}

/// Send a request to the watcher and decode its JSON reply.
///
/// Non-2xx replies become errors carrying the server's `error`/`message`.
fn request_json(
    req: ureq::Request,
    token: Option<&str>,
    body: Option<&str>,
) -> Result<serde_json::Value> {
    let req = match token.filter(|t| !t.trim().is_empty()) {
        Some(token) => req.set(AUTH_HEADER, token),
        None => req,
    };
    let result = match body {
        Some(body) => req.set("Content-Type", "application/json").send_string(body),
        None => req.call(),
    };

    let resp = result.map_err(|e| match e {
        ureq::Error::Status(code, resp) => {
            let body = resp.into_string().unwrap_or_default();
            anyhow::anyhow!(format_http_error(code, &body))
        }
        other => anyhow::anyhow!(other),
    })?;

    let text = resp.into_string().context("Failed to read response body")?;
    serde_json::from_str(&text).context("Failed to parse JSON response")
}

/// POST a raw hook payload to the watcher on `127.0.0.1:<port>`
pub fn forward_hook(port: u16, token: Option<&str>, payload: &str) -> Result<serde_json::Value> {
    let url = format!("http://127.0.0.1:{}/hook", port);
    request_json(ureq::post(&url), token, Some(payload))
}

/// Check that a watcher is listening
pub fn ping(port: u16, token: Option<&str>) -> Result<serde_json::Value> {
    let url = format!("http://127.0.0.1:{}/ping", port);
    request_json(ureq::get(&url), token, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_http_error() {
        assert_eq!(format_http_error(500, "  "), "HTTP 500");
        assert_eq!(format_http_error(502, "gateway"), "HTTP 502: gateway");
        assert_eq!(
            format_http_error(400, r#"{"error":"invalid_json","message":"eof"}"#),
            "HTTP 400 invalid_json: eof"
        );
        assert_eq!(
            format_http_error(401, r#"{"error":"unauthorized"}"#),
            "HTTP 401 unauthorized"
        );
    }

    #[test]
    fn test_nothing_listening() {
        // Port 9 (discard) is never served on loopback in test environments
        assert!(ping(9, None).is_err());
    }
}

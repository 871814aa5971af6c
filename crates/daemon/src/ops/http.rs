// SPDX-License-Identifier: MIT

//! HTTP ops (`spec.md` §4.H): outbound HTTP under a domain allowlist.

use agentkernel_core::{KernelError, Permissions};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub const MAX_RESPONSE_BYTES: u64 = 8 * 1024 * 1024;
pub const MAX_REDIRECTS: usize = 5;

const REDACTED_HEADERS: &[&str] = &["host", "authorization", "cookie"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
}

impl Method {
    fn to_reqwest(&self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
            Method::Patch => reqwest::Method::PATCH,
            Method::Head => reqwest::Method::HEAD,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HttpResult {
    pub success: bool,
    pub status_code: u16,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<serde_json::Value>,
}

/// Headers the audit log and recorder must mask before persisting, matching
/// `spec.md` §7; case-normalized first since the spec's Open Question
/// assumes case-insensitive matching against the redact list.
pub fn redact_headers(headers: &serde_json::Value) -> serde_json::Value {
    let serde_json::Value::Object(map) = headers else { return headers.clone() };
    let mut out = serde_json::Map::new();
    for (k, v) in map {
        if REDACTED_HEADERS.contains(&k.to_ascii_lowercase().as_str()) {
            out.insert(k.clone(), serde_json::Value::String("***".into()));
        } else {
            out.insert(k.clone(), v.clone());
        }
    }
    serde_json::Value::Object(out)
}

pub fn host_of(url: &str) -> Result<String, KernelError> {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .ok_or_else(|| KernelError::BadRequest(format!("invalid url: {url}")))
}

pub async fn request(
    permissions: Arc<Permissions>,
    url: &str,
    method: Method,
    headers: Option<serde_json::Value>,
    body: Option<String>,
    timeout: Duration,
) -> Result<HttpResult, KernelError> {
    let host = host_of(url)?;
    if !permissions.can_access_domain(&host) {
        return Err(KernelError::PermissionDenied(format!("domain not allowed: {host}")));
    }

    let permissions_for_redirect = Arc::clone(&permissions);
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() > MAX_REDIRECTS {
                return attempt.error("too many redirects");
            }
            let host = attempt.url().host_str().unwrap_or("");
            if permissions_for_redirect.can_access_domain(host) {
                attempt.follow()
            } else {
                attempt.stop()
            }
        }))
        .build()
        .map_err(|e| KernelError::Internal(format!("http client build failed: {e}")))?;

    let mut builder = client.request(method.to_reqwest(), url);
    if let Some(serde_json::Value::Object(map)) = &headers {
        for (k, v) in map {
            if let Some(value) = v.as_str() {
                builder = builder.header(k, value);
            }
        }
    }
    if let Some(body) = body {
        builder = builder.body(body);
    }

    let response = builder.send().await.map_err(|e| {
        if e.is_timeout() {
            KernelError::Timeout
        } else {
            KernelError::Internal(format!("http request failed: {e}"))
        }
    })?;

    let status_code = response.status().as_u16();
    if let Some(len) = response.content_length() {
        if len > MAX_RESPONSE_BYTES {
            return Err(KernelError::TooLarge(format!("{url} response exceeds cap")));
        }
    }
    let bytes = response.bytes().await.map_err(|e| KernelError::Internal(e.to_string()))?;
    if bytes.len() as u64 > MAX_RESPONSE_BYTES {
        return Err(KernelError::TooLarge(format!("{url} response exceeds cap")));
    }

    Ok(HttpResult {
        success: (200..400).contains(&status_code),
        status_code,
        body: String::from_utf8_lossy(&bytes).into_owned(),
        headers: None,
    })
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;

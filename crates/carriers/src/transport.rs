//! Shared HTTP plumbing for carrier clients.
//!
//! `HttpTransport` makes exactly one attempt per call and maps the outcome
//! onto `LookupError`. Retries and pacing belong to the dispatcher, which
//! sees every call in the run.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::Url;
use shiptrack_recon::{CarrierVariant, LookupError};

pub(crate) const USER_AGENT: &str = concat!("shiptrack/", env!("CARGO_PKG_VERSION"));
const TIMEOUT: Duration = Duration::from_secs(30);

/// Extract a human-readable error message from a carrier error body.
pub(crate) type ErrorExtractor = fn(&serde_json::Value, u16) -> String;

pub(crate) struct HttpTransport {
    pub(crate) http: Client,
    carrier: CarrierVariant,
    error_extractor: ErrorExtractor,
}

impl HttpTransport {
    pub(crate) fn new(carrier: CarrierVariant, error_extractor: ErrorExtractor) -> Self {
        let http = Client::builder()
            .timeout(TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(%carrier, "HTTP client setup failed, using defaults: {e}");
                Client::new()
            });

        Self {
            http,
            carrier,
            error_extractor,
        }
    }

    /// `base_url` joined with the fixed `path` segments and one caller value
    /// as a final, percent-encoded segment. Sheet cells can hold `/` or `?`.
    pub(crate) fn url_with_segment(&self, base_url: &str, path: &[&str], segment: &str) -> Result<Url, LookupError> {
        let invalid = || LookupError::transient(format!("{} base URL '{base_url}' is not usable", self.carrier));
        let mut url = Url::parse(base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(path)
            .push(segment);
        Ok(url)
    }

    /// Send one request and parse the JSON body.
    ///
    /// `build_request` receives the underlying client and returns a fully
    /// configured request (URL, auth, headers, body).
    pub(crate) fn request(
        &self,
        build_request: impl FnOnce(&Client) -> RequestBuilder,
    ) -> Result<serde_json::Value, LookupError> {
        let resp = build_request(&self.http).send().map_err(|e| {
            let kind = if e.is_timeout() { "timeout" } else { "network error" };
            LookupError::transient(format!("{} {kind}: {e}", self.carrier))
        })?;

        let status = resp.status().as_u16();
        if !(200..300).contains(&status) {
            return Err(self.classify_failure(status, resp));
        }

        // Read as text first: some gateways prefix a BOM.
        let text = resp
            .text()
            .map_err(|e| LookupError::transient(format!("failed to read {} response body: {e}", self.carrier)))?;
        let trimmed = text.trim_start_matches('\u{feff}');
        serde_json::from_str(trimmed).map_err(|e| {
            LookupError::Malformed(format!(
                "failed to parse {} JSON response: {e} (body: {})",
                self.carrier,
                truncate(trimmed, 200),
            ))
        })
    }

    fn classify_failure(&self, status: u16, resp: Response) -> LookupError {
        let retry_after = retry_after(&resp);
        let body: serde_json::Value = resp
            .text()
            .ok()
            .and_then(|t| serde_json::from_str(t.trim_start_matches('\u{feff}')).ok())
            .unwrap_or(serde_json::Value::Null);
        let msg = (self.error_extractor)(&body, status);

        match status {
            401 | 403 => LookupError::AuthFailed(format!("{} auth failed ({status}): {msg}", self.carrier)),
            404 => LookupError::NotFound(msg),
            429 => LookupError::Transient {
                message: format!("{} rate limited (HTTP 429)", self.carrier),
                retry_after,
            },
            s if s >= 500 => LookupError::Transient {
                message: format!("{} upstream error (HTTP {s})", self.carrier),
                retry_after,
            },
            s => LookupError::NotFound(format!("{} rejected request ({s}): {msg}", self.carrier)),
        }
    }
}

/// `Retry-After` in seconds. HTTP-date values are ignored.
fn retry_after(resp: &Response) -> Option<Duration> {
    resp.headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ── Shared JSON helpers ─────────────────────────────────────────────

/// Join the non-empty string fields of `obj` named by `keys` with ", ".
pub(crate) fn join_fields(obj: &serde_json::Value, keys: &[&str]) -> Option<String> {
    let parts: Vec<&str> = keys
        .iter()
        .filter_map(|k| obj[*k].as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

pub(crate) fn str_field(value: &serde_json::Value) -> String {
    value.as_str().unwrap_or_default().trim().to_string()
}

/// Generic extractor for carriers that report `{ "errors": [{ "message": .. }] }`
/// or a top-level `message`.
pub(crate) fn extract_error_message(body: &serde_json::Value, status: u16) -> String {
    body["errors"][0]["message"]
        .as_str()
        .or_else(|| body["response"]["errors"][0]["message"].as_str())
        .or_else(|| body["error"]["message"].as_str())
        .or_else(|| body["error_description"].as_str())
        .or_else(|| body["message"].as_str())
        .or_else(|| body["detail"].as_str())
        .or_else(|| body["title"].as_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {status}"))
}

use std::time::{Duration, Instant};

use reqwest::blocking::{Client, RequestBuilder};
use shiptrack_recon::LookupError;

use crate::transport::HttpTransport;

/// Tokens are refreshed this long before the carrier says they expire.
pub(crate) const EXPIRY_MARGIN: Duration = Duration::from_secs(300);

/// Bearer token cached until `expires_in - 300s`.
#[derive(Debug)]
pub(crate) struct TokenCache {
    token: Option<(String, Instant)>,
    default_expires_in: u64,
}

impl TokenCache {
    pub(crate) fn new(default_expires_in: u64) -> Self {
        Self {
            token: None,
            default_expires_in,
        }
    }

    /// Cached token, or a fresh one from the token endpoint.
    ///
    /// Token endpoint rejections (400/401/403) are auth failures: the
    /// credentials are wrong, not the tracking number.
    pub(crate) fn bearer(
        &mut self,
        transport: &HttpTransport,
        build_request: impl FnOnce(&Client) -> RequestBuilder,
    ) -> Result<String, LookupError> {
        if let Some((token, valid_until)) = &self.token {
            if Instant::now() < *valid_until {
                return Ok(token.clone());
            }
        }

        let body = transport.request(build_request).map_err(|e| match e {
            LookupError::NotFound(msg) => LookupError::AuthFailed(format!("token request rejected: {msg}")),
            other => other,
        })?;

        let token = body["access_token"]
            .as_str()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| LookupError::Malformed("token response missing access_token".into()))?
            .to_string();
        let expires_in = parse_expires_in(&body["expires_in"]).unwrap_or(self.default_expires_in);
        let lifetime = Duration::from_secs(expires_in).saturating_sub(EXPIRY_MARGIN);

        tracing::debug!(expires_in, "access token refreshed");
        self.token = Some((token.clone(), Instant::now() + lifetime));
        Ok(token)
    }

    /// Drop the cached token so the next call re-authenticates.
    pub(crate) fn invalidate(&mut self) {
        self.token = None;
    }
}

/// `expires_in` arrives as a number or a numeric string depending on the
/// carrier.
fn parse_expires_in(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)),
        serde_json::Value::String(s) => s
            .trim()
            .parse::<u64>()
            .ok()
            .or_else(|| s.trim().parse::<f64>().ok().map(|f| f as u64)),
        _ => None,
    }
}

//! USPS Tracking API v3.

use shiptrack_recon::{CarrierClient, CarrierVariant, LookupError, RawTrackingResult};

use crate::token::TokenCache;
use crate::transport::{extract_error_message, join_fields, str_field, HttpTransport};
use crate::OAuthCredentials;

pub const USPS_API_BASE: &str = "https://api.usps.com";
const DEFAULT_TOKEN_TTL: u64 = 3600;

pub struct UspsClient {
    transport: HttpTransport,
    credentials: Option<OAuthCredentials>,
    base_url: String,
    tokens: TokenCache,
}

impl UspsClient {
    pub fn with_base_url(credentials: Option<OAuthCredentials>, base_url: String) -> Self {
        Self {
            transport: HttpTransport::new(CarrierVariant::Usps, extract_error_message),
            credentials,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens: TokenCache::new(DEFAULT_TOKEN_TTL),
        }
    }

    fn access_token(&mut self) -> Result<String, LookupError> {
        let creds = self.credentials.as_ref().ok_or(LookupError::CredentialsMissing)?;
        let url = format!("{}/oauth2/v3/token", self.base_url);
        self.tokens.bearer(&self.transport, |http| {
            http.post(&url).form(&[
                ("grant_type", "client_credentials"),
                ("client_id", creds.client_id.as_str()),
                ("client_secret", creds.client_secret.as_str()),
            ])
        })
    }
}

impl CarrierClient for UspsClient {
    fn lookup(&mut self, tracking_number: &str) -> Result<RawTrackingResult, LookupError> {
        let token = self.access_token()?;
        let url = self
            .transport
            .url_with_segment(&self.base_url, &["tracking", "v3", "tracking"], tracking_number)?;

        let resp = self.transport.request(|http| http.get(url).bearer_auth(&token));
        if let Err(LookupError::AuthFailed(_)) = &resp {
            self.tokens.invalidate();
        }
        parse_track_response(&resp?)
    }

    fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }
}

pub(crate) fn parse_track_response(body: &serde_json::Value) -> Result<RawTrackingResult, LookupError> {
    if !body.is_object() || (body["statusCategory"].is_null() && body["status"].is_null()) {
        return Err(LookupError::Malformed("USPS response has no statusCategory".into()));
    }

    let delivery_timestamp = body["actualDeliveryDate"]
        .as_str()
        .filter(|d| !d.trim().is_empty())
        .map(str::to_string);

    Ok(RawTrackingResult {
        code: str_field(&body["statusCategory"]),
        description: str_field(&body["status"]),
        delivery_timestamp,
        location: join_fields(body, &["destinationCity", "destinationState"]),
        error: None,
    })
}

//! UPS Tracking API v1.

use shiptrack_recon::{CarrierClient, CarrierVariant, LookupError, RawTrackingResult};

use crate::token::TokenCache;
use crate::transport::{extract_error_message, join_fields, str_field, HttpTransport};
use crate::OAuthCredentials;

pub const UPS_API_BASE: &str = "https://onlinetools.ups.com";
const DEFAULT_TOKEN_TTL: u64 = 14400;
const TRANSACTION_SRC: &str = "shiptrack";

pub struct UpsClient {
    transport: HttpTransport,
    credentials: Option<OAuthCredentials>,
    base_url: String,
    tokens: TokenCache,
}

impl UpsClient {
    pub fn with_base_url(credentials: Option<OAuthCredentials>, base_url: String) -> Self {
        Self {
            transport: HttpTransport::new(CarrierVariant::Ups, extract_error_message),
            credentials,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens: TokenCache::new(DEFAULT_TOKEN_TTL),
        }
    }

    fn access_token(&mut self) -> Result<String, LookupError> {
        let creds = self.credentials.as_ref().ok_or(LookupError::CredentialsMissing)?;
        let url = format!("{}/security/v1/oauth/token", self.base_url);
        self.tokens.bearer(&self.transport, |http| {
            http.post(&url)
                .basic_auth(&creds.client_id, Some(&creds.client_secret))
                .form(&[("grant_type", "client_credentials")])
        })
    }
}

impl CarrierClient for UpsClient {
    fn lookup(&mut self, tracking_number: &str) -> Result<RawTrackingResult, LookupError> {
        let token = self.access_token()?;
        let url = self
            .transport
            .url_with_segment(&self.base_url, &["api", "track", "v1", "details"], tracking_number)?;
        let trans_id = format!("track-{}", tracking_number.chars().take(20).collect::<String>());

        let resp = self.transport.request(|http| {
            http.get(url)
                .bearer_auth(&token)
                .header("transId", &trans_id)
                .header("transactionSrc", TRANSACTION_SRC)
                .query(&[("locale", "en_US"), ("returnSignature", "false")])
        });
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
    let shipment = &body["trackResponse"]["shipment"][0];
    if !shipment.is_object() {
        return Err(LookupError::Malformed("UPS response has no trackResponse.shipment".into()));
    }

    let package = &shipment["package"][0];
    let Some(latest) = package["activity"].as_array().and_then(|a| a.first()) else {
        let msg = shipment["warnings"][0]["message"]
            .as_str()
            .unwrap_or("no tracking activity");
        return Err(LookupError::NotFound(msg.to_string()));
    };

    let status = &latest["status"];
    let code = str_field(&status["type"]);

    // deliveryDate is a list of {type, date}; older payloads send one object.
    let delivery_date = &package["deliveryDate"];
    let delivery_date = if delivery_date.is_array() { &delivery_date[0] } else { delivery_date };
    let delivery_timestamp = delivery_date["date"]
        .as_str()
        .filter(|d| d.len() == 8)
        .or_else(|| {
            // Delivered packages without deliveryDate: the delivery scan date.
            (code.eq_ignore_ascii_case("D"))
                .then(|| latest["date"].as_str())
                .flatten()
                .filter(|d| d.len() == 8)
        })
        .map(str::to_string);

    Ok(RawTrackingResult {
        code,
        description: str_field(&status["description"]),
        delivery_timestamp,
        location: join_fields(&latest["location"]["address"], &["city", "stateProvince", "country"]),
        error: None,
    })
}

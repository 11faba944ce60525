//! FedEx Track API v1.

use shiptrack_recon::{CarrierClient, CarrierVariant, LookupError, RawTrackingResult};

use crate::token::TokenCache;
use crate::transport::{extract_error_message, join_fields, str_field, HttpTransport};
use crate::OAuthCredentials;

pub const FEDEX_API_BASE: &str = "https://apis.fedex.com";
const DEFAULT_TOKEN_TTL: u64 = 3600;

pub struct FedExClient {
    transport: HttpTransport,
    credentials: Option<OAuthCredentials>,
    base_url: String,
    tokens: TokenCache,
}

impl FedExClient {
    pub fn with_base_url(credentials: Option<OAuthCredentials>, base_url: String) -> Self {
        Self {
            transport: HttpTransport::new(CarrierVariant::FedEx, extract_error_message),
            credentials,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens: TokenCache::new(DEFAULT_TOKEN_TTL),
        }
    }

    fn access_token(&mut self) -> Result<String, LookupError> {
        let creds = self.credentials.as_ref().ok_or(LookupError::CredentialsMissing)?;
        let url = format!("{}/oauth/token", self.base_url);
        self.tokens.bearer(&self.transport, |http| {
            http.post(&url).form(&[
                ("grant_type", "client_credentials"),
                ("client_id", creds.client_id.as_str()),
                ("client_secret", creds.client_secret.as_str()),
            ])
        })
    }
}

impl CarrierClient for FedExClient {
    fn lookup(&mut self, tracking_number: &str) -> Result<RawTrackingResult, LookupError> {
        let token = self.access_token()?;
        let url = format!("{}/track/v1/trackingnumbers", self.base_url);
        let body = serde_json::json!({
            "trackingInfo": [
                { "trackingNumberInfo": { "trackingNumber": tracking_number } }
            ],
            "includeDetailedScans": false,
        });

        let resp = self
            .transport
            .request(|http| http.post(&url).bearer_auth(&token).json(&body));
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
    let result = &body["output"]["completeTrackResults"][0]["trackResults"][0];
    if !result.is_object() {
        return Err(LookupError::Malformed("FedEx response has no trackResults".into()));
    }

    // FedEx answers 200 with a per-result error for unknown numbers.
    let error = &result["error"];
    if error.is_object() {
        let msg = error["message"]
            .as_str()
            .or_else(|| error["code"].as_str())
            .unwrap_or("tracking number not found");
        return Err(LookupError::NotFound(msg.to_string()));
    }

    let latest = &result["latestStatusDetail"];
    let delivery_timestamp = result["dateAndTimes"]
        .as_array()
        .into_iter()
        .flatten()
        .find(|d| d["type"].as_str() == Some("ACTUAL_DELIVERY"))
        .and_then(|d| d["dateTime"].as_str())
        .map(str::to_string);

    Ok(RawTrackingResult {
        code: str_field(&latest["code"]),
        description: str_field(&latest["description"]),
        delivery_timestamp,
        location: join_fields(&latest["scanLocation"], &["city", "stateOrProvinceCode", "countryCode"]),
        error: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn creds() -> Option<OAuthCredentials> {
        Some(OAuthCredentials::new("fx_id", "fx_secret"))
    }

    fn delivered_body() -> serde_json::Value {
        serde_json::json!({
            "output": {
                "completeTrackResults": [{
                    "trackingNumber": "794644746986",
                    "trackResults": [{
                        "latestStatusDetail": {
                            "code": "DL",
                            "description": "Delivered",
                            "scanLocation": {
                                "city": "MEMPHIS",
                                "stateOrProvinceCode": "TN",
                                "countryCode": "US"
                            }
                        },
                        "dateAndTimes": [
                            { "type": "ESTIMATED_DELIVERY", "dateTime": "2026-02-19T12:00:00-06:00" },
                            { "type": "ACTUAL_DELIVERY", "dateTime": "2026-02-20T14:03:00-06:00" }
                        ]
                    }]
                }]
            }
        })
    }

    #[test]
    fn parse_delivered() {
        let raw = parse_track_response(&delivered_body()).unwrap();
        assert_eq!(raw.code, "DL");
        assert_eq!(raw.description, "Delivered");
        assert_eq!(raw.location.as_deref(), Some("MEMPHIS, TN, US"));
        assert_eq!(raw.delivery_timestamp.as_deref(), Some("2026-02-20T14:03:00-06:00"));
    }

    #[test]
    fn parse_result_error_is_not_found() {
        let body = serde_json::json!({
            "output": { "completeTrackResults": [{ "trackResults": [{
                "error": { "code": "TRACKING.TRACKINGNUMBER.NOTFOUND", "message": "Tracking number cannot be found." }
            }]}]}
        });
        assert_eq!(
            parse_track_response(&body).unwrap_err(),
            LookupError::NotFound("Tracking number cannot be found.".into())
        );
    }

    #[test]
    fn parse_unexpected_shape_is_malformed() {
        let body = serde_json::json!({ "transactionId": "abc" });
        assert!(matches!(parse_track_response(&body), Err(LookupError::Malformed(_))));
    }

    #[test]
    fn lookup_authenticates_then_tracks() {
        let server = MockServer::start();
        let token = server.mock(|when, then| {
            when.method(POST)
                .path("/oauth/token")
                .body_includes("grant_type=client_credentials")
                .body_includes("client_id=fx_id");
            then.status(200)
                .json_body(serde_json::json!({ "access_token": "fx_tok", "expires_in": 3599 }));
        });
        let track = server.mock(|when, then| {
            when.method(POST)
                .path("/track/v1/trackingnumbers")
                .header("Authorization", "Bearer fx_tok")
                .body_includes("794644746986");
            then.status(200).json_body(delivered_body());
        });

        let mut client = FedExClient::with_base_url(creds(), server.base_url());
        let raw = client.lookup("794644746986").unwrap();
        assert_eq!(raw.code, "DL");
        client.lookup("794644746986").unwrap();

        token.assert_calls(1);
        track.assert_calls(2);
    }

    #[test]
    fn missing_credentials_make_no_call() {
        let server = MockServer::start();
        let any = server.mock(|when, then| {
            when.path_includes("/");
            then.status(200);
        });

        let mut client = FedExClient::with_base_url(None, server.base_url());
        assert!(!client.is_configured());
        assert_eq!(client.lookup("1").unwrap_err(), LookupError::CredentialsMissing);
        any.assert_calls(0);
    }

    #[test]
    fn auth_failure_drops_cached_token() {
        let server = MockServer::start();
        let token = server.mock(|when, then| {
            when.method(POST).path("/oauth/token");
            then.status(200)
                .json_body(serde_json::json!({ "access_token": "stale", "expires_in": 3600 }));
        });
        server.mock(|when, then| {
            when.method(POST).path("/track/v1/trackingnumbers");
            then.status(401)
                .json_body(serde_json::json!({ "errors": [{ "code": "NOT.AUTHORIZED.ERROR", "message": "Access token expired" }] }));
        });

        let mut client = FedExClient::with_base_url(creds(), server.base_url());
        let err = client.lookup("1").unwrap_err();
        assert_eq!(err, LookupError::AuthFailed("FedEx auth failed (401): Access token expired".into()));
        client.lookup("1").unwrap_err();
        token.assert_calls(2);
    }
}

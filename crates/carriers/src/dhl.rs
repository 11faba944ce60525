//! DHL Shipment Tracking - Unified API.

use shiptrack_recon::{CarrierClient, CarrierVariant, LookupError, RawTrackingResult};

use crate::transport::{extract_error_message, str_field, HttpTransport};

pub const DHL_API_BASE: &str = "https://api-eu.dhl.com";

pub struct DhlClient {
    transport: HttpTransport,
    api_key: Option<String>,
    base_url: String,
}

impl DhlClient {
    pub fn with_base_url(api_key: Option<String>, base_url: String) -> Self {
        Self {
            transport: HttpTransport::new(CarrierVariant::Dhl, extract_error_message),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl CarrierClient for DhlClient {
    fn lookup(&mut self, tracking_number: &str) -> Result<RawTrackingResult, LookupError> {
        let api_key = self.api_key.as_deref().ok_or(LookupError::CredentialsMissing)?;
        let url = format!("{}/track/shipments", self.base_url);

        let body = self.transport.request(|http| {
            http.get(&url)
                .header("DHL-API-Key", api_key)
                .query(&[("trackingNumber", tracking_number)])
        })?;
        parse_track_response(&body)
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

pub(crate) fn parse_track_response(body: &serde_json::Value) -> Result<RawTrackingResult, LookupError> {
    let Some(shipments) = body["shipments"].as_array() else {
        return Err(LookupError::Malformed("DHL response has no shipments".into()));
    };
    let Some(shipment) = shipments.first() else {
        return Err(LookupError::NotFound("no shipment found".into()));
    };

    let status = &shipment["status"];
    let location = str_field(&status["location"]["address"]["addressLocality"]);

    Ok(RawTrackingResult {
        code: str_field(&status["statusCode"]),
        description: str_field(&status["description"]),
        delivery_timestamp: status["timestamp"].as_str().map(str::to_string),
        location: (!location.is_empty()).then_some(location),
        error: None,
    })
}

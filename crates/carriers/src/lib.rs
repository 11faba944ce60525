//! `shiptrack-carriers`: Tracking clients for FedEx, UPS, USPS and DHL.
//!
//! Each client implements `shiptrack_recon::CarrierClient`: one network call
//! per `lookup`, errors classified into `LookupError`. Retries and pacing are
//! left to the engine's dispatcher.

pub mod dhl;
pub mod fedex;
pub mod ups;
pub mod usps;

mod token;
mod transport;

use shiptrack_recon::{CarrierSet, CarrierVariant};

pub use dhl::DhlClient;
pub use fedex::FedExClient;
pub use ups::UpsClient;
pub use usps::UspsClient;

/// OAuth client-credentials pair.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl OAuthCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

// Secrets stay out of logs and panics.
impl std::fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Secrets for every carrier. `None` leaves that carrier unconfigured.
#[derive(Debug, Clone, Default)]
pub struct CarrierCredentials {
    pub fedex: Option<OAuthCredentials>,
    pub ups: Option<OAuthCredentials>,
    pub usps: Option<OAuthCredentials>,
    pub dhl_api_key: Option<String>,
}

impl CarrierCredentials {
    pub fn is_configured(&self, carrier: CarrierVariant) -> bool {
        match carrier {
            CarrierVariant::FedEx => self.fedex.is_some(),
            CarrierVariant::Ups => self.ups.is_some(),
            CarrierVariant::Usps => self.usps.is_some(),
            CarrierVariant::Dhl => self.dhl_api_key.is_some(),
            CarrierVariant::Unknown => false,
        }
    }
}

/// API base URLs. Defaults are the production hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarrierEndpoints {
    pub fedex: String,
    pub ups: String,
    pub usps: String,
    pub dhl: String,
}

impl Default for CarrierEndpoints {
    fn default() -> Self {
        Self {
            fedex: fedex::FEDEX_API_BASE.to_string(),
            ups: ups::UPS_API_BASE.to_string(),
            usps: usps::USPS_API_BASE.to_string(),
            dhl: dhl::DHL_API_BASE.to_string(),
        }
    }
}

/// Build the full client set. Carriers without credentials still get a
/// client; it reports itself unconfigured and never touches the network.
pub fn build_carrier_set(credentials: &CarrierCredentials, endpoints: &CarrierEndpoints) -> CarrierSet {
    for carrier in CarrierVariant::SUPPORTED {
        if !credentials.is_configured(carrier) {
            tracing::debug!(%carrier, "no credentials configured");
        }
    }

    CarrierSet::new()
        .with(
            CarrierVariant::FedEx,
            FedExClient::with_base_url(credentials.fedex.clone(), endpoints.fedex.clone()),
        )
        .with(
            CarrierVariant::Ups,
            UpsClient::with_base_url(credentials.ups.clone(), endpoints.ups.clone()),
        )
        .with(
            CarrierVariant::Usps,
            UspsClient::with_base_url(credentials.usps.clone(), endpoints.usps.clone()),
        )
        .with(
            CarrierVariant::Dhl,
            DhlClient::with_base_url(credentials.dhl_api_key.clone(), endpoints.dhl.clone()),
        )
}

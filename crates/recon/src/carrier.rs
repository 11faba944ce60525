use std::collections::BTreeMap;

use crate::error::LookupError;
use crate::model::{CarrierVariant, RawTrackingResult};

/// Uniform tracking capability implemented once per carrier.
///
/// Clients own their credentials and auth-token cache. A client without
/// credentials must report `is_configured() == false` and return
/// `LookupError::CredentialsMissing` from `lookup` without touching the
/// network.
pub trait CarrierClient {
    fn lookup(&mut self, tracking_number: &str) -> Result<RawTrackingResult, LookupError>;

    fn is_configured(&self) -> bool {
        true
    }
}

/// The closed set of clients, keyed by the variant the classifier selects.
#[derive(Default)]
pub struct CarrierSet {
    clients: BTreeMap<CarrierVariant, Box<dyn CarrierClient>>,
}

impl CarrierSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the client for `variant`. `Unknown` is ignored: there is no
    /// client for an unrecognized carrier.
    pub fn insert(&mut self, variant: CarrierVariant, client: Box<dyn CarrierClient>) {
        if variant == CarrierVariant::Unknown {
            return;
        }
        self.clients.insert(variant, client);
    }

    pub fn with(mut self, variant: CarrierVariant, client: impl CarrierClient + 'static) -> Self {
        self.insert(variant, Box::new(client));
        self
    }

    pub fn get(&self, variant: CarrierVariant) -> Option<&dyn CarrierClient> {
        self.clients.get(&variant).map(|c| c.as_ref())
    }

    pub fn get_mut(&mut self, variant: CarrierVariant) -> Option<&mut (dyn CarrierClient + 'static)> {
        self.clients.get_mut(&variant).map(|c| c.as_mut())
    }

    /// Whether `variant` has a client with credentials.
    pub fn is_configured(&self, variant: CarrierVariant) -> bool {
        self.get(variant).is_some_and(|c| c.is_configured())
    }
}

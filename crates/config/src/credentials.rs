// Carrier and Lark secrets
//
// Secrets are resolved from:
// 1. System keychain (with the `keychain` feature)
// 2. Environment variables (CI/headless)
//
// Secrets are NEVER read from the settings file.

use serde::Serialize;

/// Service name for keychain storage
#[cfg(feature = "keychain")]
const KEYCHAIN_SERVICE: &str = "shiptrack";

/// Where a secret came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretSource {
    Keychain,
    Environment,
    None,
}

impl SecretSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretSource::Keychain => "keychain",
            SecretSource::Environment => "environment",
            SecretSource::None => "none",
        }
    }
}

#[derive(Clone)]
pub struct SecretLookup {
    pub value: Option<String>,
    pub source: SecretSource,
}

impl std::fmt::Debug for SecretLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretLookup")
            .field("value", &self.value.as_ref().map(|_| "<redacted>"))
            .field("source", &self.source)
            .finish()
    }
}

/// Keychain account for a variable: `FEDEX_API_KEY` → `fedex_api_key`.
#[cfg(feature = "keychain")]
fn keychain_account(name: &str) -> String {
    name.to_lowercase()
}

/// Resolve one secret by its environment variable name.
///
/// Checks in order:
/// 1. System keychain (account = lowercased variable name)
/// 2. Environment variable
pub fn get_secret(name: &str, env: &dyn Fn(&str) -> Option<String>) -> SecretLookup {
    #[cfg(feature = "keychain")]
    {
        if let Ok(entry) = keyring::Entry::new(KEYCHAIN_SERVICE, &keychain_account(name)) {
            if let Ok(value) = entry.get_password() {
                if !value.trim().is_empty() {
                    return SecretLookup {
                        value: Some(value.trim().to_string()),
                        source: SecretSource::Keychain,
                    };
                }
            }
        }
    }

    match env(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(value) => SecretLookup {
            value: Some(value),
            source: SecretSource::Environment,
        },
        None => SecretLookup {
            value: None,
            source: SecretSource::None,
        },
    }
}

/// Check if keychain support is compiled in
pub fn keychain_available() -> bool {
    cfg!(feature = "keychain")
}

// ── Named credential sets ───────────────────────────────────────────

/// One credential: an id/secret pair or a single key.
#[derive(Debug, Clone)]
pub struct CredentialStatus {
    /// `fedex`, `ups`, `usps`, `dhl` or `lark`.
    pub name: &'static str,
    /// Environment variable names, in order.
    pub vars: &'static [&'static str],
    pub lookups: Vec<SecretLookup>,
}

impl CredentialStatus {
    /// All parts present.
    pub fn is_complete(&self) -> bool {
        self.lookups.iter().all(|l| l.value.is_some())
    }

    /// Weakest source across parts: `None` if any part is missing.
    pub fn source(&self) -> SecretSource {
        if !self.is_complete() {
            return SecretSource::None;
        }
        if self.lookups.iter().all(|l| l.source == SecretSource::Keychain) {
            SecretSource::Keychain
        } else {
            SecretSource::Environment
        }
    }

    /// Variables that resolved to nothing.
    pub fn missing(&self) -> Vec<&'static str> {
        self.vars
            .iter()
            .zip(&self.lookups)
            .filter(|(_, l)| l.value.is_none())
            .map(|(v, _)| *v)
            .collect()
    }

    /// `(id, secret)` when both parts are present.
    pub fn pair(&self) -> Option<(String, String)> {
        match self.lookups.as_slice() {
            [id, secret] => Some((id.value.clone()?, secret.value.clone()?)),
            _ => None,
        }
    }

    /// The single key, for one-part credentials.
    pub fn key(&self) -> Option<String> {
        match self.lookups.as_slice() {
            [key] => key.value.clone(),
            _ => None,
        }
    }
}

/// Credential variables per service.
pub const CREDENTIAL_VARS: &[(&str, &[&str])] = &[
    ("lark", &["LARK_APP_ID", "LARK_APP_SECRET"]),
    ("fedex", &["FEDEX_API_KEY", "FEDEX_SECRET_KEY"]),
    ("ups", &["UPS_CLIENT_ID", "UPS_CLIENT_SECRET"]),
    ("usps", &["USPS_CLIENT_ID", "USPS_CLIENT_SECRET"]),
    ("dhl", &["DHL_API_KEY"]),
];

/// Resolved secrets for every service.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub entries: Vec<CredentialStatus>,
}

impl Credentials {
    pub fn from_env() -> Self {
        Self::resolve(&|name| std::env::var(name).ok())
    }

    pub fn resolve(env: &dyn Fn(&str) -> Option<String>) -> Self {
        let entries = CREDENTIAL_VARS
            .iter()
            .map(|&(name, vars)| CredentialStatus {
                name,
                vars,
                lookups: vars.iter().map(|v| get_secret(v, env)).collect(),
            })
            .collect();
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&CredentialStatus> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn pair(&self, name: &str) -> Option<(String, String)> {
        self.get(name).and_then(CredentialStatus::pair)
    }

    pub fn key(&self, name: &str) -> Option<String> {
        self.get(name).and_then(CredentialStatus::key)
    }
}

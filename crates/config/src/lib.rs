// Configuration loading

pub mod credentials;
pub mod settings;

use std::path::PathBuf;

use thiserror::Error;

pub use credentials::{Credentials, SecretSource};
pub use settings::{Settings, TabScope};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings{}: {message}", .path.as_ref().map(|p| format!(" in {}", p.display())).unwrap_or_default())]
    Parse { path: Option<PathBuf>, message: String },
    #[error("no sheet tokens configured")]
    NoSheetTokens,
    #[error("{0}")]
    Invalid(String),
}

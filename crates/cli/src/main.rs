// shiptrack CLI - reconcile spreadsheet shipments against carrier tracking

mod doctor;
mod exit_codes;
mod run;
mod track;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use shiptrack_carriers::{build_carrier_set, CarrierCredentials, CarrierEndpoints, OAuthCredentials};
use shiptrack_config::{ConfigError, Credentials, Settings};
use shiptrack_recon::{CarrierSet, DispatchConfig};
use tracing_subscriber::EnvFilter;

use exit_codes::{EXIT_CONFIG, EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "shiptrack")]
#[command(about = "Reconcile spreadsheet shipments against live carrier tracking")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Settings file (default: $SHIPTRACK_CONFIG, then ~/.config/shiptrack/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Log debug detail (per-call retries, skipped rows)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check every shipment, write status changes back and post the summary
    #[command(after_help = "\
Examples:
  shiptrack run
  shiptrack run --dry-run --json
  shiptrack run --config ./shiptrack.toml --output report.json")]
    Run {
        /// Do the lookups but write nothing back and send no message
        #[arg(long)]
        dry_run: bool,

        /// Print the run report as JSON on stdout
        #[arg(long)]
        json: bool,

        /// Also write the JSON run report to this file
        #[arg(long, short = 'o', value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Show resolved settings and which credentials are available
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Look up one tracking number and print the normalized result
    #[command(after_help = "\
Examples:
  shiptrack track ups 1Z999AA10123456784
  shiptrack track 'FedEx Ground' 794644746986 --json")]
    Track {
        /// Carrier name as it would appear in the sheet (fedex, ups, usps, dhl, ...)
        carrier: String,

        /// Tracking number
        tracking: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  shiptrack-recon ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
    )
}

fn init_tracing(quiet: bool, verbose: bool) {
    let default = if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    // RUST_LOG wins over the flags.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose);

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Run { dry_run, json, output } => run::cmd_run(config, dry_run, json, output),
        Commands::Doctor { json } => doctor::cmd_doctor(config, json),
        Commands::Track { carrier, tracking, json } => track::cmd_track(config, &carrier, &tracking, json),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self::new(EXIT_ERROR, msg)
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(EXIT_CONFIG, msg)
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        let hint = match &err {
            ConfigError::NoSheetTokens => {
                Some("set lark.sheet_tokens in the settings file or LARK_SHEET_TOKENS".to_string())
            }
            ConfigError::Read { .. } => Some("pass --config or set SHIPTRACK_CONFIG to an existing file".to_string()),
            _ => None,
        };
        Self { code: EXIT_CONFIG, message: err.to_string(), hint }
    }
}

// ============================================================================
// Shared setup
// ============================================================================

/// Load settings (file + environment) without validating them.
pub(crate) fn load_settings(config: Option<&Path>) -> Result<Settings, CliError> {
    Ok(Settings::load(config)?)
}

pub(crate) fn dispatch_config(settings: &Settings) -> DispatchConfig {
    DispatchConfig {
        pacing: std::time::Duration::from_millis(settings.dispatch.pacing_ms),
        max_retries: settings.dispatch.max_retries,
    }
}

/// Carrier clients from resolved secrets and per-carrier URL overrides.
pub(crate) fn carrier_set(settings: &Settings, credentials: &Credentials) -> CarrierSet {
    let oauth = |name: &str| credentials.pair(name).map(|(id, secret)| OAuthCredentials::new(id, secret));
    let carrier_credentials = CarrierCredentials {
        fedex: oauth("fedex"),
        ups: oauth("ups"),
        usps: oauth("usps"),
        dhl_api_key: credentials.key("dhl"),
    };

    let defaults = CarrierEndpoints::default();
    let endpoint = |key: &str, default: String| settings.carrier_base_url(key).map(str::to_string).unwrap_or(default);
    let endpoints = CarrierEndpoints {
        fedex: endpoint("fedex", defaults.fedex),
        ups: endpoint("ups", defaults.ups),
        usps: endpoint("usps", defaults.usps),
        dhl: endpoint("dhl", defaults.dhl),
    };

    build_carrier_set(&carrier_credentials, &endpoints)
}

/// Environment variables behind a named credential, for hints.
pub(crate) fn credential_vars(name: &str) -> String {
    shiptrack_config::credentials::CREDENTIAL_VARS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, vars)| vars.join(" and "))
        .unwrap_or_default()
}

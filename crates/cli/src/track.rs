// shiptrack track - one live lookup, same clients and normalizer as `run`

use std::path::Path;

use shiptrack_config::Credentials;
use shiptrack_recon::{classify, reconcile_with, CarrierVariant, Dispatcher, ShipmentId, ShipmentRecord};

use crate::exit_codes::EXIT_TRACK_FAILED;
use crate::{carrier_set, credential_vars, dispatch_config, load_settings, CliError};

pub fn cmd_track(config: Option<&Path>, carrier: &str, tracking: &str, json: bool) -> Result<(), CliError> {
    let tracking = tracking.trim();
    if tracking.is_empty() {
        return Err(CliError::usage("tracking number is empty"));
    }
    let variant = classify(carrier);
    if variant == CarrierVariant::Unknown {
        return Err(CliError::usage(format!("unknown carrier '{carrier}'")).with_hint("use fedex, ups, usps or dhl"));
    }

    let settings = load_settings(config)?;
    let credentials = Credentials::from_env();
    let mut carriers = carrier_set(&settings, &credentials);
    if !carriers.is_configured(variant) {
        return Err(CliError::config(format!("{variant} credentials not configured"))
            .with_hint(format!("set {}", credential_vars(variant.key()))));
    }

    let shipment = ShipmentRecord {
        id: ShipmentId {
            spreadsheet: String::new(),
            tab: String::new(),
            sheet_id: String::new(),
            row: 0,
        },
        tracking_number: tracking.to_string(),
        carrier_label: carrier.to_string(),
        recipient: String::new(),
        customer: String::new(),
        status: String::new(),
        delivery_date: None,
    };
    let mut dispatcher = Dispatcher::new(dispatch_config(&settings));
    let report = reconcile_with(std::slice::from_ref(&shipment), &mut carriers, &mut dispatcher);

    let Some(decision) = report.decisions().next() else {
        return Err(CliError::general("lookup produced no result"));
    };
    if let Some(error) = &decision.error {
        return Err(CliError::new(EXIT_TRACK_FAILED, error.to_string()));
    }
    let Some(result) = &decision.observed else {
        return Err(CliError::new(EXIT_TRACK_FAILED, "lookup returned no status"));
    };

    if json {
        let json_output = serde_json::json!({
            "carrier": variant,
            "tracking_number": tracking,
            "attempts": decision.attempts,
            "result": result,
        });
        let rendered = serde_json::to_string_pretty(&json_output)
            .map_err(|e| CliError::general(format!("failed to serialize result: {e}")))?;
        println!("{rendered}");
    } else {
        println!("carrier:       {variant}");
        println!("tracking:      {tracking}");
        println!("status:        {}", result.status.sheet_label());
        if !result.description.is_empty() {
            println!("description:   {}", result.description);
        }
        if let Some(location) = &result.location {
            println!("location:      {location}");
        }
        if let Some(date) = result.delivery_date {
            println!("delivered:     {date}");
        }
    }
    Ok(())
}

// shiptrack run - the scheduled reconciliation pass

use std::path::{Path, PathBuf};

use chrono::Datelike;
use serde::Serialize;
use shiptrack_config::{Credentials, Settings, TabScope};
use shiptrack_lark::{card_content, render_report, LarkClient, LarkError, SheetLayout, SheetTab};
use shiptrack_recon::{reconcile_with, CarrierVariant, Dispatcher, RunReport, ShipmentRecord};

use crate::exit_codes::{EXIT_DELIVERY_FAILED, EXIT_LARK_AUTH, EXIT_SHEET_UNAVAILABLE};
use crate::{carrier_set, credential_vars, dispatch_config, load_settings, CliError};

/// Month tab titles, January first.
const MONTH_TABS: [&str; 12] = ["JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC"];

/// What the pass read from the spreadsheets.
#[derive(Debug, Default, Serialize)]
pub struct SheetScan {
    pub spreadsheets_read: usize,
    pub spreadsheets_failed: usize,
    pub tabs_read: usize,
    pub tabs_failed: usize,
    /// Rows left out by `sheets.skip_settled`.
    pub rows_settled: usize,
    #[serde(skip)]
    pub shipments: Vec<ShipmentRecord>,
}

/// Write-back and delivery results.
#[derive(Debug, Default, Serialize)]
pub struct Delivery {
    pub rows_written: usize,
    pub cells_written: usize,
    pub write_failures: usize,
    pub message_sent: bool,
}

#[derive(Serialize)]
struct RunOutput<'a> {
    dry_run: bool,
    /// Carriers skipped for missing credentials.
    disabled_carriers: &'a [CarrierVariant],
    scan: &'a SheetScan,
    delivery: &'a Delivery,
    report: &'a RunReport,
}

pub fn cmd_run(config: Option<&Path>, dry_run: bool, json: bool, output: Option<PathBuf>) -> Result<(), CliError> {
    let settings = load_settings(config)?;
    settings.validate()?;

    let credentials = Credentials::from_env();
    let (app_id, app_secret) = credentials.pair("lark").ok_or_else(|| {
        CliError::config("Lark app credentials not configured")
            .with_hint(format!("set {}", credential_vars("lark")))
    })?;
    let layout = SheetLayout::from_settings(&settings.lark, &settings.columns)
        .ok_or_else(|| CliError::config("invalid column layout"))?;

    let mut lark = LarkClient::new(&settings.lark.base_url, app_id, app_secret);
    lark.tenant_token().map_err(lark_auth_error)?;

    let month = chrono::Utc::now().month0() as usize;
    let scan = collect_shipments(&mut lark, &settings, &layout, month)?;

    let mut carriers = carrier_set(&settings, &credentials);
    let mut dispatcher = Dispatcher::new(dispatch_config(&settings));
    let report = reconcile_with(&scan.shipments, &mut carriers, &mut dispatcher);
    let disabled: Vec<CarrierVariant> = dispatcher.disabled_carriers().collect();

    let body = render_report(&report, &settings.report);
    let mut delivery = Delivery::default();
    if dry_run {
        tracing::info!("dry run: {} row updates not written, message not sent", report.updates().len());
        eprintln!("--- message preview ---\n{body}\n-----------------------");
    } else {
        write_updates(&mut lark, &report, &layout, &mut delivery);
        deliver(&mut lark, &settings, &body, &mut delivery)?;
    }

    print_summary(&report, &scan, &delivery, &disabled, dry_run);

    let run_output = RunOutput {
        dry_run,
        disabled_carriers: &disabled,
        scan: &scan,
        delivery: &delivery,
        report: &report,
    };
    let rendered = serde_json::to_string_pretty(&run_output)
        .map_err(|e| CliError::general(format!("failed to serialize run report: {e}")))?;
    if let Some(path) = output {
        std::fs::write(&path, format!("{rendered}\n"))
            .map_err(|e| CliError::general(format!("cannot write {}: {e}", path.display())))?;
        tracing::info!(path = %path.display(), "run report written");
    }
    if json {
        println!("{rendered}");
    }
    Ok(())
}

fn lark_auth_error(err: LarkError) -> CliError {
    CliError::new(EXIT_LARK_AUTH, err.to_string())
        .with_hint(format!("check {} and lark.base_url", credential_vars("lark")))
}

/// Does this tab hold shipments for this pass?
fn tab_selected(tab: &SheetTab, settings: &Settings, month: usize) -> bool {
    if settings.sheets.is_skipped(&tab.title) {
        return false;
    }
    match settings.sheets.tab_scope {
        TabScope::All => true,
        TabScope::CurrentMonth => MONTH_TABS
            .get(month)
            .is_some_and(|m| tab.title.trim().eq_ignore_ascii_case(m)),
    }
}

fn collect_shipments(
    lark: &mut LarkClient,
    settings: &Settings,
    layout: &SheetLayout,
    month: usize,
) -> Result<SheetScan, CliError> {
    let mut scan = SheetScan::default();

    for spreadsheet in &settings.lark.sheet_tokens {
        let tabs = match lark.list_tabs(spreadsheet) {
            Ok(tabs) => tabs,
            Err(e @ LarkError::Auth(_)) => return Err(lark_auth_error(e)),
            Err(e) => {
                tracing::error!(spreadsheet = %spreadsheet, "cannot read spreadsheet: {e}");
                scan.spreadsheets_failed += 1;
                continue;
            }
        };
        scan.spreadsheets_read += 1;

        for tab in tabs.iter().filter(|t| tab_selected(t, settings, month)) {
            match lark.read_rows(spreadsheet, tab, layout) {
                Ok(rows) => {
                    scan.tabs_read += 1;
                    for record in rows {
                        if settings.sheets.skip_settled && record.is_settled() {
                            scan.rows_settled += 1;
                            continue;
                        }
                        scan.shipments.push(record);
                    }
                }
                Err(e @ LarkError::Auth(_)) => return Err(lark_auth_error(e)),
                Err(e) => {
                    tracing::warn!(spreadsheet = %spreadsheet, tab = %tab.title, "cannot read tab: {e}");
                    scan.tabs_failed += 1;
                }
            }
        }
    }

    if scan.spreadsheets_read == 0 {
        return Err(CliError::new(
            EXIT_SHEET_UNAVAILABLE,
            format!("none of the {} configured spreadsheets could be read", settings.lark.sheet_tokens.len()),
        )
        .with_hint("check the sheet tokens and that the Lark app has access to them"));
    }
    tracing::info!(
        spreadsheets = scan.spreadsheets_read,
        tabs = scan.tabs_read,
        shipments = scan.shipments.len(),
        "sheets scanned"
    );
    Ok(scan)
}

/// Apply row updates one row at a time. A failed row is logged and counted.
fn write_updates(lark: &mut LarkClient, report: &RunReport, layout: &SheetLayout, delivery: &mut Delivery) {
    for update in report.updates() {
        match lark.write_row(&update, layout) {
            Ok(cells) => {
                delivery.rows_written += 1;
                delivery.cells_written += cells;
            }
            Err(e) => {
                tracing::warn!(
                    tracking = %update.tracking_number,
                    tab = %update.id.tab,
                    row = update.id.row,
                    "row write failed: {e}"
                );
                delivery.write_failures += 1;
            }
        }
    }
}

fn deliver(lark: &mut LarkClient, settings: &Settings, body: &str, delivery: &mut Delivery) -> Result<(), CliError> {
    let chat_id = settings.lark.chat_id.trim();
    if chat_id.is_empty() {
        tracing::warn!("no chat id configured, summary not sent");
        return Ok(());
    }
    let card = card_content(&settings.report.title, body);
    lark.send_card(chat_id, &card).map_err(|e| {
        CliError::new(EXIT_DELIVERY_FAILED, format!("summary delivery failed: {e}"))
            .with_hint("check lark.chat_id and that the bot is a member of the chat")
    })?;
    delivery.message_sent = true;
    Ok(())
}

fn print_summary(report: &RunReport, scan: &SheetScan, delivery: &Delivery, disabled: &[CarrierVariant], dry_run: bool) {
    let t = &report.totals;
    eprintln!(
        "shiptrack run: {} shipments ({} delivered, {} in transit, {} exception, {} unknown, {} errors)",
        t.shipments, t.delivered, t.in_transit, t.exception, t.unknown, t.errors
    );
    eprintln!(
        "  sheets:        {} spreadsheets, {} tabs read ({} failed)",
        scan.spreadsheets_read, scan.tabs_read, scan.tabs_failed
    );
    eprintln!("  network calls: {}", t.network_calls);
    if t.errors > 0 {
        let c = &t.error_classes;
        eprintln!(
            "  errors:        {} configuration, {} classification, {} lookup",
            c.configuration, c.classification, c.terminal_lookup
        );
    }
    if !disabled.is_empty() {
        let names: Vec<&str> = disabled.iter().map(|c| c.name()).collect();
        eprintln!("  disabled:      {} (credentials not configured)", names.join(", "));
    }
    if dry_run {
        eprintln!("  updates:       {} rows (dry run, not written)", report.updates().len());
        eprintln!("  message:       skipped (dry run)");
    } else {
        eprintln!(
            "  updates:       {} rows written, {} failed",
            delivery.rows_written, delivery.write_failures
        );
        eprintln!("  message:       {}", if delivery.message_sent { "sent" } else { "not sent" });
    }
}

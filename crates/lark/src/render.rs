//! Summary card rendering.
//!
//! One markdown body per run: errors first, then status buckets in
//! taxonomy order, each line `tracking -- name -- detail`.

use chrono::NaiveDate;
use serde_json::{json, Value};
use shiptrack_config::settings::ReportSettings;
use shiptrack_recon::{NormalizedStatus, ReconciliationDecision, RunReport};

/// Recipient value meaning "shipped straight to the customer".
const CUSTOMER_DIRECT: &str = "CUSTOMER DIRECT";

/// Markdown body of the summary card.
pub fn render_report(report: &RunReport, options: &ReportSettings) -> String {
    let statuses: Vec<NormalizedStatus> = NormalizedStatus::ALL
        .into_iter()
        .filter(|&s| options.include_delivered || s != NormalizedStatus::Delivered)
        .collect();

    let mut sections = Vec::new();
    for view in report.view(options.max_lines_per_bucket, &statuses) {
        if view.is_empty() {
            continue;
        }
        let mut lines = vec![format!("**{}** ({})", heading(view.status), view.total())];
        lines.extend(view.shown.iter().map(|d| shipment_line(d)));
        if view.hidden > 0 {
            lines.push(format!("…and {} more", view.hidden));
        }
        sections.push(lines.join("\n"));
    }

    if sections.is_empty() {
        sections.push("No shipments to track.".to_string());
    }
    sections.push(footer(report));
    sections.join("\n\n")
}

/// Interactive card object: header title plus one markdown element.
pub fn card_content(title: &str, body: &str) -> Value {
    json!({
        "config": { "wide_screen_mode": true },
        "header": {
            "title": { "tag": "plain_text", "content": title },
            "template": "blue",
        },
        "elements": [{ "tag": "markdown", "content": body }],
    })
}

fn heading(status: Option<NormalizedStatus>) -> &'static str {
    match status {
        None => "Errors",
        Some(NormalizedStatus::Delivered) => "Delivered",
        Some(NormalizedStatus::InTransit) => "In Transit",
        Some(NormalizedStatus::Exception) => "Exception",
        Some(NormalizedStatus::Unknown) => "Unknown",
    }
}

fn shipment_line(decision: &ReconciliationDecision) -> String {
    format!(
        "{} -- {} -- {}",
        decision.shipment.tracking_number,
        display_name(&decision.shipment.recipient, &decision.shipment.customer),
        detail(decision)
    )
}

fn display_name<'a>(recipient: &'a str, customer: &'a str) -> &'a str {
    let recipient = recipient.trim();
    let customer = customer.trim();
    let name = if recipient.is_empty() || recipient.eq_ignore_ascii_case(CUSTOMER_DIRECT) {
        customer
    } else {
        recipient
    };
    if name.is_empty() {
        "Unknown"
    } else {
        name
    }
}

fn detail(decision: &ReconciliationDecision) -> String {
    if let Some(error) = &decision.error {
        return error.to_string();
    }
    let Some(observed) = &decision.observed else {
        return "pending".to_string();
    };
    let description = observed.description.trim();

    match observed.status {
        NormalizedStatus::Delivered => match observed.delivery_date.or(decision.new_delivery_date) {
            Some(date) => format!("delivered on {}", long_date(date)),
            None => "delivered".to_string(),
        },
        NormalizedStatus::InTransit => {
            let parts: Vec<&str> = [Some(description), observed.location.as_deref().map(str::trim)]
                .into_iter()
                .flatten()
                .filter(|s| !s.is_empty())
                .collect();
            if parts.is_empty() {
                "in transit".to_string()
            } else {
                parts.join(" - ")
            }
        }
        NormalizedStatus::Exception if description.is_empty() => "exception".to_string(),
        NormalizedStatus::Exception => format!("exception - {description}"),
        NormalizedStatus::Unknown if description.is_empty() => "pending".to_string(),
        NormalizedStatus::Unknown => format!("unknown - {description}"),
    }
}

/// `2026-02-20` → `Friday, February 20, 2026`.
fn long_date(date: NaiveDate) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}

fn footer(report: &RunReport) -> String {
    let t = &report.totals;
    let mut parts = vec![
        format!("{} delivered", t.delivered),
        format!("{} in transit", t.in_transit),
        format!("{} exception", t.exception),
        format!("{} unknown", t.unknown),
    ];
    if t.errors > 0 {
        parts.push(format!("{} {}", t.errors, if t.errors == 1 { "error" } else { "errors" }));
    }
    format!(
        "_{} shipments: {} · {} updated_",
        t.shipments,
        parts.join(", "),
        report.updates().len()
    )
}

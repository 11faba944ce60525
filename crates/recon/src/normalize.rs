//! Carrier vocabulary → shared status taxonomy.
//!
//! One closed table per carrier. Codes are compared after trimming,
//! uppercasing and replacing spaces with `_`; nothing else. Codes not in a
//! table resolve to `Unknown` and are logged so drift in a carrier's
//! vocabulary shows up in the run log instead of as a failure.

use chrono::NaiveDate;

use crate::model::{CarrierVariant, NormalizedResult, NormalizedStatus, RawTrackingResult};

use NormalizedStatus::{Delivered, Exception, InTransit, Unknown};

// ── Tables ──────────────────────────────────────────────────────────

/// FedEx Track v1 `latestStatusDetail.code`.
fn fedex_status(code: &str) -> Option<NormalizedStatus> {
    match code {
        "DL" => Some(Delivered),
        "PU" | "IT" | "AR" | "DP" | "AF" | "OD" | "OC" | "PL" => Some(InTransit),
        "DE" | "SE" | "CA" | "RS" => Some(Exception),
        _ => None,
    }
}

/// UPS Track v1 `activity[].status.type`.
fn ups_status(code: &str) -> Option<NormalizedStatus> {
    match code {
        "D" => Some(Delivered),
        "I" | "P" | "M" | "O" => Some(InTransit),
        "X" | "RS" => Some(Exception),
        _ => None,
    }
}

/// USPS Tracking v3 `statusCategory`.
fn usps_status(code: &str) -> Option<NormalizedStatus> {
    match code {
        "DELIVERED" => Some(Delivered),
        "ACCEPTED" | "PRE_TRANSIT" | "IN_TRANSIT" | "OUT_FOR_DELIVERY" | "AVAILABLE_FOR_PICKUP" => {
            Some(InTransit)
        }
        "ALERT" | "RETURN_TO_SENDER" => Some(Exception),
        _ => None,
    }
}

/// DHL Unified Tracking `status.statusCode`.
fn dhl_status(code: &str) -> Option<NormalizedStatus> {
    match code {
        "DELIVERED" => Some(Delivered),
        "PRE-TRANSIT" | "TRANSIT" => Some(InTransit),
        "FAILURE" => Some(Exception),
        "UNKNOWN" => Some(Unknown),
        _ => None,
    }
}

fn canonical_code(code: &str) -> String {
    code.trim().to_ascii_uppercase().replace(' ', "_")
}

// ── Public API ──────────────────────────────────────────────────────

/// Map a carrier's raw result to the shared taxonomy. Total.
pub fn normalize(variant: CarrierVariant, raw: &RawTrackingResult) -> NormalizedStatus {
    let code = canonical_code(&raw.code);
    if code.is_empty() {
        tracing::debug!(carrier = %variant, "empty status code");
        return Unknown;
    }
    let mapped = match variant {
        CarrierVariant::FedEx => fedex_status(&code),
        CarrierVariant::Ups => ups_status(&code),
        CarrierVariant::Usps => usps_status(&code),
        CarrierVariant::Dhl => dhl_status(&code),
        CarrierVariant::Unknown => None,
    };

    match mapped {
        Some(status) => status,
        None => {
            tracing::warn!(
                carrier = %variant,
                code = %raw.code,
                description = %raw.description,
                "unmapped carrier status code, reporting as unknown"
            );
            Unknown
        }
    }
}

/// Normalize status and pick the delivery date. The date is kept only for
/// `Delivered`; estimates on undelivered shipments are dropped.
pub fn normalize_result(variant: CarrierVariant, raw: &RawTrackingResult) -> NormalizedResult {
    let status = normalize(variant, raw);
    let delivery_date = if status == Delivered {
        raw.delivery_timestamp.as_deref().and_then(parse_delivery_date)
    } else {
        None
    };

    NormalizedResult {
        status,
        delivery_date,
        location: raw.location.clone().filter(|l| !l.trim().is_empty()),
        description: raw.description.trim().to_string(),
    }
}

/// Calendar date of a carrier timestamp as the carrier reports it. No
/// timezone conversion: `2026-02-20T23:10:00-05:00` is 2026-02-20.
pub fn parse_delivery_date(ts: &str) -> Option<NaiveDate> {
    let ts = ts.trim();
    let parsed = ts
        .get(..10)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .or_else(|| {
            ts.get(..8)
                .filter(|d| d.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y%m%d").ok())
        });
    if parsed.is_none() && !ts.is_empty() {
        tracing::warn!(timestamp = %ts, "unparseable delivery timestamp, ignoring");
    }
    parsed
}

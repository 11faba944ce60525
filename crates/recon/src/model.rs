use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{ErrorClass, ShipmentError};

// ---------------------------------------------------------------------------
// Carriers
// ---------------------------------------------------------------------------

/// Supported carriers. `Unknown` is a real variant so classification is total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CarrierVariant {
    FedEx,
    Ups,
    Usps,
    Dhl,
    Unknown,
}

impl CarrierVariant {
    /// Every variant that has a tracking client.
    pub const SUPPORTED: [CarrierVariant; 4] = [Self::FedEx, Self::Ups, Self::Usps, Self::Dhl];

    /// Display name used in logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            Self::FedEx => "FedEx",
            Self::Ups => "UPS",
            Self::Usps => "USPS",
            Self::Dhl => "DHL",
            Self::Unknown => "Unknown",
        }
    }

    /// Stable lowercase key used in config sections and CLI arguments.
    pub fn key(&self) -> &'static str {
        match self {
            Self::FedEx => "fedex",
            Self::Ups => "ups",
            Self::Usps => "usps",
            Self::Dhl => "dhl",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for CarrierVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Where a shipment row lives in the spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ShipmentId {
    pub spreadsheet: String,
    pub tab: String,
    pub sheet_id: String,
    /// 1-indexed row number.
    pub row: u32,
}

/// Read-only snapshot of one spreadsheet row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShipmentRecord {
    pub id: ShipmentId,
    pub tracking_number: String,
    /// Free-text carrier label as typed in the sheet.
    pub carrier_label: String,
    pub recipient: String,
    pub customer: String,
    /// Persisted status text (may be empty or a legacy label).
    pub status: String,
    /// Persisted delivery date text. Any non-empty value counts as set.
    pub delivery_date: Option<String>,
}

impl ShipmentRecord {
    /// Persisted status parsed into the shared taxonomy, if recognizable.
    pub fn persisted_status(&self) -> Option<NormalizedStatus> {
        NormalizedStatus::from_sheet_label(&self.status)
    }

    pub fn has_delivery_date(&self) -> bool {
        self.delivery_date
            .as_deref()
            .is_some_and(|d| !d.trim().is_empty())
    }

    /// Delivered with a date: no lookup can change this row.
    pub fn is_settled(&self) -> bool {
        self.persisted_status() == Some(NormalizedStatus::Delivered) && self.has_delivery_date()
    }
}

// ---------------------------------------------------------------------------
// Carrier output
// ---------------------------------------------------------------------------

/// Carrier-native lookup payload, produced once per call and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTrackingResult {
    /// Carrier status code exactly as the carrier reports it.
    pub code: String,
    /// Human-readable status text from the carrier.
    pub description: String,
    /// Delivery timestamp (ISO 8601 date or datetime), if the carrier sent one.
    pub delivery_timestamp: Option<String>,
    pub location: Option<String>,
    /// Soft error reported inside an otherwise successful payload.
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Normalized status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizedStatus {
    Delivered,
    InTransit,
    Exception,
    Unknown,
}

impl NormalizedStatus {
    /// Report bucket order.
    pub const ALL: [NormalizedStatus; 4] =
        [Self::Delivered, Self::InTransit, Self::Exception, Self::Unknown];

    /// Text written to the status column.
    pub fn sheet_label(&self) -> &'static str {
        match self {
            Self::Delivered => "DELIVERED",
            Self::InTransit => "IN TRANSIT",
            Self::Exception => "EXCEPTION",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Parse persisted status text, including labels written by older bot
    /// versions. Empty or unrecognized text yields `None`.
    pub fn from_sheet_label(label: &str) -> Option<Self> {
        let label = label.trim().to_ascii_uppercase();
        match label.as_str() {
            "DELIVERED" => Some(Self::Delivered),
            "IN TRANSIT" | "INTRANSIT" | "IN_TRANSIT" | "OUT FOR DELIVERY" | "LABEL CREATED"
            | "PENDING" => Some(Self::InTransit),
            "EXCEPTION" => Some(Self::Exception),
            "UNKNOWN" | "NOT FOUND" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl std::fmt::Display for NormalizedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Delivered => write!(f, "delivered"),
            Self::InTransit => write!(f, "in_transit"),
            Self::Exception => write!(f, "exception"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Normalizer output. `delivery_date` is only ever set for `Delivered`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedResult {
    pub status: NormalizedStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub description: String,
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationDecision {
    pub shipment: ShipmentRecord,
    pub carrier: CarrierVariant,
    /// What the carrier reported, after normalization. `None` on error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed: Option<NormalizedResult>,
    /// Present only when the status column must change.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_status: Option<NormalizedStatus>,
    /// Present only when the delivery date column is empty and a date is known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_delivery_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ShipmentError>,
    /// Network calls spent on this shipment.
    pub attempts: u32,
}

impl ReconciliationDecision {
    /// Error-only decision. Never proposes a mutation.
    pub fn failed(shipment: ShipmentRecord, carrier: CarrierVariant, error: ShipmentError, attempts: u32) -> Self {
        Self {
            shipment,
            carrier,
            observed: None,
            new_status: None,
            new_delivery_date: None,
            error: Some(error),
            attempts,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.new_status.is_none() && self.new_delivery_date.is_none()
    }

    /// Report bucket: `None` for the error bucket.
    pub fn bucket(&self) -> Option<NormalizedStatus> {
        if self.error.is_some() {
            return None;
        }
        self.observed.as_ref().map(|o| o.status)
    }

    /// The write instruction for this row, if any.
    pub fn row_update(&self) -> Option<RowUpdate> {
        if self.error.is_some() || self.is_noop() {
            return None;
        }
        Some(RowUpdate {
            id: self.shipment.id.clone(),
            tracking_number: self.shipment.tracking_number.clone(),
            status: self.new_status,
            delivery_date: self.new_delivery_date,
        })
    }
}

/// Write instruction for the spreadsheet collaborator: status and/or
/// delivery date for one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowUpdate {
    pub id: ShipmentId,
    pub tracking_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<NormalizedStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_date: Option<NaiveDate>,
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StatusBucket {
    pub status: NormalizedStatus,
    pub decisions: Vec<ReconciliationDecision>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunTotals {
    pub shipments: usize,
    pub errors: usize,
    pub delivered: usize,
    pub in_transit: usize,
    pub exception: usize,
    pub unknown: usize,
    pub status_updates: usize,
    pub date_updates: usize,
    pub network_calls: u32,
    pub error_classes: ErrorCounts,
}

/// Failed shipments per `ErrorClass`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ErrorCounts {
    pub configuration: usize,
    pub classification: usize,
    pub terminal_lookup: usize,
}

impl ErrorCounts {
    pub fn record(&mut self, class: ErrorClass) {
        match class {
            ErrorClass::Configuration => self.configuration += 1,
            ErrorClass::Classification => self.classification += 1,
            ErrorClass::TerminalLookup => self.terminal_lookup += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Failed shipments, surfaced first.
    pub errors: Vec<ReconciliationDecision>,
    /// One bucket per `NormalizedStatus`, in `NormalizedStatus::ALL` order.
    pub buckets: Vec<StatusBucket>,
    pub totals: RunTotals,
}

/// A capped slice of one bucket, for renderers with a line budget.
#[derive(Debug, Clone)]
pub struct BucketView<'a> {
    /// `None` for the error bucket.
    pub status: Option<NormalizedStatus>,
    pub shown: Vec<&'a ReconciliationDecision>,
    pub hidden: usize,
}

impl<'a> BucketView<'a> {
    pub fn total(&self) -> usize {
        self.shown.len() + self.hidden
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

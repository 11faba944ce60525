//! `shiptrack-recon`: Carrier status normalization and reconciliation engine.
//!
//! Pure engine crate: receives shipment snapshots and carrier clients behind
//! the `CarrierClient` trait, returns decisions and a bucketed report.
//! No CLI, spreadsheet or HTTP dependencies.

pub mod aggregate;
pub mod carrier;
pub mod classify;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod model;
pub mod normalize;
pub mod plan;

pub use carrier::{CarrierClient, CarrierSet};
pub use classify::classify;
pub use dispatch::{DispatchConfig, Dispatcher, Pacer};
pub use engine::{reconcile, reconcile_with};
pub use error::{ErrorClass, LookupError, ShipmentError};
pub use model::{
    BucketView, CarrierVariant, ErrorCounts, NormalizedResult, NormalizedStatus, RawTrackingResult, ReconciliationDecision,
    RowUpdate, RunReport, RunTotals, ShipmentId, ShipmentRecord, StatusBucket,
};
pub use normalize::normalize;
pub use plan::plan;

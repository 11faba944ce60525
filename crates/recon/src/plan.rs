use crate::error::ShipmentError;
use crate::model::{CarrierVariant, NormalizedResult, NormalizedStatus, ReconciliationDecision, ShipmentRecord};

/// Decide what to write back for one shipment.
///
/// Rules, in order:
/// 1. A failed lookup yields an error-only decision.
/// 2. A row already `DELIVERED` with a date is settled: no-op, whatever the
///    carrier now reports. The observation is kept for the report.
/// 3. Same status as persisted and no new date: no-op.
/// 4. Different status: propose it. `Unknown` is never proposed, it would
///    replace real information with none.
/// 5. A delivery date is proposed only for `Delivered` when the row has no
///    date yet. Dates are write-once.
pub fn plan(
    current: &ShipmentRecord,
    carrier: CarrierVariant,
    outcome: Result<NormalizedResult, ShipmentError>,
    attempts: u32,
) -> ReconciliationDecision {
    let observed = match outcome {
        Ok(observed) => observed,
        Err(error) => return ReconciliationDecision::failed(current.clone(), carrier, error, attempts),
    };

    let settled = current.is_settled();

    let new_status = match observed.status {
        _ if settled => None,
        NormalizedStatus::Unknown => None,
        status if current.persisted_status() == Some(status) => None,
        status => Some(status),
    };

    let new_delivery_date = if observed.status == NormalizedStatus::Delivered && !current.has_delivery_date() {
        observed.delivery_date
    } else {
        None
    };

    ReconciliationDecision {
        shipment: current.clone(),
        carrier,
        observed: Some(observed),
        new_status,
        new_delivery_date,
        error: None,
        attempts,
    }
}

use crate::aggregate::aggregate;
use crate::carrier::CarrierSet;
use crate::dispatch::{DispatchConfig, Dispatcher};
use crate::model::{ReconciliationDecision, RunReport, ShipmentRecord};
use crate::normalize::normalize_result;
use crate::plan::plan;

/// Reconcile a batch of shipments against their carriers.
///
/// Shipments are processed strictly in input order, one network call at a
/// time. Per-shipment failures become error decisions; the run itself never
/// fails.
pub fn reconcile(shipments: &[ShipmentRecord], carriers: &mut CarrierSet, config: &DispatchConfig) -> RunReport {
    let mut dispatcher = Dispatcher::new(*config);
    reconcile_with(shipments, carriers, &mut dispatcher)
}

/// `reconcile` with a caller-supplied dispatcher (custom pacer, or one
/// dispatcher shared across several spreadsheets).
pub fn reconcile_with(
    shipments: &[ShipmentRecord],
    carriers: &mut CarrierSet,
    dispatcher: &mut Dispatcher,
) -> RunReport {
    let calls_before = dispatcher.calls();
    let decisions: Vec<ReconciliationDecision> = shipments
        .iter()
        .map(|shipment| reconcile_one(shipment, carriers, dispatcher))
        .collect();
    let report = aggregate(decisions, dispatcher.calls() - calls_before);

    tracing::info!(
        shipments = report.totals.shipments,
        errors = report.totals.errors,
        status_updates = report.totals.status_updates,
        date_updates = report.totals.date_updates,
        calls = report.totals.network_calls,
        "reconciliation complete"
    );
    report
}

/// Dispatch, normalize and plan one shipment.
pub fn reconcile_one(
    shipment: &ShipmentRecord,
    carriers: &mut CarrierSet,
    dispatcher: &mut Dispatcher,
) -> ReconciliationDecision {
    let outcome = dispatcher.dispatch(shipment, carriers);
    let normalized = outcome.result.map(|raw| normalize_result(outcome.carrier, &raw));
    let decision = plan(shipment, outcome.carrier, normalized, outcome.attempts);

    if let Some(status) = decision.new_status {
        tracing::info!(
            tracking = %shipment.tracking_number,
            row = shipment.id.row,
            from = %shipment.status,
            to = status.sheet_label(),
            "status change"
        );
    }
    decision
}

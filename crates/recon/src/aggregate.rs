use std::collections::HashSet;

use crate::model::{
    BucketView, NormalizedStatus, ReconciliationDecision, RowUpdate, RunReport, RunTotals, StatusBucket,
};

/// Group decisions into report buckets and compute run totals.
///
/// Errors go to their own list. Every `NormalizedStatus` gets a bucket, in
/// `NormalizedStatus::ALL` order, even when empty. Within a bucket decisions
/// keep input order, so the same input always produces the same report.
pub fn aggregate(decisions: Vec<ReconciliationDecision>, network_calls: u32) -> RunReport {
    let mut totals = RunTotals {
        shipments: decisions.len(),
        network_calls,
        ..Default::default()
    };
    let mut errors = Vec::new();
    let mut buckets: Vec<StatusBucket> = NormalizedStatus::ALL
        .iter()
        .map(|&status| StatusBucket { status, decisions: Vec::new() })
        .collect();

    for decision in decisions {
        if decision.new_status.is_some() {
            totals.status_updates += 1;
        }
        if decision.new_delivery_date.is_some() {
            totals.date_updates += 1;
        }

        let Some(status) = decision.bucket() else {
            totals.errors += 1;
            if let Some(error) = &decision.error {
                totals.error_classes.record(error.class());
            }
            errors.push(decision);
            continue;
        };
        match status {
            NormalizedStatus::Delivered => totals.delivered += 1,
            NormalizedStatus::InTransit => totals.in_transit += 1,
            NormalizedStatus::Exception => totals.exception += 1,
            NormalizedStatus::Unknown => totals.unknown += 1,
        }
        // ALL order matches enum order.
        buckets[status as usize].decisions.push(decision);
    }

    RunReport { errors, buckets, totals }
}

impl RunReport {
    pub fn bucket(&self, status: NormalizedStatus) -> &[ReconciliationDecision] {
        self.buckets
            .iter()
            .find(|b| b.status == status)
            .map(|b| b.decisions.as_slice())
            .unwrap_or(&[])
    }

    /// All decisions, errors first, then buckets in order.
    pub fn decisions(&self) -> impl Iterator<Item = &ReconciliationDecision> {
        self.errors
            .iter()
            .chain(self.buckets.iter().flat_map(|b| b.decisions.iter()))
    }

    /// Row writes this run proposes, in report order.
    pub fn updates(&self) -> Vec<RowUpdate> {
        self.decisions().filter_map(|d| d.row_update()).collect()
    }

    /// Error bucket followed by the selected status buckets, each capped at
    /// `limit` entries.
    ///
    /// A tracking number is listed once: its first occurrence in view order
    /// wins and later repeats are dropped before capping. Empty views are
    /// included; renderers decide whether to show them.
    pub fn view(&self, limit: usize, statuses: &[NormalizedStatus]) -> Vec<BucketView<'_>> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut views = Vec::with_capacity(self.buckets.len() + 1);
        views.push(capped(&mut seen, None, &self.errors, limit));
        for bucket in self.buckets.iter().filter(|b| statuses.contains(&b.status)) {
            views.push(capped(&mut seen, Some(bucket.status), &bucket.decisions, limit));
        }
        views
    }
}

fn capped<'a>(
    seen: &mut HashSet<&'a str>,
    status: Option<NormalizedStatus>,
    decisions: &'a [ReconciliationDecision],
    limit: usize,
) -> BucketView<'a> {
    let mut unique: Vec<&ReconciliationDecision> = decisions
        .iter()
        .filter(|d| seen.insert(d.shipment.tracking_number.as_str()))
        .collect();
    let hidden = unique.len().saturating_sub(limit);
    unique.truncate(limit);
    BucketView { status, shown: unique, hidden }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShipmentError;
    use crate::model::{CarrierVariant, NormalizedResult, ShipmentId, ShipmentRecord};
    use chrono::NaiveDate;

    fn shipment(row: u32) -> ShipmentRecord {
        ShipmentRecord {
            id: ShipmentId {
                spreadsheet: "sht".into(),
                tab: "FEB".into(),
                sheet_id: "s1".into(),
                row,
            },
            tracking_number: format!("TRK{row}"),
            carrier_label: "UPS".into(),
            recipient: String::new(),
            customer: String::new(),
            status: String::new(),
            delivery_date: None,
        }
    }

    fn observed(row: u32, status: NormalizedStatus, new_status: Option<NormalizedStatus>) -> ReconciliationDecision {
        ReconciliationDecision {
            shipment: shipment(row),
            carrier: CarrierVariant::Ups,
            observed: Some(NormalizedResult {
                status,
                delivery_date: None,
                location: None,
                description: String::new(),
            }),
            new_status,
            new_delivery_date: None,
            error: None,
            attempts: 1,
        }
    }

    fn errored(row: u32) -> ReconciliationDecision {
        ReconciliationDecision::failed(
            shipment(row),
            CarrierVariant::Unknown,
            ShipmentError::Classification { label: "Speedy Logistics".into() },
            0,
        )
    }

    #[test]
    fn forty_seven_shipments() {
        let mut decisions = Vec::new();
        let mut row = 3;
        for _ in 0..43 {
            decisions.push(observed(row, NormalizedStatus::Delivered, None));
            row += 1;
        }
        for _ in 0..3 {
            decisions.push(observed(row, NormalizedStatus::InTransit, None));
            row += 1;
        }
        decisions.push(errored(row));

        let report = aggregate(decisions, 46);
        assert_eq!(report.buckets.len(), 4);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.bucket(NormalizedStatus::Delivered).len(), 43);
        assert_eq!(report.bucket(NormalizedStatus::InTransit).len(), 3);
        assert_eq!(report.bucket(NormalizedStatus::Exception).len(), 0);
        assert_eq!(report.totals.shipments, 47);
        assert_eq!(report.totals.errors, 1);
        assert_eq!(report.totals.error_classes.classification, 1);
        assert_eq!(report.totals.error_classes.terminal_lookup, 0);
        assert_eq!(report.totals.network_calls, 46);

        let counted: usize = report.errors.len() + report.buckets.iter().map(|b| b.decisions.len()).sum::<usize>();
        assert_eq!(counted, 47);
    }

    #[test]
    fn bucket_order_is_fixed() {
        let report = aggregate(vec![observed(3, NormalizedStatus::Unknown, None)], 1);
        let order: Vec<_> = report.buckets.iter().map(|b| b.status).collect();
        assert_eq!(order, NormalizedStatus::ALL.to_vec());
    }

    #[test]
    fn input_order_kept_within_bucket() {
        let report = aggregate(
            vec![
                observed(9, NormalizedStatus::InTransit, None),
                observed(4, NormalizedStatus::InTransit, None),
                observed(7, NormalizedStatus::InTransit, None),
            ],
            3,
        );
        let rows: Vec<u32> = report
            .bucket(NormalizedStatus::InTransit)
            .iter()
            .map(|d| d.shipment.id.row)
            .collect();
        assert_eq!(rows, vec![9, 4, 7]);
    }

    #[test]
    fn updates_and_totals() {
        let mut dated = observed(5, NormalizedStatus::Delivered, Some(NormalizedStatus::Delivered));
        dated.new_delivery_date = NaiveDate::from_ymd_opt(2026, 2, 20);
        let report = aggregate(
            vec![
                observed(3, NormalizedStatus::InTransit, Some(NormalizedStatus::InTransit)),
                observed(4, NormalizedStatus::InTransit, None),
                dated,
                errored(6),
            ],
            3,
        );
        assert_eq!(report.totals.status_updates, 2);
        assert_eq!(report.totals.date_updates, 1);
        let rows: Vec<u32> = report.updates().iter().map(|u| u.id.row).collect();
        assert_eq!(rows, vec![5, 3]);
    }

    #[test]
    fn view_caps_each_bucket() {
        let decisions = (0..30).map(|i| observed(3 + i, NormalizedStatus::Delivered, None)).collect();
        let report = aggregate(decisions, 30);
        let views = report.view(25, &NormalizedStatus::ALL);
        assert_eq!(views.len(), 5);
        assert_eq!(views[0].status, None);
        assert_eq!(views[0].total(), 0);
        let delivered = &views[1];
        assert_eq!(delivered.status, Some(NormalizedStatus::Delivered));
        assert_eq!(delivered.shown.len(), 25);
        assert_eq!(delivered.hidden, 5);
        assert_eq!(delivered.total(), 30);
    }

    #[test]
    fn view_lists_each_tracking_number_once() {
        let mut repeat = observed(8, NormalizedStatus::InTransit, None);
        repeat.shipment.tracking_number = "TRK3".into();
        let mut failed = errored(9);
        failed.shipment.tracking_number = "TRK4".into();
        let report = aggregate(
            vec![
                observed(3, NormalizedStatus::Delivered, None),
                observed(4, NormalizedStatus::InTransit, None),
                repeat,
                failed,
            ],
            3,
        );

        let views = report.view(25, &NormalizedStatus::ALL);
        let rows = |v: &BucketView<'_>| v.shown.iter().map(|d| d.shipment.id.row).collect::<Vec<_>>();
        assert_eq!(rows(&views[0]), vec![9]);
        assert_eq!(rows(&views[1]), vec![3]);
        // TRK4 went out with the error, TRK3 with Delivered.
        assert!(views[2].is_empty());
    }

    #[test]
    fn view_skips_unselected_buckets() {
        let report = aggregate(
            vec![
                observed(3, NormalizedStatus::Delivered, None),
                observed(4, NormalizedStatus::Exception, None),
            ],
            2,
        );
        let views = report.view(25, &[NormalizedStatus::Exception]);
        let statuses: Vec<_> = views.iter().map(|v| v.status).collect();
        assert_eq!(statuses, vec![None, Some(NormalizedStatus::Exception)]);
        assert_eq!(views[1].shown[0].shipment.id.row, 4);
    }
}

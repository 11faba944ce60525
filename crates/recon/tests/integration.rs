use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use chrono::NaiveDate;
use shiptrack_recon::*;

/// In-memory carrier: fixed responses per tracking number, shared call log.
struct FakeCarrier {
    responses: HashMap<String, Result<RawTrackingResult, LookupError>>,
    log: Rc<RefCell<Vec<String>>>,
    configured: bool,
}

impl FakeCarrier {
    fn new(log: &Rc<RefCell<Vec<String>>>) -> Self {
        Self {
            responses: HashMap::new(),
            log: Rc::clone(log),
            configured: true,
        }
    }

    fn respond(mut self, tracking: &str, code: &str, date: Option<&str>) -> Self {
        self.responses.insert(
            tracking.to_string(),
            Ok(RawTrackingResult {
                code: code.into(),
                description: format!("status {code}"),
                delivery_timestamp: date.map(String::from),
                ..Default::default()
            }),
        );
        self
    }

    fn fail(mut self, tracking: &str, err: LookupError) -> Self {
        self.responses.insert(tracking.to_string(), Err(err));
        self
    }
}

impl CarrierClient for FakeCarrier {
    fn lookup(&mut self, tracking_number: &str) -> Result<RawTrackingResult, LookupError> {
        if !self.configured {
            return Err(LookupError::CredentialsMissing);
        }
        self.log.borrow_mut().push(tracking_number.to_string());
        self.responses
            .get(tracking_number)
            .cloned()
            .unwrap_or_else(|| Err(LookupError::NotFound("no such shipment".into())))
    }

    fn is_configured(&self) -> bool {
        self.configured
    }
}

fn record(row: u32, tracking: &str, carrier: &str, status: &str, date: Option<&str>) -> ShipmentRecord {
    ShipmentRecord {
        id: ShipmentId {
            spreadsheet: "shtcnTEST".into(),
            tab: "FEB 2026".into(),
            sheet_id: "a1b2c3".into(),
            row,
        },
        tracking_number: tracking.into(),
        carrier_label: carrier.into(),
        recipient: "Brendan".into(),
        customer: String::new(),
        status: status.into(),
        delivery_date: date.map(String::from),
    }
}

fn instant_dispatcher(config: DispatchConfig) -> Dispatcher {
    Dispatcher::with_pacer(config, Pacer::with_sleeper(config.pacing, |_| {}))
}

// -------------------------------------------------------------------------
// End-to-end scenarios
// -------------------------------------------------------------------------

#[test]
fn ups_delivered_updates_status_and_date() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut carriers = CarrierSet::new().with(
        CarrierVariant::Ups,
        FakeCarrier::new(&log).respond("44476970", "D", Some("20260220")),
    );
    let shipments = vec![record(3, "44476970", "UPS", "IN TRANSIT", None)];

    let mut dispatcher = instant_dispatcher(DispatchConfig::default());
    let report = reconcile_with(&shipments, &mut carriers, &mut dispatcher);

    let updates = report.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].tracking_number, "44476970");
    assert_eq!(updates[0].status, Some(NormalizedStatus::Delivered));
    assert_eq!(updates[0].delivery_date, NaiveDate::from_ymd_opt(2026, 2, 20));
    assert_eq!(report.bucket(NormalizedStatus::Delivered).len(), 1);
}

#[test]
fn second_run_is_noop() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut carriers = CarrierSet::new().with(
        CarrierVariant::Ups,
        FakeCarrier::new(&log).respond("44476970", "D", Some("20260220")),
    );
    let shipments = vec![record(3, "44476970", "UPS", "DELIVERED", Some("2026-02-20"))];

    let mut dispatcher = instant_dispatcher(DispatchConfig::default());
    let report = reconcile_with(&shipments, &mut carriers, &mut dispatcher);
    assert!(report.updates().is_empty());
    assert_eq!(report.totals.status_updates, 0);
    assert_eq!(report.totals.date_updates, 0);
}

#[test]
fn missing_credentials_skip_only_that_carrier() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut fedex = FakeCarrier::new(&log).respond("F1", "DL", None);
    fedex.configured = false;
    let ups = FakeCarrier::new(&log)
        .respond("U1", "I", None)
        .respond("U2", "D", Some("2026-02-19"));
    let mut carriers = CarrierSet::new()
        .with(CarrierVariant::FedEx, fedex)
        .with(CarrierVariant::Ups, ups);

    let shipments = vec![
        record(3, "F1", "FedEx", "", None),
        record(4, "U1", "UPS", "", None),
        record(5, "F2", "fed ex", "", None),
        record(6, "U2", "ups", "IN TRANSIT", None),
    ];

    let mut dispatcher = instant_dispatcher(DispatchConfig::default());
    let report = reconcile_with(&shipments, &mut carriers, &mut dispatcher);

    assert_eq!(*log.borrow(), vec!["U1".to_string(), "U2".to_string()]);
    assert_eq!(report.errors.len(), 2);
    for e in &report.errors {
        assert_eq!(
            e.error,
            Some(ShipmentError::Configuration { carrier: CarrierVariant::FedEx })
        );
        assert_eq!(e.error.as_ref().map(|e| e.class()), Some(ErrorClass::Configuration));
    }
    assert_eq!(report.totals.network_calls, 2);
}

#[test]
fn unknown_carrier_reported_without_call() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut carriers = CarrierSet::new().with(CarrierVariant::Ups, FakeCarrier::new(&log));
    let shipments = vec![record(3, "SL-1", "Speedy Logistics", "", None)];

    let report = reconcile(&shipments, &mut carriers, &DispatchConfig::default());
    assert!(log.borrow().is_empty());
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].attempts, 0);
    assert_eq!(
        report.errors[0].error.as_ref().map(|e| e.to_string()),
        Some("Unknown carrier 'Speedy Logistics'".to_string())
    );
}

#[test]
fn not_found_is_terminal_error() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut carriers = CarrierSet::new().with(
        CarrierVariant::Dhl,
        FakeCarrier::new(&log).fail("D1", LookupError::NotFound("no shipment found".into())),
    );
    let shipments = vec![record(3, "D1", "DHL", "IN TRANSIT", None)];

    let mut dispatcher = instant_dispatcher(DispatchConfig::default());
    let report = reconcile_with(&shipments, &mut carriers, &mut dispatcher);
    assert_eq!(log.borrow().len(), 1);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(
        report.errors[0].error.as_ref().map(|e| e.class()),
        Some(ErrorClass::TerminalLookup)
    );
    assert!(report.updates().is_empty());
}

#[test]
fn retry_bound_respected() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut carriers = CarrierSet::new().with(
        CarrierVariant::Usps,
        FakeCarrier::new(&log).fail("9400", LookupError::transient("HTTP 503")),
    );
    let shipments = vec![record(3, "9400", "USPS", "", None)];

    let config = DispatchConfig {
        pacing: Duration::from_millis(1),
        max_retries: 3,
    };
    let mut dispatcher = instant_dispatcher(config);
    let report = reconcile_with(&shipments, &mut carriers, &mut dispatcher);

    assert_eq!(log.borrow().len(), 4);
    assert_eq!(report.errors[0].attempts, 4);
    assert!(matches!(
        report.errors[0].error,
        Some(ShipmentError::RetryExhausted { attempts: 4, .. })
    ));
}

#[test]
fn unmapped_code_is_unknown_and_not_written() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut carriers = CarrierSet::new().with(
        CarrierVariant::FedEx,
        FakeCarrier::new(&log).respond("F1", "ZZ", None),
    );
    let shipments = vec![record(3, "F1", "FedEx", "IN TRANSIT", None)];

    let mut dispatcher = instant_dispatcher(DispatchConfig::default());
    let report = reconcile_with(&shipments, &mut carriers, &mut dispatcher);
    assert_eq!(report.bucket(NormalizedStatus::Unknown).len(), 1);
    assert!(report.updates().is_empty());
}

#[test]
fn mixed_batch_buckets_in_input_order() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut carriers = CarrierSet::new()
        .with(
            CarrierVariant::FedEx,
            FakeCarrier::new(&log).respond("F1", "DL", Some("2026-02-18T10:00:00-05:00")).respond("F2", "DE", None),
        )
        .with(
            CarrierVariant::Ups,
            FakeCarrier::new(&log).respond("U1", "I", None).respond("U2", "D", Some("20260221")),
        );

    let shipments = vec![
        record(3, "U1", "UPS", "", None),
        record(4, "F1", "FedEx", "", None),
        record(5, "X1", "Royal Mail", "", None),
        record(6, "F2", "FedEx", "IN TRANSIT", None),
        record(7, "U2", "UPS", "", None),
    ];

    let mut dispatcher = instant_dispatcher(DispatchConfig::default());
    let report = reconcile_with(&shipments, &mut carriers, &mut dispatcher);

    assert_eq!(*log.borrow(), vec!["U1", "F1", "F2", "U2"]);
    let delivered: Vec<_> = report
        .bucket(NormalizedStatus::Delivered)
        .iter()
        .map(|d| d.shipment.tracking_number.as_str())
        .collect();
    assert_eq!(delivered, vec!["F1", "U2"]);
    assert_eq!(report.bucket(NormalizedStatus::Exception).len(), 1);
    assert_eq!(report.bucket(NormalizedStatus::InTransit).len(), 1);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.totals.shipments, 5);
    assert_eq!(report.totals.date_updates, 2);
}

//! Sequential, paced lookup dispatch.
//!
//! Every shipment runs through its own state machine:
//!
//! ```text
//! Pending ──► Dispatched{attempt=1} ──► Succeeded
//!                 │    ▲                    ▲
//!                 │    └── Transient ───────┤ (attempt ≤ max_retries)
//!                 │        Malformed (once) ┘
//!                 └──► Failed
//! ```
//!
//! Calls are strictly sequential. One `Pacer` spaces every network call in
//! the run, whatever the carrier, including retries. A carrier that reports
//! missing credentials is disabled for the rest of the run, so its remaining
//! shipments fail without spending pacing budget.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use crate::carrier::CarrierSet;
use crate::classify::classify;
use crate::error::{LookupError, ShipmentError};
use crate::model::{CarrierVariant, RawTrackingResult, ShipmentRecord};

pub const DEFAULT_PACING: Duration = Duration::from_millis(500);
pub const DEFAULT_MAX_RETRIES: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Minimum gap between any two network calls in the run.
    pub pacing: Duration,
    /// Additional attempts after a transient failure.
    pub max_retries: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            pacing: DEFAULT_PACING,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

// ── Pacer ───────────────────────────────────────────────────────────

/// Global "last call" clock shared by every carrier in a run.
pub struct Pacer {
    interval: Duration,
    last_call: Option<Instant>,
    sleeper: Box<dyn FnMut(Duration)>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self::with_sleeper(interval, std::thread::sleep)
    }

    /// Pacer with a custom sleep function (tests record instead of sleeping).
    pub fn with_sleeper(interval: Duration, sleeper: impl FnMut(Duration) + 'static) -> Self {
        Self {
            interval,
            last_call: None,
            sleeper: Box::new(sleeper),
        }
    }

    /// Block until the gap since the previous call is at least the pacing
    /// interval (or `at_least`, when longer), then record this call.
    pub fn pause(&mut self, at_least: Option<Duration>) {
        let target = at_least.map_or(self.interval, |d| d.max(self.interval));
        if let Some(last) = self.last_call {
            let elapsed = last.elapsed();
            if elapsed < target {
                (self.sleeper)(target - elapsed);
            }
        }
        self.last_call = Some(Instant::now());
    }
}

// ── State machine ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupState {
    Pending,
    Dispatched {
        attempt: u32,
        /// Carrier-requested delay before this attempt (Retry-After).
        backoff: Option<Duration>,
    },
    Succeeded {
        raw: RawTrackingResult,
        attempts: u32,
    },
    Failed {
        error: ShipmentError,
        attempts: u32,
    },
}

/// Terminal result of dispatching one shipment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatched {
    pub carrier: CarrierVariant,
    pub attempts: u32,
    pub result: Result<RawTrackingResult, ShipmentError>,
}

// ── Dispatcher ──────────────────────────────────────────────────────

pub struct Dispatcher {
    config: DispatchConfig,
    pacer: Pacer,
    disabled: BTreeSet<CarrierVariant>,
    calls: u32,
}

impl Dispatcher {
    pub fn new(config: DispatchConfig) -> Self {
        let pacer = Pacer::new(config.pacing);
        Self::with_pacer(config, pacer)
    }

    pub fn with_pacer(config: DispatchConfig, pacer: Pacer) -> Self {
        Self {
            config,
            pacer,
            disabled: BTreeSet::new(),
            calls: 0,
        }
    }

    /// Network calls made so far in this run.
    pub fn calls(&self) -> u32 {
        self.calls
    }

    /// Carriers short-circuited for missing credentials.
    pub fn disabled_carriers(&self) -> impl Iterator<Item = CarrierVariant> + '_ {
        self.disabled.iter().copied()
    }

    /// Run one shipment's state machine to a terminal state.
    pub fn dispatch(&mut self, shipment: &ShipmentRecord, carriers: &mut CarrierSet) -> Dispatched {
        let carrier = classify(&shipment.carrier_label);
        let tracking = shipment.tracking_number.as_str();
        let mut malformed_retried = false;
        let mut state = LookupState::Pending;

        loop {
            state = match state {
                LookupState::Pending => self.admit(shipment, carrier, carriers),
                LookupState::Dispatched { attempt, backoff } => {
                    self.attempt(tracking, carrier, attempt, backoff, &mut malformed_retried, carriers)
                }
                LookupState::Succeeded { raw, attempts } => {
                    return Dispatched { carrier, attempts, result: Ok(raw) };
                }
                LookupState::Failed { error, attempts } => {
                    return Dispatched { carrier, attempts, result: Err(error) };
                }
            };
        }
    }

    /// `Pending` → `Dispatched` or an immediate `Failed` with no network call.
    fn admit(&mut self, shipment: &ShipmentRecord, carrier: CarrierVariant, carriers: &CarrierSet) -> LookupState {
        if carrier == CarrierVariant::Unknown {
            tracing::warn!(
                row = shipment.id.row,
                tab = %shipment.id.tab,
                label = %shipment.carrier_label,
                "unknown carrier, skipping lookup"
            );
            return LookupState::Failed {
                error: ShipmentError::Classification { label: shipment.carrier_label.trim().to_string() },
                attempts: 0,
            };
        }

        if self.disabled.contains(&carrier) || !carriers.is_configured(carrier) {
            if self.disabled.insert(carrier) {
                tracing::warn!(%carrier, "credentials not configured, skipping all {carrier} shipments");
            }
            return LookupState::Failed {
                error: ShipmentError::Configuration { carrier },
                attempts: 0,
            };
        }

        LookupState::Dispatched { attempt: 1, backoff: None }
    }

    /// One network call: `Dispatched` → `Dispatched` (retry) | terminal.
    fn attempt(
        &mut self,
        tracking: &str,
        carrier: CarrierVariant,
        attempt: u32,
        backoff: Option<Duration>,
        malformed_retried: &mut bool,
        carriers: &mut CarrierSet,
    ) -> LookupState {
        let Some(client) = carriers.get_mut(carrier) else {
            self.disabled.insert(carrier);
            return LookupState::Failed {
                error: ShipmentError::Configuration { carrier },
                attempts: attempt - 1,
            };
        };

        self.pacer.pause(backoff);
        self.calls += 1;
        tracing::debug!(%carrier, tracking, attempt, "lookup");

        let can_retry = attempt <= self.config.max_retries;
        match client.lookup(tracking) {
            Ok(raw) => LookupState::Succeeded { raw, attempts: attempt },
            Err(LookupError::CredentialsMissing) => {
                self.disabled.insert(carrier);
                tracing::warn!(%carrier, "credentials not configured, skipping all {carrier} shipments");
                LookupState::Failed {
                    error: ShipmentError::Configuration { carrier },
                    attempts: attempt,
                }
            }
            Err(LookupError::Transient { message, retry_after }) if can_retry => {
                tracing::warn!(
                    %carrier,
                    tracking,
                    "retry {}/{} ({message})",
                    attempt,
                    self.config.max_retries,
                );
                LookupState::Dispatched { attempt: attempt + 1, backoff: retry_after }
            }
            Err(LookupError::Malformed(message)) if can_retry && !*malformed_retried => {
                *malformed_retried = true;
                tracing::warn!(%carrier, tracking, "malformed response, retrying once ({message})");
                LookupState::Dispatched { attempt: attempt + 1, backoff: None }
            }
            Err(LookupError::Malformed(message)) => {
                tracing::warn!(%carrier, tracking, "malformed response, reporting as unknown ({message})");
                LookupState::Succeeded {
                    raw: RawTrackingResult {
                        description: format!("unreadable {carrier} response"),
                        error: Some(message),
                        ..Default::default()
                    },
                    attempts: attempt,
                }
            }
            Err(err) => {
                tracing::warn!(%carrier, tracking, "lookup failed: {err}");
                LookupState::Failed {
                    error: ShipmentError::from_lookup(carrier, err, attempt),
                    attempts: attempt,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carrier::CarrierClient;
    use crate::model::ShipmentId;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    /// Client that replays a script of results and counts calls.
    struct Scripted {
        script: VecDeque<Result<RawTrackingResult, LookupError>>,
        calls: Rc<RefCell<u32>>,
        configured: bool,
    }

    impl Scripted {
        fn new(script: Vec<Result<RawTrackingResult, LookupError>>) -> (Self, Rc<RefCell<u32>>) {
            let calls = Rc::new(RefCell::new(0));
            let client = Self {
                script: script.into(),
                calls: Rc::clone(&calls),
                configured: true,
            };
            (client, calls)
        }

        fn unconfigured() -> (Self, Rc<RefCell<u32>>) {
            let (mut c, calls) = Self::new(vec![]);
            c.configured = false;
            (c, calls)
        }
    }

    impl CarrierClient for Scripted {
        fn lookup(&mut self, _tracking_number: &str) -> Result<RawTrackingResult, LookupError> {
            *self.calls.borrow_mut() += 1;
            self.script
                .pop_front()
                .unwrap_or_else(|| Ok(delivered()))
        }

        fn is_configured(&self) -> bool {
            self.configured
        }
    }

    fn delivered() -> RawTrackingResult {
        RawTrackingResult {
            code: "D".into(),
            description: "Delivered".into(),
            delivery_timestamp: Some("2026-02-20".into()),
            ..Default::default()
        }
    }

    fn shipment(row: u32, carrier: &str) -> ShipmentRecord {
        ShipmentRecord {
            id: ShipmentId {
                spreadsheet: "sht".into(),
                tab: "FEB".into(),
                sheet_id: "s1".into(),
                row,
            },
            tracking_number: format!("TRK{row}"),
            carrier_label: carrier.into(),
            recipient: String::new(),
            customer: String::new(),
            status: String::new(),
            delivery_date: None,
        }
    }

    fn no_sleep_dispatcher(max_retries: u32) -> (Dispatcher, Rc<RefCell<Vec<Duration>>>) {
        let sleeps = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&sleeps);
        let pacer = Pacer::with_sleeper(Duration::from_secs(1), move |d| log.borrow_mut().push(d));
        let config = DispatchConfig {
            pacing: Duration::from_secs(1),
            max_retries,
        };
        (Dispatcher::with_pacer(config, pacer), sleeps)
    }

    #[test]
    fn success_on_first_attempt() {
        let (client, calls) = Scripted::new(vec![Ok(delivered())]);
        let mut carriers = CarrierSet::new().with(CarrierVariant::Ups, client);
        let (mut dispatcher, _) = no_sleep_dispatcher(2);

        let out = dispatcher.dispatch(&shipment(3, "UPS"), &mut carriers);
        assert_eq!(out.carrier, CarrierVariant::Ups);
        assert_eq!(out.attempts, 1);
        assert_eq!(out.result, Ok(delivered()));
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn transient_retried_then_succeeds() {
        let (client, calls) = Scripted::new(vec![
            Err(LookupError::transient("HTTP 503")),
            Err(LookupError::transient("timeout")),
            Ok(delivered()),
        ]);
        let mut carriers = CarrierSet::new().with(CarrierVariant::Ups, client);
        let (mut dispatcher, sleeps) = no_sleep_dispatcher(2);

        let out = dispatcher.dispatch(&shipment(3, "UPS"), &mut carriers);
        assert!(out.result.is_ok());
        assert_eq!(out.attempts, 3);
        assert_eq!(*calls.borrow(), 3);
        // Retries are paced like any other call.
        assert_eq!(sleeps.borrow().len(), 2);
    }

    #[test]
    fn transient_exhausted_is_terminal() {
        let (client, calls) = Scripted::new(vec![
            Err(LookupError::transient("HTTP 503")),
            Err(LookupError::transient("HTTP 503")),
            Err(LookupError::transient("HTTP 502")),
            Ok(delivered()),
        ]);
        let mut carriers = CarrierSet::new().with(CarrierVariant::Ups, client);
        let (mut dispatcher, _) = no_sleep_dispatcher(2);

        let out = dispatcher.dispatch(&shipment(3, "UPS"), &mut carriers);
        assert_eq!(
            out.result,
            Err(ShipmentError::RetryExhausted {
                carrier: CarrierVariant::Ups,
                attempts: 3,
                message: "HTTP 502".into(),
            })
        );
        assert_eq!(*calls.borrow(), 3);
    }

    #[test]
    fn not_found_is_not_retried() {
        let (client, calls) = Scripted::new(vec![Err(LookupError::NotFound("no record".into()))]);
        let mut carriers = CarrierSet::new().with(CarrierVariant::FedEx, client);
        let (mut dispatcher, _) = no_sleep_dispatcher(2);

        let out = dispatcher.dispatch(&shipment(3, "FedEx"), &mut carriers);
        assert!(matches!(out.result, Err(ShipmentError::NotFound { .. })));
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn malformed_retried_once_then_unknown() {
        let (client, calls) = Scripted::new(vec![
            Err(LookupError::Malformed("bad json".into())),
            Err(LookupError::Malformed("bad json again".into())),
        ]);
        let mut carriers = CarrierSet::new().with(CarrierVariant::Dhl, client);
        let (mut dispatcher, _) = no_sleep_dispatcher(2);

        let out = dispatcher.dispatch(&shipment(3, "DHL"), &mut carriers);
        let raw = out.result.unwrap();
        assert!(raw.code.is_empty());
        assert_eq!(raw.error.as_deref(), Some("bad json again"));
        assert_eq!(out.attempts, 2);
        assert_eq!(*calls.borrow(), 2);
    }

    #[test]
    fn unknown_carrier_makes_no_call() {
        let (client, calls) = Scripted::new(vec![]);
        let mut carriers = CarrierSet::new().with(CarrierVariant::Ups, client);
        let (mut dispatcher, _) = no_sleep_dispatcher(2);

        let out = dispatcher.dispatch(&shipment(3, "Speedy Logistics"), &mut carriers);
        assert_eq!(out.carrier, CarrierVariant::Unknown);
        assert_eq!(out.attempts, 0);
        assert_eq!(
            out.result,
            Err(ShipmentError::Classification { label: "Speedy Logistics".into() })
        );
        assert_eq!(*calls.borrow(), 0);
        assert_eq!(dispatcher.calls(), 0);
    }

    #[test]
    fn missing_credentials_short_circuit_carrier_only() {
        let (fedex, fedex_calls) = Scripted::unconfigured();
        let (ups, ups_calls) = Scripted::new(vec![]);
        let mut carriers = CarrierSet::new()
            .with(CarrierVariant::FedEx, fedex)
            .with(CarrierVariant::Ups, ups);
        let (mut dispatcher, _) = no_sleep_dispatcher(2);

        for row in 3..6 {
            let out = dispatcher.dispatch(&shipment(row, "FedEx Ground"), &mut carriers);
            assert_eq!(
                out.result,
                Err(ShipmentError::Configuration { carrier: CarrierVariant::FedEx })
            );
        }
        let ups_out = dispatcher.dispatch(&shipment(9, "UPS"), &mut carriers);
        assert!(ups_out.result.is_ok());

        assert_eq!(*fedex_calls.borrow(), 0);
        assert_eq!(*ups_calls.borrow(), 1);
        assert_eq!(dispatcher.disabled_carriers().collect::<Vec<_>>(), vec![CarrierVariant::FedEx]);
    }

    #[test]
    fn credentials_missing_from_lookup_disables_carrier() {
        let (client, calls) = Scripted::new(vec![Err(LookupError::CredentialsMissing)]);
        let mut carriers = CarrierSet::new().with(CarrierVariant::Usps, client);
        let (mut dispatcher, _) = no_sleep_dispatcher(2);

        let first = dispatcher.dispatch(&shipment(3, "USPS"), &mut carriers);
        let second = dispatcher.dispatch(&shipment(4, "USPS"), &mut carriers);
        assert!(matches!(first.result, Err(ShipmentError::Configuration { .. })));
        assert!(matches!(second.result, Err(ShipmentError::Configuration { .. })));
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn missing_client_is_configuration_error() {
        let mut carriers = CarrierSet::new();
        let (mut dispatcher, _) = no_sleep_dispatcher(2);
        let out = dispatcher.dispatch(&shipment(3, "DHL"), &mut carriers);
        assert_eq!(out.result, Err(ShipmentError::Configuration { carrier: CarrierVariant::Dhl }));
    }

    #[test]
    fn pacing_is_global_across_carriers() {
        let (fedex, _) = Scripted::new(vec![]);
        let (ups, _) = Scripted::new(vec![]);
        let mut carriers = CarrierSet::new()
            .with(CarrierVariant::FedEx, fedex)
            .with(CarrierVariant::Ups, ups);
        let (mut dispatcher, sleeps) = no_sleep_dispatcher(2);

        dispatcher.dispatch(&shipment(3, "FedEx"), &mut carriers);
        dispatcher.dispatch(&shipment(4, "UPS"), &mut carriers);
        dispatcher.dispatch(&shipment(5, "FedEx"), &mut carriers);

        let sleeps = sleeps.borrow();
        assert_eq!(sleeps.len(), 2, "first call is not delayed");
        for d in sleeps.iter() {
            assert!(*d > Duration::from_millis(900), "slept {d:?}");
        }
        assert_eq!(dispatcher.calls(), 3);
    }

    #[test]
    fn retry_after_extends_pause() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let mut pacer = Pacer::with_sleeper(Duration::from_millis(100), move |d| sink.borrow_mut().push(d));
        pacer.pause(None);
        pacer.pause(Some(Duration::from_secs(5)));
        let log = log.borrow();
        assert_eq!(log.len(), 1);
        assert!(log[0] > Duration::from_secs(4));
    }
}

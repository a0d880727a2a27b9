use chrono::{DateTime, Duration, TimeZone, Utc};
use octofr::config::{Config, ReadingFrequency};
use octofr::coordinator::RefreshCoordinator;
use octofr::error::{OctoError, Result};
use octofr::kraken::{AccountData, EnergyApi, ReadingsRequest, UtilityType};
use octofr::snapshot::{ElectricityIndex, ElectricityMeter, GasMeter, Reading, SupplyPoints};
use std::error::Error as _;
use std::sync::{Arc, Mutex};

type Failure = fn() -> OctoError;

#[derive(Default)]
struct StubApi {
    account: AccountData,
    electricity: Vec<Reading>,
    gas: Vec<Reading>,
    index: Option<ElectricityIndex>,
    fail_account: Mutex<Option<Failure>>,
    fail_readings: Mutex<Option<Failure>>,
    fail_index: Mutex<Option<Failure>>,
    requests: Mutex<Vec<ReadingsRequest>>,
    index_calls: Mutex<Vec<(String, String)>>,
}

fn injected(slot: &Mutex<Option<Failure>>) -> Result<()> {
    match *slot.lock().unwrap() {
        Some(f) => Err(f()),
        None => Ok(()),
    }
}

impl StubApi {
    fn set_failure(&self, f: Option<Failure>) {
        *self.fail_account.lock().unwrap() = f;
    }

    fn requests(&self) -> Vec<ReadingsRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl EnergyApi for StubApi {
    async fn get_account_data(&self, _account_number: &str) -> Result<AccountData> {
        injected(&self.fail_account)?;
        Ok(self.account.clone())
    }

    async fn get_energy_readings(&self, request: &ReadingsRequest) -> Result<Vec<Reading>> {
        self.requests.lock().unwrap().push(request.clone());
        injected(&self.fail_readings)?;
        Ok(match request.utility {
            UtilityType::Electricity => self.electricity.clone(),
            UtilityType::Gas => self.gas.clone(),
        })
    }

    async fn get_electricity_index(
        &self,
        account_number: &str,
        prm_id: &str,
    ) -> Result<Option<ElectricityIndex>> {
        self.index_calls
            .lock()
            .unwrap()
            .push((account_number.to_string(), prm_id.to_string()));
        injected(&self.fail_index)?;
        Ok(self.index.clone())
    }
}

fn meter(id: &str, distributor: &str, powered: &str) -> ElectricityMeter {
    ElectricityMeter {
        id: Some(id.into()),
        distributor_status: Some(distributor.into()),
        powered_status: Some(powered.into()),
        ..Default::default()
    }
}

fn account(electricity: Vec<ElectricityMeter>, gas: Vec<GasMeter>) -> AccountData {
    AccountData {
        account_id: Some("123".into()),
        account_number: Some("A-1234ABCD".into()),
        supply_points: SupplyPoints { electricity, gas },
        ..Default::default()
    }
}

fn config(frequency: ReadingFrequency) -> Config {
    let mut cfg = Config::default();
    cfg.account.account_number = "A-1234ABCD".into();
    cfg.reading_frequency = frequency;
    cfg
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 15, 12, 0, 0).unwrap()
}

#[tokio::test]
async fn refresh_builds_snapshot_and_publishes_it() {
    let api = Arc::new(StubApi {
        account: account(
            vec![meter("PRM-OLD", "RESIL", "LIMI"), meter("PRM1", "SERVC", "ALIM")],
            vec![GasMeter {
                id: Some("PCE1".into()),
                ..Default::default()
            }],
        ),
        electricity: vec![Reading::default(); 3],
        gas: vec![Reading::default()],
        index: Some(ElectricityIndex::default()),
        ..Default::default()
    });
    let mut coordinator =
        RefreshCoordinator::new(api.clone(), &config(ReadingFrequency::HourInterval)).unwrap();
    let rx = coordinator.subscribe();
    assert!(coordinator.current().is_none());

    let snapshot = coordinator.refresh_at(now()).await.unwrap();

    assert_eq!(snapshot.account_id, "123");
    assert_eq!(snapshot.electricity_meters().len(), 1);
    assert!(snapshot.electricity_meter("PRM-OLD").is_none());
    assert_eq!(snapshot.electricity_readings.len(), 3);
    assert_eq!(snapshot.gas_readings.len(), 1);
    assert!(snapshot.electricity_index.is_some());
    assert_eq!(snapshot.window.start, now() - Duration::hours(72));
    assert_eq!(snapshot.fetched_at, now());

    assert!(coordinator.last_update_success());
    assert!(coordinator.last_error().is_none());
    let published = rx.borrow().clone().unwrap();
    assert!(Arc::ptr_eq(&published, &snapshot));

    let requests = api.requests();
    assert_eq!(requests.len(), 2);
    let elec = &requests[0];
    assert_eq!(elec.meter_id, "PRM1");
    assert_eq!(elec.account_id, "123");
    assert_eq!(elec.reading_quality, "ACTUAL");
    assert_eq!(elec.first, 500);
    assert_eq!(elec.reading_frequency, ReadingFrequency::HourInterval);
    assert_eq!(requests[1].meter_id, "PCE1");
    assert_eq!(requests[1].utility, UtilityType::Gas);

    let index_calls = api.index_calls.lock().unwrap().clone();
    assert_eq!(index_calls, vec![("A-1234ABCD".into(), "PRM1".into())]);
}

#[tokio::test]
async fn window_strings_carry_configured_offset() {
    let api = Arc::new(StubApi {
        account: account(vec![meter("PRM1", "SERVC", "ALIM")], vec![]),
        ..Default::default()
    });
    let mut coordinator =
        RefreshCoordinator::new(api.clone(), &config(ReadingFrequency::DayInterval)).unwrap();
    coordinator.refresh_at(now()).await.unwrap();

    let req = &api.requests()[0];
    // Europe/Paris is UTC+1 in mid-March
    assert_eq!(req.end, "2025-03-15T13:00:00+01:00");
    assert_eq!(req.start, "2025-02-12T13:00:00+01:00");
}

#[tokio::test]
async fn no_meters_means_no_reading_calls() {
    let api = Arc::new(StubApi {
        account: account(vec![meter("PRM-OLD", "RESIL", "LIMI")], vec![]),
        ..Default::default()
    });
    let mut coordinator =
        RefreshCoordinator::new(api.clone(), &config(ReadingFrequency::HourInterval)).unwrap();

    let snapshot = coordinator.refresh_at(now()).await.unwrap();

    assert!(snapshot.electricity_meters().is_empty());
    assert!(snapshot.electricity_readings.is_empty());
    assert!(snapshot.electricity_index.is_none());
    assert!(api.requests().is_empty());
    assert!(api.index_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_account_id_is_a_refresh_failure() {
    let mut data = account(vec![], vec![]);
    data.account_id = None;
    let api = Arc::new(StubApi {
        account: data,
        ..Default::default()
    });
    let mut coordinator =
        RefreshCoordinator::new(api, &config(ReadingFrequency::HourInterval)).unwrap();

    let err = coordinator.refresh_at(now()).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Refresh failed: Missing account_id in API response"
    );
    assert!(err.source().is_none());
    assert!(!coordinator.last_update_success());
}

#[tokio::test]
async fn missing_account_number_is_a_refresh_failure() {
    let mut data = account(vec![], vec![]);
    data.account_number = Some(String::new());
    let api = Arc::new(StubApi {
        account: data,
        ..Default::default()
    });
    let mut coordinator =
        RefreshCoordinator::new(api, &config(ReadingFrequency::HourInterval)).unwrap();

    let err = coordinator.refresh_at(now()).await.unwrap_err();
    assert!(err.to_string().contains("Missing account_number"));
}

#[tokio::test]
async fn failed_refresh_keeps_previous_snapshot() {
    let api = Arc::new(StubApi {
        account: account(vec![meter("PRM1", "SERVC", "ALIM")], vec![]),
        ..Default::default()
    });
    let mut coordinator =
        RefreshCoordinator::new(api.clone(), &config(ReadingFrequency::HourInterval)).unwrap();
    let first = coordinator.refresh_at(now()).await.unwrap();

    api.set_failure(Some(|| OctoError::network("connection reset")));
    let err = coordinator
        .refresh_at(now() + Duration::hours(1))
        .await
        .unwrap_err();

    assert!(matches!(err, OctoError::Refresh { .. }));
    assert_eq!(
        err.source().map(|s| s.to_string()).as_deref(),
        Some("Network error: connection reset")
    );
    assert!(!coordinator.last_update_success());
    assert!(
        coordinator
            .last_error()
            .unwrap()
            .contains("Error communicating with API")
    );
    let current = coordinator.current().unwrap();
    assert!(Arc::ptr_eq(&current, &first));

    api.set_failure(None);
    coordinator.refresh_at(now() + Duration::hours(2)).await.unwrap();
    assert!(coordinator.last_update_success());
    assert_eq!(coordinator.status().cycles, 3);
}

#[tokio::test]
async fn run_refreshes_eagerly_and_stops_on_shutdown() {
    let api = Arc::new(StubApi {
        account: account(vec![], vec![]),
        ..Default::default()
    });
    let mut coordinator =
        RefreshCoordinator::new(api, &config(ReadingFrequency::HourInterval)).unwrap();
    let mut rx = coordinator.subscribe();

    let (tx, shutdown) = tokio::sync::oneshot::channel::<()>();
    let watcher = tokio::spawn(async move {
        rx.changed().await.unwrap();
        let published = rx.borrow().is_some();
        tx.send(()).ok();
        published
    });

    coordinator
        .run(async {
            shutdown.await.ok();
        })
        .await;

    assert!(watcher.await.unwrap());
    assert!(coordinator.last_update_success());
    assert_eq!(coordinator.status().cycles, 1);
}

#[tokio::test]
async fn readings_failure_mid_cycle_keeps_previous_snapshot() {
    let api = Arc::new(StubApi {
        account: account(vec![meter("PRM1", "SERVC", "ALIM")], vec![]),
        electricity: vec![Reading::default(); 2],
        ..Default::default()
    });
    let mut coordinator =
        RefreshCoordinator::new(api.clone(), &config(ReadingFrequency::HourInterval)).unwrap();
    let first = coordinator.refresh_at(now()).await.unwrap();

    *api.fail_readings.lock().unwrap() = Some(|| OctoError::timeout("readings took too long"));
    let err = coordinator
        .refresh_at(now() + Duration::hours(1))
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Refresh failed: Error communicating with API: Timeout error: readings took too long"
    );
    assert!(matches!(
        err.source()
            .and_then(|s| s.downcast_ref::<OctoError>()),
        Some(OctoError::Timeout { .. })
    ));
    assert!(!coordinator.last_update_success());
    assert!(Arc::ptr_eq(&coordinator.current().unwrap(), &first));
    // The index call is never reached once readings fail
    assert_eq!(api.index_calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn index_failure_mid_cycle_keeps_previous_snapshot() {
    let api = Arc::new(StubApi {
        account: account(vec![meter("PRM1", "SERVC", "ALIM")], vec![]),
        ..Default::default()
    });
    let mut coordinator =
        RefreshCoordinator::new(api.clone(), &config(ReadingFrequency::DayInterval)).unwrap();
    let first = coordinator.refresh_at(now()).await.unwrap();
    let mut rx = coordinator.subscribe();
    rx.borrow_and_update();

    *api.fail_index.lock().unwrap() = Some(|| OctoError::api("Unknown PRM"));
    let err = coordinator
        .refresh_at(now() + Duration::hours(1))
        .await
        .unwrap_err();

    assert!(matches!(err, OctoError::Refresh { .. }));
    assert_eq!(
        err.source().map(|s| s.to_string()).as_deref(),
        Some("API error: Unknown PRM")
    );
    assert!(!rx.has_changed().unwrap());
    assert!(Arc::ptr_eq(&coordinator.current().unwrap(), &first));
}

#[tokio::test]
async fn refresh_failure_from_api_is_not_rewrapped() {
    let api = Arc::new(StubApi {
        account: account(vec![], vec![]),
        ..Default::default()
    });
    api.set_failure(Some(|| OctoError::refresh("Account locked upstream")));
    let mut coordinator =
        RefreshCoordinator::new(api, &config(ReadingFrequency::HourInterval)).unwrap();

    let err = coordinator.refresh_at(now()).await.unwrap_err();

    assert_eq!(err.to_string(), "Refresh failed: Account locked upstream");
    assert!(err.source().is_none());
    assert_eq!(
        coordinator.last_error(),
        Some("Refresh failed: Account locked upstream")
    );
    assert!(coordinator.current().is_none());
}

#[test]
fn zero_scan_interval_is_rejected() {
    let mut cfg = config(ReadingFrequency::HourInterval);
    cfg.scan_interval_minutes = 0;

    let err = RefreshCoordinator::new(Arc::new(StubApi::default()), &cfg)
        .err()
        .unwrap();

    assert!(matches!(
        err,
        OctoError::Validation { ref field, .. } if field == "scan_interval_minutes"
    ));
}

#[test]
fn empty_account_number_is_rejected() {
    let mut cfg = config(ReadingFrequency::HourInterval);
    cfg.account.account_number = "  ".into();

    assert!(RefreshCoordinator::new(Arc::new(StubApi::default()), &cfg).is_err());
}

#[tokio::test]
async fn unsupported_frequency_falls_back_to_weekly_window() {
    let api = Arc::new(StubApi {
        account: account(vec![meter("PRM1", "SERVC", "ALIM")], vec![]),
        ..Default::default()
    });
    let mut coordinator =
        RefreshCoordinator::new(api.clone(), &config(ReadingFrequency::MonthInterval)).unwrap();

    let snapshot = coordinator.refresh_at(now()).await.unwrap();

    assert_eq!(snapshot.window.start, now() - Duration::days(7));
    assert_eq!(
        api.requests()[0].reading_frequency,
        ReadingFrequency::MonthInterval
    );
}

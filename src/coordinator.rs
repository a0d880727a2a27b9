//! Refresh coordinator
//!
//! One refresh cycle fetches account data, drops terminated meters, pulls
//! readings and index data for the primary meters and assembles a fresh
//! [`Snapshot`]. The snapshot is published through a `watch` channel as an
//! `Arc`, so readers always see a complete snapshot. A failed cycle leaves
//! the previous snapshot in place.

use crate::config::{Config, ReadingFrequency};
use crate::error::{OctoError, Result};
use crate::kraken::{
    EnergyApi, READING_QUALITY_ACTUAL, READINGS_PAGE_SIZE, ReadingsRequest, UtilityType,
};
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use crate::snapshot::{ElectricityMeter, Reading, ReadingWindow, Snapshot};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use chrono_tz::Tz;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use uuid::Uuid;

/// Lookback of hourly readings
pub const HOURLY_WINDOW_HOURS: i64 = 72;
/// Lookback of daily readings
pub const DAILY_WINDOW_DAYS: i64 = 31;
/// Lookback for any other reading frequency
pub const FALLBACK_WINDOW_DAYS: i64 = 7;

/// Readings window ending at `now` for the given frequency
pub fn compute_window(frequency: &ReadingFrequency, now: DateTime<Utc>) -> ReadingWindow {
    let lookback = match frequency {
        ReadingFrequency::HourInterval => ChronoDuration::hours(HOURLY_WINDOW_HOURS),
        ReadingFrequency::DayInterval => ChronoDuration::days(DAILY_WINDOW_DAYS),
        _ => ChronoDuration::days(FALLBACK_WINDOW_DAYS),
    };
    ReadingWindow {
        start: now - lookback,
        end: now,
    }
}

/// Drop supply points that are both terminated and limited
pub fn filter_active_meters(meters: Vec<ElectricityMeter>) -> Vec<ElectricityMeter> {
    meters.into_iter().filter(|m| !m.is_terminated()).collect()
}

/// Outcome of the most recent refresh cycle
#[derive(Debug, Clone, Default)]
pub struct RefreshStatus {
    pub last_update_success: bool,
    pub last_error: Option<String>,
    pub cycles: u64,
}

/// Periodic fetch-and-publish loop for one account
pub struct RefreshCoordinator {
    api: Arc<dyn EnergyApi>,
    account_number: String,
    reading_frequency: ReadingFrequency,
    scan_interval: Duration,
    tz: Tz,
    snapshot_tx: watch::Sender<Option<Arc<Snapshot>>>,
    status: RefreshStatus,
    logger: StructuredLogger,
}

impl RefreshCoordinator {
    pub fn new(api: Arc<dyn EnergyApi>, config: &Config) -> Result<Self> {
        config.validate()?;
        let tz = config.tz()?;
        let (snapshot_tx, _) = watch::channel(None);
        let logger = get_logger_with_context(
            LogContext::new("coordinator").with_account_number(&config.account.account_number),
        );
        if !config.reading_frequency.is_supported() {
            logger.warn(&format!(
                "Reading frequency {} is not known to be accepted by the API, using a {}-day window",
                config.reading_frequency, FALLBACK_WINDOW_DAYS
            ));
        }
        Ok(Self {
            api,
            account_number: config.account.account_number.clone(),
            reading_frequency: config.reading_frequency.clone(),
            scan_interval: config.scan_interval(),
            tz,
            snapshot_tx,
            status: RefreshStatus::default(),
            logger,
        })
    }

    pub fn account_number(&self) -> &str {
        &self.account_number
    }

    pub fn reading_frequency(&self) -> &ReadingFrequency {
        &self.reading_frequency
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Receiver that observes every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Snapshot>>> {
        self.snapshot_tx.subscribe()
    }

    /// Last published snapshot, if any cycle has succeeded yet
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.snapshot_tx.borrow().clone()
    }

    pub fn status(&self) -> &RefreshStatus {
        &self.status
    }

    pub fn last_update_success(&self) -> bool {
        self.status.last_update_success
    }

    pub fn last_error(&self) -> Option<&str> {
        self.status.last_error.as_deref()
    }

    /// Run one refresh cycle now
    pub async fn refresh(&mut self) -> Result<Arc<Snapshot>> {
        self.refresh_at(Utc::now()).await
    }

    /// Run one refresh cycle with an explicit clock. Any failure comes back
    /// as [`OctoError::Refresh`] and the published snapshot is left untouched.
    pub async fn refresh_at(&mut self, now: DateTime<Utc>) -> Result<Arc<Snapshot>> {
        let logger = self.logger.for_cycle(Uuid::new_v4().to_string());
        self.status.cycles = self.status.cycles.saturating_add(1);

        match self.fetch_snapshot(now, &logger).await {
            Ok(snapshot) => {
                logger.info(&format!(
                    "Refresh complete: {} electricity meter(s), {} gas meter(s), {} electricity reading(s), {} gas reading(s)",
                    snapshot.supply_points.electricity.len(),
                    snapshot.supply_points.gas.len(),
                    snapshot.electricity_readings.len(),
                    snapshot.gas_readings.len()
                ));
                let snapshot = Arc::new(snapshot);
                self.snapshot_tx.send_replace(Some(Arc::clone(&snapshot)));
                self.status.last_update_success = true;
                self.status.last_error = None;
                Ok(snapshot)
            }
            Err(e) => {
                let recoverable = e.is_recoverable();
                let err = e.into_refresh_failure();
                if recoverable {
                    logger.warn(&format!("{}, retrying next cycle", err));
                } else {
                    logger.error(&format!("{}", err));
                }
                self.status.last_update_success = false;
                self.status.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    async fn fetch_snapshot(
        &self,
        now: DateTime<Utc>,
        logger: &StructuredLogger,
    ) -> Result<Snapshot> {
        let account = self.api.get_account_data(&self.account_number).await?;

        let account_id = account
            .account_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| OctoError::refresh("Missing account_id in API response"))?;
        let account_number = account
            .account_number
            .filter(|n| !n.is_empty())
            .ok_or_else(|| OctoError::refresh("Missing account_number in API response"))?;

        let mut supply_points = account.supply_points;
        let before = supply_points.electricity.len();
        supply_points.electricity = filter_active_meters(supply_points.electricity);
        let dropped = before - supply_points.electricity.len();
        if dropped > 0 {
            logger.debug(&format!("Ignoring {} terminated electricity meter(s)", dropped));
        }

        let electricity_meter_id = supply_points
            .electricity
            .first()
            .and_then(|m| m.id.clone());
        let gas_meter_id = supply_points.gas.first().and_then(|m| m.id.clone());

        let window = compute_window(&self.reading_frequency, now);

        let mut electricity_readings = Vec::new();
        let mut electricity_index = None;
        if let Some(prm_id) = electricity_meter_id.as_deref() {
            electricity_readings = self
                .fetch_readings(
                    &account_id,
                    prm_id,
                    UtilityType::Electricity,
                    &self.reading_frequency,
                    &window,
                )
                .await?;
            electricity_index = self
                .api
                .get_electricity_index(&account_number, prm_id)
                .await?;
        }

        let mut gas_readings = Vec::new();
        if let Some(pce_ref) = gas_meter_id.as_deref() {
            // Gas meters only report daily values
            let gas_window = compute_window(&ReadingFrequency::DayInterval, now);
            gas_readings = self
                .fetch_readings(
                    &account_id,
                    pce_ref,
                    UtilityType::Gas,
                    &ReadingFrequency::DayInterval,
                    &gas_window,
                )
                .await?;
        }

        Ok(Snapshot {
            account_id,
            account_number,
            supply_points,
            ledgers: account.ledgers,
            payment_requests: account.payment_requests,
            electricity_readings,
            electricity_index,
            gas_readings,
            reading_frequency: self.reading_frequency.clone(),
            window,
            fetched_at: now,
        })
    }

    async fn fetch_readings(
        &self,
        account_id: &str,
        meter_id: &str,
        utility: UtilityType,
        frequency: &ReadingFrequency,
        window: &ReadingWindow,
    ) -> Result<Vec<Reading>> {
        let request = ReadingsRequest {
            account_id: account_id.to_string(),
            start: window.start.with_timezone(&self.tz).to_rfc3339(),
            end: window.end.with_timezone(&self.tz).to_rfc3339(),
            meter_id: meter_id.to_string(),
            utility,
            reading_frequency: frequency.clone(),
            reading_quality: READING_QUALITY_ACTUAL.to_string(),
            first: READINGS_PAGE_SIZE,
        };
        self.api.get_energy_readings(&request).await
    }

    /// Refresh once immediately, then on every scan interval until
    /// `shutdown` resolves. Cycles never overlap; late ticks are delayed.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut ticker = interval(self.scan_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.logger.info(&format!(
            "Starting refresh loop every {}s ({})",
            self.scan_interval.as_secs(),
            self.reading_frequency.label()
        ));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Failure is already logged and recorded in the status
                    let _ = self.refresh().await;
                }
                _ = &mut shutdown => {
                    self.logger.info("Shutdown signal received");
                    break;
                }
            }
        }
    }
}

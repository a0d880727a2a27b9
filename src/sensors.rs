//! Sensor projection over a [`Snapshot`]
//!
//! [`discover`] resolves the set of sensors a snapshot supports once; each
//! [`Sensor`] then computes its value and attributes on demand from whatever
//! snapshot is current. The current month is derived from the `now` passed
//! in, never cached.

use crate::aggregate::{
    TariffType, aggregate, current_month, detect_tariff, gas_monthly_total, window_info,
};
use crate::config::ReadingFrequency;
use crate::offpeak::OffPeakSchedule;
use crate::snapshot::{LedgerType, Rate, Snapshot};
use chrono::{DateTime, TimeZone};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Prefix of every unique id
pub const DOMAIN: &str = "octopus_french";

pub const UNIT_KWH: &str = "kWh";
pub const UNIT_EUR: &str = "EUR";

/// Shown when a sensor's meter vanished from the snapshot
pub const UNKNOWN_METER: &str = "Inconnu";

const MONTHLY_PRECISION: u32 = 2;

/// What a sensor computes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    /// Electricity consumption this month for one rate
    Consumption(Rate),
    /// Electricity cost this month for one rate
    Cost(Rate),
    /// Provider calendar of an electricity contract
    Contract,
    /// Cumulative meter index of one register
    Index(Rate),
    GasConsumption,
    GasContract,
    LedgerBalance(LedgerType),
    /// Latest payment request of a ledger
    Bill(LedgerType),
    /// Whether the wall clock is inside an off-peak range
    OffPeakActive,
}

impl SensorKind {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Consumption(Rate::Base) => "conso_base",
            Self::Consumption(Rate::Hp) => "conso_hp",
            Self::Consumption(Rate::Hc) => "conso_hc",
            Self::Cost(Rate::Base) => "cout_base",
            Self::Cost(Rate::Hp) => "cout_hp",
            Self::Cost(Rate::Hc) => "cout_hc",
            Self::Contract | Self::GasContract => "contract",
            Self::Index(Rate::Base) => "index_base",
            Self::Index(Rate::Hp) => "index_hp",
            Self::Index(Rate::Hc) => "index_hc",
            Self::GasConsumption => "consumption",
            Self::LedgerBalance(LedgerType::Pot) => "pot_ledger",
            Self::LedgerBalance(LedgerType::Electricity) => "electricity_ledger",
            Self::LedgerBalance(LedgerType::Gas) => "gas_ledger",
            Self::Bill(LedgerType::Electricity) => "electricity_bill",
            Self::Bill(LedgerType::Gas) => "gas_bill",
            Self::Bill(LedgerType::Pot) => "pot_bill",
            Self::OffPeakActive => "off_peak",
        }
    }

    pub fn unit(&self) -> Option<&'static str> {
        match self {
            Self::Consumption(_) | Self::Index(_) | Self::GasConsumption => Some(UNIT_KWH),
            Self::Cost(_) | Self::LedgerBalance(_) | Self::Bill(_) => Some(UNIT_EUR),
            Self::Contract | Self::GasContract | Self::OffPeakActive => None,
        }
    }

    /// Suggested display precision
    pub fn precision(&self) -> Option<u32> {
        match self {
            Self::Index(_) => Some(0),
            Self::Contract | Self::GasContract | Self::OffPeakActive => None,
            _ => Some(MONTHLY_PRECISION),
        }
    }
}

/// Computed sensor state
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SensorValue {
    Number(f64),
    Text(String),
    Flag(bool),
}

impl fmt::Display for SensorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{}", v),
            Self::Text(s) => f.write_str(s),
            Self::Flag(true) => f.write_str("on"),
            Self::Flag(false) => f.write_str("off"),
        }
    }
}

/// One projected sensor bound to a meter or to the account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sensor {
    pub kind: SensorKind,
    /// PRM, PCE reference or account number
    pub subject: String,
    pub unique_id: String,
}

/// Resolve every sensor the snapshot supports
pub fn discover(snapshot: &Snapshot) -> Vec<Sensor> {
    let mut sensors = Vec::new();

    for (kind, ledger_type) in [
        (SensorKind::LedgerBalance(LedgerType::Pot), LedgerType::Pot),
        (SensorKind::Bill(LedgerType::Electricity), LedgerType::Electricity),
        (SensorKind::Bill(LedgerType::Gas), LedgerType::Gas),
    ] {
        if snapshot.ledger(ledger_type).is_some() {
            sensors.push(Sensor::new(kind, &snapshot.account_number));
        }
    }

    let tariff = detect_tariff(&snapshot.electricity_readings);
    let index_tariff = snapshot
        .electricity_index
        .as_ref()
        .and_then(|i| i.tariff_type.as_deref())
        .map(TariffType::from_label);

    for meter in snapshot.electricity_meters() {
        if meter.is_terminated() {
            continue;
        }
        let Some(prm_id) = meter.id.as_deref() else {
            continue;
        };

        sensors.push(Sensor::new(SensorKind::Contract, prm_id));
        for rate in rates_for(tariff) {
            sensors.push(Sensor::new(SensorKind::Consumption(*rate), prm_id));
            sensors.push(Sensor::new(SensorKind::Cost(*rate), prm_id));
        }
        if let Some(index_tariff) = index_tariff {
            for rate in rates_for(index_tariff) {
                sensors.push(Sensor::new(SensorKind::Index(*rate), prm_id));
            }
        }
        if !OffPeakSchedule::parse(meter.off_peak_label.as_deref()).is_empty() {
            sensors.push(Sensor::new(SensorKind::OffPeakActive, prm_id));
        }
    }

    for meter in snapshot.gas_meters() {
        let Some(pce_ref) = meter.id.as_deref() else {
            continue;
        };
        sensors.push(Sensor::new(SensorKind::GasConsumption, pce_ref));
        sensors.push(Sensor::new(SensorKind::GasContract, pce_ref));
    }

    sensors
}

/// Sensors resolved from the first snapshot that reaches [`SensorSet::resolve`]
/// and reused for every later one. Sensors whose subject later disappears
/// report "Inconnu" or become unavailable instead of vanishing.
#[derive(Debug, Default)]
pub struct SensorSet {
    sensors: Option<Vec<Sensor>>,
}

impl SensorSet {
    pub fn resolve(&mut self, snapshot: &Snapshot) -> &[Sensor] {
        self.sensors.get_or_insert_with(|| discover(snapshot))
    }

    pub fn is_resolved(&self) -> bool {
        self.sensors.is_some()
    }
}

fn rates_for(tariff: TariffType) -> &'static [Rate] {
    match tariff {
        TariffType::Base => &[Rate::Base],
        TariffType::Hphc => &[Rate::Hp, Rate::Hc],
        TariffType::Unknown => &[],
    }
}

impl Sensor {
    pub fn new(kind: SensorKind, subject: &str) -> Self {
        Self {
            kind,
            subject: subject.to_string(),
            unique_id: format!("{}_{}_{}", DOMAIN, subject, kind.key()),
        }
    }

    pub fn key(&self) -> &'static str {
        self.kind.key()
    }

    pub fn unit(&self) -> Option<&'static str> {
        self.kind.unit()
    }

    pub fn precision(&self) -> Option<u32> {
        self.kind.precision()
    }

    /// Current state; `None` means unavailable
    pub fn value<Tz: TimeZone>(&self, snapshot: &Snapshot, now: &DateTime<Tz>) -> Option<SensorValue> {
        match self.kind {
            SensorKind::Consumption(rate) => Some(SensorValue::Number(aggregate(
                &snapshot.electricity_readings,
                &[rate.consumption_label()],
                false,
                &current_month(now),
                self.precision(),
            ))),
            SensorKind::Cost(rate) => Some(SensorValue::Number(aggregate(
                &snapshot.electricity_readings,
                &[rate.cost_label()],
                true,
                &current_month(now),
                self.precision(),
            ))),
            SensorKind::Contract => match snapshot.electricity_meter(&self.subject) {
                None => Some(SensorValue::Text(UNKNOWN_METER.to_string())),
                Some(meter) => meter
                    .provider_calendar_id()
                    .map(|id| SensorValue::Text(id.to_string())),
            },
            SensorKind::Index(rate) => snapshot
                .electricity_index
                .as_ref()?
                .register(rate)?
                .index_end
                .map(SensorValue::Number),
            SensorKind::GasConsumption => Some(SensorValue::Number(gas_monthly_total(
                &snapshot.gas_readings,
                &current_month(now),
                self.precision(),
            ))),
            SensorKind::GasContract => {
                let status = match snapshot.gas_meter(&self.subject) {
                    None => UNKNOWN_METER,
                    Some(meter) => gas_status_label(meter.powered_status.as_deref()),
                };
                Some(SensorValue::Text(status.to_string()))
            }
            SensorKind::LedgerBalance(lt) => snapshot
                .ledger(lt)?
                .balance_euros()
                .map(SensorValue::Number),
            SensorKind::Bill(lt) => snapshot
                .payment_request(lt)?
                .customer_amount
                .map(|cents| SensorValue::Number(cents / 100.0)),
            SensorKind::OffPeakActive => {
                let meter = snapshot.electricity_meter(&self.subject)?;
                let schedule = OffPeakSchedule::parse(meter.off_peak_label.as_deref());
                Some(SensorValue::Flag(
                    schedule.is_off_peak_at(now.naive_local().time()),
                ))
            }
        }
    }

    /// Extra attributes exposed next to the state
    pub fn attributes<Tz: TimeZone>(&self, snapshot: &Snapshot, now: &DateTime<Tz>) -> Map<String, Value> {
        let mut attrs = Map::new();
        let frequency = &snapshot.reading_frequency;

        match self.kind {
            SensorKind::Consumption(_) | SensorKind::Cost(_) => {
                let window = window_info(&snapshot.electricity_readings);
                attrs.insert("current_month".into(), current_month(now).into());
                attrs.insert("readings_count".into(), window.count.into());
                attrs.insert("window_start".into(), window.start.into());
                attrs.insert("window_end".into(), window.end.into());
                attrs.insert(
                    "calculation_method".into(),
                    calculation_method(frequency).into(),
                );
                attrs.insert("reading_frequency".into(), frequency.as_str().into());
            }
            SensorKind::Contract => {
                let Some(meter) = snapshot.electricity_meter(&self.subject) else {
                    return attrs;
                };
                let ledger_id = snapshot
                    .ledger(LedgerType::Electricity)
                    .and_then(|l| l.number.clone());
                attrs.insert("ledger_id".into(), ledger_id.into());
                attrs.insert("prm_id".into(), meter.id.clone().into());
                attrs.insert("agreement".into(), meter.provider_calendar_id().into());
                attrs.insert(
                    "distributor_status".into(),
                    meter.distributor_status.clone().into(),
                );
                attrs.insert("meter_kind".into(), meter.meter_kind.clone().into());
                attrs.insert(
                    "subscribed_max_power".into(),
                    meter
                        .subscribed_max_power
                        .map(|p| format!("{} kVA", p))
                        .into(),
                );
                attrs.insert("is_teleoperable".into(), meter.is_teleoperable.into());
                attrs.insert("off_peak_label".into(), meter.off_peak_label.clone().into());
                attrs.insert("powered_status".into(), meter.powered_status.clone().into());
                attrs.insert("reading_frequency".into(), frequency.as_str().into());
            }
            SensorKind::Index(rate) => {
                let Some(index) = snapshot.electricity_index.as_ref() else {
                    return attrs;
                };
                let register = index.register(rate);
                attrs.insert("prm_id".into(), self.subject.clone().into());
                attrs.insert(
                    "index_start".into(),
                    register.and_then(|r| r.index_start).into(),
                );
                attrs.insert(
                    "consumption".into(),
                    register.and_then(|r| r.consumption).into(),
                );
                attrs.insert("period_start".into(), index.period_start.clone().into());
                attrs.insert("period_end".into(), index.period_end.clone().into());
                attrs.insert(
                    "index_reliability".into(),
                    register.and_then(|r| r.index_reliability.clone()).into(),
                );
                attrs.insert("reading_frequency".into(), frequency.as_str().into());
            }
            SensorKind::GasConsumption => {
                attrs.insert("current_month".into(), current_month(now).into());
                attrs.insert("readings_count".into(), snapshot.gas_readings.len().into());
                attrs.insert("calculation_method".into(), "Cumulée / mois".into());
                attrs.insert("reading_frequency".into(), frequency.as_str().into());
            }
            SensorKind::GasContract => {
                let Some(meter) = snapshot.gas_meter(&self.subject) else {
                    return attrs;
                };
                let ledger_id = snapshot
                    .ledger(LedgerType::Gas)
                    .and_then(|l| l.number.clone());
                attrs.insert("ledger_id".into(), ledger_id.into());
                attrs.insert("pce_ref".into(), meter.id.clone().into());
                attrs.insert("gas_nature".into(), meter.gas_nature.clone().into());
                attrs.insert(
                    "annual_consumption".into(),
                    meter
                        .annual_consumption
                        .map(|c| format!("{} kWh", c))
                        .into(),
                );
                attrs.insert("is_smart_meter".into(), meter.is_smart_meter.into());
                attrs.insert("powered_status".into(), meter.powered_status.clone().into());
                attrs.insert("reading_frequency".into(), frequency.as_str().into());
            }
            SensorKind::LedgerBalance(lt) => {
                let ledger = snapshot.ledger(lt);
                attrs.insert(
                    "ledger_number".into(),
                    ledger.and_then(|l| l.number.clone()).into(),
                );
                attrs.insert(
                    "ledger_name".into(),
                    ledger.and_then(|l| l.name.clone()).into(),
                );
                attrs.insert(
                    "balance_cents".into(),
                    ledger.and_then(|l| l.balance).into(),
                );
            }
            SensorKind::Bill(lt) => {
                let Some(payment) = snapshot.payment_request(lt) else {
                    return attrs;
                };
                attrs.insert(
                    "payment_status".into(),
                    payment
                        .payment_status
                        .as_deref()
                        .unwrap_or_default()
                        .to_lowercase()
                        .into(),
                );
                attrs.insert(
                    "total_amount".into(),
                    (payment.total_amount.unwrap_or(0.0) / 100.0).into(),
                );
                attrs.insert(
                    "customer_amount".into(),
                    (payment.customer_amount.unwrap_or(0.0) / 100.0).into(),
                );
                attrs.insert(
                    "expected_payment_date".into(),
                    payment.expected_payment_date.clone().into(),
                );
            }
            SensorKind::OffPeakActive => {
                let Some(meter) = snapshot.electricity_meter(&self.subject) else {
                    return attrs;
                };
                let schedule = OffPeakSchedule::parse(meter.off_peak_label.as_deref());
                attrs.insert("off_peak_type".into(), schedule.kind.clone().into());
                attrs.insert("off_peak_total_hours".into(), schedule.total_hours.into());
                attrs.insert("off_peak_range_count".into(), schedule.range_count.into());
                attrs.insert("reading_frequency".into(), frequency.as_str().into());
                attrs.insert("prm_id".into(), self.subject.clone().into());
                for (i, range) in schedule.ranges.iter().enumerate() {
                    let n = i + 1;
                    attrs.insert(
                        format!("off_peak_range_{}_start", n),
                        range.start_label().into(),
                    );
                    attrs.insert(format!("off_peak_range_{}_end", n), range.end_label().into());
                    attrs.insert(
                        format!("off_peak_range_{}_duration", n),
                        range.duration_hours.into(),
                    );
                }
            }
        }

        attrs
    }
}

fn gas_status_label(powered_status: Option<&str>) -> &'static str {
    match powered_status {
        Some("non_coupe") => "En service",
        Some("coupe") => "Coupé",
        _ => "unknown",
    }
}

fn calculation_method(frequency: &ReadingFrequency) -> &'static str {
    match frequency {
        ReadingFrequency::HourInterval => "Cumulée / mois (fenêtre horaire partielle)",
        _ => "Cumulée / mois",
    }
}

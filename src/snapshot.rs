//! Typed snapshot of one refresh cycle
//!
//! A [`Snapshot`] is produced by the refresh coordinator, published as an
//! `Arc`, and never mutated afterwards. Every optional upstream field is an
//! explicit `Option` so "absent" is a first-class state for consumers.

use crate::config::ReadingFrequency;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Distributor status of a terminated electricity contract
pub const DISTRIBUTOR_STATUS_TERMINATED: &str = "RESIL";
/// Powered status of a limited/disconnected electricity supply
pub const POWERED_STATUS_LIMITED: &str = "LIMI";

/// Ledger categories known to the French platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LedgerType {
    Electricity,
    Gas,
    Pot,
}

impl LedgerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Electricity => "FRA_ELECTRICITY_LEDGER",
            Self::Gas => "FRA_GAS_LEDGER",
            Self::Pot => "POT_LEDGER",
        }
    }
}

/// Billing rate of a statistic, index register or sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rate {
    /// Single-rate tariff
    Base,
    /// Heures pleines (peak)
    Hp,
    /// Heures creuses (off-peak)
    Hc,
}

impl Rate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Hp => "hp",
            Self::Hc => "hc",
        }
    }

    /// Statistic label carrying consumption for this rate
    pub fn consumption_label(&self) -> &'static str {
        match self {
            Self::Base => "BASE",
            Self::Hp => "HEURES_PLEINES",
            Self::Hc => "HEURES_CREUSES",
        }
    }

    /// Statistic label carrying cost for this rate. Cost entries are tagged
    /// with the consumption metric they price.
    pub fn cost_label(&self) -> &'static str {
        match self {
            Self::Base => "CONSO_BASE",
            Self::Hp => "CONSO_HEURES_PLEINES",
            Self::Hc => "CONSO_HEURES_CREUSES",
        }
    }
}

/// Provider calendar attached to an electricity supply point
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderCalendar {
    pub id: Option<String>,
}

/// Electricity supply point (PRM)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectricityMeter {
    pub id: Option<String>,
    pub distributor_status: Option<String>,
    pub powered_status: Option<String>,
    pub off_peak_label: Option<String>,
    pub meter_kind: Option<String>,
    #[serde(default, deserialize_with = "de::opt_number")]
    pub subscribed_max_power: Option<f64>,
    pub is_teleoperable: Option<bool>,
    pub provider_calendar: Option<ProviderCalendar>,
}

impl ElectricityMeter {
    /// Terminated and limited supply points are dropped from snapshots.
    /// Both conditions must hold.
    pub fn is_terminated(&self) -> bool {
        self.distributor_status.as_deref() == Some(DISTRIBUTOR_STATUS_TERMINATED)
            && self.powered_status.as_deref() == Some(POWERED_STATUS_LIMITED)
    }

    pub fn provider_calendar_id(&self) -> Option<&str> {
        self.provider_calendar.as_ref()?.id.as_deref()
    }
}

/// Gas supply point (PCE)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasMeter {
    pub id: Option<String>,
    pub powered_status: Option<String>,
    pub gas_nature: Option<String>,
    #[serde(default, deserialize_with = "de::opt_number")]
    pub annual_consumption: Option<f64>,
    pub is_smart_meter: Option<bool>,
}

/// Supply points grouped by utility
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupplyPoints {
    #[serde(default)]
    pub electricity: Vec<ElectricityMeter>,
    #[serde(default)]
    pub gas: Vec<GasMeter>,
}

/// Estimated cost of a statistic, in cents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cost {
    #[serde(default, deserialize_with = "de::opt_number")]
    pub estimated_amount: Option<f64>,
}

/// One labelled measure attached to a reading
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistic {
    pub label: Option<String>,
    #[serde(default, deserialize_with = "de::opt_number")]
    pub value: Option<f64>,
    pub cost_incl_tax: Option<Cost>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadingMetadata {
    #[serde(default)]
    pub statistics: Vec<Statistic>,
}

/// One consumption period as delivered by the API (order is not guaranteed)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub start_at: Option<String>,
    pub end_at: Option<String>,
    #[serde(default, deserialize_with = "de::opt_number")]
    pub value: Option<f64>,
    pub meta_data: Option<ReadingMetadata>,
}

impl Reading {
    pub fn statistics(&self) -> &[Statistic] {
        self.meta_data
            .as_ref()
            .map(|m| m.statistics.as_slice())
            .unwrap_or(&[])
    }
}

/// Running balance of an account ledger, in cents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ledger {
    pub ledger_type: Option<String>,
    pub number: Option<String>,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "de::opt_number")]
    pub balance: Option<f64>,
}

impl Ledger {
    pub fn balance_euros(&self) -> Option<f64> {
        self.balance.map(|cents| cents / 100.0)
    }
}

/// Latest payment request of a ledger, amounts in cents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    #[serde(default, deserialize_with = "de::opt_number")]
    pub customer_amount: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_number")]
    pub total_amount: Option<f64>,
    pub payment_status: Option<String>,
    pub expected_payment_date: Option<String>,
}

/// Cumulative counter values of one index register
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexRegister {
    #[serde(default, deserialize_with = "de::opt_number")]
    pub index_start: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_number")]
    pub index_end: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_number")]
    pub consumption: Option<f64>,
    pub index_reliability: Option<String>,
}

/// Electricity meter index over the latest period
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectricityIndex {
    pub tariff_type: Option<String>,
    pub period_start: Option<String>,
    pub period_end: Option<String>,
    pub base: Option<IndexRegister>,
    pub hp: Option<IndexRegister>,
    pub hc: Option<IndexRegister>,
}

impl ElectricityIndex {
    pub fn register(&self, rate: Rate) -> Option<&IndexRegister> {
        match rate {
            Rate::Base => self.base.as_ref(),
            Rate::Hp => self.hp.as_ref(),
            Rate::Hc => self.hc.as_ref(),
        }
    }
}

/// Time window requested for readings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Unified, immutable result of one refresh cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub account_id: String,
    pub account_number: String,
    pub supply_points: SupplyPoints,
    /// Ledgers keyed by ledger type label
    pub ledgers: BTreeMap<String, Ledger>,
    /// Latest payment request keyed by ledger type label
    pub payment_requests: BTreeMap<String, PaymentRequest>,
    pub electricity_readings: Vec<Reading>,
    pub electricity_index: Option<ElectricityIndex>,
    pub gas_readings: Vec<Reading>,
    pub reading_frequency: ReadingFrequency,
    pub window: ReadingWindow,
    pub fetched_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn electricity_meters(&self) -> &[ElectricityMeter] {
        &self.supply_points.electricity
    }

    pub fn gas_meters(&self) -> &[GasMeter] {
        &self.supply_points.gas
    }

    pub fn electricity_meter(&self, prm_id: &str) -> Option<&ElectricityMeter> {
        self.supply_points
            .electricity
            .iter()
            .find(|m| m.id.as_deref() == Some(prm_id))
    }

    pub fn gas_meter(&self, pce_ref: &str) -> Option<&GasMeter> {
        self.supply_points
            .gas
            .iter()
            .find(|m| m.id.as_deref() == Some(pce_ref))
    }

    pub fn ledger(&self, ledger_type: LedgerType) -> Option<&Ledger> {
        self.ledgers.get(ledger_type.as_str())
    }

    pub fn payment_request(&self, ledger_type: LedgerType) -> Option<&PaymentRequest> {
        self.payment_requests.get(ledger_type.as_str())
    }
}

mod de {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Accept JSON numbers and numeric strings; anything else becomes `None`
    pub fn opt_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn terminated_requires_both_statuses() {
        let mut meter = ElectricityMeter {
            distributor_status: Some("RESIL".into()),
            powered_status: Some("LIMI".into()),
            ..Default::default()
        };
        assert!(meter.is_terminated());

        meter.powered_status = Some("ACTIVE".into());
        assert!(!meter.is_terminated());

        meter.distributor_status = Some("SERVC".into());
        meter.powered_status = Some("LIMI".into());
        assert!(!meter.is_terminated());
    }

    #[test]
    fn reading_deserializes_string_numbers() {
        let reading: Reading = serde_json::from_value(json!({
            "startAt": "2025-03-01T00:00:00+01:00",
            "value": "1.5",
            "metaData": {"statistics": [
                {"label": "CONSO_BASE", "value": 2, "costInclTax": {"estimatedAmount": "1234"}}
            ]}
        }))
        .unwrap();
        assert_eq!(reading.value, Some(1.5));
        let stat = &reading.statistics()[0];
        assert_eq!(stat.value, Some(2.0));
        assert_eq!(
            stat.cost_incl_tax.as_ref().and_then(|c| c.estimated_amount),
            Some(1234.0)
        );
    }

    #[test]
    fn missing_metadata_yields_no_statistics() {
        let reading: Reading = serde_json::from_value(json!({"startAt": "2025-03-01"})).unwrap();
        assert!(reading.statistics().is_empty());
    }

    #[test]
    fn ledger_type_labels() {
        assert_eq!(LedgerType::Pot.as_str(), "POT_LEDGER");
        assert_eq!(LedgerType::Gas.as_str(), "FRA_GAS_LEDGER");
    }

    #[test]
    fn ledger_balance_in_euros() {
        let ledger = Ledger {
            balance: Some(-4250.0),
            ..Default::default()
        };
        assert_eq!(ledger.balance_euros(), Some(-42.5));
        assert_eq!(Ledger::default().balance_euros(), None);
    }
}

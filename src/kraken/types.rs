use crate::config::ReadingFrequency;
use crate::snapshot::{
    ElectricityIndex, ElectricityMeter, GasMeter, Ledger, PaymentRequest, Reading, SupplyPoints,
};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Utility a meter belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtilityType {
    Electricity,
    Gas,
}

impl UtilityType {
    /// Enum value expected by the GraphQL schema
    pub fn as_graphql(&self) -> &'static str {
        match self {
            Self::Electricity => "ELECTRICITY",
            Self::Gas => "GAS",
        }
    }
}

/// Parameters of an energy readings query
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingsRequest {
    pub account_id: String,
    /// ISO-8601 window start
    pub start: String,
    /// ISO-8601 window end
    pub end: String,
    pub meter_id: String,
    pub utility: UtilityType,
    pub reading_frequency: ReadingFrequency,
    pub reading_quality: String,
    /// Page size
    pub first: u32,
}

/// Account-level data of one fetch cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountData {
    pub account_id: Option<String>,
    pub account_number: Option<String>,
    pub supply_points: SupplyPoints,
    /// Keyed by ledger type label
    pub ledgers: BTreeMap<String, Ledger>,
    /// Latest payment request keyed by ledger type label
    pub payment_requests: BTreeMap<String, PaymentRequest>,
}

// ---- GraphQL response shapes ----

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenData {
    pub obtain_kraken_token: Option<TokenPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenPayload {
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AccountResponse {
    pub account: Option<RawAccount>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawAccount {
    pub id: Option<String>,
    pub number: Option<String>,
    #[serde(default)]
    pub ledgers: Vec<RawLedger>,
    #[serde(default)]
    pub properties: Vec<RawProperty>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawLedger {
    #[serde(flatten)]
    pub ledger: Ledger,
    pub payment_requests: Option<Connection<PaymentRequest>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawProperty {
    #[serde(default)]
    pub electricity_supply_points: Vec<ElectricityMeter>,
    #[serde(default)]
    pub gas_supply_points: Vec<GasMeter>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Connection<T> {
    pub page_info: Option<PageInfo>,
    #[serde(default = "Vec::new")]
    pub edges: Vec<Edge<T>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Edge<T> {
    pub node: Option<T>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PageInfo {
    #[serde(default)]
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

impl<T> Connection<T> {
    pub fn into_nodes(self) -> Vec<T> {
        self.edges.into_iter().filter_map(|e| e.node).collect()
    }

    pub fn into_parts(self) -> (PageInfo, Vec<T>) {
        let page_info = self.page_info.unwrap_or_default();
        let nodes = self.edges.into_iter().filter_map(|e| e.node).collect();
        (page_info, nodes)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct MeasurementsResponse {
    pub measurements: Option<Connection<Reading>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct IndexResponse {
    pub electricity_index: Option<ElectricityIndex>,
}

impl From<RawAccount> for AccountData {
    fn from(raw: RawAccount) -> Self {
        let mut supply_points = SupplyPoints::default();
        for property in raw.properties {
            supply_points
                .electricity
                .extend(property.electricity_supply_points);
            supply_points.gas.extend(property.gas_supply_points);
        }

        let mut ledgers = BTreeMap::new();
        let mut payment_requests = BTreeMap::new();
        for raw_ledger in raw.ledgers {
            let Some(ledger_type) = raw_ledger.ledger.ledger_type.clone() else {
                continue;
            };
            if let Some(latest) = raw_ledger
                .payment_requests
                .and_then(|c| c.into_nodes().into_iter().next())
            {
                payment_requests.insert(ledger_type.clone(), latest);
            }
            ledgers.insert(ledger_type, raw_ledger.ledger);
        }

        Self {
            account_id: raw.id,
            account_number: raw.number,
            supply_points,
            ledgers,
            payment_requests,
        }
    }
}

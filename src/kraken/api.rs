use crate::error::Result;
use crate::kraken::types::{AccountData, ReadingsRequest};
use crate::snapshot::{ElectricityIndex, Reading};

/// Quality filter applied to every readings query
pub const READING_QUALITY_ACTUAL: &str = "ACTUAL";
/// Page size of readings queries
pub const READINGS_PAGE_SIZE: u32 = 500;

/// Remote energy data source consumed by the refresh coordinator
#[async_trait::async_trait]
pub trait EnergyApi: Send + Sync {
    /// Account identity, supply points, ledgers and latest payment requests
    async fn get_account_data(&self, account_number: &str) -> Result<AccountData>;

    /// Consumption readings of one meter over a window
    async fn get_energy_readings(&self, request: &ReadingsRequest) -> Result<Vec<Reading>>;

    /// Latest electricity index of a PRM, if the platform exposes one
    async fn get_electricity_index(
        &self,
        account_number: &str,
        prm_id: &str,
    ) -> Result<Option<ElectricityIndex>>;
}

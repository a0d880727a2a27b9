use anyhow::Result;
use chrono::Utc;
use octofr::config::Config;
use octofr::coordinator::RefreshCoordinator;
use octofr::kraken::KrakenClient;
use octofr::logging::init_logging;
use octofr::sensors::SensorSet;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
    init_logging(&config.logging).map_err(|e| anyhow::anyhow!("{}", e))?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    info!(
        "Octofr {} starting for account {}",
        env!("APP_VERSION"),
        config.account.account_number
    );

    let client = KrakenClient::new(&config.api, &config.account)
        .map_err(|e| anyhow::anyhow!("Failed to create API client: {}", e))?;
    let mut coordinator = RefreshCoordinator::new(Arc::new(client), &config)
        .map_err(|e| anyhow::anyhow!("Failed to create coordinator: {}", e))?;
    let tz = coordinator.timezone();

    // Report sensor values whenever a new snapshot is published
    let mut snapshots = coordinator.subscribe();
    let reporter = tokio::spawn(async move {
        let mut sensor_set = SensorSet::default();
        while snapshots.changed().await.is_ok() {
            let Some(snapshot) = snapshots.borrow_and_update().clone() else {
                continue;
            };
            if !sensor_set.is_resolved() {
                let count = sensor_set.resolve(&snapshot).len();
                info!("Discovered {} sensor(s)", count);
            }
            let now = Utc::now().with_timezone(&tz);
            for sensor in sensor_set.resolve(&snapshot) {
                match sensor.value(&snapshot, &now) {
                    Some(value) => info!(
                        "{} = {}{}",
                        sensor.unique_id,
                        value,
                        sensor.unit().map(|u| format!(" {}", u)).unwrap_or_default()
                    ),
                    None => info!("{} unavailable", sensor.unique_id),
                }
            }
        }
    });

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    };
    coordinator.run(shutdown).await;

    reporter.abort();
    if let Some(err) = coordinator.last_error() {
        info!("Last refresh error: {}", err);
    }
    info!("Octofr shutdown complete");
    Ok(())
}


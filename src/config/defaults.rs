use super::*;

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_API_ENDPOINT.to_string(),
            timeout_seconds: 30,
            token_refresh_margin_seconds: 300,
            token_max_age_seconds: 50 * 60,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            console_level: None,
            file_level: None,
            file: "/tmp/octofr.log".to_string(),
            backup_count: 5,
            console_output: true,
            json_format: false,
        }
    }
}

impl Default for ReadingFrequency {
    fn default() -> Self {
        Self::HourInterval
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            account: AccountConfig::default(),
            api: ApiConfig::default(),
            scan_interval_minutes: DEFAULT_SCAN_INTERVAL_MINUTES,
            reading_frequency: ReadingFrequency::default(),
            timezone: "Europe/Paris".to_string(),
            logging: LoggingConfig::default(),
        }
    }
}

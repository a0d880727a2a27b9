use crate::config::{AccountConfig, ApiConfig};
use crate::error::{OctoError, Result};
use crate::kraken::api::EnergyApi;
use crate::kraken::queries;
use crate::kraken::types::{
    AccountData, AccountResponse, IndexResponse, MeasurementsResponse, ReadingsRequest, TokenData,
};
use crate::logging::{StructuredLogger, get_logger};
use crate::snapshot::{ElectricityIndex, Reading};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Upper bound on followed pages of one readings query
const MAX_READING_PAGES: usize = 20;

/// Kraken error codes signalling an expired or rejected token
const TOKEN_ERROR_CODES: &[&str] = &["KT-CT-1124", "KT-CT-1139", "KT-CT-1143"];

struct CachedToken {
    value: String,
    obtained_at: Instant,
}

/// HTTP client for the Kraken GraphQL endpoint with token caching
pub struct KrakenClient {
    http: reqwest::Client,
    endpoint: String,
    email: String,
    password: String,
    token_ttl: Duration,
    token: Mutex<Option<CachedToken>>,
    logger: StructuredLogger,
}

impl KrakenClient {
    pub fn new(api: &ApiConfig, account: &AccountConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(api.timeout_seconds))
            .build()?;
        let ttl = api
            .token_max_age_seconds
            .saturating_sub(api.token_refresh_margin_seconds);
        Ok(Self {
            http,
            endpoint: api.endpoint.clone(),
            email: account.email.clone(),
            password: account.password.clone(),
            token_ttl: Duration::from_secs(ttl),
            token: Mutex::new(None),
            logger: get_logger("kraken"),
        })
    }

    /// Current token, obtaining a new one when missing or stale
    async fn token(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        if let Some(cached) = guard.as_ref()
            && cached.obtained_at.elapsed() < self.token_ttl
        {
            return Ok(cached.value.clone());
        }

        if self.email.trim().is_empty() || self.password.is_empty() {
            return Err(OctoError::auth("No API credentials configured"));
        }

        self.logger.debug("Obtaining new API token");
        let variables = json!({
            "input": {"email": self.email, "password": self.password}
        });
        let data: TokenData = self.post(queries::OBTAIN_TOKEN, variables, None).await?;
        let value = data
            .obtain_kraken_token
            .and_then(|t| t.token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| OctoError::auth("Token missing from authentication response"))?;

        *guard = Some(CachedToken {
            value: value.clone(),
            obtained_at: Instant::now(),
        });
        Ok(value)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    /// Run an authenticated query, renewing the token once if it is rejected
    async fn execute<T: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<T> {
        let token = self.token().await?;
        match self.post(query, variables.clone(), Some(&token)).await {
            Err(OctoError::Auth { message }) => {
                self.logger
                    .warn(&format!("Token rejected ({}), renewing", message));
                self.invalidate_token().await;
                let token = self.token().await?;
                self.post(query, variables, Some(&token)).await
            }
            other => other,
        }
    }

    async fn post<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
        token: Option<&str>,
    ) -> Result<T> {
        let mut request = self
            .http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, format!("octofr/{}", env!("APP_VERSION")))
            .json(&json!({"query": query, "variables": variables}));
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, token);
        }

        let resp = request.send().await?;
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(OctoError::auth(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            self.logger.error(&format!("Kraken API error: {}", status));
            return Err(OctoError::network(format!("HTTP {}", status)));
        }

        let body: Value = resp.json().await?;
        extract_data(body)
    }
}

/// Pull `data` out of a GraphQL envelope, mapping `errors` to typed failures
fn extract_data<T: DeserializeOwned>(mut body: Value) -> Result<T> {
    if let Some(first) = body
        .get("errors")
        .and_then(|e| e.as_array())
        .and_then(|a| a.first())
    {
        let message = first
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("GraphQL error")
            .to_string();
        let code = first
            .pointer("/extensions/errorCode")
            .and_then(|c| c.as_str())
            .unwrap_or_default();
        if TOKEN_ERROR_CODES.contains(&code) {
            return Err(OctoError::auth(message));
        }
        return Err(OctoError::api(message));
    }

    match body.get_mut("data").map(Value::take) {
        Some(data) if !data.is_null() => Ok(serde_json::from_value(data)?),
        _ => Err(OctoError::api("Response carries no data")),
    }
}

#[async_trait::async_trait]
impl EnergyApi for KrakenClient {
    async fn get_account_data(&self, account_number: &str) -> Result<AccountData> {
        let resp: AccountResponse = self
            .execute(
                queries::ACCOUNT_DATA,
                json!({"accountNumber": account_number}),
            )
            .await?;
        Ok(resp.account.map(AccountData::from).unwrap_or_default())
    }

    async fn get_energy_readings(&self, request: &ReadingsRequest) -> Result<Vec<Reading>> {
        let mut readings = Vec::new();
        let mut after: Option<String> = None;

        for _ in 0..MAX_READING_PAGES {
            let variables = json!({
                "accountId": request.account_id,
                "meterId": request.meter_id,
                "utilityType": request.utility.as_graphql(),
                "startAt": request.start,
                "endAt": request.end,
                "frequency": request.reading_frequency.as_str(),
                "quality": request.reading_quality,
                "first": request.first,
                "after": after,
            });
            let resp: MeasurementsResponse = self.execute(queries::MEASUREMENTS, variables).await?;
            let Some(connection) = resp.measurements else {
                return Ok(readings);
            };
            let (page_info, nodes) = connection.into_parts();
            readings.extend(nodes);

            match page_info.end_cursor {
                Some(cursor) if page_info.has_next_page => after = Some(cursor),
                _ => return Ok(readings),
            }
        }

        self.logger.warn(&format!(
            "Readings for meter {} truncated after {} pages",
            request.meter_id, MAX_READING_PAGES
        ));
        Ok(readings)
    }

    async fn get_electricity_index(
        &self,
        account_number: &str,
        prm_id: &str,
    ) -> Result<Option<ElectricityIndex>> {
        let resp: IndexResponse = self
            .execute(
                queries::ELECTRICITY_INDEX,
                json!({"accountNumber": account_number, "prmId": prm_id}),
            )
            .await?;
        Ok(resp.electricity_index)
    }
}

//! Limits table served by the hosted backend's PostgREST endpoint.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;

use vitae_core::domain::{LimitsChange, LimitsRecord, LimitsUpdate};
use vitae_core::ports::{LimitsSource, LimitsSourceError};

const LIMITS_TABLE: &str = "api_limits";
const HISTORY_TABLE: &str = "api_limits_history";
const LIMITS_COLUMNS: &str =
    "feature_name,limit_per_minute,limit_per_hour,limit_per_day,is_enabled,updated_at,updated_by";

/// Hosted backend connection settings.
#[derive(Debug, Clone)]
pub struct RestLimitsConfig {
    /// Project URL, e.g. https://xyz.supabase.co
    pub url: String,
    /// Service-role key sent as both `apikey` and bearer token.
    pub service_key: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl RestLimitsConfig {
    /// Load from environment; `None` unless both URL and key are set.
    pub fn from_env() -> Option<Self> {
        let url = std::env::var("SUPABASE_URL").ok()?;
        let service_key = std::env::var("SUPABASE_SERVICE_ROLE_KEY").ok()?;
        Some(Self {
            url,
            service_key,
            timeout: Duration::from_secs(
                std::env::var("SUPABASE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
        })
    }
}

#[derive(Serialize)]
struct LimitsPatch<'a> {
    limit_per_minute: Option<u32>,
    limit_per_hour: Option<u32>,
    limit_per_day: Option<u32>,
    updated_at: chrono::DateTime<Utc>,
    updated_by: &'a str,
}

#[derive(Serialize)]
struct HistoryRow<'a> {
    feature_name: &'a str,
    old_limit_per_minute: Option<u32>,
    new_limit_per_minute: Option<u32>,
    old_limit_per_hour: Option<u32>,
    new_limit_per_hour: Option<u32>,
    old_limit_per_day: Option<u32>,
    new_limit_per_day: Option<u32>,
    changed_by: &'a str,
}

impl<'a> HistoryRow<'a> {
    fn from_change(change: &'a LimitsChange, actor: &'a str) -> Self {
        Self {
            feature_name: &change.feature,
            old_limit_per_minute: change.old_limits.minute,
            new_limit_per_minute: change.new_limits.minute,
            old_limit_per_hour: change.old_limits.hour,
            new_limit_per_hour: change.new_limits.hour,
            old_limit_per_day: change.old_limits.day,
            new_limit_per_day: change.new_limits.day,
            changed_by: actor,
        }
    }
}

fn eq_filter(value: &str) -> String {
    format!("eq.{value}")
}

fn transport_error(err: reqwest::Error) -> LimitsSourceError {
    if err.is_timeout() {
        LimitsSourceError::Timeout
    } else {
        LimitsSourceError::Unavailable(err.to_string())
    }
}

fn status_error(status: StatusCode) -> LimitsSourceError {
    LimitsSourceError::Unavailable(format!("hosted backend answered {status}"))
}

/// Reads and writes the `api_limits` table over HTTP.
pub struct RestLimitsSource {
    http: Client,
    config: RestLimitsConfig,
}

impl RestLimitsSource {
    pub fn new(config: RestLimitsConfig) -> Result<Self, LimitsSourceError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LimitsSourceError::Unavailable(e.to_string()))?;

        tracing::info!(url = %config.url, "Using hosted limits table");
        Ok(Self { http, config })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.config.url.trim_end_matches('/'), table)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.config.service_key)
            .bearer_auth(&self.config.service_key)
    }

    async fn insert_history(&self, change: &LimitsChange, actor: &str) {
        let result = self
            .authed(self.http.post(self.table_url(HISTORY_TABLE)))
            .header("Prefer", "return=minimal")
            .json(&HistoryRow::from_change(change, actor))
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => tracing::warn!(
                feature = %change.feature,
                status = %response.status(),
                "Failed to record limits history"
            ),
            Err(e) => tracing::warn!(
                feature = %change.feature,
                error = %e,
                "Failed to record limits history"
            ),
        }
    }
}

#[async_trait]
impl LimitsSource for RestLimitsSource {
    async fn fetch(&self, feature: &str) -> Result<LimitsRecord, LimitsSourceError> {
        let response = self
            .authed(self.http.get(self.table_url(LIMITS_TABLE)))
            .query(&[
                ("feature_name", eq_filter(feature).as_str()),
                ("select", LIMITS_COLUMNS),
            ])
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error(response.status()));
        }

        let rows: Vec<LimitsRecord> = response
            .json()
            .await
            .map_err(|e| LimitsSourceError::Decode(e.to_string()))?;

        rows.into_iter()
            .next()
            .ok_or_else(|| LimitsSourceError::NotFound(feature.to_string()))
    }

    async fn list(&self) -> Result<Vec<LimitsRecord>, LimitsSourceError> {
        let response = self
            .authed(self.http.get(self.table_url(LIMITS_TABLE)))
            .query(&[("select", LIMITS_COLUMNS), ("order", "feature_name.asc")])
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error(response.status()));
        }

        response
            .json()
            .await
            .map_err(|e| LimitsSourceError::Decode(e.to_string()))
    }

    async fn update(
        &self,
        update: &LimitsUpdate,
        actor: &str,
    ) -> Result<LimitsChange, LimitsSourceError> {
        let old = self.fetch(&update.feature_name).await?;
        let new_limits = update.thresholds;

        let patch = LimitsPatch {
            limit_per_minute: new_limits.minute,
            limit_per_hour: new_limits.hour,
            limit_per_day: new_limits.day,
            updated_at: Utc::now(),
            updated_by: actor,
        };

        let response = self
            .authed(self.http.patch(self.table_url(LIMITS_TABLE)))
            .query(&[("feature_name", eq_filter(&update.feature_name))])
            .header("Prefer", "return=minimal")
            .json(&patch)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error(response.status()));
        }

        let change = LimitsChange {
            feature: update.feature_name.clone(),
            old_limits: old.thresholds(),
            new_limits,
        };

        // History is an audit trail only; the update already succeeded.
        self.insert_history(&change, actor).await;

        Ok(change)
    }
}

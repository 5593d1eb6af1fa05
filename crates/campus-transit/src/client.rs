use std::sync::Arc;

use async_trait::async_trait;
use campus_core::{config::TransitConfig, Clock};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{Result, TransitError};
use crate::token::{TokenCache, TokenResponse};

/// Source of "how many seconds until the next bus reaches this stop".
#[async_trait]
pub trait ArrivalEstimator: Send + Sync {
    /// `Ok(None)` when the route is not currently serving the stop.
    async fn estimate_seconds(
        &self,
        route_id: &str,
        stop_id: &str,
        direction: u8,
    ) -> Result<Option<i64>>;
}

/// One row of the estimated-time-of-arrival feed.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ArrivalRecord {
    #[serde(rename = "StopID")]
    pub stop_id: String,
    pub direction: u8,
    /// Seconds until arrival; absent when no bus is on the way.
    #[serde(default)]
    pub estimate_time: Option<i64>,
}

/// Client for the city bus API, authenticated with OAuth2 client credentials.
pub struct TransitClient {
    client: reqwest::Client,
    config: TransitConfig,
    clock: Arc<dyn Clock>,
    token: RwLock<Option<TokenCache>>,
}

impl TransitClient {
    pub fn new(config: TransitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            clock,
            token: RwLock::new(None),
        }
    }

    /// Return a usable access token, refreshing the cache when needed.
    async fn access_token(&self) -> Result<String> {
        // Fast path: read lock
        {
            let cache = self.token.read().await;
            if let Some(value) = TokenCache::fresh_value(cache.as_ref(), self.clock.now()) {
                return Ok(value.to_string());
            }
        }

        // Slow path: another task may have refreshed while we waited for the write lock.
        let mut cache = self.token.write().await;
        if let Some(value) = TokenCache::fresh_value(cache.as_ref(), self.clock.now()) {
            return Ok(value.to_string());
        }

        info!("refreshing transit API access token");
        let fresh = self.fetch_token().await?;
        let value = fresh.value.clone();
        *cache = Some(fresh);
        Ok(value)
    }

    async fn fetch_token(&self) -> Result<TokenCache> {
        let resp = self
            .client
            .post(&self.config.token_url)
            .header("Accept", "application/json")
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(TransitError::Api {
                status,
                message: format!("token request failed: {text}"),
            });
        }

        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| TransitError::Parse(format!("invalid token response: {e}")))?;
        Ok(TokenCache::from_response(body, self.clock.now()))
    }
}

#[async_trait]
impl ArrivalEstimator for TransitClient {
    async fn estimate_seconds(
        &self,
        route_id: &str,
        stop_id: &str,
        direction: u8,
    ) -> Result<Option<i64>> {
        let token = self.access_token().await?;
        let url = format!(
            "{}/EstimatedTimeOfArrival/City/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.city,
            route_id
        );

        let resp = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&[("$format", "JSON")])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(TransitError::Api {
                status,
                message: text,
            });
        }

        let records: Vec<ArrivalRecord> = resp
            .json()
            .await
            .map_err(|e| TransitError::Parse(format!("invalid arrival feed: {e}")))?;
        let estimate = select_estimate(&records, stop_id, direction);
        debug!(route_id, stop_id, direction, ?estimate, "arrival estimate");
        Ok(estimate)
    }
}

/// Pick the soonest positive estimate for `(stop_id, direction)`.
pub fn select_estimate(records: &[ArrivalRecord], stop_id: &str, direction: u8) -> Option<i64> {
    records
        .iter()
        .filter(|r| r.stop_id == stop_id && r.direction == direction)
        .filter_map(|r| r.estimate_time)
        .filter(|secs| *secs > 0)
        .min()
}

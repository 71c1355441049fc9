use crate::data_structures::PriceSample;
use chrono::NaiveDate;
use reqwest::{Client, Error as ReqwestError};
use serde_json::Value;
use std::time::{Duration as StdDuration, SystemTime};
use tokio::time::sleep;

#[derive(Debug)]
pub enum JquantsError {
    Http(ReqwestError),
    Serialization(serde_json::Error),
    Auth(String),
    InvalidResponse(String),
    NoData,
}

impl From<ReqwestError> for JquantsError {
    fn from(error: ReqwestError) -> Self {
        JquantsError::Http(error)
    }
}

impl From<serde_json::Error> for JquantsError {
    fn from(error: serde_json::Error) -> Self {
        JquantsError::Serialization(error)
    }
}

/// Client for the J-Quants daily quotes API.
///
/// Authentication is a two-step token scheme: a long-lived refresh token is
/// exchanged for an ID token that expires after roughly a day. The ID token
/// is cached and re-acquired lazily when the API answers 401.
pub struct JquantsClient {
    client: Client,
    base_url: String,
    refresh_token: String,
    id_token: Option<String>,
    rate_limit_per_minute: u32,
    request_timestamps: Vec<SystemTime>,
}

impl JquantsClient {
    pub fn new(
        base_url: String,
        refresh_token: String,
        rate_limit_per_minute: u32,
    ) -> Result<Self, JquantsError> {
        let client = Client::builder()
            .timeout(StdDuration::from_secs(30))
            .build()?;

        Ok(JquantsClient {
            client,
            base_url,
            refresh_token,
            id_token: None,
            rate_limit_per_minute,
            request_timestamps: Vec::new(),
        })
    }

    async fn enforce_rate_limit(&mut self) {
        let current_time = SystemTime::now();

        // Remove timestamps older than 1 minute
        self.request_timestamps.retain(|&timestamp| {
            current_time
                .duration_since(timestamp)
                .unwrap_or(StdDuration::from_secs(0))
                < StdDuration::from_secs(60)
        });

        // If we're at the rate limit, wait
        if self.request_timestamps.len() >= self.rate_limit_per_minute as usize {
            if let Some(&oldest_request) = self.request_timestamps.first() {
                let wait_time = StdDuration::from_secs(60)
                    - current_time
                        .duration_since(oldest_request)
                        .unwrap_or(StdDuration::from_secs(0));
                if !wait_time.is_zero() {
                    sleep(wait_time + StdDuration::from_millis(100)).await;
                }
            }
        }

        self.request_timestamps.push(current_time);
    }

    async fn ensure_id_token(&mut self) -> Result<String, JquantsError> {
        if let Some(token) = &self.id_token {
            return Ok(token.clone());
        }

        let url = format!("{}token/auth_refresh", self.base_url);
        let response = self
            .client
            .post(&url)
            .query(&[("refreshtoken", self.refresh_token.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(JquantsError::Auth(format!(
                "token refresh failed with status {}",
                status
            )));
        }

        let body: Value = response.json().await?;
        let token = body
            .get("idToken")
            .and_then(|v| v.as_str())
            .ok_or_else(|| JquantsError::Auth("token refresh response missing idToken".to_string()))?
            .to_string();

        self.id_token = Some(token.clone());
        Ok(token)
    }

    async fn fetch_quote_page(
        &mut self,
        code: &str,
        from: NaiveDate,
        to: NaiveDate,
        pagination_key: Option<&str>,
    ) -> Result<Value, JquantsError> {
        const MAX_RETRIES: u32 = 5;

        let url = format!("{}prices/daily_quotes", self.base_url);

        for attempt in 0..MAX_RETRIES {
            self.enforce_rate_limit().await;

            if attempt > 0 {
                let delay = StdDuration::from_secs_f64(
                    2.0_f64.powi(attempt as i32 - 1) + rand::random::<f64>(),
                );
                let delay = delay.min(StdDuration::from_secs(30));
                sleep(delay).await;
            }

            let token = self.ensure_id_token().await?;

            let mut query = vec![
                ("code", code.to_string()),
                ("from", from.format("%Y-%m-%d").to_string()),
                ("to", to.format("%Y-%m-%d").to_string()),
            ];
            if let Some(key) = pagination_key {
                query.push(("pagination_key", key.to_string()));
            }

            let response = self
                .client
                .get(&url)
                .bearer_auth(&token)
                .query(&query)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();

                    if status.is_success() {
                        match resp.json::<Value>().await {
                            Ok(data) => return Ok(data),
                            Err(_) => continue,
                        }
                    } else if status == 401 {
                        // ID token expired; force a refresh on the next attempt
                        self.id_token = None;
                        continue;
                    } else if status == 429 || status.is_server_error() {
                        continue;
                    } else {
                        return Err(JquantsError::InvalidResponse(format!(
                            "daily_quotes request failed with status {}",
                            status
                        )));
                    }
                }
                Err(_) => continue,
            }
        }

        Err(JquantsError::InvalidResponse(
            "max retries exceeded".to_string(),
        ))
    }

    /// Daily closing prices for one instrument over an inclusive date range,
    /// oldest first. Follows `pagination_key` until the range is exhausted.
    pub async fn daily_history(
        &mut self,
        code: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PriceSample>, JquantsError> {
        let mut samples = Vec::new();
        let mut pagination_key: Option<String> = None;

        loop {
            let page = self
                .fetch_quote_page(code, from, to, pagination_key.as_deref())
                .await?;
            parse_daily_quotes(&page, &mut samples)?;

            match page.get("pagination_key").and_then(|v| v.as_str()) {
                Some(key) => pagination_key = Some(key.to_string()),
                None => break,
            }
        }

        if samples.is_empty() {
            return Err(JquantsError::NoData);
        }

        samples.sort_by_key(|s| s.date);
        Ok(samples)
    }
}

/// Extracts `(Date, close)` pairs from one `daily_quotes` page.
///
/// `AdjustmentClose` folds in splits and is preferred; the raw `Close` is
/// the fallback for series the API does not adjust (indices). Days with a
/// null close (trading halts) are skipped.
fn parse_daily_quotes(page: &Value, out: &mut Vec<PriceSample>) -> Result<(), JquantsError> {
    let quotes = page
        .get("daily_quotes")
        .and_then(|v| v.as_array())
        .ok_or_else(|| {
            JquantsError::InvalidResponse("response missing daily_quotes array".to_string())
        })?;

    for quote in quotes {
        let date_str = quote
            .get("Date")
            .and_then(|v| v.as_str())
            .ok_or_else(|| JquantsError::InvalidResponse("quote missing Date".to_string()))?;
        let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
            JquantsError::InvalidResponse(format!("invalid quote date '{}': {}", date_str, e))
        })?;

        let close = quote
            .get("AdjustmentClose")
            .and_then(|v| v.as_f64())
            .or_else(|| quote.get("Close").and_then(|v| v.as_f64()));

        if let Some(close) = close {
            out.push(PriceSample { date, close });
        }
    }

    Ok(())
}

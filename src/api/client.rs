//! REST client for the sports data backend.
//!
//! Every call shares one policy: a 10-second timeout, up to two retries on
//! network errors or 5xx responses with linear backoff (`base * attempt`),
//! and an immediate failure on 4xx. Errors are returned as values; callers
//! fold them into their views without discarding previously fetched data.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::models::{League, MatchState, TodaySummary, TrendingItem};

/// Per-request timeout; requests are aborted when it expires.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Retries after the initial attempt, for retryable failures only.
pub const MAX_RETRIES: u32 = 2;

const DEFAULT_RETRY_BASE: Duration = Duration::from_millis(500);

/// Failure taxonomy for REST calls.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection/timeout/transport failure — retryable.
    #[error("network error: {0}")]
    Network(String),
    /// 5xx response — retryable.
    #[error("server error: {0}")]
    Server(StatusCode),
    /// 4xx response — fatal for this call, never retried.
    #[error("request rejected: {0}")]
    Client(StatusCode),
    /// Body arrived but did not decode.
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Network(_) | FetchError::Server(_))
    }
}

/// Client for the sports data REST API.
#[derive(Clone)]
pub struct SportsApi {
    http: Client,
    base_url: String,
    retry_base: Duration,
}

impl SportsApi {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(SportsApi {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry_base: DEFAULT_RETRY_BASE,
        })
    }

    /// Override the retry backoff base, mainly to keep tests fast.
    #[cfg(test)]
    pub fn with_retry_base(mut self, base: Duration) -> Self {
        self.retry_base = base;
        self
    }

    /// All leagues the backend knows about.
    pub async fn leagues(&self) -> Result<Vec<League>, FetchError> {
        #[derive(Deserialize)]
        struct LeaguesResponse {
            leagues: Vec<League>,
        }
        let resp: LeaguesResponse = self.get_json("/leagues").await?;
        Ok(resp.leagues)
    }

    /// Current scoreboard (all of today's matches) for one league.
    pub async fn league_scoreboard(&self, league_id: &str) -> Result<Vec<MatchState>, FetchError> {
        #[derive(Deserialize)]
        struct ScoreboardResponse {
            matches: Vec<MatchState>,
        }
        let path = format!("/leagues/{}/scoreboard", league_id);
        let resp: ScoreboardResponse = self.get_json(&path).await?;
        Ok(resp.matches)
    }

    /// Aggregate live/finished/upcoming counts for today.
    pub async fn today_summary(&self) -> Result<TodaySummary, FetchError> {
        self.get_json("/scores/today").await
    }

    /// Full state of a single match.
    pub async fn match_detail(&self, match_id: &str) -> Result<MatchState, FetchError> {
        let path = format!("/matches/{}", match_id);
        self.get_json(&path).await
    }

    /// Trending/breaking informational feed.
    pub async fn trending(&self) -> Result<Vec<TrendingItem>, FetchError> {
        #[derive(Deserialize)]
        struct TrendingResponse {
            items: Vec<TrendingItem>,
        }
        let resp: TrendingResponse = self.get_json("/news/trending").await?;
        Ok(resp.items)
    }

    /// Health probe; success is the only signal.
    pub async fn health(&self) -> Result<(), FetchError> {
        let url = join_url(&self.base_url, "/health");
        self.get_checked(&url).await.map(|_| ())
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let url = join_url(&self.base_url, path);
        let resp = self.get_checked(&url).await?;
        resp.json::<T>()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))
    }

    /// GET with the shared retry policy applied; returns a success response.
    async fn get_checked(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let mut attempt: u32 = 1;
        loop {
            match self.try_get(url).await {
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_retryable() && attempt <= MAX_RETRIES => {
                    debug!("GET {} failed on attempt {}: {} — retrying", url, attempt, e);
                    tokio::time::sleep(self.retry_base * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_get(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;
        let status = resp.status();
        if status.is_client_error() {
            return Err(FetchError::Client(status));
        }
        if !status.is_success() {
            return Err(FetchError::Server(status));
        }
        Ok(resp)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

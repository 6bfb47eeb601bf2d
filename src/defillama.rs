//! DefiLlama yields API client.
//!
//! Strategies identify their pool by the DefiLlama pool code and read
//! `{apy, tvl}` from the pool's chart series. The sampled point is the
//! tenth entry from the end of the series rather than the newest one,
//! which is still being filled in for the current day.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://yields.llama.fi";

/// Request timeout for the yields API.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Offset from the end of the chart series to the sampled point.
const SAMPLE_OFFSET: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum DefillamaError {
    #[error("yields request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("yields API returned {status} for pool {pool}")]
    Status { pool: String, status: StatusCode },
    #[error("yields API returned an empty chart for pool {pool}")]
    EmptyChart { pool: String },
}

/// A sampled point from a pool's yield chart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YieldPoolStats {
    /// Annualized percentage yield.
    pub apy: f64,
    /// Total value locked, in USD.
    pub tvl_usd: f64,
}

#[derive(Deserialize)]
struct ChartResponse {
    data: Vec<ChartPoint>,
}

#[derive(Deserialize)]
struct ChartPoint {
    #[serde(default)]
    apy: f64,
    #[serde(rename = "tvlUsd", default)]
    tvl_usd: f64,
}

/// Client for the DefiLlama yields API.
#[derive(Debug, Clone)]
pub struct DefillamaClient {
    http: reqwest::Client,
    base_url: Url,
}

impl DefillamaClient {
    pub fn new() -> Result<Self, DefillamaError> {
        let base_url = DEFAULT_BASE_URL
            .parse()
            .expect("default base URL is valid");

        Self::with_base_url(base_url)
    }

    /// Creates a client against a custom API host. Used by tests to
    /// point at a mock server.
    pub fn with_base_url(base_url: Url) -> Result<Self, DefillamaError> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()?;

        Ok(Self { http, base_url })
    }

    /// Fetches the chart for a pool code and samples the point
    /// [`SAMPLE_OFFSET`] entries from the end, falling back to the
    /// newest point when the series is shorter.
    pub async fn yield_pool_stats(&self, pool: &str) -> Result<YieldPoolStats, DefillamaError> {
        let url = format!("{}chart/{pool}", self.base_url);

        let response = self.http.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(DefillamaError::Status {
                pool: pool.to_string(),
                status: response.status(),
            });
        }

        let chart: ChartResponse = response.json().await?;

        let index = chart
            .data
            .len()
            .checked_sub(SAMPLE_OFFSET)
            .unwrap_or(chart.data.len().saturating_sub(1));

        let point = chart.data.get(index).ok_or_else(|| DefillamaError::EmptyChart {
            pool: pool.to_string(),
        })?;

        Ok(YieldPoolStats {
            apy: point.apy,
            tvl_usd: point.tvl_usd,
        })
    }
}

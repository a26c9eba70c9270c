//! HTTP implementation of the upstream providers

use super::{RateTable, RawCountry, UpstreamProvider, UpstreamSource};
use crate::config::UpstreamConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// Exchange-rate provider response; only `rates` is used
#[derive(Debug, Deserialize)]
struct RatesResponse {
    rates: RateTable,
}

/// Upstream source backed by the restcountries and open.er-api endpoints
pub struct HttpUpstream {
    client: reqwest::Client,
    countries_url: String,
    rates_url: String,
}

impl HttpUpstream {
    /// Create a new HTTP upstream from configuration
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("country-cache/", env!("CARGO_PKG_VERSION")));
        if config.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_secs));
        }
        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            countries_url: config.countries_url.clone(),
            rates_url: config.rates_url.clone(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        provider: UpstreamProvider,
        url: &str,
    ) -> Result<T> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::upstream(provider, format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::upstream(
                provider,
                format!("unexpected status {}", status),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| Error::upstream(provider, format!("invalid response body: {}", e)))
    }
}

#[async_trait]
impl UpstreamSource for HttpUpstream {
    async fn fetch_countries(&self) -> Result<Vec<RawCountry>> {
        self.get_json(UpstreamProvider::Countries, &self.countries_url)
            .await
    }

    async fn fetch_rates(&self) -> Result<RateTable> {
        let response: RatesResponse = self
            .get_json(UpstreamProvider::ExchangeRates, &self.rates_url)
            .await?;
        Ok(response.rates)
    }
}

//! Upstream data providers
//!
//! Two independent sources feed every refresh: a country list and a USD
//! exchange-rate table. [`fetch_all`] issues both calls concurrently and
//! fails fast, tagging the error with the provider that failed.

mod http;

pub use http::HttpUpstream;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which upstream provider a failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpstreamProvider {
    /// Country demographic data (restcountries)
    Countries,
    /// Currency exchange rates (open.er-api)
    ExchangeRates,
}

impl UpstreamProvider {
    /// Client-facing description used in the 503 `details` field
    pub fn failure_details(&self) -> &'static str {
        match self {
            Self::Countries => "Could not fetch data from restcountries",
            Self::ExchangeRates => "Could not fetch data from exchange rate API",
        }
    }
}

impl std::fmt::Display for UpstreamProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Countries => write!(f, "countries"),
            Self::ExchangeRates => write!(f, "exchange_rates"),
        }
    }
}

/// A country as delivered by the countries provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCountry {
    pub name: String,
    #[serde(default)]
    pub capital: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub population: u64,
    #[serde(default)]
    pub flag: Option<String>,
    #[serde(default)]
    pub currencies: Option<Vec<RawCurrency>>,
}

impl RawCountry {
    /// Code of the first listed currency, if any
    pub fn primary_currency(&self) -> Option<&str> {
        self.currencies
            .as_ref()
            .and_then(|list| list.first())
            .and_then(|c| c.code.as_deref())
            .filter(|code| !code.is_empty())
    }
}

/// A currency entry inside [`RawCountry`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCurrency {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
}

/// Currency code → units per 1 USD
pub type RateTable = HashMap<String, f64>;

/// Everything one refresh cycle needs from upstream
#[derive(Debug, Clone, Default)]
pub struct UpstreamData {
    pub countries: Vec<RawCountry>,
    pub rates: RateTable,
}

/// Source of raw country and exchange-rate data.
///
/// Implementations must tag every failure with the provider that caused it
/// (`Error::UpstreamUnavailable`).
#[async_trait]
pub trait UpstreamSource: Send + Sync {
    /// Fetch the full country list.
    async fn fetch_countries(&self) -> Result<Vec<RawCountry>>;

    /// Fetch the USD exchange-rate table.
    async fn fetch_rates(&self) -> Result<RateTable>;
}

/// Fetch both sources concurrently. The first failure aborts the other call.
pub async fn fetch_all(source: &dyn UpstreamSource) -> Result<UpstreamData> {
    let (countries, rates) = tokio::try_join!(source.fetch_countries(), source.fetch_rates())?;

    tracing::debug!(
        countries = countries.len(),
        rates = rates.len(),
        "Fetched upstream data"
    );

    Ok(UpstreamData { countries, rates })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    struct FixedSource {
        countries_ok: bool,
        rates_ok: bool,
    }

    #[async_trait]
    impl UpstreamSource for FixedSource {
        async fn fetch_countries(&self) -> Result<Vec<RawCountry>> {
            if self.countries_ok {
                Ok(vec![RawCountry {
                    name: "Ghana".to_string(),
                    capital: Some("Accra".to_string()),
                    region: Some("Africa".to_string()),
                    population: 31_072_940,
                    flag: None,
                    currencies: None,
                }])
            } else {
                Err(Error::upstream(UpstreamProvider::Countries, "connection refused"))
            }
        }

        async fn fetch_rates(&self) -> Result<RateTable> {
            if self.rates_ok {
                Ok(RateTable::from([("GHS".to_string(), 15.3)]))
            } else {
                Err(Error::upstream(UpstreamProvider::ExchangeRates, "502"))
            }
        }
    }

    #[tokio::test]
    async fn test_fetch_all_joins_both() {
        let data = fetch_all(&FixedSource {
            countries_ok: true,
            rates_ok: true,
        })
        .await
        .unwrap();
        assert_eq!(data.countries.len(), 1);
        assert_eq!(data.rates["GHS"], 15.3);
    }

    #[tokio::test]
    async fn test_fetch_all_tags_failing_provider() {
        let err = fetch_all(&FixedSource {
            countries_ok: true,
            rates_ok: false,
        })
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            Error::UpstreamUnavailable {
                provider: UpstreamProvider::ExchangeRates,
                ..
            }
        ));

        let err = fetch_all(&FixedSource {
            countries_ok: false,
            rates_ok: true,
        })
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            Error::UpstreamUnavailable {
                provider: UpstreamProvider::Countries,
                ..
            }
        ));
    }

    #[test]
    fn test_raw_country_deserialization() {
        let json = r#"{
            "name": "Nigeria",
            "capital": "Abuja",
            "region": "Africa",
            "population": 206139587,
            "flag": "https://flagcdn.com/ng.svg",
            "currencies": [{"code": "NGN", "name": "Nigerian naira", "symbol": "₦"}]
        }"#;

        let country: RawCountry = serde_json::from_str(json).unwrap();
        assert_eq!(country.name, "Nigeria");
        assert_eq!(country.population, 206_139_587);
        assert_eq!(country.primary_currency(), Some("NGN"));
    }

    #[test]
    fn test_raw_country_without_optional_fields() {
        let json = r#"{"name": "Antarctica", "region": "Polar", "population": 1000}"#;
        let country: RawCountry = serde_json::from_str(json).unwrap();
        assert!(country.capital.is_none());
        assert!(country.flag.is_none());
        assert_eq!(country.primary_currency(), None);
    }

    #[test]
    fn test_primary_currency_ignores_missing_code() {
        let country = RawCountry {
            name: "Nowhere".to_string(),
            capital: None,
            region: None,
            population: 0,
            flag: None,
            currencies: Some(vec![RawCurrency {
                code: None,
                name: Some("Unnamed".to_string()),
                symbol: None,
            }]),
        };
        assert_eq!(country.primary_currency(), None);
    }

    #[test]
    fn test_provider_display() {
        assert_eq!(UpstreamProvider::Countries.to_string(), "countries");
        assert_eq!(UpstreamProvider::ExchangeRates.to_string(), "exchange_rates");
    }
}

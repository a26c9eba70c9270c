//! Joins a raw country to its exchange rate and derives the GDP estimate

use crate::countries::CountryRecord;
use crate::upstream::{RateTable, RawCountry};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::ops::RangeInclusive;

/// Range of the per-country multiplier, drawn fresh on every refresh
pub const MULTIPLIER_RANGE: RangeInclusive<u32> = 1000..=2000;

/// Draw one estimate multiplier
pub fn draw_multiplier<R: Rng + ?Sized>(rng: &mut R) -> u32 {
    rng.gen_range(MULTIPLIER_RANGE)
}

/// Estimated GDP for a country.
///
/// - no currency: `Some(0.0)`
/// - currency without a usable rate: `None`
/// - otherwise: `population * multiplier / rate`
pub fn estimate_gdp(
    population: u64,
    currency: Option<&str>,
    rate: Option<f64>,
    multiplier: u32,
) -> Option<f64> {
    match (currency, rate) {
        (None, _) => Some(0.0),
        (Some(_), Some(rate)) if rate > 0.0 && rate.is_finite() => {
            Some(population as f64 * f64::from(multiplier) / rate)
        }
        (Some(_), _) => None,
    }
}

/// Build the stored record for one raw country
pub fn merge_country<R: Rng + ?Sized>(
    raw: &RawCountry,
    rates: &RateTable,
    refreshed_at: DateTime<Utc>,
    rng: &mut R,
) -> CountryRecord {
    let currency = raw.primary_currency();
    let rate = currency.and_then(|code| rates.get(code).copied());
    let multiplier = draw_multiplier(rng);

    CountryRecord {
        name: raw.name.clone(),
        capital: raw.capital.clone(),
        region: raw.region.clone(),
        population: raw.population,
        currency_code: currency.map(str::to_string),
        exchange_rate: rate,
        estimated_gdp: estimate_gdp(raw.population, currency, rate, multiplier),
        flag_url: raw.flag.clone(),
        last_refreshed_at: refreshed_at,
    }
}

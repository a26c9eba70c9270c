//! Country Cache - cached country and exchange-rate service
//!
//! Country Cache pulls the country list and USD exchange rates from two
//! public providers, merges them into records carrying an estimated GDP,
//! stores them in a relational table and serves them over a REST API. Every
//! successful refresh also renders a small PNG summary of the store.
//!
//! ## Architecture
//!
//! ```text
//!   restcountries ─┐
//!                  ├─► upstream ─► refresh::merge ─► countries::store ─► summary
//!   exchange API ──┘                                      │                │
//!                                                         ▼                ▼
//!                                              countries::handler ◄── SummaryCache
//!                                                         │
//!                                                        api
//! ```
//!
//! ## Modules
//!
//! - [`upstream`]: Provider clients and raw payload types
//! - [`refresh`]: Refresh cycle and GDP estimation
//! - [`countries`]: Record store and HTTP handlers
//! - [`summary`]: Summary statistics and image cache
//! - [`api`]: Router assembly
//! - [`config`]: Configuration management

pub mod api;
pub mod config;
pub mod countries;
pub mod error;
pub mod refresh;
pub mod summary;
pub mod upstream;

pub use config::CountryCacheConfig;
pub use error::{Error, Result};

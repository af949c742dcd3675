//! Cash Points Harvester - Download towns, cash points and banks from the banki.ru API.
//!
//! This crate harvests geographic and point-of-service records from a
//! JSON-RPC web API, resolves towns to canonical regions (falling back to
//! reverse geocoding), normalizes free-text annotations and persists
//! everything into SQLite databases.
//!
//! # Example
//!
//! ```
//! use cashpoints_harvester::normalize::normalize_annotation;
//!
//! let normalized = normalize_annotation("Вход по пропускам, валюта: рубли, доллары");
//! assert!(normalized.restricted_access);
//! assert!(normalized.currencies.rub);
//! assert!(normalized.currencies.usd);
//! assert!(!normalized.currencies.eur);
//! ```
//!
//! # Architecture
//!
//! The harvester is organized into several modules:
//!
//! - [`config`]: Configuration constants and runtime settings
//! - [`types`]: Core data types (Town, Region, CashPoint, Bank)
//! - [`error`]: Error types and Result alias
//! - [`http`]: Transport abstraction and blocking HTTP client
//! - [`rpc`]: Retrying JSON-RPC client
//! - [`fetcher`]: Paginated list-then-detail fetching
//! - [`fields`]: Typed access to loosely typed API objects
//! - [`geocode`]: Reverse geocoding
//! - [`xml`]: XML utilities
//! - [`resolver`]: Town to region resolution
//! - [`transliterate`]: Cyrillic to Latin transliteration
//! - [`html`]: HTML entity decoding
//! - [`normalize`]: Annotation normalization and enrichment
//! - [`cashpoint`]: Cash point record mapping
//! - [`banks`]: Bank list harvest
//! - [`store`]: SQLite persistence
//! - [`harvester`]: Pipeline stages
//! - [`cli`]: Command-line interface

pub mod banks;
pub mod cashpoint;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod fields;
pub mod geocode;
pub mod harvester;
pub mod html;
pub mod http;
pub mod normalize;
pub mod resolver;
pub mod rpc;
pub mod store;
pub mod transliterate;
pub mod types;
pub mod xml;

// Re-export the pipeline stages
pub use harvester::{harvest_banks, harvest_cash_points, harvest_towns, postprocess};

// Re-export commonly used items
pub use config::{HarvesterConfig, RetryPolicy};
pub use error::{HarvesterError, Result};
pub use types::{Bank, BankBranch, CashPoint, EnrichedCashPoint, PointType, Region, Town};

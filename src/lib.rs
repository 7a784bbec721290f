//! biodem_rs
//!
//! Joins democracy indicator time series with biodiversity record counts from
//! an occurrence aggregator, and charts the result. Pairs with the `biodem` CLI.
//!
//! ### Features
//! - Load the democracy, country and indicator tables from CSV
//! - Query per-year and per-country record counts (with taxon, domestic-only
//!   and image-only filters) and taxon name suggestions
//! - Per-country medians over a year window (scatter view) and per-year merged
//!   rows for one country (time-series view)
//! - Render both views to SVG/PNG
//! - An intent-driven state machine that drops stale responses and keeps the
//!   last good data when a fetch fails
//! - Serial batch download of record counts into a wide CSV
//!
//! ### Example
//! ```no_run
//! use biodem_rs::{Client, models::{CountryFacetQuery, Indicator, YearWindow}};
//! use biodem_rs::aggregate::{ScatterSelection, scatter_points};
//! use biodem_rs::stats::YearOverrides;
//!
//! let data = biodem_rs::storage::load_datasets("vdem.csv", "countries.csv", None)?;
//! let window = YearWindow::new(2000, 2010);
//! let facet = Client::default()
//!     .query_country_facet(&CountryFacetQuery::from(window))
//!     .into_result()?;
//! let selection = ScatterSelection {
//!     x: Indicator::Polyarchy,
//!     y: Indicator::RuleOfLaw,
//!     window,
//!     normalize_by_area: false,
//! };
//! let points = scatter_points(&data, &facet, &selection, &YearOverrides::builtin());
//! let acc = biodem_rs::viz::country_accessors("en");
//! biodem_rs::viz::plot_scatter(&points, &acc, &Default::default(), "scatter.svg")?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod aggregate;
pub mod api;
pub mod config;
pub mod countries;
pub mod download;
pub mod models;
pub mod state;
pub mod stats;
pub mod storage;
pub mod viz;

pub use api::{Client, OccurrenceSource, QueryError, QueryResult};
pub use config::StudyConfig;
pub use models::{AggregatedCountryPoint, DemocracyRecord, Indicator, MergedYearRow, YearWindow};
pub use storage::Datasets;

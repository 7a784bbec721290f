//! Synchronous client for the **GBIF occurrence and species APIs**.
//!
//! Three queries are exposed, each returning a tagged [`QueryResult`] instead of
//! raising: year-faceted counts for one country/filter combination,
//! country-faceted counts for one year range, and taxon-name autocompletion
//! against the GBIF backbone.
//!
//! ### Notes
//! - The occurrence API speaks ISO alpha-2; queries take alpha-3 codes and the
//!   client translates in both directions.
//! - HTTP 5xx answers (the service replies 503 under load) are retried on a
//!   short backoff ladder before surfacing as [`QueryError::Transport`].
//!
//! Typical usage:
//! ```no_run
//! # use biodem_rs::{Client, models::YearFacetQuery};
//! let client = Client::default();
//! let series = client
//!     .query_year_facet(&YearFacetQuery {
//!         country: Some("SWE".into()),
//!         ..Default::default()
//!     })
//!     .into_result()?;
//! # Ok::<(), biodem_rs::api::QueryError>(())
//! ```
use crate::config::DEFAULT_COUNTRY;
use crate::countries::{alpha3_to_alpha2, translate_country_facet};
use crate::models::{
    CountryFacetQuery, CountryFacetSeries, DateSpec, TaxonSuggestion, YearFacetQuery,
    YearFacetSeries,
};
use log::{debug, warn};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};
use reqwest::blocking::Client as HttpClient;
use reqwest::redirect::Policy;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// The GBIF backbone taxonomy; suggestions are restricted to it.
pub const BACKBONE_DATASET_KEY: &str = "d7dddbf4-2cf0-4f39-9b2a-bb099caae36c";

/// Maximum number of facet buckets requested per query.
pub const FACET_LIMIT: u32 = 200;

const RETRY_BACKOFF_MS: [u64; 3] = [100, 300, 700];

// Allow -, _, . unescaped in query values
const SAFE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

fn enc(s: &str) -> String {
    percent_encoding::utf8_percent_encode(s.trim(), SAFE).to_string()
}

/// Why a query produced no data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The service could not be reached, or kept failing with 5xx.
    #[error("network error for {url}: {message}")]
    Transport { url: String, message: String },
    /// The service answered with a non-success, non-retryable status.
    #[error("request to {url} failed with HTTP {status}")]
    Status { url: String, status: u16 },
    /// The query succeeded but matched nothing.
    #[error("no results for {query:?}")]
    EmptyResult { query: String },
    /// The response body did not have the expected shape.
    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },
    #[error("unknown country code {0:?}")]
    UnknownCountry(String),
}

/// Tagged outcome of a remote query: data, or the error that replaced it.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult<T> {
    Response(T),
    Error(QueryError),
}

impl<T> QueryResult<T> {
    pub fn is_error(&self) -> bool {
        matches!(self, QueryResult::Error(_))
    }

    pub fn into_result(self) -> Result<T, QueryError> {
        match self {
            QueryResult::Response(v) => Ok(v),
            QueryResult::Error(e) => Err(e),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> QueryResult<U> {
        match self {
            QueryResult::Response(v) => QueryResult::Response(f(v)),
            QueryResult::Error(e) => QueryResult::Error(e),
        }
    }
}

impl<T> From<Result<T, QueryError>> for QueryResult<T> {
    fn from(r: Result<T, QueryError>) -> Self {
        match r {
            Ok(v) => QueryResult::Response(v),
            Err(e) => QueryResult::Error(e),
        }
    }
}

/// Anything that can answer the three occurrence queries.
///
/// `Client` talks to the live service; tests plug in in-memory sources.
pub trait OccurrenceSource: Send + Sync {
    fn year_facet(&self, query: &YearFacetQuery) -> QueryResult<YearFacetSeries>;
    fn country_facet(&self, query: &CountryFacetQuery) -> QueryResult<CountryFacetSeries>;
    fn taxon_suggestions(&self, text: &str) -> QueryResult<Vec<TaxonSuggestion>>;
}

#[derive(Debug, Clone)]
pub struct Client {
    pub base_url: String,
    /// Alpha-3 code used when a year-facet query names no country.
    pub fallback_country: String,
    http: HttpClient,
}

impl Default for Client {
    fn default() -> Self {
        Self::with_base_url("https://api.gbif.org/v1")
    }
}

impl Client {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(30)) // total request timeout
            .connect_timeout(Duration::from_secs(10)) // connect timeout
            .redirect(Policy::limited(5)) // cap redirects
            .user_agent(concat!("biodem_rs/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("reqwest client build");
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            fallback_country: DEFAULT_COUNTRY.into(),
            http,
        }
    }

    /// URL for year-faceted counts of one country/filter combination.
    pub fn year_facet_url(&self, query: &YearFacetQuery) -> Result<String, QueryError> {
        let alpha3 = query
            .country
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(self.fallback_country.as_str());
        let alpha2 = alpha3_to_alpha2(alpha3)
            .ok_or_else(|| QueryError::UnknownCountry(alpha3.to_string()))?;

        let mut url = format!(
            "{}/occurrence/search?country={}&limit=1&facet=year&year.facetLimit={}",
            self.base_url, alpha2, FACET_LIMIT
        );
        if query.only_domestic {
            url.push_str(&format!("&publishingCountry={}", alpha2));
        }
        if let Some(key) = query.taxon_key {
            url.push_str(&format!("&taxonKey={}", key));
        }
        if query.only_with_images {
            url.push_str("&mediaType=StillImage");
        }
        Ok(url)
    }

    /// URL for country-faceted counts of one year range.
    pub fn country_facet_url(&self, query: &CountryFacetQuery) -> String {
        let years = DateSpec::from_bounds(query.year_min, query.year_max);
        format!(
            "{}/occurrence/search?limit=1&facet=country&country.facetLimit={}&year={}",
            self.base_url,
            FACET_LIMIT,
            years.to_query_param()
        )
    }

    /// URL for backbone name suggestions.
    pub fn suggest_url(&self, text: &str) -> String {
        format!(
            "{}/species/suggest?q={}&datasetKey={}",
            self.base_url,
            enc(text),
            BACKBONE_DATASET_KEY
        )
    }

    /// Year → record count for one country/filter combination.
    pub fn query_year_facet(&self, query: &YearFacetQuery) -> QueryResult<YearFacetSeries> {
        let run = || -> Result<YearFacetSeries, QueryError> {
            let url = self.year_facet_url(query)?;
            let v = self.get_json(&url)?;
            let counts = parse_facet_counts(&v).map_err(|message| QueryError::Decode {
                url: url.clone(),
                message,
            })?;
            Ok(year_series(counts))
        };
        run().into()
    }

    /// Alpha-3 country → record count for one year range.
    pub fn query_country_facet(&self, query: &CountryFacetQuery) -> QueryResult<CountryFacetSeries> {
        let run = || -> Result<CountryFacetSeries, QueryError> {
            let url = self.country_facet_url(query);
            let v = self.get_json(&url)?;
            let counts = parse_facet_counts(&v).map_err(|message| QueryError::Decode {
                url: url.clone(),
                message,
            })?;
            Ok(translate_country_facet(counts.into_iter().collect()))
        };
        run().into()
    }

    /// Backbone taxa matching `text`. Zero matches is an `EmptyResult` error.
    pub fn query_taxon_suggestions(&self, text: &str) -> QueryResult<Vec<TaxonSuggestion>> {
        let run = || -> Result<Vec<TaxonSuggestion>, QueryError> {
            let url = self.suggest_url(text);
            let v = self.get_json(&url)?;
            let hits = parse_suggestions(&v).map_err(|message| QueryError::Decode {
                url: url.clone(),
                message,
            })?;
            if hits.is_empty() {
                return Err(QueryError::EmptyResult {
                    query: text.trim().to_string(),
                });
            }
            Ok(hits)
        };
        run().into()
    }

    // Small retry for transient failures (5xx / network errors)
    fn get_json(&self, url: &str) -> Result<Value, QueryError> {
        debug!("GET {}", url);
        let mut last_err = String::new();
        for backoff_ms in RETRY_BACKOFF_MS {
            match self.http.get(url).send() {
                Ok(r) if r.status().is_success() => {
                    return r.json().map_err(|e| QueryError::Decode {
                        url: url.to_string(),
                        message: e.to_string(),
                    });
                }
                Ok(r) if r.status().is_server_error() => {
                    last_err = format!("HTTP {}", r.status());
                }
                Ok(r) => {
                    return Err(QueryError::Status {
                        url: url.to_string(),
                        status: r.status().as_u16(),
                    });
                }
                Err(e) => last_err = e.to_string(),
            }
            debug!("retrying {} in {} ms ({})", url, backoff_ms, last_err);
            std::thread::sleep(Duration::from_millis(backoff_ms));
        }
        Err(QueryError::Transport {
            url: url.to_string(),
            message: last_err,
        })
    }
}

impl OccurrenceSource for Client {
    fn year_facet(&self, query: &YearFacetQuery) -> QueryResult<YearFacetSeries> {
        self.query_year_facet(query)
    }

    fn country_facet(&self, query: &CountryFacetQuery) -> QueryResult<CountryFacetSeries> {
        self.query_country_facet(query)
    }

    fn taxon_suggestions(&self, text: &str) -> QueryResult<Vec<TaxonSuggestion>> {
        self.query_taxon_suggestions(text)
    }
}

#[derive(Debug, Deserialize)]
struct FacetCount {
    name: String,
    count: u64,
}

#[derive(Debug, Deserialize)]
struct Facet {
    #[serde(default)]
    counts: Vec<FacetCount>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    facets: Vec<Facet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Suggestion {
    key: Option<u64>,
    nub_key: Option<u64>,
    canonical_name: Option<String>,
    scientific_name: Option<String>,
}

/// Extract `(name, count)` pairs from the first facet of a search response.
///
/// A response without facets means "no records" and yields an empty list.
pub fn parse_facet_counts(v: &Value) -> Result<Vec<(String, u64)>, String> {
    let resp: SearchResponse = serde_json::from_value(v.clone()).map_err(|e| e.to_string())?;
    Ok(resp
        .facets
        .into_iter()
        .next()
        .map(|f| f.counts.into_iter().map(|c| (c.name, c.count)).collect())
        .unwrap_or_default())
}

/// Extract suggestions from a suggest response (a top-level array).
pub fn parse_suggestions(v: &Value) -> Result<Vec<TaxonSuggestion>, String> {
    let hits: Vec<Suggestion> = serde_json::from_value(v.clone()).map_err(|e| e.to_string())?;
    Ok(hits
        .into_iter()
        .filter_map(|s| {
            let key = s.nub_key.or(s.key)?;
            let name = s.canonical_name.or(s.scientific_name)?;
            Some(TaxonSuggestion { name, key })
        })
        .collect())
}

/// Year facet buckets keyed by year; unparseable bucket names are skipped.
pub fn year_series(counts: Vec<(String, u64)>) -> YearFacetSeries {
    let mut out: BTreeMap<i32, u64> = BTreeMap::new();
    for (name, count) in counts {
        match name.trim().parse::<i32>() {
            Ok(year) => *out.entry(year).or_default() += count,
            Err(_) => warn!("skipping year facet bucket {name:?}"),
        }
    }
    out
}

//! Batch download of per-country, per-year record counts.
//!
//! Filters are fetched strictly one after another, and countries within a
//! filter too: the occurrence service answers concurrent load with 503s.
//! Result sets are left-joined on `(country, year)` with the first filter as
//! the base.
//!
//! Failures are returned as errors. A successful download that matched nothing
//! is an `Ok` with an empty table, so the two outcomes stay distinguishable.

use crate::api::{OccurrenceSource, QueryError};
use crate::models::{YearFacetQuery, YearWindow};
use anyhow::{Context, Result, bail};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Filter token meaning "no taxon restriction".
pub const ALL_TOKEN: &str = "all";

/// Column name used when no filter tokens are given.
pub const DEFAULT_COLUMN: &str = "records";

/// `(alpha-3 country, year)` → record count.
pub type RecordTable = BTreeMap<(String, i32), u64>;

/// A download filter: the token the user typed and the taxon it resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub token: String,
    pub taxon_key: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WideRow {
    pub country: String,
    pub year: i32,
    pub values: Vec<u64>,
}

/// One row per `(country, year)`, one value column per filter variant.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WideTable {
    pub columns: Vec<String>,
    pub rows: Vec<WideRow>,
}

impl WideTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Options for [`download`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Alpha-3 codes to query, in order.
    pub countries: Vec<String>,
    /// Add a `<token>-domestic` column per filter (records published by the
    /// country itself).
    pub add_domestic: bool,
    /// Keep only years inside this window.
    pub window: Option<YearWindow>,
}

/// Resolve filter tokens to taxon keys. `all` needs no lookup; every other
/// token takes the first backbone suggestion. A token with no match is an
/// error.
pub fn resolve_filters<S: OccurrenceSource + ?Sized>(
    source: &S,
    tokens: &[String],
) -> Result<Vec<FilterSpec>> {
    let mut out = Vec::with_capacity(tokens.len());
    for token in tokens {
        let token = token.trim();
        if token.eq_ignore_ascii_case(ALL_TOKEN) {
            out.push(FilterSpec {
                token: ALL_TOKEN.into(),
                taxon_key: None,
            });
            continue;
        }
        let hits = source
            .taxon_suggestions(token)
            .into_result()
            .with_context(|| format!("resolve taxon filter {token:?}"))?;
        let Some(first) = hits.into_iter().next() else {
            return Err(QueryError::EmptyResult {
                query: token.to_string(),
            })
            .with_context(|| format!("resolve taxon filter {token:?}"));
        };
        info!("filter {:?} -> {} (taxon key {})", token, first.name, first.key);
        out.push(FilterSpec {
            token: token.to_string(),
            taxon_key: Some(first.key),
        });
    }
    Ok(out)
}

/// Fetch one filter variant for every country, serially.
pub fn fetch_filter_table<S: OccurrenceSource + ?Sized>(
    source: &S,
    filter: &FilterSpec,
    only_domestic: bool,
    opts: &DownloadOptions,
) -> Result<RecordTable> {
    let mut table = RecordTable::new();
    for country in &opts.countries {
        let query = YearFacetQuery {
            country: Some(country.clone()),
            only_domestic,
            only_with_images: false,
            taxon_key: filter.taxon_key,
        };
        let series = source.year_facet(&query).into_result().with_context(|| {
            format!(
                "fetch {} records for {}{}",
                filter.token,
                country,
                if only_domestic { " (domestic)" } else { "" }
            )
        })?;
        debug!("{} {}: {} years", filter.token, country, series.len());
        for (year, count) in series {
            if opts.window.is_none_or(|w| w.contains(year)) {
                table.insert((country.clone(), year), count);
            }
        }
    }
    Ok(table)
}

/// Left-join tables on `(country, year)`, the first table being the base.
/// Keys missing from a later table get `0`; keys only in later tables are dropped.
pub fn join_tables(columns: Vec<String>, tables: &[RecordTable]) -> WideTable {
    let Some(base) = tables.first() else {
        return WideTable {
            columns,
            rows: Vec::new(),
        };
    };
    let rows = base
        .keys()
        .map(|key| WideRow {
            country: key.0.clone(),
            year: key.1,
            values: tables
                .iter()
                .map(|t| t.get(key).copied().unwrap_or(0))
                .collect(),
        })
        .collect();
    WideTable { columns, rows }
}

/// Resolve `tokens`, fetch each filter (and its domestic variant when asked)
/// one after another, and join the results.
///
/// With no tokens, a single unfiltered `records` column is produced.
pub fn download<S: OccurrenceSource + ?Sized>(
    source: &S,
    tokens: &[String],
    opts: &DownloadOptions,
) -> Result<WideTable> {
    if opts.countries.is_empty() {
        bail!("no countries to download");
    }
    let filters = if tokens.is_empty() {
        vec![FilterSpec {
            token: DEFAULT_COLUMN.into(),
            taxon_key: None,
        }]
    } else {
        resolve_filters(source, tokens)?
    };

    let mut columns = Vec::new();
    let mut tables = Vec::new();
    for filter in &filters {
        info!("downloading {} for {} countries", filter.token, opts.countries.len());
        tables.push(fetch_filter_table(source, filter, false, opts)?);
        columns.push(filter.token.clone());
        if opts.add_domestic {
            tables.push(fetch_filter_table(source, filter, true, opts)?);
            columns.push(format!("{}-domestic", filter.token));
        }
    }
    Ok(join_tables(columns, &tables))
}

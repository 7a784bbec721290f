//! Static CSV tables in, download tables out.
//!
//! Loaders are lenient by contract: a numeric cell that does not parse becomes
//! `NaN` rather than an error. Only a row whose year cannot be read is skipped.

use crate::countries::country_name;
use crate::download::{WideRow, WideTable};
use crate::models::{CountryMetadata, DemocracyRecord, Indicator, IndicatorMetadata, Region};
use ahash::AHashMap;
use anyhow::{Context, Result, anyhow};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use log::{info, warn};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// The three static tables, with country metadata indexed by alpha-3 code.
#[derive(Debug, Clone, Default)]
pub struct Datasets {
    pub democracy: Vec<DemocracyRecord>,
    pub indicators: Vec<IndicatorMetadata>,
    countries: AHashMap<String, CountryMetadata>,
}

impl Datasets {
    pub fn new(
        democracy: Vec<DemocracyRecord>,
        indicators: Vec<IndicatorMetadata>,
        countries: Vec<CountryMetadata>,
    ) -> Self {
        let countries = countries
            .into_iter()
            .map(|c| (c.code.clone(), c))
            .collect::<AHashMap<_, _>>();
        let out = Self {
            democracy,
            indicators,
            countries,
        };
        if !out.indicators.is_empty() {
            for ind in out.missing_metadata() {
                warn!("no metadata entry for indicator {}", ind);
            }
        }
        out
    }

    pub fn country(&self, code: &str) -> Option<&CountryMetadata> {
        self.countries.get(code)
    }

    pub fn country_count(&self) -> usize {
        self.countries.len()
    }

    pub fn indicator_metadata(&self, indicator: Indicator) -> Option<&IndicatorMetadata> {
        self.indicators.iter().find(|m| m.id == indicator.id())
    }

    /// Short display name: metadata `short_name` when present, else the built-in label.
    pub fn indicator_label(&self, indicator: Indicator) -> String {
        self.indicator_metadata(indicator)
            .map(|m| m.short_name.trim())
            .filter(|s| !s.is_empty())
            .map_or_else(|| indicator.label().to_string(), str::to_string)
    }

    /// Indicators without a metadata row (a configuration warning, not an error).
    pub fn missing_metadata(&self) -> Vec<Indicator> {
        Indicator::ALL
            .into_iter()
            .filter(|ind| self.indicator_metadata(*ind).is_none())
            .collect()
    }
}

/// Load all three tables. The indicator metadata table is optional.
pub fn load_datasets<P: AsRef<Path>>(
    democracy: P,
    countries: P,
    indicators: Option<P>,
) -> Result<Datasets> {
    let democracy = load_democracy(democracy)?;
    let countries = load_country_metadata(countries)?;
    let indicators = match indicators {
        Some(p) => load_indicator_metadata(p)?,
        None => Vec::new(),
    };
    info!(
        "loaded {} democracy rows, {} countries, {} indicator descriptions",
        democracy.len(),
        countries.len(),
        indicators.len()
    );
    Ok(Datasets::new(democracy, indicators, countries))
}

fn parse_num(cell: Option<&str>) -> f64 {
    cell.and_then(|c| c.trim().parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

fn column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim().eq_ignore_ascii_case(name))
}

/// Democracy time series: `country,year,<indicator columns>,confl`.
pub fn load_democracy<P: AsRef<Path>>(path: P) -> Result<Vec<DemocracyRecord>> {
    let path = path.as_ref();
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    load_democracy_from_reader(f).with_context(|| format!("read {}", path.display()))
}

pub fn load_democracy_from_reader<R: Read>(reader: R) -> Result<Vec<DemocracyRecord>> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr.headers()?.clone();
    let country_col = column(&headers, "country").ok_or_else(|| anyhow!("missing country column"))?;
    let year_col = column(&headers, "year").ok_or_else(|| anyhow!("missing year column"))?;
    let conflict_col = column(&headers, "confl");
    let indicator_cols: Vec<(Indicator, Option<usize>)> = Indicator::ALL
        .into_iter()
        .map(|ind| (ind, column(&headers, ind.id())))
        .collect();
    for (ind, col) in &indicator_cols {
        if col.is_none() {
            warn!("democracy table has no {} column; values will be NaN", ind);
        }
    }

    // (country, year) is unique; a later duplicate replaces the earlier row.
    let mut by_key: BTreeMap<(String, i32), DemocracyRecord> = BTreeMap::new();
    for (line, row) in rdr.records().enumerate() {
        let row = row?;
        let country = row.get(country_col).unwrap_or("").trim().to_ascii_uppercase();
        let year = match row.get(year_col).and_then(|y| y.trim().parse::<f64>().ok()) {
            Some(y) if y.fract() == 0.0 => y as i32,
            _ => {
                warn!("skipping democracy row {}: unreadable year", line + 2);
                continue;
            }
        };
        if country.is_empty() {
            warn!("skipping democracy row {}: empty country", line + 2);
            continue;
        }
        let mut rec = DemocracyRecord::new(country.clone(), year);
        for (ind, col) in &indicator_cols {
            if let Some(c) = col {
                rec.set(*ind, parse_num(row.get(*c)));
            }
        }
        rec.conflict = parse_num(conflict_col.and_then(|c| row.get(c)));
        if by_key.insert((country.clone(), year), rec).is_some() {
            warn!("duplicate democracy row for {} {}; keeping the last", country, year);
        }
    }
    Ok(by_key.into_values().collect())
}

/// Indicator descriptions: `id,full_name,short_name,description,relevance,references`.
pub fn load_indicator_metadata<P: AsRef<Path>>(path: P) -> Result<Vec<IndicatorMetadata>> {
    let path = path.as_ref();
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    load_indicator_metadata_from_reader(f).with_context(|| format!("read {}", path.display()))
}

pub fn load_indicator_metadata_from_reader<R: Read>(reader: R) -> Result<Vec<IndicatorMetadata>> {
    let mut rdr = ReaderBuilder::new().from_reader(reader);
    let mut out = Vec::new();
    for row in rdr.deserialize() {
        let meta: IndicatorMetadata = row?;
        if Indicator::from_id(&meta.id).is_none() {
            warn!("metadata for unknown indicator {:?}", meta.id);
        }
        out.push(meta);
    }
    Ok(out)
}

/// Per-country metadata: `country,area,e_regionpol`.
pub fn load_country_metadata<P: AsRef<Path>>(path: P) -> Result<Vec<CountryMetadata>> {
    let path = path.as_ref();
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    load_country_metadata_from_reader(f).with_context(|| format!("read {}", path.display()))
}

pub fn load_country_metadata_from_reader<R: Read>(reader: R) -> Result<Vec<CountryMetadata>> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr.headers()?.clone();
    let country_col = column(&headers, "country").ok_or_else(|| anyhow!("missing country column"))?;
    let area_col = column(&headers, "area");
    let region_col = column(&headers, "e_regionpol");

    let mut out = Vec::new();
    for row in rdr.records() {
        let row = row?;
        let code = row.get(country_col).unwrap_or("").trim().to_ascii_uppercase();
        if code.is_empty() {
            continue;
        }
        let display_name = country_name(&code).map_or_else(|| code.clone(), str::to_string);
        out.push(CountryMetadata {
            display_name,
            area: parse_num(area_col.and_then(|c| row.get(c))),
            region: region_col
                .and_then(|c| row.get(c))
                .map_or(Region::Unknown, Region::from_code),
            code,
        });
    }
    Ok(out)
}

/// Prefix text cells that a spreadsheet would evaluate as a formula.
pub fn sanitize_cell(cell: &str) -> Cow<'_, str> {
    if cell.starts_with(['=', '+', '-', '@']) {
        Cow::Owned(format!("'{cell}"))
    } else {
        Cow::Borrowed(cell)
    }
}

/// Multi-filter download: `country,year,<one column per filter>`.
pub fn save_wide_csv<P: AsRef<Path>>(table: &WideTable, path: P) -> Result<()> {
    let f = File::create(path.as_ref())
        .with_context(|| format!("create {}", path.as_ref().display()))?;
    write_wide_csv(table, f)
}

pub fn write_wide_csv<W: Write>(table: &WideTable, writer: W) -> Result<()> {
    let mut wtr = WriterBuilder::new().from_writer(writer);
    let mut header: Vec<Cow<'_, str>> = vec!["country".into(), "year".into()];
    header.extend(table.columns.iter().map(|c| sanitize_cell(c)));
    wtr.write_record(header.iter().map(|h| h.as_bytes()))?;
    for row in &table.rows {
        let mut rec: Vec<String> = Vec::with_capacity(2 + row.values.len());
        rec.push(sanitize_cell(&row.country).into_owned());
        rec.push(row.year.to_string());
        rec.extend(row.values.iter().map(|v| v.to_string()));
        wtr.write_record(&rec)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Read back a wide download table.
pub fn load_wide_csv<P: AsRef<Path>>(path: P) -> Result<WideTable> {
    let path = path.as_ref();
    let mut rdr = ReaderBuilder::new()
        .from_path(path)
        .with_context(|| format!("open {}", path.display()))?;
    let headers = rdr.headers()?.clone();
    if headers.len() < 3 {
        return Err(anyhow!("{}: expected country, year and value columns", path.display()));
    }
    let columns = headers.iter().skip(2).map(str::to_string).collect();
    let mut rows = Vec::new();
    for row in rdr.records() {
        let row = row?;
        let year = row
            .get(1)
            .and_then(|y| y.trim().parse::<i32>().ok())
            .ok_or_else(|| anyhow!("{}: unreadable year in {:?}", path.display(), row))?;
        rows.push(WideRow {
            country: row.get(0).unwrap_or("").to_string(),
            year,
            values: row
                .iter()
                .skip(2)
                .map(|v| v.trim().parse::<u64>().unwrap_or(0))
                .collect(),
        });
    }
    Ok(WideTable { columns, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unparseable_cells_become_nan() {
        let csv = "country,year,v2x_polyarchy,v2x_regime,confl\nSWE,2000,0.9,3,0\nSWE,2001,NA,,1\n";
        let rows = load_democracy_from_reader(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get(Indicator::Polyarchy), 0.9);
        assert!(rows[1].get(Indicator::Polyarchy).is_nan());
        assert!(rows[1].get(Indicator::RegimeType).is_nan());
        assert!(rows[0].get(Indicator::RuleOfLaw).is_nan());
        assert_eq!(rows[1].conflict_flag(), Some(true));
    }

    #[test]
    fn formula_starters_are_prefixed() {
        assert_eq!(sanitize_cell("=SUM(A1)"), "'=SUM(A1)");
        assert_eq!(sanitize_cell("SWE"), "SWE");
    }
}

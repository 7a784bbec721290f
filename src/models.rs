use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// How to specify the `year` filter in occurrence queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateSpec {
    /// Single year like 2020
    Year(i32),
    /// Inclusive range like 2000..=2020
    Range { start: i32, end: i32 },
}

impl DateSpec {
    /// Collapse `min == max` into a single year.
    pub fn from_bounds(min: i32, max: i32) -> Self {
        if min == max {
            DateSpec::Year(min)
        } else {
            DateSpec::Range {
                start: min.min(max),
                end: min.max(max),
            }
        }
    }

    pub fn to_query_param(&self) -> String {
        match *self {
            DateSpec::Year(y) => y.to_string(),
            DateSpec::Range { start, end } => format!("{},{}", start, end),
        }
    }
}

/// Inclusive year range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct YearWindow {
    pub start: i32,
    pub end: i32,
}

impl YearWindow {
    pub fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, year: i32) -> bool {
        year >= self.start && year <= self.end
    }

    /// A window whose start lies after its end covers no year at all.
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn intersect(&self, other: &YearWindow) -> YearWindow {
        YearWindow {
            start: self.start.max(other.start),
            end: self.end.min(other.end),
        }
    }
}

impl fmt::Display for YearWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// The democracy indicators carried by the time-series table.
///
/// The set is closed: every column the application reads has a variant here,
/// and `DemocracyRecord::get` is the only way to read an indicator value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Indicator {
    Polyarchy,
    LiberalDemocracy,
    ParticipatoryDemocracy,
    DeliberativeDemocracy,
    EgalitarianDemocracy,
    FreedomOfExpression,
    FreedomOfAssociation,
    RuleOfLaw,
    PoliticalCorruption,
    PhysicalIntegrity,
    CivilSocietyParticipation,
    RegimeType,
}

impl Indicator {
    pub const COUNT: usize = 12;

    pub const ALL: [Indicator; Indicator::COUNT] = [
        Indicator::Polyarchy,
        Indicator::LiberalDemocracy,
        Indicator::ParticipatoryDemocracy,
        Indicator::DeliberativeDemocracy,
        Indicator::EgalitarianDemocracy,
        Indicator::FreedomOfExpression,
        Indicator::FreedomOfAssociation,
        Indicator::RuleOfLaw,
        Indicator::PoliticalCorruption,
        Indicator::PhysicalIntegrity,
        Indicator::CivilSocietyParticipation,
        Indicator::RegimeType,
    ];

    /// Column name in the democracy CSV (and `id` in the metadata table).
    pub fn id(self) -> &'static str {
        match self {
            Indicator::Polyarchy => "v2x_polyarchy",
            Indicator::LiberalDemocracy => "v2x_libdem",
            Indicator::ParticipatoryDemocracy => "v2x_partipdem",
            Indicator::DeliberativeDemocracy => "v2x_delibdem",
            Indicator::EgalitarianDemocracy => "v2x_egaldem",
            Indicator::FreedomOfExpression => "v2x_freexp_altinf",
            Indicator::FreedomOfAssociation => "v2x_frassoc_thick",
            Indicator::RuleOfLaw => "v2x_rule",
            Indicator::PoliticalCorruption => "v2x_corr",
            Indicator::PhysicalIntegrity => "v2x_clphy",
            Indicator::CivilSocietyParticipation => "v2x_cspart",
            Indicator::RegimeType => "v2x_regime",
        }
    }

    /// Human label used when no metadata short name is available.
    pub fn label(self) -> &'static str {
        match self {
            Indicator::Polyarchy => "Electoral democracy",
            Indicator::LiberalDemocracy => "Liberal democracy",
            Indicator::ParticipatoryDemocracy => "Participatory democracy",
            Indicator::DeliberativeDemocracy => "Deliberative democracy",
            Indicator::EgalitarianDemocracy => "Egalitarian democracy",
            Indicator::FreedomOfExpression => "Freedom of expression",
            Indicator::FreedomOfAssociation => "Freedom of association",
            Indicator::RuleOfLaw => "Rule of law",
            Indicator::PoliticalCorruption => "Political corruption",
            Indicator::PhysicalIntegrity => "Physical integrity",
            Indicator::CivilSocietyParticipation => "Civil society participation",
            Indicator::RegimeType => "Regime type",
        }
    }

    /// Natural value range of the indicator.
    pub fn value_range(self) -> (f64, f64) {
        match self {
            Indicator::RegimeType => (0.0, 3.0),
            _ => (0.0, 1.0),
        }
    }

    /// Look up by column id (`v2x_polyarchy`) or by the id without its
    /// `v2x_` prefix (`polyarchy`).
    pub fn from_id(id: &str) -> Option<Self> {
        let id = id.trim();
        Indicator::ALL.into_iter().find(|ind| {
            let full = ind.id();
            full.eq_ignore_ascii_case(id)
                || full
                    .strip_prefix("v2x_")
                    .is_some_and(|short| short.eq_ignore_ascii_case(id))
        })
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Indicator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Indicator::from_id(s).ok_or_else(|| format!("unknown indicator: {s}"))
    }
}

/// One country-year row of the democracy table. Missing values are `NaN`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemocracyRecord {
    pub country: String,
    pub year: i32,
    values: [f64; Indicator::COUNT],
    /// 0/1 armed-conflict flag, `NaN` when unknown.
    pub conflict: f64,
}

impl DemocracyRecord {
    /// A record with every indicator and the conflict flag unavailable.
    pub fn new(country: impl Into<String>, year: i32) -> Self {
        Self {
            country: country.into(),
            year,
            values: [f64::NAN; Indicator::COUNT],
            conflict: f64::NAN,
        }
    }

    pub fn with(mut self, indicator: Indicator, value: f64) -> Self {
        self.set(indicator, value);
        self
    }

    pub fn with_conflict(mut self, conflict: f64) -> Self {
        self.conflict = conflict;
        self
    }

    pub fn get(&self, indicator: Indicator) -> f64 {
        self.values[indicator.index()]
    }

    pub fn set(&mut self, indicator: Indicator, value: f64) {
        self.values[indicator.index()] = value;
    }

    pub fn conflict_flag(&self) -> Option<bool> {
        if self.conflict.is_nan() {
            None
        } else {
            Some(self.conflict != 0.0)
        }
    }
}

/// Explanatory metadata for one indicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorMetadata {
    pub id: String,
    pub full_name: String,
    pub short_name: String,
    pub description: String,
    pub relevance: String,
    pub references: String,
}

/// Politico-geographic region (`e_regionpol`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Region {
    EasternEuropeCentralAsia,
    LatinAmerica,
    MiddleEastNorthAfrica,
    SubSaharanAfrica,
    WesternEuropeNorthAmerica,
    EastAsia,
    SouthEastAsia,
    SouthAsia,
    Pacific,
    Caribbean,
    Unknown,
}

impl Region {
    /// Map a region code cell to a region. `"NA"`, blanks and out-of-range
    /// codes map to `Unknown`.
    pub fn from_code(code: &str) -> Self {
        match code
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|c| c.fract() == 0.0)
            .map(|c| c as i64)
        {
            Some(1) => Region::EasternEuropeCentralAsia,
            Some(2) => Region::LatinAmerica,
            Some(3) => Region::MiddleEastNorthAfrica,
            Some(4) => Region::SubSaharanAfrica,
            Some(5) => Region::WesternEuropeNorthAmerica,
            Some(6) => Region::EastAsia,
            Some(7) => Region::SouthEastAsia,
            Some(8) => Region::SouthAsia,
            Some(9) => Region::Pacific,
            Some(10) => Region::Caribbean,
            _ => Region::Unknown,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Region::EasternEuropeCentralAsia => "Eastern Europe and Central Asia",
            Region::LatinAmerica => "Latin America",
            Region::MiddleEastNorthAfrica => "Middle East and North Africa",
            Region::SubSaharanAfrica => "Sub-Saharan Africa",
            Region::WesternEuropeNorthAmerica => "Western Europe and North America",
            Region::EastAsia => "East Asia",
            Region::SouthEastAsia => "South-East Asia",
            Region::SouthAsia => "South Asia",
            Region::Pacific => "The Pacific",
            Region::Caribbean => "The Caribbean",
            Region::Unknown => "Unknown region",
        }
    }
}

/// Static per-country metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryMetadata {
    /// ISO alpha-3 code
    pub code: String,
    pub display_name: String,
    /// km², `NaN` when unknown
    pub area: f64,
    pub region: Region,
}

impl CountryMetadata {
    pub fn region_name(&self) -> &'static str {
        self.region.name()
    }
}

/// Regime classification (`v2x_regime`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Regime {
    ClosedAutocracy,
    ElectoralAutocracy,
    ElectoralDemocracy,
    LiberalDemocracy,
}

impl Regime {
    pub const ALL: [Regime; 4] = [
        Regime::ClosedAutocracy,
        Regime::ElectoralAutocracy,
        Regime::ElectoralDemocracy,
        Regime::LiberalDemocracy,
    ];

    /// Classify a (possibly fractional, e.g. median) regime value.
    pub fn from_value(value: f64) -> Option<Self> {
        if value.is_nan() {
            return None;
        }
        match value.round().clamp(0.0, 3.0) as u8 {
            0 => Some(Regime::ClosedAutocracy),
            1 => Some(Regime::ElectoralAutocracy),
            2 => Some(Regime::ElectoralDemocracy),
            _ => Some(Regime::LiberalDemocracy),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Regime::ClosedAutocracy => "Closed autocracy",
            Regime::ElectoralAutocracy => "Electoral autocracy",
            Regime::ElectoralDemocracy => "Electoral democracy",
            Regime::LiberalDemocracy => "Liberal democracy",
        }
    }
}

/// Year → record count for one country/filter combination.
pub type YearFacetSeries = BTreeMap<i32, u64>;

/// Alpha-3 country code → record count for one year range.
pub type CountryFacetSeries = BTreeMap<String, u64>;

/// Parameters that determine a `YearFacetSeries`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct YearFacetQuery {
    /// Alpha-3 code; the client falls back to its default country when absent.
    pub country: Option<String>,
    pub only_domestic: bool,
    pub only_with_images: bool,
    pub taxon_key: Option<u64>,
}

/// Parameters that determine a `CountryFacetSeries`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CountryFacetQuery {
    pub year_min: i32,
    pub year_max: i32,
}

impl From<YearWindow> for CountryFacetQuery {
    fn from(w: YearWindow) -> Self {
        Self {
            year_min: w.start,
            year_max: w.end,
        }
    }
}

/// One autocomplete hit from the taxonomic backbone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonSuggestion {
    pub name: String,
    pub key: u64,
}

/// Scatter view entry: one country summarized over a year window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedCountryPoint {
    pub country: String,
    pub name: String,
    pub region: Region,
    pub area: f64,
    pub x: f64,
    pub y: f64,
    pub regime_median: f64,
    /// Records over the window, divided by `area` when normalized.
    pub record_count: f64,
    pub raw_record_count: u64,
}

/// Time-series view entry: one year for the selected country.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedYearRow {
    pub year: i32,
    /// Selected indicator, `NaN` when unavailable.
    pub value: f64,
    pub record_count: u64,
    pub conflict: Option<bool>,
    pub regime: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_codes_must_be_whole_numbers() {
        assert_eq!(Region::from_code("1"), Region::EasternEuropeCentralAsia);
        assert_eq!(Region::from_code(" 5.0 "), Region::WesternEuropeNorthAmerica);
        assert_eq!(Region::from_code("1.9"), Region::Unknown);
        assert_eq!(Region::from_code("NA"), Region::Unknown);
        assert_eq!(Region::from_code("11"), Region::Unknown);
    }
}

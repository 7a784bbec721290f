use biodem_rs::api::{OccurrenceSource, QueryError, QueryResult};
use biodem_rs::download::{DownloadOptions, download, resolve_filters};
use biodem_rs::models::{
    CountryFacetQuery, CountryFacetSeries, TaxonSuggestion, YearFacetQuery, YearFacetSeries,
    YearWindow,
};
use std::sync::Mutex;

const MAMMALIA: u64 = 359;

/// Serves fixed counts and records every year-facet query it sees.
#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<YearFacetQuery>>,
}

impl OccurrenceSource for Recorder {
    fn year_facet(&self, query: &YearFacetQuery) -> QueryResult<YearFacetSeries> {
        self.seen.lock().unwrap().push(query.clone());
        let country = query.country.as_deref().unwrap_or("");
        let series: YearFacetSeries = match (country, query.taxon_key, query.only_domestic) {
            ("SWE", None, false) => [(2000, 100), (2001, 120), (1950, 3)].into_iter().collect(),
            ("SWE", None, true) => [(2000, 40)].into_iter().collect(),
            ("SWE", Some(MAMMALIA), false) => [(2001, 7)].into_iter().collect(),
            ("NOR", None, false) => [(2000, 80)].into_iter().collect(),
            _ => YearFacetSeries::new(),
        };
        QueryResult::Response(series)
    }

    fn country_facet(&self, _query: &CountryFacetQuery) -> QueryResult<CountryFacetSeries> {
        QueryResult::Response(CountryFacetSeries::new())
    }

    fn taxon_suggestions(&self, text: &str) -> QueryResult<Vec<TaxonSuggestion>> {
        if text.eq_ignore_ascii_case("mammalia") {
            QueryResult::Response(vec![TaxonSuggestion {
                name: "Mammalia".into(),
                key: MAMMALIA,
            }])
        } else {
            QueryResult::Error(QueryError::EmptyResult {
                query: text.to_string(),
            })
        }
    }
}

fn opts(countries: &[&str]) -> DownloadOptions {
    DownloadOptions {
        countries: countries.iter().map(|c| c.to_string()).collect(),
        add_domestic: false,
        window: None,
    }
}

#[test]
fn all_and_taxon_filters_join_on_country_year() {
    let src = Recorder::default();
    let tokens = vec!["all".to_string(), "mammalia".to_string()];
    let mut o = opts(&["SWE", "NOR"]);
    o.window = Some(YearWindow::new(1960, 2018));
    let table = download(&src, &tokens, &o).unwrap();

    assert_eq!(table.columns, vec!["all", "mammalia"]);
    let rows: Vec<_> = table
        .rows
        .iter()
        .map(|r| (r.country.as_str(), r.year, r.values.clone()))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("NOR", 2000, vec![80, 0]),
            ("SWE", 2000, vec![100, 0]),
            ("SWE", 2001, vec![120, 7]),
        ]
    );
}

#[test]
fn domestic_variant_adds_a_column_per_filter() {
    let src = Recorder::default();
    let mut o = opts(&["SWE"]);
    o.add_domestic = true;
    let table = download(&src, &["all".to_string()], &o).unwrap();
    assert_eq!(table.columns, vec!["all", "all-domestic"]);
    let first = &table.rows.iter().find(|r| r.year == 2000).unwrap().values;
    assert_eq!(first, &vec![100, 40]);
    assert!(src.seen.lock().unwrap().iter().any(|q| q.only_domestic));
}

#[test]
fn no_tokens_gives_single_records_column() {
    let src = Recorder::default();
    let table = download(&src, &[], &opts(&["NOR"])).unwrap();
    assert_eq!(table.columns, vec!["records"]);
    assert_eq!(table.rows.len(), 1);
}

#[test]
fn unknown_taxon_is_an_error_not_an_empty_table() {
    let src = Recorder::default();
    let err = download(&src, &["unicornia".to_string()], &opts(&["SWE"])).unwrap_err();
    assert!(format!("{err:#}").contains("unicornia"));
    assert!(src.seen.lock().unwrap().is_empty(), "nothing fetched after a failed lookup");
}

#[test]
fn empty_match_is_ok_and_empty() {
    let src = Recorder::default();
    let table = download(&src, &[], &opts(&["FIN"])).unwrap();
    assert!(table.is_empty());
}

#[test]
fn queries_run_in_order() {
    let src = Recorder::default();
    download(&src, &["all".to_string()], &opts(&["SWE", "NOR", "FIN"])).unwrap();
    let order: Vec<_> = src
        .seen
        .lock()
        .unwrap()
        .iter()
        .map(|q| q.country.clone().unwrap_or_default())
        .collect();
    assert_eq!(order, vec!["SWE", "NOR", "FIN"]);
}

#[test]
fn all_token_needs_no_lookup() {
    let specs = resolve_filters(&Recorder::default(), &["ALL".to_string()]).unwrap();
    assert_eq!(specs[0].token, "all");
    assert_eq!(specs[0].taxon_key, None);
}

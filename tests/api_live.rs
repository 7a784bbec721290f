//! Live API tests. Run with: `cargo test --features online -- --nocapture`
#![cfg(feature = "online")]

use biodem_rs::Client;
use biodem_rs::models::{CountryFacetQuery, YearFacetQuery};

#[test]
fn sweden_has_records_per_year() {
    let cli = Client::default();
    let series = cli
        .query_year_facet(&YearFacetQuery {
            country: Some("SWE".into()),
            ..Default::default()
        })
        .into_result()
        .unwrap();
    assert!(!series.is_empty());
    assert!(series.values().any(|n| *n > 0));
}

#[test]
fn country_facet_is_keyed_by_alpha3() {
    let cli = Client::default();
    let series = cli
        .query_country_facet(&CountryFacetQuery {
            year_min: 2000,
            year_max: 2001,
        })
        .into_result()
        .unwrap();
    assert!(series.contains_key("USA"));
    assert!(series.keys().all(|k| k.len() == 3));
}

#[test]
fn mammalia_resolves_to_backbone_class() {
    let cli = Client::default();
    let hits = cli.query_taxon_suggestions("Mammalia").into_result().unwrap();
    assert_eq!(hits[0].key, 359);
}

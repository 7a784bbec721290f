use biodem_rs::download::{WideRow, WideTable};
use biodem_rs::models::{Indicator, Region};
use biodem_rs::storage;
use std::fs;
use tempfile::tempdir;

const DEMOCRACY: &str = "\
country,year,v2x_polyarchy,v2x_rule,v2x_regime,confl
SWE,2000,0.9,0.95,3,0
SWE,2001,0.91,NA,3,
swe,2001,0.92,0.96,3,1
NOR,abc,0.9,0.9,3,0
,2000,0.5,0.5,1,0
NOR,2000,0.93,0.97,3,0
";

const COUNTRIES: &str = "\
country,area,e_regionpol
SWE,450295,5
NOR,,5
";

const INDICATORS: &str = "\
id,full_name,short_name,description,relevance,references
v2x_polyarchy,Electoral democracy index,Electoral democracy,To what extent is the ideal achieved?,Core,Teorell 2019
";

#[test]
fn loads_all_three_tables() {
    let dir = tempdir().unwrap();
    let dem = dir.path().join("dem.csv");
    let cty = dir.path().join("countries.csv");
    let ind = dir.path().join("indicators.csv");
    fs::write(&dem, DEMOCRACY).unwrap();
    fs::write(&cty, COUNTRIES).unwrap();
    fs::write(&ind, INDICATORS).unwrap();

    let data = storage::load_datasets(&dem, &cty, Some(&ind)).unwrap();

    // Bad year and empty country are skipped; the duplicate SWE 2001 keeps the last row.
    assert_eq!(data.democracy.len(), 3);
    let swe01 = data
        .democracy
        .iter()
        .find(|r| r.country == "SWE" && r.year == 2001)
        .unwrap();
    assert_eq!(swe01.get(Indicator::Polyarchy), 0.92);
    assert_eq!(swe01.conflict_flag(), Some(true));
    assert!(swe01.get(Indicator::LiberalDemocracy).is_nan());

    let swe = data.country("SWE").unwrap();
    assert_eq!(swe.display_name, "Sweden");
    assert_eq!(swe.area, 450295.0);
    assert_ne!(swe.region, Region::Unknown);
    assert!(data.country("NOR").unwrap().area.is_nan());

    assert_eq!(data.indicator_label(Indicator::Polyarchy), "Electoral democracy");
    assert_eq!(data.indicator_label(Indicator::RuleOfLaw), Indicator::RuleOfLaw.label());
    assert!(data.missing_metadata().contains(&Indicator::RuleOfLaw));
}

#[test]
fn missing_file_is_a_contextual_error() {
    let dir = tempdir().unwrap();
    let err = storage::load_democracy(dir.path().join("nope.csv")).unwrap_err();
    assert!(format!("{err:#}").contains("nope.csv"));
}

#[test]
fn wide_table_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("out.csv");
    let table = WideTable {
        columns: vec!["all".into(), "all-domestic".into()],
        rows: vec![
            WideRow {
                country: "SWE".into(),
                year: 2000,
                values: vec![100, 40],
            },
            WideRow {
                country: "SWE".into(),
                year: 2001,
                values: vec![120, 0],
            },
        ],
    };
    storage::save_wide_csv(&table, &path).unwrap();
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("country,year,all,all-domestic\n"));
    assert_eq!(storage::load_wide_csv(&path).unwrap(), table);
}

#[test]
fn empty_table_writes_header_only() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty.csv");
    let table = WideTable {
        columns: vec!["records".into()],
        rows: vec![],
    };
    storage::save_wide_csv(&table, &path).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "country,year,records\n");
}

// Cells that a spreadsheet would run as formulas get a leading quote.
#[test]
fn csv_cells_are_prefixed_to_avoid_formulas() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("inject.csv");
    let table = WideTable {
        columns: vec!["=cmd".into()],
        rows: vec![WideRow {
            country: "@SUM(A1)".into(),
            year: 2000,
            values: vec![1],
        }],
    };
    storage::save_wide_csv(&table, &path).unwrap();
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("'=cmd"));
    assert!(text.contains("'@SUM(A1)"));
}

use biodem_rs::api::{OccurrenceSource, QueryError, QueryResult};
use biodem_rs::models::{
    CountryFacetQuery, CountryFacetSeries, DemocracyRecord, Indicator, TaxonSuggestion,
    YearFacetQuery, YearFacetSeries, YearWindow,
};
use biodem_rs::state::{
    AppState, Command, Completion, Controller, Intent, QueryKind, QueryStatus,
};
use biodem_rs::storage::Datasets;
use biodem_rs::StudyConfig;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn years(entries: &[(i32, u64)]) -> YearFacetSeries {
    entries.iter().copied().collect()
}

fn year_seq(cmds: &[Command]) -> u64 {
    cmds.iter()
        .find_map(|c| match c {
            Command::FetchYearFacet { seq, .. } => Some(*seq),
            _ => None,
        })
        .expect("year facet fetch issued")
}

fn country_seq(cmds: &[Command]) -> u64 {
    cmds.iter()
        .find_map(|c| match c {
            Command::FetchCountryFacet { seq, .. } => Some(*seq),
            _ => None,
        })
        .expect("country facet fetch issued")
}

fn transport_error() -> QueryError {
    QueryError::Transport {
        url: "http://fake".into(),
        message: "HTTP 503".into(),
    }
}

#[test]
fn refresh_issues_both_facets() {
    let mut st = AppState::new(StudyConfig::default());
    let cmds = st.apply(Intent::Refresh);
    assert_eq!(cmds.len(), 2);
    assert!(st.is_fetching(QueryKind::YearFacet));
    assert!(st.is_fetching(QueryKind::CountryFacet));
    match &cmds[0] {
        Command::FetchYearFacet { query, .. } => {
            assert_eq!(query.country.as_deref(), Some("USA"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn stale_response_never_overwrites_newer_one() {
    let mut st = AppState::new(StudyConfig::default());
    let first = year_seq(&st.apply(Intent::Refresh));
    let second = year_seq(&st.apply(Intent::SelectCountry("swe".into())));
    assert!(second > first);
    assert_eq!(st.selection().country, "SWE");

    st.apply(Intent::QueryCompleted(Completion::YearFacet {
        seq: second,
        result: QueryResult::Response(years(&[(2000, 5)])),
    }));
    // The slow first response arrives last.
    st.apply(Intent::QueryCompleted(Completion::YearFacet {
        seq: first,
        result: QueryResult::Response(years(&[(2000, 99)])),
    }));
    assert_eq!(st.year_facet.data(), Some(&years(&[(2000, 5)])));
    assert_eq!(st.status(QueryKind::YearFacet), QueryStatus::Ready);
}

#[test]
fn stale_response_while_newer_is_pending_is_dropped() {
    let mut st = AppState::new(StudyConfig::default());
    let first = year_seq(&st.apply(Intent::Refresh));
    st.apply(Intent::SetOnlyDomestic(true));
    st.apply(Intent::QueryCompleted(Completion::YearFacet {
        seq: first,
        result: QueryResult::Response(years(&[(1999, 1)])),
    }));
    assert_eq!(st.year_facet.data(), None);
    assert!(st.is_fetching(QueryKind::YearFacet));
}

#[test]
fn failure_keeps_last_good_data_and_posts_notice() {
    let mut st = AppState::new(StudyConfig::default());
    let cmds = st.apply(Intent::Refresh);
    let good: CountryFacetSeries = [("SWE".to_string(), 10u64)].into_iter().collect();
    st.apply(Intent::QueryCompleted(Completion::CountryFacet {
        seq: country_seq(&cmds),
        result: QueryResult::Response(good.clone()),
    }));

    let cmds = st.apply(Intent::SetWindow(YearWindow::new(1990, 2000)));
    st.apply(Intent::QueryCompleted(Completion::CountryFacet {
        seq: country_seq(&cmds),
        result: QueryResult::Error(transport_error()),
    }));
    assert_eq!(st.country_facet.data(), Some(&good));
    assert_eq!(st.status(QueryKind::CountryFacet), QueryStatus::Failed);
    assert!(st.notices.get(QueryKind::CountryFacet).is_some());
    assert!(st.notices.get(QueryKind::YearFacet).is_none());
}

#[test]
fn notices_are_independent_per_source() {
    let mut st = AppState::new(StudyConfig::default());
    let cmds = st.apply(Intent::Refresh);
    st.apply(Intent::QueryCompleted(Completion::YearFacet {
        seq: year_seq(&cmds),
        result: QueryResult::Error(transport_error()),
    }));
    st.apply(Intent::QueryCompleted(Completion::CountryFacet {
        seq: country_seq(&cmds),
        result: QueryResult::Error(QueryError::Status {
            url: "http://fake".into(),
            status: 400,
        }),
    }));
    assert_eq!(st.notices.len(), 2);

    st.apply(Intent::DismissNotice(QueryKind::YearFacet));
    assert_eq!(st.notices.len(), 1);
    assert!(st.notices.get(QueryKind::CountryFacet).is_some());

    // A later success clears its own notice.
    let cmds = st.apply(Intent::SetWindow(YearWindow::new(2000, 2010)));
    st.apply(Intent::QueryCompleted(Completion::CountryFacet {
        seq: country_seq(&cmds),
        result: QueryResult::Response(CountryFacetSeries::new()),
    }));
    assert!(st.notices.is_empty());
}

#[test]
fn window_is_clipped_to_study_period() {
    let mut st = AppState::new(StudyConfig::default());
    let cmds = st.apply(Intent::SetWindow(YearWindow::new(1900, 2050)));
    assert!(cmds.is_empty(), "clipped window equals the default");
    assert_eq!(st.selection().window, YearWindow::new(1960, 2018));
}

#[test]
fn window_outside_study_period_is_ignored() {
    let mut st = AppState::new(StudyConfig::default());
    let cmds = st.apply(Intent::SetWindow(YearWindow::new(1990, 2000)));
    assert_eq!(cmds.len(), 1);

    let cmds = st.apply(Intent::SetWindow(YearWindow::new(1900, 1950)));
    assert!(cmds.is_empty());
    assert_eq!(st.selection().window, YearWindow::new(1990, 2000));

    let cmds = st.apply(Intent::SetWindow(YearWindow::new(2010, 2000)));
    assert!(cmds.is_empty());
    assert_eq!(st.selection().window, YearWindow::new(1990, 2000));
    assert!(!st.selection().window.is_empty());
}

#[test]
fn taxon_typing_is_debounced() {
    let mut st = AppState::new(StudyConfig::default());
    let t0 = Instant::now();
    let ms = |n: u64| t0 + Duration::from_millis(n);

    assert!(st.apply(Intent::TaxonTyped { text: "ma".into(), at: t0 }).is_empty());
    st.apply(Intent::TaxonTyped {
        text: "mam".into(),
        at: ms(100),
    });
    assert_eq!(st.next_deadline(), Some(ms(500)));
    assert!(st.apply(Intent::Tick(ms(300))).is_empty());

    let cmds = st.apply(Intent::Tick(ms(500)));
    assert_eq!(cmds.len(), 1);
    match &cmds[0] {
        Command::FetchTaxonSuggestions { text, .. } => assert_eq!(text, "mam"),
        other => panic!("unexpected {other:?}"),
    }
    assert!(st.apply(Intent::Tick(ms(2000))).is_empty());
    assert_eq!(st.next_deadline(), None);
}

#[test]
fn selecting_a_taxon_refetches_year_facet() {
    let mut st = AppState::new(StudyConfig::default());
    let taxon = TaxonSuggestion {
        name: "Aves".into(),
        key: 212,
    };
    let cmds = st.apply(Intent::SetTaxon(Some(taxon.clone())));
    match &cmds[..] {
        [Command::FetchYearFacet { query, .. }] => assert_eq!(query.taxon_key, Some(212)),
        other => panic!("unexpected {other:?}"),
    }
    assert!(st.apply(Intent::SetTaxon(Some(taxon))).is_empty());
}

struct FakeSource {
    fail_years: bool,
}

impl OccurrenceSource for FakeSource {
    fn year_facet(&self, query: &YearFacetQuery) -> QueryResult<YearFacetSeries> {
        if self.fail_years {
            return QueryResult::Error(transport_error());
        }
        assert_eq!(query.country.as_deref(), Some("USA"));
        QueryResult::Response(years(&[(2000, 100), (2001, 150)]))
    }

    fn country_facet(&self, _query: &CountryFacetQuery) -> QueryResult<CountryFacetSeries> {
        QueryResult::Response([("USA".to_string(), 500u64)].into_iter().collect())
    }

    fn taxon_suggestions(&self, text: &str) -> QueryResult<Vec<TaxonSuggestion>> {
        QueryResult::Response(vec![TaxonSuggestion {
            name: text.to_string(),
            key: 1,
        }])
    }
}

fn usa_data() -> Arc<Datasets> {
    let rows = [2000, 2001]
        .into_iter()
        .map(|y| {
            DemocracyRecord::new("USA", y)
                .with(Indicator::Polyarchy, 0.8)
                .with(Indicator::RuleOfLaw, 0.9)
                .with(Indicator::RegimeType, 3.0)
        })
        .collect();
    Arc::new(Datasets::new(rows, vec![], vec![]))
}

#[test]
fn controller_fetches_and_builds_views() {
    let mut ctl = Controller::new(
        Arc::new(FakeSource { fail_years: false }),
        usa_data(),
        StudyConfig::default(),
    );
    ctl.dispatch(Intent::Refresh);
    assert!(ctl.wait_idle(Duration::from_secs(5)));

    let scatter = ctl.scatter_view().to_vec();
    assert_eq!(scatter.len(), 1);
    assert_eq!(scatter[0].raw_record_count, 500);

    let timeline = ctl.timeline_view();
    let counts: Vec<_> = timeline.iter().map(|r| r.record_count).collect();
    assert_eq!(counts, vec![100, 150]);
}

#[test]
fn controller_reports_failures_as_notices() {
    let mut ctl = Controller::new(
        Arc::new(FakeSource { fail_years: true }),
        usa_data(),
        StudyConfig::default(),
    );
    ctl.dispatch(Intent::Refresh);
    assert!(ctl.wait_idle(Duration::from_secs(5)));
    assert!(ctl.state().notices.get(QueryKind::YearFacet).is_some());
    assert_eq!(ctl.state().status(QueryKind::CountryFacet), QueryStatus::Ready);
    assert!(ctl.timeline_view().iter().all(|r| r.record_count == 0));
}

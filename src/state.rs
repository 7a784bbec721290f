//! Application state for the interactive views.
//!
//! All mutation goes through [`AppState::apply`], which takes an [`Intent`] and
//! returns the fetches to start. Every fetch carries a sequence number that is
//! monotonic per query kind; a completion whose number is not the latest issued
//! for its kind is dropped, so a slow stale response can never overwrite a
//! newer one. A failed fetch keeps the last good data on screen and posts a
//! notice under its own source.

use crate::aggregate::{ScatterSelection, scatter_points, timeline_rows};
use crate::api::{OccurrenceSource, QueryError, QueryResult};
use crate::config::StudyConfig;
use crate::models::{
    AggregatedCountryPoint, CountryFacetQuery, CountryFacetSeries, Indicator, MergedYearRow,
    TaxonSuggestion, YearFacetQuery, YearFacetSeries, YearWindow,
};
use crate::storage::Datasets;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

/// The independent query keys. Also used as notice sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QueryKind {
    YearFacet,
    CountryFacet,
    TaxonSuggest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryStatus {
    #[default]
    Idle,
    Fetching,
    Ready,
    Failed,
}

/// Data and bookkeeping for one query key.
#[derive(Debug, Clone)]
pub struct QuerySlot<T> {
    pub status: QueryStatus,
    latest_seq: u64,
    /// Sequence number of the request that produced `data`.
    data_seq: u64,
    data: Option<T>,
}

impl<T> Default for QuerySlot<T> {
    fn default() -> Self {
        Self {
            status: QueryStatus::Idle,
            latest_seq: 0,
            data_seq: 0,
            data: None,
        }
    }
}

/// What happened to a completion handed to a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Stored,
    Failed(QueryError),
    Stale,
}

impl<T> QuerySlot<T> {
    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn latest_seq(&self) -> u64 {
        self.latest_seq
    }

    fn issue(&mut self) -> u64 {
        self.latest_seq += 1;
        self.status = QueryStatus::Fetching;
        self.latest_seq
    }

    fn complete(&mut self, seq: u64, result: QueryResult<T>) -> Applied {
        if seq != self.latest_seq {
            return Applied::Stale;
        }
        match result {
            QueryResult::Response(v) => {
                self.data = Some(v);
                self.data_seq = seq;
                self.status = QueryStatus::Ready;
                Applied::Stored
            }
            QueryResult::Error(e) => {
                self.status = QueryStatus::Failed;
                Applied::Failed(e)
            }
        }
    }
}

/// Dismissible error banners, one slot per source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoticeBoard {
    notices: BTreeMap<QueryKind, String>,
}

impl NoticeBoard {
    pub fn post(&mut self, source: QueryKind, message: impl Into<String>) {
        self.notices.insert(source, message.into());
    }

    pub fn dismiss(&mut self, source: QueryKind) -> bool {
        self.notices.remove(&source).is_some()
    }

    pub fn get(&self, source: QueryKind) -> Option<&str> {
        self.notices.get(&source).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (QueryKind, &str)> {
        self.notices.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.notices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notices.is_empty()
    }
}

/// Trailing-edge debounce with a cap on the total delay.
#[derive(Debug, Clone)]
pub struct Debouncer {
    wait: Duration,
    max_wait: Duration,
    pending: Option<String>,
    first_push: Option<Instant>,
    last_push: Option<Instant>,
}

impl Debouncer {
    pub fn new(wait: Duration, max_wait: Duration) -> Self {
        Self {
            wait,
            max_wait,
            pending: None,
            first_push: None,
            last_push: None,
        }
    }

    pub fn push(&mut self, value: impl Into<String>, now: Instant) {
        self.pending = Some(value.into());
        self.first_push.get_or_insert(now);
        self.last_push = Some(now);
    }

    /// When the pending value becomes due, if any.
    pub fn deadline(&self) -> Option<Instant> {
        let (first, last) = (self.first_push?, self.last_push?);
        self.pending.as_ref()?;
        Some((last + self.wait).min(first + self.max_wait))
    }

    /// Release the pending value once it is due.
    pub fn poll(&mut self, now: Instant) -> Option<String> {
        if now < self.deadline()? {
            return None;
        }
        self.first_push = None;
        self.last_push = None;
        self.pending.take()
    }
}

/// User-facing selection that determines the queries and the views.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Alpha-3 code of the time-series country.
    pub country: String,
    pub scatter_x: Indicator,
    pub scatter_y: Indicator,
    /// Indicator drawn as a line in the time-series view.
    pub indicator: Indicator,
    pub window: YearWindow,
    pub only_domestic: bool,
    pub only_with_images: bool,
    pub taxon: Option<TaxonSuggestion>,
    pub normalize_by_area: bool,
}

impl Selection {
    pub fn year_facet_query(&self) -> YearFacetQuery {
        YearFacetQuery {
            country: Some(self.country.clone()),
            only_domestic: self.only_domestic,
            only_with_images: self.only_with_images,
            taxon_key: self.taxon.as_ref().map(|t| t.key),
        }
    }

    pub fn country_facet_query(&self) -> CountryFacetQuery {
        self.window.into()
    }

    pub fn scatter_selection(&self) -> ScatterSelection {
        ScatterSelection {
            x: self.scatter_x,
            y: self.scatter_y,
            window: self.window,
            normalize_by_area: self.normalize_by_area,
        }
    }
}

/// A finished fetch, tagged with the sequence number it was issued under.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    YearFacet {
        seq: u64,
        result: QueryResult<YearFacetSeries>,
    },
    CountryFacet {
        seq: u64,
        result: QueryResult<CountryFacetSeries>,
    },
    TaxonSuggest {
        seq: u64,
        result: QueryResult<Vec<TaxonSuggestion>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// Issue both facet queries for the current selection.
    Refresh,
    SelectCountry(String),
    SelectScatterAxes { x: Indicator, y: Indicator },
    SelectIndicator(Indicator),
    SetWindow(YearWindow),
    SetOnlyDomestic(bool),
    SetOnlyWithImages(bool),
    SetTaxon(Option<TaxonSuggestion>),
    SetNormalizeByArea(bool),
    /// A keystroke in the taxon search box.
    TaxonTyped { text: String, at: Instant },
    /// Clock tick; releases a due taxon lookup.
    Tick(Instant),
    QueryCompleted(Completion),
    DismissNotice(QueryKind),
}

/// A fetch to run; its result comes back as [`Intent::QueryCompleted`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    FetchYearFacet { seq: u64, query: YearFacetQuery },
    FetchCountryFacet { seq: u64, query: CountryFacetQuery },
    FetchTaxonSuggestions { seq: u64, text: String },
}

impl Command {
    /// Run the fetch against `source`.
    pub fn run<S: OccurrenceSource + ?Sized>(&self, source: &S) -> Completion {
        match self {
            Command::FetchYearFacet { seq, query } => Completion::YearFacet {
                seq: *seq,
                result: source.year_facet(query),
            },
            Command::FetchCountryFacet { seq, query } => Completion::CountryFacet {
                seq: *seq,
                result: source.country_facet(query),
            },
            Command::FetchTaxonSuggestions { seq, text } => Completion::TaxonSuggest {
                seq: *seq,
                result: source.taxon_suggestions(text),
            },
        }
    }
}

type ScatterKey = (u64, ScatterSelection);
type TimelineKey = (u64, String, Indicator, YearWindow);

#[derive(Debug, Clone)]
pub struct AppState {
    pub config: StudyConfig,
    selection: Selection,
    pub year_facet: QuerySlot<YearFacetSeries>,
    pub country_facet: QuerySlot<CountryFacetSeries>,
    pub suggestions: QuerySlot<Vec<TaxonSuggestion>>,
    pub notices: NoticeBoard,
    debouncer: Debouncer,
    scatter_memo: Option<(ScatterKey, Vec<AggregatedCountryPoint>)>,
    timeline_memo: Option<(TimelineKey, Vec<MergedYearRow>)>,
}

impl AppState {
    pub fn new(config: StudyConfig) -> Self {
        let selection = Selection {
            country: config.fallback_country.clone(),
            scatter_x: Indicator::Polyarchy,
            scatter_y: Indicator::RuleOfLaw,
            indicator: Indicator::Polyarchy,
            window: config.study_window,
            only_domestic: false,
            only_with_images: false,
            taxon: None,
            normalize_by_area: false,
        };
        let debouncer = Debouncer::new(config.debounce_wait, config.debounce_max_wait);
        Self {
            config,
            selection,
            year_facet: QuerySlot::default(),
            country_facet: QuerySlot::default(),
            suggestions: QuerySlot::default(),
            notices: NoticeBoard::default(),
            debouncer,
            scatter_memo: None,
            timeline_memo: None,
        }
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn status(&self, kind: QueryKind) -> QueryStatus {
        match kind {
            QueryKind::YearFacet => self.year_facet.status,
            QueryKind::CountryFacet => self.country_facet.status,
            QueryKind::TaxonSuggest => self.suggestions.status,
        }
    }

    pub fn is_fetching(&self, kind: QueryKind) -> bool {
        self.status(kind) == QueryStatus::Fetching
    }

    /// When the next `Tick` has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.debouncer.deadline()
    }

    /// Apply one intent and return the fetches it requires.
    pub fn apply(&mut self, intent: Intent) -> Vec<Command> {
        let mut cmds = Vec::new();
        match intent {
            Intent::Refresh => {
                cmds.push(self.fetch_year_facet());
                cmds.push(self.fetch_country_facet());
            }
            Intent::SelectCountry(country) => {
                let country = country.trim().to_ascii_uppercase();
                if country != self.selection.country {
                    self.selection.country = country;
                    cmds.push(self.fetch_year_facet());
                }
            }
            Intent::SelectScatterAxes { x, y } => {
                self.selection.scatter_x = x;
                self.selection.scatter_y = y;
            }
            Intent::SelectIndicator(ind) => self.selection.indicator = ind,
            Intent::SetWindow(window) => {
                let clipped = window.intersect(&self.config.study_window);
                if clipped.is_empty() {
                    warn!("ignoring year window {window}: no year inside the study period");
                } else if clipped != self.selection.window {
                    self.selection.window = clipped;
                    cmds.push(self.fetch_country_facet());
                }
            }
            Intent::SetOnlyDomestic(v) => {
                if v != self.selection.only_domestic {
                    self.selection.only_domestic = v;
                    cmds.push(self.fetch_year_facet());
                }
            }
            Intent::SetOnlyWithImages(v) => {
                if v != self.selection.only_with_images {
                    self.selection.only_with_images = v;
                    cmds.push(self.fetch_year_facet());
                }
            }
            Intent::SetTaxon(taxon) => {
                if taxon != self.selection.taxon {
                    self.selection.taxon = taxon;
                    cmds.push(self.fetch_year_facet());
                }
            }
            Intent::SetNormalizeByArea(v) => self.selection.normalize_by_area = v,
            Intent::TaxonTyped { text, at } => self.debouncer.push(text, at),
            Intent::Tick(now) => {
                if let Some(text) = self.debouncer.poll(now) {
                    if !text.trim().is_empty() {
                        let seq = self.suggestions.issue();
                        cmds.push(Command::FetchTaxonSuggestions { seq, text });
                    }
                }
            }
            Intent::QueryCompleted(done) => self.complete(done),
            Intent::DismissNotice(kind) => {
                self.notices.dismiss(kind);
            }
        }
        cmds
    }

    fn fetch_year_facet(&mut self) -> Command {
        let seq = self.year_facet.issue();
        Command::FetchYearFacet {
            seq,
            query: self.selection.year_facet_query(),
        }
    }

    fn fetch_country_facet(&mut self) -> Command {
        let seq = self.country_facet.issue();
        Command::FetchCountryFacet {
            seq,
            query: self.selection.country_facet_query(),
        }
    }

    fn complete(&mut self, done: Completion) {
        let (kind, applied) = match done {
            Completion::YearFacet { seq, result } => {
                (QueryKind::YearFacet, self.year_facet.complete(seq, result))
            }
            Completion::CountryFacet { seq, result } => {
                (QueryKind::CountryFacet, self.country_facet.complete(seq, result))
            }
            Completion::TaxonSuggest { seq, result } => {
                (QueryKind::TaxonSuggest, self.suggestions.complete(seq, result))
            }
        };
        match applied {
            Applied::Stored => {
                self.notices.dismiss(kind);
            }
            Applied::Failed(e) => {
                warn!("{:?} query failed: {}", kind, e);
                self.notices.post(kind, e.to_string());
            }
            Applied::Stale => debug!("dropping stale {:?} response", kind),
        }
    }

    /// Scatter points for the current selection and country-facet data.
    /// Recomputed only when either changes.
    pub fn scatter_view(&mut self, data: &Datasets) -> &[AggregatedCountryPoint] {
        let key: ScatterKey = (self.country_facet.data_seq, self.selection.scatter_selection());
        let fresh = self.scatter_memo.as_ref().is_some_and(|(k, _)| *k == key);
        if !fresh {
            let empty = CountryFacetSeries::new();
            let facet = self.country_facet.data().unwrap_or(&empty);
            let points = scatter_points(data, facet, &key.1, &self.config.overrides);
            self.scatter_memo = Some((key, points));
        }
        self.scatter_memo.as_ref().map(|(_, v)| v.as_slice()).unwrap_or(&[])
    }

    /// Year rows for the current country, indicator and window.
    /// Recomputed only when those or the year-facet data change.
    pub fn timeline_view(&mut self, data: &Datasets) -> &[MergedYearRow] {
        let key: TimelineKey = (
            self.year_facet.data_seq,
            self.selection.country.clone(),
            self.selection.indicator,
            self.selection.window,
        );
        let fresh = self.timeline_memo.as_ref().is_some_and(|(k, _)| *k == key);
        if !fresh {
            let empty = YearFacetSeries::new();
            let facet = self.year_facet.data().unwrap_or(&empty);
            let rows = timeline_rows(&data.democracy, &key.1, key.2, &key.3, facet);
            self.timeline_memo = Some((key, rows));
        }
        self.timeline_memo.as_ref().map(|(_, v)| v.as_slice()).unwrap_or(&[])
    }
}

/// Owns the state and a query source; runs fetches on worker threads and
/// feeds their results back through a channel.
pub struct Controller<S: OccurrenceSource + 'static> {
    state: AppState,
    source: Arc<S>,
    data: Arc<Datasets>,
    tx: mpsc::Sender<Completion>,
    rx: mpsc::Receiver<Completion>,
    in_flight: usize,
}

impl<S: OccurrenceSource + 'static> Controller<S> {
    pub fn new(source: Arc<S>, data: Arc<Datasets>, config: StudyConfig) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            state: AppState::new(config),
            source,
            data,
            tx,
            rx,
            in_flight: 0,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn datasets(&self) -> &Datasets {
        &self.data
    }

    pub fn dispatch(&mut self, intent: Intent) {
        for cmd in self.state.apply(intent) {
            self.spawn(cmd);
        }
    }

    fn spawn(&mut self, cmd: Command) {
        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        self.in_flight += 1;
        thread::spawn(move || {
            // The receiver only goes away with the controller.
            let _ = tx.send(cmd.run(source.as_ref()));
        });
    }

    /// Apply every completion that has already arrived. Returns how many.
    pub fn poll(&mut self) -> usize {
        let mut n = 0;
        while let Ok(done) = self.rx.try_recv() {
            self.apply_completion(done);
            n += 1;
        }
        n
    }

    /// Block until every spawned fetch has reported back, or `timeout` passes.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.in_flight > 0 {
            let left = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(left) {
                Ok(done) => self.apply_completion(done),
                Err(_) => return false,
            }
        }
        true
    }

    fn apply_completion(&mut self, done: Completion) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.dispatch(Intent::QueryCompleted(done));
    }

    pub fn scatter_view(&mut self) -> &[AggregatedCountryPoint] {
        self.state.scatter_view(&self.data)
    }

    pub fn timeline_view(&mut self) -> &[MergedYearRow] {
        self.state.timeline_view(&self.data)
    }
}

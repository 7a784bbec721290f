use crate::models::YearWindow;
use crate::stats::YearOverrides;
use std::time::Duration;

/// Country used for year-facet queries that do not name one.
pub const DEFAULT_COUNTRY: &str = "USA";

/// First and last year covered by the study.
pub const STUDY_START: i32 = 1960;
pub const STUDY_END: i32 = 2018;

/// Study-wide settings shared by the controller and the CLI.
#[derive(Debug, Clone, PartialEq)]
pub struct StudyConfig {
    pub study_window: YearWindow,
    pub fallback_country: String,
    pub overrides: YearOverrides,
    /// Quiet period after the last keystroke before a taxon lookup is sent.
    pub debounce_wait: Duration,
    /// Upper bound on how long continuous typing can postpone a lookup.
    pub debounce_max_wait: Duration,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            study_window: YearWindow::new(STUDY_START, STUDY_END),
            fallback_country: DEFAULT_COUNTRY.into(),
            overrides: YearOverrides::builtin(),
            debounce_wait: Duration::from_millis(400),
            debounce_max_wait: Duration::from_secs(3),
        }
    }
}

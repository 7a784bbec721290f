use biodem_rs::models::{Indicator, YearWindow};
use biodem_rs::stats::{YearOverrides, compute_extent, is_within_range, median, valid_years};

#[test]
fn extent_ignores_nan_and_honors_forced_bounds() {
    let v = [0.4, f64::NAN, 0.1, 0.9];
    assert_eq!(compute_extent(&v, |x| *x, None, None), (Some(0.1), Some(0.9)));
    assert_eq!(
        compute_extent(&v, |x| *x, Some(0.0), Some(1.0)),
        (Some(0.0), Some(1.0))
    );
    let empty: [f64; 0] = [];
    assert_eq!(compute_extent(&empty, |x| *x, None, None), (None, None));
}

#[test]
fn median_of_odd_and_even() {
    assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
    assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
    assert_eq!(median(&[]), None);
    assert_eq!(median(&[0.7]), Some(0.7));
}

#[test]
fn range_check_is_inclusive() {
    assert!(is_within_range(2000, (2000, 2010)));
    assert!(is_within_range(2010, (2000, 2010)));
    assert!(!is_within_range(2011, (2000, 2010)));
}

#[test]
fn valid_years_intersect_overrides() {
    let overrides = YearOverrides::default()
        .with_start(Indicator::RuleOfLaw, 1990)
        .with_stop(Indicator::RuleOfLaw, 2010);
    let w = valid_years(
        &[Indicator::Polyarchy, Indicator::RuleOfLaw],
        1960,
        2018,
        &overrides,
    );
    assert_eq!(w, YearWindow::new(1990, 2010));
}

#[test]
fn builtin_overrides_limit_cspart_and_clphy() {
    let o = YearOverrides::builtin();
    let w = valid_years(
        &[Indicator::CivilSocietyParticipation, Indicator::PhysicalIntegrity],
        1960,
        2018,
        &o,
    );
    assert_eq!(w, YearWindow::new(1970, 2017));
    let plain = valid_years(&[Indicator::Polyarchy], 1960, 2018, &o);
    assert_eq!(plain, YearWindow::new(1960, 2018));
}

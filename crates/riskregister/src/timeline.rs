//! Risk history timeline.
//!
//! Rebuilds, for every sample date between the project start and end, the
//! mean score of the risks that were active on that date, split by the status
//! each risk had at the time.

use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::project::ProjectMeta;
use crate::risk::{Risk, RiskStatus};

/// Spacing between sample dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Seven days.
    Week,
    /// One calendar month.
    Month,
    /// One calendar year.
    Year,
}

/// Where a risk's status on a past date comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusSource {
    /// Reconstructed from the status history.
    #[default]
    History,
    /// The risk's present status, for every date.
    Current,
}

/// Tunables for timeline construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineSettings {
    /// Longest span (days) sampled weekly.
    pub week_max_days: i64,
    /// Longest span (days) sampled monthly; longer spans are sampled yearly.
    pub month_max_days: i64,
    /// How past statuses are determined.
    pub status_source: StatusSource,
}

impl Default for TimelineSettings {
    fn default() -> Self {
        Self {
            week_max_days: 120,
            month_max_days: 730,
            status_source: StatusSource::History,
        }
    }
}

/// A single sample of a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesPoint {
    /// Sample date.
    pub date: NaiveDate,
    /// Mean score, 0 when no matching risk was active.
    pub value: f64,
}

/// Samples for one status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSeries {
    /// The status this series tracks.
    pub status: RiskStatus,
    /// One point per sample date.
    pub points: Vec<SeriesPoint>,
}

/// The reconstructed timeline of a project.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Timeline {
    /// Project start.
    pub start: NaiveDate,
    /// Project end.
    pub end: NaiveDate,
    /// Sample spacing.
    pub step: Step,
    /// Sample dates, starting at `start` and never past `end`.
    pub dates: Vec<NaiveDate>,
    /// One series per status, in `RiskStatus::ALL` order.
    pub series: Vec<StatusSeries>,
}

impl Timeline {
    /// Build the timeline for a project.
    ///
    /// Returns `None` when the start or end date is missing, or the end is not
    /// after the start.
    #[must_use]
    pub fn build(meta: &ProjectMeta, risks: &[Risk], settings: &TimelineSettings) -> Option<Self> {
        let start = meta.start_date?;
        let end = meta.end_date?;
        if end <= start {
            return None;
        }

        let step = choose_step((end - start).num_days(), settings);
        let dates = sample_dates(start, end, step);
        let series = RiskStatus::ALL
            .iter()
            .map(|&status| StatusSeries {
                status,
                points: dates
                    .iter()
                    .map(|&date| SeriesPoint {
                        date,
                        value: mean_score_on(risks, date, status, settings.status_source),
                    })
                    .collect(),
            })
            .collect();

        Some(Self {
            start,
            end,
            step,
            dates,
            series,
        })
    }

    /// The series for a status.
    #[must_use]
    pub fn series_for(&self, status: RiskStatus) -> Option<&StatusSeries> {
        self.series.iter().find(|s| s.status == status)
    }
}

/// Pick the sample spacing for a span of `span_days`.
#[must_use]
pub fn choose_step(span_days: i64, settings: &TimelineSettings) -> Step {
    if span_days <= settings.week_max_days {
        Step::Week
    } else if span_days <= settings.month_max_days {
        Step::Month
    } else {
        Step::Year
    }
}

/// Sample dates from `start` to `end` inclusive.
///
/// Each date is computed from `start` (the k-th month, not k single-month
/// steps), so month-end starts do not drift.
#[must_use]
pub fn sample_dates(start: NaiveDate, end: NaiveDate, step: Step) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    for k in 0u32.. {
        let next = match step {
            Step::Week => start.checked_add_days(Days::new(7 * u64::from(k))),
            Step::Month => start.checked_add_months(Months::new(k)),
            Step::Year => k
                .checked_mul(12)
                .and_then(|m| start.checked_add_months(Months::new(m))),
        };
        match next {
            Some(date) if date <= end => dates.push(date),
            _ => break,
        }
    }
    dates
}

/// Mean score of risks active on `date` whose status then was `status`.
fn mean_score_on(
    risks: &[Risk],
    date: NaiveDate,
    status: RiskStatus,
    source: StatusSource,
) -> f64 {
    crate::matrix::aggregated_score(risks.iter().filter(|r| {
        r.is_active_on(date)
            && match source {
                StatusSource::History => r.status_on(date) == status,
                StatusSource::Current => r.status == status,
            }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::RiskInput;
    use chrono::{TimeZone, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn meta(start: NaiveDate, end: NaiveDate) -> ProjectMeta {
        ProjectMeta {
            start_date: Some(start),
            end_date: Some(end),
            ..ProjectMeta::default()
        }
    }

    fn risk(id: &str, p: u8, i: u8, identified: NaiveDate) -> Risk {
        let input = RiskInput {
            probability: p,
            impact: i,
            date_identified: identified,
            ..RiskInput::default()
        };
        let created = identified.and_hms_opt(9, 0, 0).unwrap().and_utc();
        Risk::create(id.to_string(), input, "", created)
    }

    fn value(t: &Timeline, status: RiskStatus, idx: usize) -> f64 {
        t.series_for(status).unwrap().points[idx].value
    }

    #[test]
    fn test_requires_valid_range() {
        let s = TimelineSettings::default();
        assert!(Timeline::build(&ProjectMeta::default(), &[], &s).is_none());
        let same = meta(date(2024, 1, 1), date(2024, 1, 1));
        assert!(Timeline::build(&same, &[], &s).is_none());
        let backwards = meta(date(2024, 2, 1), date(2024, 1, 1));
        assert!(Timeline::build(&backwards, &[], &s).is_none());
    }

    #[test]
    fn test_choose_step() {
        let s = TimelineSettings::default();
        assert_eq!(choose_step(1, &s), Step::Week);
        assert_eq!(choose_step(120, &s), Step::Week);
        assert_eq!(choose_step(121, &s), Step::Month);
        assert_eq!(choose_step(730, &s), Step::Month);
        assert_eq!(choose_step(731, &s), Step::Year);
    }

    #[test]
    fn test_weekly_samples_include_end() {
        let dates = sample_dates(date(2024, 1, 1), date(2024, 1, 29), Step::Week);
        assert_eq!(dates.len(), 5);
        assert_eq!(dates[4], date(2024, 1, 29));

        let dates = sample_dates(date(2024, 1, 1), date(2024, 1, 28), Step::Week);
        assert_eq!(dates.len(), 4);
    }

    #[test]
    fn test_monthly_samples_do_not_drift() {
        let dates = sample_dates(date(2024, 1, 31), date(2024, 5, 31), Step::Month);
        assert_eq!(
            dates,
            vec![
                date(2024, 1, 31),
                date(2024, 2, 29),
                date(2024, 3, 31),
                date(2024, 4, 30),
                date(2024, 5, 31),
            ]
        );
    }

    #[test]
    fn test_yearly_samples() {
        let dates = sample_dates(date(2020, 6, 1), date(2023, 5, 31), Step::Year);
        assert_eq!(dates, vec![date(2020, 6, 1), date(2021, 6, 1), date(2022, 6, 1)]);
    }

    #[test]
    fn test_series_shape() {
        let m = meta(date(2024, 1, 1), date(2024, 3, 1));
        let t = Timeline::build(&m, &[], &TimelineSettings::default()).unwrap();
        assert_eq!(t.step, Step::Week);
        assert_eq!(t.series.len(), 4);
        assert_eq!(t.series[1].status, RiskStatus::InProgress);
        for series in &t.series {
            assert_eq!(series.points.len(), t.dates.len());
            assert!(series.points.iter().all(|p| p.value.abs() < f64::EPSILON));
        }
    }

    #[test]
    fn test_averages_active_risks() {
        let m = meta(date(2024, 1, 1), date(2024, 1, 29));
        let mut resolved = risk("b", 2, 2, date(2024, 1, 1));
        resolved.date_resolved = Some(date(2024, 1, 10));
        let risks = vec![
            risk("a", 4, 4, date(2024, 1, 1)),
            resolved,
            risk("c", 1, 2, date(2024, 1, 20)),
        ];
        let t = Timeline::build(&m, &risks, &TimelineSettings::default()).unwrap();

        // Jan 1: a (16) and b (4)
        assert!((value(&t, RiskStatus::Open, 0) - 10.0).abs() < 1e-9);
        // Jan 8: still both
        assert!((value(&t, RiskStatus::Open, 1) - 10.0).abs() < 1e-9);
        // Jan 15: b resolved
        assert!((value(&t, RiskStatus::Open, 2) - 16.0).abs() < 1e-9);
        // Jan 22: a and c (2)
        assert!((value(&t, RiskStatus::Open, 3) - 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_history_moves_risk_between_series() {
        let m = meta(date(2024, 1, 1), date(2024, 1, 29));
        let mut r = risk("a", 3, 5, date(2024, 1, 1));
        r.apply(
            RiskInput {
                status: RiskStatus::Mitigated,
                ..r.to_input()
            },
            "fixed",
            Utc.with_ymd_and_hms(2024, 1, 16, 10, 0, 0).unwrap(),
        );
        let risks = vec![r];

        let t = Timeline::build(&m, &risks, &TimelineSettings::default()).unwrap();
        assert!((value(&t, RiskStatus::Open, 2) - 15.0).abs() < 1e-9);
        assert!(value(&t, RiskStatus::Mitigated, 2).abs() < f64::EPSILON);
        assert!(value(&t, RiskStatus::Open, 3).abs() < f64::EPSILON);
        assert!((value(&t, RiskStatus::Mitigated, 3) - 15.0).abs() < 1e-9);

        let current = TimelineSettings {
            status_source: StatusSource::Current,
            ..TimelineSettings::default()
        };
        let t = Timeline::build(&m, &risks, &current).unwrap();
        assert!((value(&t, RiskStatus::Mitigated, 0) - 15.0).abs() < 1e-9);
        assert!(value(&t, RiskStatus::Open, 0).abs() < f64::EPSILON);
    }
}

//! Progress editor: mutates a working copy of a goal's period records and
//! derives the history entries a commit must append.
//!
//! The functions here are pure over the period arrays; the HTTP handler owns
//! authorization and the single-row persistence of the result.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::achievement::effective_achieved;
use crate::operational::types::{HistoryEntry, PeriodProgress, Quarter, TrackingMethod};
use crate::shared::error::KpiError;

pub const NOTE_WEEKLY: &str = "Weekly total updated";
pub const NOTE_DIRECT: &str = "Direct value updated";

fn find_period_mut<'a>(
    periods: &'a mut [PeriodProgress],
    year: &str,
    quarter: Quarter,
) -> Result<&'a mut PeriodProgress, KpiError> {
    periods
        .iter_mut()
        .find(|p| p.year == year && p.quarter == quarter)
        .ok_or_else(|| KpiError::NotFound(format!("no period {year} {quarter}")))
}

/// Replace one week's achieved value and recompute the weekly total.
///
/// After this returns Ok, `weeklyTotalAchieved` equals the sum over all
/// week slots of the period.
pub fn set_weekly_achieved(
    periods: &mut [PeriodProgress],
    year: &str,
    quarter: Quarter,
    week: u32,
    value: f64,
) -> Result<(), KpiError> {
    if value < 0.0 || value.is_nan() {
        return Err(KpiError::Validation(format!(
            "achieved value must be a non-negative number, got {value}"
        )));
    }
    let period = find_period_mut(periods, year, quarter)?;
    let weeks = period
        .weeks
        .as_mut()
        .ok_or_else(|| KpiError::Validation(format!("period {year} {quarter} has no week slots")))?;
    let slot = weeks
        .iter_mut()
        .find(|w| w.week == week)
        .ok_or_else(|| KpiError::NotFound(format!("no week {week} in {year} {quarter}")))?;
    slot.achieved = value;
    period.weekly_total_achieved = Some(weeks.iter().map(|w| w.achieved).sum());
    Ok(())
}

/// Replace the single per-period value of a direct-tracked goal.
pub fn set_direct_achieved(
    periods: &mut [PeriodProgress],
    year: &str,
    quarter: Quarter,
    value: f64,
) -> Result<(), KpiError> {
    if value < 0.0 || value.is_nan() {
        return Err(KpiError::Validation(format!(
            "achieved value must be a non-negative number, got {value}"
        )));
    }
    let period = find_period_mut(periods, year, quarter)?;
    period.achieved = Some(value);
    Ok(())
}

/// One history entry per period whose effective value changed between the
/// persisted and edited arrays; unchanged periods contribute nothing.
/// Periods are matched by (year, quarter); an edited period with no
/// persisted counterpart diffs against 0.
pub fn diff_history(
    original: &[PeriodProgress],
    edited: &[PeriodProgress],
    method: TrackingMethod,
    acting_user: Uuid,
    now: DateTime<Utc>,
) -> Vec<HistoryEntry> {
    let note = match method {
        TrackingMethod::Weekly => NOTE_WEEKLY,
        TrackingMethod::Direct => NOTE_DIRECT,
    };

    edited
        .iter()
        .filter_map(|period| {
            let old_value = original
                .iter()
                .find(|p| p.year == period.year && p.quarter == period.quarter)
                .map(|p| effective_achieved(p, method))
                .unwrap_or(0.0);
            let new_value = effective_achieved(period, method);
            if new_value == old_value {
                return None;
            }
            Some(HistoryEntry {
                user_id: acting_user,
                year: period.year.clone(),
                quarter: period.quarter,
                old_value,
                new_value,
                note: note.to_string(),
                changed_at: now,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weekly_period(year: &str, quarter: Quarter) -> PeriodProgress {
        PeriodProgress::new_weekly(year.to_string(), quarter, 100.0, None)
    }

    fn direct_period(year: &str, quarter: Quarter, achieved: f64) -> PeriodProgress {
        let mut p = PeriodProgress::new_direct(year.to_string(), quarter, 100.0, None);
        p.achieved = Some(achieved);
        p
    }

    #[test]
    fn weekly_total_tracks_sum_of_weeks() {
        let mut periods = vec![weekly_period("2025", Quarter::Q1)];
        set_weekly_achieved(&mut periods, "2025", Quarter::Q1, 1, 4.0).unwrap();
        set_weekly_achieved(&mut periods, "2025", Quarter::Q1, 13, 6.0).unwrap();
        set_weekly_achieved(&mut periods, "2025", Quarter::Q1, 1, 2.0).unwrap();

        let period = &periods[0];
        let sum: f64 = period.weeks.as_ref().unwrap().iter().map(|w| w.achieved).sum();
        assert_eq!(period.weekly_total_achieved, Some(sum));
        assert_eq!(sum, 8.0);
    }

    #[test]
    fn unknown_week_or_period_is_rejected() {
        let mut periods = vec![weekly_period("2025", Quarter::Q1)];
        assert!(matches!(
            set_weekly_achieved(&mut periods, "2025", Quarter::Q1, 14, 1.0),
            Err(KpiError::NotFound(_))
        ));
        assert!(matches!(
            set_weekly_achieved(&mut periods, "2025", Quarter::Q2, 1, 1.0),
            Err(KpiError::NotFound(_))
        ));
    }

    #[test]
    fn negative_values_are_rejected() {
        let mut periods = vec![weekly_period("2025", Quarter::Q1)];
        assert!(matches!(
            set_weekly_achieved(&mut periods, "2025", Quarter::Q1, 1, -1.0),
            Err(KpiError::Validation(_))
        ));
        assert!(matches!(
            set_direct_achieved(&mut periods, "2025", Quarter::Q1, -0.5),
            Err(KpiError::Validation(_))
        ));
    }

    #[test]
    fn diff_appends_one_entry_per_changed_period() {
        let original = vec![
            direct_period("2025", Quarter::Q1, 10.0),
            direct_period("2025", Quarter::Q2, 20.0),
        ];
        let mut edited = original.clone();
        set_direct_achieved(&mut edited, "2025", Quarter::Q2, 25.0).unwrap();

        let user = Uuid::new_v4();
        let now = Utc::now();
        let entries = diff_history(&original, &edited, TrackingMethod::Direct, user, now);

        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.quarter, Quarter::Q2);
        assert_eq!(entry.old_value, 20.0);
        assert_eq!(entry.new_value, 25.0);
        assert_eq!(entry.note, NOTE_DIRECT);
        assert_eq!(entry.user_id, user);
        assert_eq!(entry.changed_at, now);
    }

    #[test]
    fn diff_is_empty_for_unchanged_periods() {
        let original = vec![direct_period("2025", Quarter::Q1, 10.0)];
        let edited = original.clone();
        let entries = diff_history(
            &original,
            &edited,
            TrackingMethod::Direct,
            Uuid::new_v4(),
            Utc::now(),
        );
        assert!(entries.is_empty());
    }

    #[test]
    fn weekly_diff_uses_weekly_totals_and_note() {
        let original = vec![weekly_period("2025", Quarter::Q3)];
        let mut edited = original.clone();
        set_weekly_achieved(&mut edited, "2025", Quarter::Q3, 5, 7.0).unwrap();

        let entries = diff_history(
            &original,
            &edited,
            TrackingMethod::Weekly,
            Uuid::new_v4(),
            Utc::now(),
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].old_value, 0.0);
        assert_eq!(entries[0].new_value, 7.0);
        assert_eq!(entries[0].note, NOTE_WEEKLY);
    }

    #[test]
    fn period_missing_from_original_diffs_against_zero() {
        let original: Vec<PeriodProgress> = vec![];
        let edited = vec![direct_period("2025", Quarter::Q4, 3.0)];
        let entries = diff_history(
            &original,
            &edited,
            TrackingMethod::Direct,
            Uuid::new_v4(),
            Utc::now(),
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].old_value, 0.0);
        assert_eq!(entries[0].new_value, 3.0);
    }
}

//! Cycle statistics and predictions.
//!
//! Everything here is a pure function of its inputs: the recorded cycle start
//! dates, the configured fallback cycle length, and an injected `today`. Nothing
//! reads the clock or touches storage, so the same inputs always produce the
//! same [`PredictionResult`] and the functions are safe to call from any number
//! of concurrent requests.

use crate::dates::CalendarDate;
use crate::error::DateError;
use crate::model::{DEFAULT_PREDICTION_COUNT, FertileWindow, PredictedCycle, PredictionResult};

/// Gaps at or below this many days are treated as logging noise.
const MIN_PLAUSIBLE_GAP: i64 = 5;

/// Gaps at or above this many days are treated as missing data.
const MAX_PLAUSIBLE_GAP: i64 = 120;

/// Bounds applied to an average computed from history.
const MIN_AVERAGE_CYCLE: i64 = 20;
const MAX_AVERAGE_CYCLE: i64 = 120;

/// Luteal phase length: ovulation falls this many days before the next start.
const LUTEAL_PHASE_DAYS: i64 = 14;

/// Offset of the fertile window's first day from the predicted start,
/// relative to the cycle length.
const FERTILE_START_BEFORE_NEXT: i64 = 18;

/// Offset of the fertile window's last day, relative to the cycle length.
const FERTILE_END_BEFORE_NEXT: i64 = 13;

/// Inputs to [`compute_stats`] besides the entries themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsOptions {
    /// Used when the history has no usable gaps. Expected to be positive.
    pub default_cycle_length: u32,

    /// Attach ovulation day and fertile window to each prediction.
    pub enable_ovulation: bool,

    /// Number of future cycle starts to project.
    pub prediction_count: usize,

    /// Reference day for `days_since_last` and `days_until_next`.
    pub today: CalendarDate,
}

impl StatsOptions {
    /// Options with the default prediction count and ovulation enabled.
    pub fn new(default_cycle_length: u32, today: CalendarDate) -> Self {
        Self {
            default_cycle_length,
            enable_ovulation: true,
            prediction_count: DEFAULT_PREDICTION_COUNT,
            today,
        }
    }
}

/// Compute statistics from raw `YYYY-MM-DD` strings.
///
/// Fails with [`DateError::InvalidDateFormat`] on the first string that is not
/// a real date. Input order does not matter; duplicates are not removed.
pub fn compute_stats<S: AsRef<str>>(
    entries: &[S],
    options: &StatsOptions,
) -> Result<PredictionResult, DateError> {
    let dates = entries
        .iter()
        .map(|s| CalendarDate::parse(s.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;

    compute_stats_for_dates(dates, options)
}

/// Compute statistics from already-parsed dates.
pub fn compute_stats_for_dates(
    mut entries: Vec<CalendarDate>,
    options: &StatsOptions,
) -> Result<PredictionResult, DateError> {
    entries.sort_unstable();

    let average_cycle_length = average_cycle_length(&entries, options.default_cycle_length);
    let predictions =
        predict_next_dates(&entries, average_cycle_length, options.prediction_count)?;

    let forecast = predictions
        .iter()
        .map(|&start| {
            if !options.enable_ovulation {
                return Ok(PredictedCycle {
                    start,
                    ovulation_date: None,
                    fertile_window: None,
                });
            }
            let (ovulation, window) = ovulation_and_fertile_window(start, average_cycle_length)?;
            Ok(PredictedCycle {
                start,
                ovulation_date: Some(ovulation),
                fertile_window: Some(window),
            })
        })
        .collect::<Result<Vec<_>, DateError>>()?;

    let last = entries.last().copied();
    let next_date = predictions.first().copied();

    Ok(PredictionResult {
        average_cycle_length,
        days_since_last: last.map(|d| d.diff_days(options.today)),
        days_until_next: next_date.map(|d| options.today.diff_days(d)),
        last,
        next_date,
        predictions,
        forecast,
        entries,
    })
}

/// Estimate a representative cycle length from ascending dates.
///
/// Gaps between adjacent dates outside `(5, 120)` are dropped. With no gaps
/// left, `fallback` is returned as-is. Otherwise the mean of the remaining
/// gaps is rounded half away from zero and clamped into `[20, 120]`.
pub fn average_cycle_length(sorted: &[CalendarDate], fallback: u32) -> u32 {
    let gaps: Vec<i64> = sorted
        .windows(2)
        .map(|w| w[0].diff_days(w[1]))
        .filter(|&gap| gap > MIN_PLAUSIBLE_GAP && gap < MAX_PLAUSIBLE_GAP)
        .collect();

    if gaps.is_empty() {
        return fallback;
    }

    let mean = gaps.iter().sum::<i64>() as f64 / gaps.len() as f64;
    clamp_average(mean.round() as i64)
}

fn clamp_average(days: i64) -> u32 {
    // Bounds are small positive constants, so the cast cannot truncate
    days.clamp(MIN_AVERAGE_CYCLE, MAX_AVERAGE_CYCLE) as u32
}

/// Project `count` cycle starts after the latest of `sorted`, soonest first.
///
/// Prediction `i` (1-based) is `average_cycle_length * i` days after the last
/// entry. Empty history yields no predictions.
pub fn predict_next_dates(
    sorted: &[CalendarDate],
    average_cycle_length: u32,
    count: usize,
) -> Result<Vec<CalendarDate>, DateError> {
    let Some(&last) = sorted.last() else {
        return Ok(Vec::new());
    };

    let step = i64::from(average_cycle_length);
    (1..=count as i64)
        .map(|i| last.add_days(step * i))
        .collect()
}

/// Ovulation day and fertile window for a cycle starting at `start` with the
/// given length.
///
/// Ovulation is `L - 14` days after `start`; the window runs from `L - 18` to
/// `L - 13`. For `L < 18` the window begins before `start`, which is left as is.
pub fn ovulation_and_fertile_window(
    start: CalendarDate,
    cycle_length: u32,
) -> Result<(CalendarDate, FertileWindow), DateError> {
    let length = i64::from(cycle_length);
    let ovulation = start.add_days(length - LUTEAL_PHASE_DAYS)?;
    let window = FertileWindow {
        start: start.add_days(length - FERTILE_START_BEFORE_NEXT)?,
        end: start.add_days(length - FERTILE_END_BEFORE_NEXT)?,
    };
    Ok((ovulation, window))
}

//! Journal analytics.
//!
//! Every query reads entries through the [`EntryStore`] and reduces them in
//! memory. The reducers are plain functions over entry slices so the date
//! math can be tested without a store. A store failure fails the whole query;
//! nothing partial is returned.

use std::collections::{BTreeMap, HashSet};

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::entry::{Entry, Feeling};
use crate::store::{DateRange, EntryStore};

const DEFAULT_PERIOD_DAYS: i64 = 30;
const WEEKLY_REPORT_DAYS: i64 = 7;
const TOP_FEELINGS: usize = 3;

/// Lookback window selected by the `period` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Week,
    Month,
    Quarter,
    Year,
}

impl Period {
    /// Unknown or missing tokens fall back to 30 days.
    pub fn from_token(token: Option<&str>) -> Self {
        match token {
            Some("7days") => Period::Week,
            Some("90days") => Period::Quarter,
            Some("year") => Period::Year,
            _ => Period::Month,
        }
    }

    pub fn days(self) -> i64 {
        match self {
            Period::Week => 7,
            Period::Month => DEFAULT_PERIOD_DAYS,
            Period::Quarter => 90,
            Period::Year => 365,
        }
    }
}

/// The `days` calendar days ending on `today`, inclusive.
pub fn window(today: NaiveDate, days: i64) -> DateRange {
    DateRange::between(today - Duration::days(days.max(1) - 1), today)
}

// ============================================================================
// Response shapes
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_entries: i64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub average_mood: f64,
    pub average_water_intake: f64,
    pub average_sleep_hours: f64,
    pub completion_rate: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoodPoint {
    pub date: NaiveDate,
    pub mood: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyPoint {
    pub hour: u8,
    pub average_energy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapDay {
    pub date: NaiveDate,
    pub completion_rate: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeelingCount {
    pub feeling: Feeling,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyReport {
    pub days_logged: usize,
    pub average_mood: f64,
    pub average_water_intake: f64,
    pub average_sleep_hours: f64,
    pub top_feelings: Vec<FeelingCount>,
}

// ============================================================================
// Reducers
// ============================================================================

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Mean of the present values, to one decimal. Zero when nothing is present.
pub fn average<I>(values: I) -> f64
where
    I: IntoIterator<Item = Option<f64>>,
{
    let (sum, count) = values
        .into_iter()
        .flatten()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        round1(sum / count as f64)
    }
}

/// Consecutive days with an entry, walking back from `today`.
/// Zero when there is no entry today.
pub fn current_streak<I>(dates: I, today: NaiveDate) -> u32
where
    I: IntoIterator<Item = NaiveDate>,
{
    let logged: HashSet<NaiveDate> = dates.into_iter().collect();
    let mut streak = 0;
    let mut check = today;
    while logged.contains(&check) {
        streak += 1;
        check -= Duration::days(1);
    }
    streak
}

pub fn longest_streak<I>(dates: I) -> u32
where
    I: IntoIterator<Item = NaiveDate>,
{
    let mut sorted: Vec<NaiveDate> = dates.into_iter().collect();
    sorted.sort();
    sorted.dedup();

    let mut longest = 0;
    let mut run = 0;
    let mut prev: Option<NaiveDate> = None;
    for date in sorted {
        run = match prev {
            Some(p) if date == p + Duration::days(1) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        prev = Some(date);
    }
    longest
}

struct Averages {
    mood: f64,
    water_intake: f64,
    sleep_hours: f64,
}

fn averages(entries: &[Entry]) -> Averages {
    Averages {
        mood: average(entries.iter().map(|e| e.content.trackers.mood.map(f64::from))),
        water_intake: average(
            entries
                .iter()
                .map(|e| Some(f64::from(e.content.trackers.water_intake))),
        ),
        sleep_hours: average(entries.iter().map(|e| e.content.trackers.sleep_hours)),
    }
}

/// `windowed` are the entries inside the period; `all_dates` every day the
/// user has journaled.
pub fn summarize(
    total_entries: i64,
    windowed: &[Entry],
    all_dates: &[NaiveDate],
    today: NaiveDate,
) -> Summary {
    let avg = averages(windowed);
    let completion_rate = if windowed.is_empty() {
        0
    } else {
        let total: u32 = windowed
            .iter()
            .map(|e| u32::from(e.content.completion_percentage()))
            .sum();
        (total as f64 / windowed.len() as f64).round() as u8
    };

    Summary {
        total_entries,
        current_streak: current_streak(all_dates.iter().copied(), today),
        longest_streak: longest_streak(all_dates.iter().copied()),
        average_mood: avg.mood,
        average_water_intake: avg.water_intake,
        average_sleep_hours: avg.sleep_hours,
        completion_rate,
    }
}

pub fn mood_trend(entries: &[Entry]) -> Vec<MoodPoint> {
    let mut points: Vec<MoodPoint> = entries
        .iter()
        .filter_map(|e| {
            e.content.trackers.mood.map(|mood| MoodPoint {
                date: e.date,
                mood,
            })
        })
        .collect();
    points.sort_by_key(|p| p.date);
    points
}

pub fn energy_by_hour(entries: &[Entry]) -> Vec<EnergyPoint> {
    let mut hours: BTreeMap<u8, (f64, u32)> = BTreeMap::new();
    for reading in entries.iter().flat_map(|e| &e.content.trackers.energy_levels) {
        let slot = hours.entry(reading.time).or_insert((0.0, 0));
        slot.0 += f64::from(reading.energy);
        slot.1 += 1;
    }

    hours
        .into_iter()
        .map(|(hour, (sum, count))| EnergyPoint {
            hour,
            average_energy: round1(sum / f64::from(count)),
        })
        .collect()
}

/// One element per day of `year`; days without an entry are zero.
pub fn heatmap(year: i32, entries: &[Entry]) -> AppResult<Vec<HeatmapDay>> {
    let (start, end) = year_bounds(year)?;
    let rates: BTreeMap<NaiveDate, u8> = entries
        .iter()
        .map(|e| (e.date, e.content.section_completion_rate()))
        .collect();

    Ok(start
        .iter_days()
        .take_while(|d| *d <= end)
        .map(|date| HeatmapDay {
            date,
            completion_rate: rates.get(&date).copied().unwrap_or(0),
        })
        .collect())
}

/// Most frequent feelings, primary and additional, highest count first.
/// Equal counts keep the order in which the feelings were first seen.
pub fn top_feelings(entries: &[Entry], limit: usize) -> Vec<FeelingCount> {
    let mut counts: Vec<FeelingCount> = Vec::new();
    for feeling in entries.iter().flat_map(|e| e.content.feelings()) {
        match counts.iter_mut().find(|c| c.feeling == feeling) {
            Some(c) => c.count += 1,
            None => counts.push(FeelingCount { feeling, count: 1 }),
        }
    }
    // Stable sort preserves first-seen order among ties
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(limit);
    counts
}

pub fn weekly_report(entries: &[Entry]) -> WeeklyReport {
    let avg = averages(entries);
    WeeklyReport {
        days_logged: entries.len(),
        average_mood: avg.mood,
        average_water_intake: avg.water_intake,
        average_sleep_hours: avg.sleep_hours,
        top_feelings: top_feelings(entries, TOP_FEELINGS),
    }
}

fn year_bounds(year: i32) -> AppResult<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1);
    let end = NaiveDate::from_ymd_opt(year, 12, 31);
    match (start, end) {
        (Some(s), Some(e)) => Ok((s, e)),
        _ => Err(AppError::Validation(format!("Year {} is out of range", year))),
    }
}

// ============================================================================
// Queries
// ============================================================================

pub async fn summary<S: EntryStore + ?Sized>(
    store: &S,
    user_id: Uuid,
    period: Period,
    today: NaiveDate,
) -> AppResult<Summary> {
    let windowed = store
        .list_entries(user_id, window(today, period.days()))
        .await?;
    let all = store.list_entries(user_id, DateRange::all()).await?;
    let all_dates: Vec<NaiveDate> = all.iter().map(|e| e.date).collect();

    Ok(summarize(all.len() as i64, &windowed, &all_dates, today))
}

pub async fn mood_trends<S: EntryStore + ?Sized>(
    store: &S,
    user_id: Uuid,
    period: Period,
    today: NaiveDate,
) -> AppResult<Vec<MoodPoint>> {
    let entries = store
        .list_entries(user_id, window(today, period.days()))
        .await?;
    Ok(mood_trend(&entries))
}

pub async fn energy_patterns<S: EntryStore + ?Sized>(
    store: &S,
    user_id: Uuid,
) -> AppResult<Vec<EnergyPoint>> {
    let entries = store.list_entries(user_id, DateRange::all()).await?;
    Ok(energy_by_hour(&entries))
}

pub async fn activity_heatmap<S: EntryStore + ?Sized>(
    store: &S,
    user_id: Uuid,
    year: i32,
) -> AppResult<Vec<HeatmapDay>> {
    let (start, end) = year_bounds(year)?;
    let entries = store
        .list_entries(user_id, DateRange::between(start, end))
        .await?;
    heatmap(year, &entries)
}

pub async fn weekly<S: EntryStore + ?Sized>(
    store: &S,
    user_id: Uuid,
    today: NaiveDate,
) -> AppResult<WeeklyReport> {
    let entries = store
        .list_entries(user_id, window(today, WEEKLY_REPORT_DAYS))
        .await?;
    Ok(weekly_report(&entries))
}

/// Year used by the heatmap when the request names none or an unparsable one.
pub fn year_or_current(raw: Option<&str>, today: NaiveDate) -> i32 {
    raw.and_then(|y| y.trim().parse::<i32>().ok())
        .filter(|y| *y > 0)
        .unwrap_or_else(|| today.year())
}

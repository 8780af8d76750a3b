//! Aggregation of canonical trips by day, mode and user
//!
//! Every aggregation is a single pass over the trips. Daily series are
//! ordered by date ascending; mode and user summaries are ordered by total
//! descending with the key as tie-breaker so output is deterministic.

use crate::domain::aggregate::{DailyAggregate, DayModeTotal, ModeSummary, UserSummary};
use crate::domain::trip::CanonicalTrip;
use crate::domain::types::{TransportMode, UserId};
use chrono::{Duration, NaiveDate};
use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Date range and mode filter applied before aggregation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TripFilter {
    /// First included date (UTC)
    pub from: Option<NaiveDate>,
    /// Last included date (UTC)
    pub to: Option<NaiveDate>,
    /// Included modes; empty means all
    pub modes: Vec<TransportMode>,
}

impl TripFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_date(mut self, date: NaiveDate) -> Self {
        self.from = Some(date);
        self
    }

    pub fn to_date(mut self, date: NaiveDate) -> Self {
        self.to = Some(date);
        self
    }

    pub fn with_modes(mut self, modes: Vec<TransportMode>) -> Self {
        self.modes = modes;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.from.is_none() && self.to.is_none() && self.modes.is_empty()
    }

    pub fn matches(&self, trip: &CanonicalTrip) -> bool {
        let date = trip.date();
        self.from.map_or(true, |from| date >= from)
            && self.to.map_or(true, |to| date <= to)
            && (self.modes.is_empty() || self.modes.contains(&trip.mode))
    }
}

/// Trips passing the filter, in input order
pub fn filter_trips(trips: &[CanonicalTrip], filter: &TripFilter) -> Vec<CanonicalTrip> {
    trips.iter().filter(|t| filter.matches(t)).cloned().collect()
}

/// One aggregate per date that has at least one trip, dates ascending
pub fn aggregate_by_day(trips: &[CanonicalTrip]) -> Vec<DailyAggregate> {
    let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for trip in trips {
        *by_date.entry(trip.date()).or_insert(0.0) += trip.emission_kg;
    }
    by_date.into_iter().map(|(date, kg)| DailyAggregate::new(date, kg)).collect()
}

/// Like `aggregate_by_day`, with zero-emission days inserted for gaps
/// between the first and last observed date
pub fn aggregate_by_day_zero_filled(trips: &[CanonicalTrip]) -> Vec<DailyAggregate> {
    zero_fill(&aggregate_by_day(trips))
}

/// Insert zero days into a date-ascending series
pub fn zero_fill(daily: &[DailyAggregate]) -> Vec<DailyAggregate> {
    let (Some(first), Some(last)) = (daily.first(), daily.last()) else {
        return Vec::new();
    };

    let mut filled = Vec::with_capacity((last.date - first.date).num_days() as usize + 1);
    let mut observed = daily.iter().peekable();
    let mut date = first.date;
    loop {
        match observed.peek() {
            Some(day) if day.date == date => {
                filled.push((*day).clone());
                observed.next();
            }
            _ => filled.push(DailyAggregate::new(date, 0.0)),
        }
        match date.succ_opt() {
            Some(next) if next <= last.date => date = next,
            _ => break,
        }
    }
    filled
}

pub fn aggregate_by_mode(trips: &[CanonicalTrip]) -> Vec<ModeSummary> {
    let mut by_mode: FxHashMap<&TransportMode, (f64, usize)> = FxHashMap::default();
    for trip in trips {
        let entry = by_mode.entry(&trip.mode).or_insert((0.0, 0));
        entry.0 += trip.emission_kg;
        entry.1 += 1;
    }

    let mut summaries: Vec<ModeSummary> = by_mode
        .into_iter()
        .map(|(mode, (emission_kg, trips))| ModeSummary { mode: mode.clone(), emission_kg, trips })
        .collect();
    summaries.sort_by(|a, b| by_total_desc(a.emission_kg, b.emission_kg).then_with(|| a.mode.cmp(&b.mode)));
    summaries
}

pub fn aggregate_by_user(trips: &[CanonicalTrip]) -> Vec<UserSummary> {
    let mut by_user: FxHashMap<&UserId, (f64, usize)> = FxHashMap::default();
    for trip in trips {
        let entry = by_user.entry(&trip.user_id).or_insert((0.0, 0));
        entry.0 += trip.emission_kg;
        entry.1 += 1;
    }

    let mut summaries: Vec<UserSummary> = by_user
        .into_iter()
        .map(|(user, (emission_kg, trips))| UserSummary { user_id: user.clone(), emission_kg, trips })
        .collect();
    summaries
        .sort_by(|a, b| by_total_desc(a.emission_kg, b.emission_kg).then_with(|| a.user_id.cmp(&b.user_id)));
    summaries
}

/// Per-date, per-mode totals (stacked daily breakdown).
/// Dates ascending, modes in name order within a date.
pub fn aggregate_by_day_and_mode(trips: &[CanonicalTrip]) -> Vec<DayModeTotal> {
    let mut cells: BTreeMap<(NaiveDate, &str), (&TransportMode, f64)> = BTreeMap::new();
    for trip in trips {
        cells.entry((trip.date(), trip.mode.as_str())).or_insert((&trip.mode, 0.0)).1 += trip.emission_kg;
    }
    cells
        .into_iter()
        .map(|((date, _), (mode, emission_kg))| DayModeTotal { date, mode: mode.clone(), emission_kg })
        .collect()
}

/// The `k` highest-emission days, ties broken by earliest date
pub fn top_k(daily: &[DailyAggregate], k: usize) -> Vec<DailyAggregate> {
    let mut ranked = daily.to_vec();
    ranked.sort_by(|a, b| by_total_desc(a.emission_kg, b.emission_kg).then_with(|| a.date.cmp(&b.date)));
    ranked.truncate(k);
    ranked
}

/// Total emission over the last `days` calendar days ending at the last
/// observed date
pub fn recent_total(daily: &[DailyAggregate], days: u32) -> f64 {
    let Some(last) = daily.iter().map(|d| d.date).max() else {
        return 0.0;
    };
    if days == 0 {
        return 0.0;
    }
    // A window reaching past the earliest representable date covers everything
    match last.checked_sub_signed(Duration::days(i64::from(days) - 1)) {
        Some(cutoff) => daily.iter().filter(|d| d.date >= cutoff).map(|d| d.emission_kg).sum(),
        None => daily.iter().map(|d| d.emission_kg).sum(),
    }
}

pub fn total_emission(trips: &[CanonicalTrip]) -> f64 {
    trips.iter().map(|t| t.emission_kg).sum()
}

#[inline]
fn by_total_desc(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn trip(day: u32, hour: u32, mode: TransportMode, user: &str, kg: f64) -> CanonicalTrip {
        CanonicalTrip {
            timestamp: Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap(),
            mode,
            user_id: UserId(user.to_string()),
            distance_km: kg * 10.0,
            emission_kg: kg,
        }
    }

    fn sample_trips() -> Vec<CanonicalTrip> {
        vec![
            trip(3, 8, TransportMode::Bus, "user_1", 0.4),
            trip(1, 8, TransportMode::Train, "user_1", 0.1),
            trip(1, 18, TransportMode::Bus, "user_2", 0.3),
            trip(5, 12, TransportMode::Tram, "user_3", 0.2),
            trip(3, 23, TransportMode::Train, "user_2", 0.1),
        ]
    }

    #[test]
    fn test_aggregate_by_day_sorted_without_gaps_filled() {
        let daily = aggregate_by_day(&sample_trips());
        let dates: Vec<NaiveDate> = daily.iter().map(|d| d.date).collect();
        assert_eq!(dates, vec![date(2024, 3, 1), date(2024, 3, 3), date(2024, 3, 5)]);
        assert!(dates.windows(2).all(|w| w[0] < w[1]));
        assert!((daily[0].emission_kg - 0.4).abs() < 1e-12);
        assert!((daily[1].emission_kg - 0.5).abs() < 1e-12);
        assert!(daily.iter().all(|d| d.label.is_none() && d.forecast_kg.is_none()));
    }

    #[test]
    fn test_zero_filled_inserts_missing_days() {
        let daily = aggregate_by_day_zero_filled(&sample_trips());
        assert_eq!(daily.len(), 5);
        assert_eq!(daily[1].date, date(2024, 3, 2));
        assert_eq!(daily[1].emission_kg, 0.0);
        assert_eq!(daily[3].emission_kg, 0.0);
        assert!(aggregate_by_day_zero_filled(&[]).is_empty());
    }

    #[test]
    fn test_aggregate_by_mode_unique_keys() {
        let modes = aggregate_by_mode(&sample_trips());
        assert_eq!(modes.len(), 3);
        assert_eq!(modes[0].mode, TransportMode::Bus);
        assert!((modes[0].emission_kg - 0.7).abs() < 1e-12);
        assert_eq!(modes[0].trips, 2);
        let total: f64 = modes.iter().map(|m| m.emission_kg).sum();
        assert!((total - total_emission(&sample_trips())).abs() < 1e-12);
    }

    #[test]
    fn test_aggregate_by_user() {
        let users = aggregate_by_user(&sample_trips());
        assert_eq!(users.len(), 3);
        assert_eq!(users[0].user_id.as_str(), "user_1");
        assert!((users[0].emission_kg - 0.5).abs() < 1e-12);
        assert_eq!(users[1].user_id.as_str(), "user_2");
        assert_eq!(users[1].trips, 2);
    }

    #[test]
    fn test_aggregate_by_day_and_mode() {
        let cells = aggregate_by_day_and_mode(&sample_trips());
        assert_eq!(cells.len(), 5);
        assert_eq!(cells[0].date, date(2024, 3, 1));
        assert_eq!(cells[0].mode, TransportMode::Bus);
        assert_eq!(cells[1].mode, TransportMode::Train);
    }

    #[test]
    fn test_top_k_orders_and_breaks_ties_by_date() {
        let daily = vec![
            DailyAggregate::new(date(2024, 3, 1), 1.0),
            DailyAggregate::new(date(2024, 3, 2), 3.0),
            DailyAggregate::new(date(2024, 3, 3), 2.0),
            DailyAggregate::new(date(2024, 3, 4), 3.0),
        ];

        let top = top_k(&daily, 3);
        let dates: Vec<NaiveDate> = top.iter().map(|d| d.date).collect();
        assert_eq!(dates, vec![date(2024, 3, 2), date(2024, 3, 4), date(2024, 3, 3)]);

        assert_eq!(top_k(&daily, 10).len(), 4);
        assert!(top_k(&daily, 0).is_empty());
        assert!(top_k(&[], 5).is_empty());
    }

    #[test]
    fn test_recent_total_uses_calendar_window() {
        let daily = aggregate_by_day(&sample_trips());
        // Window of 3 days ending 2024-03-05 covers 03-03..03-05
        assert!((recent_total(&daily, 3) - 0.7).abs() < 1e-12);
        assert!((recent_total(&daily, 7) - 1.1).abs() < 1e-12);
        assert_eq!(recent_total(&daily, 0), 0.0);
        assert_eq!(recent_total(&[], 7), 0.0);
        assert!((recent_total(&daily, u32::MAX) - total_emission(&sample_trips())).abs() < 1e-12);
    }

    #[test]
    fn test_zero_fill_at_end_of_calendar() {
        let daily = vec![
            DailyAggregate::new(NaiveDate::MAX.pred_opt().unwrap(), 1.0),
            DailyAggregate::new(NaiveDate::MAX, 2.0),
        ];
        let filled = zero_fill(&daily);
        assert_eq!(filled.len(), 2);
        assert_eq!(filled[1].date, NaiveDate::MAX);
    }

    #[test]
    fn test_filter_by_date_range_and_mode() {
        let trips = sample_trips();

        let filter = TripFilter::new().from_date(date(2024, 3, 2)).to_date(date(2024, 3, 3));
        assert_eq!(filter_trips(&trips, &filter).len(), 2);

        let filter = TripFilter::new().with_modes(vec![TransportMode::Train]);
        let trains = filter_trips(&trips, &filter);
        assert_eq!(trains.len(), 2);
        assert!(trains.iter().all(|t| t.mode == TransportMode::Train));

        assert!(TripFilter::new().is_empty());
        assert_eq!(filter_trips(&trips, &TripFilter::new()).len(), trips.len());
    }
}

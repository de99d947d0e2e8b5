// src/variation.rs

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::model::{EnrichedRecord, RawRecord};

/// Days back from the latest date to look for the comparison baseline.
pub const VARIATION_WINDOW_DAYS: i64 = 30;

/// National sums over a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub confirmed: u64,
    pub deaths: u64,
}

pub fn totals(records: &[EnrichedRecord]) -> Totals {
    records.iter().fold(Totals::default(), |acc, r| Totals {
        confirmed: acc.confirmed.saturating_add(r.confirmed),
        deaths: acc.deaths.saturating_add(r.deaths),
    })
}

/// Percentage change in total confirmed cases between the latest date and
/// the most recent date at least 30 days earlier, rounded to 2 decimals.
///
/// Expects aggregate rows already removed. `None` when the history is too
/// short or the baseline total is zero.
pub fn monthly_variation(records: &[RawRecord]) -> Option<f64> {
    let mut by_date: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for r in records {
        let total = by_date.entry(r.date).or_default();
        *total = total.saturating_add(r.confirmed);
    }

    let (&latest, &current) = by_date.iter().next_back()?;
    let cutoff = latest - Duration::days(VARIATION_WINDOW_DAYS);
    let (_, &previous) = by_date.range(..=cutoff).next_back()?;
    if previous == 0 {
        return None;
    }

    let pct = (current as f64 - previous as f64) / previous as f64 * 100.0;
    let rounded = (pct * 100.0).round() / 100.0;
    // no "-0.0" for changes too small to show
    Some(if rounded == 0.0 { 0.0 } else { rounded })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(region: &str, date: (i32, u32, u32), confirmed: u64) -> RawRecord {
        RawRecord {
            region: region.into(),
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            confirmed,
            deaths: 0,
            confirmed_per_100k: None,
        }
    }

    #[test]
    fn compares_latest_with_thirty_days_earlier() {
        let rows = vec![
            raw("AA", (2024, 1, 1), 100),
            raw("BB", (2024, 1, 1), 100),
            raw("AA", (2024, 1, 20), 140),
            raw("BB", (2024, 1, 20), 140),
            raw("AA", (2024, 2, 5), 150),
            raw("BB", (2024, 2, 5), 100),
        ];
        // baseline is 2024-01-01 (the 20th is inside the window)
        assert_eq!(monthly_variation(&rows), Some(25.0));
    }

    #[test]
    fn rounds_to_two_decimals() {
        let rows = vec![raw("AA", (2024, 1, 1), 3), raw("AA", (2024, 3, 1), 4)];
        assert_eq!(monthly_variation(&rows), Some(33.33));
    }

    #[test]
    fn negative_change_is_reported() {
        let rows = vec![raw("AA", (2024, 1, 1), 200), raw("AA", (2024, 2, 1), 150)];
        assert_eq!(monthly_variation(&rows), Some(-25.0));
    }

    #[test]
    fn short_history_or_zero_baseline_is_none() {
        let short = vec![raw("AA", (2024, 1, 1), 10), raw("AA", (2024, 1, 15), 20)];
        assert_eq!(monthly_variation(&short), None);

        let zero = vec![raw("AA", (2024, 1, 1), 0), raw("AA", (2024, 3, 1), 20)];
        assert_eq!(monthly_variation(&zero), None);

        assert_eq!(monthly_variation(&[]), None);
    }

    #[test]
    fn tiny_decrease_rounds_to_positive_zero() {
        let rows = vec![
            raw("AA", (2024, 1, 1), 1_000_000),
            raw("AA", (2024, 3, 1), 999_990),
        ];
        let v = monthly_variation(&rows).expect("baseline present");
        assert_eq!(v, 0.0);
        assert!(v.is_sign_positive());
    }

    #[test]
    fn huge_counts_saturate_instead_of_overflowing() {
        let rows = vec![
            raw("AA", (2024, 1, 1), u64::MAX),
            raw("BB", (2024, 1, 1), 10),
            raw("AA", (2024, 3, 1), u64::MAX),
            raw("BB", (2024, 3, 1), 20),
        ];
        assert_eq!(monthly_variation(&rows), Some(0.0));

        let recs: Vec<EnrichedRecord> = [u64::MAX, 5]
            .into_iter()
            .map(|n| EnrichedRecord {
                region: "X".into(),
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                confirmed: n,
                deaths: n,
                population: None,
                mortality_rate: 0.0,
                incidence: None,
            })
            .collect();
        assert_eq!(
            totals(&recs),
            Totals {
                confirmed: u64::MAX,
                deaths: u64::MAX
            }
        );
    }

    #[test]
    fn totals_sum_the_snapshot() {
        let recs: Vec<EnrichedRecord> = [(100u64, 10u64), (200, 5), (0, 0)]
            .into_iter()
            .map(|(confirmed, deaths)| EnrichedRecord {
                region: "X".into(),
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                confirmed,
                deaths,
                population: None,
                mortality_rate: 0.0,
                incidence: None,
            })
            .collect();
        assert_eq!(
            totals(&recs),
            Totals {
                confirmed: 300,
                deaths: 15
            }
        );
    }
}

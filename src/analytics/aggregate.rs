//! Descriptive aggregates behind the trend views.
//!
//! Every function is pure over borrowed records and returns freshly
//! allocated rows in a deterministic order.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, Days, NaiveDate};
use serde::Serialize;

use crate::store::{CampusId, ConsumptionRecord, Resource, ResourceTriple, TimeSeriesStore};

/// Total consumption of one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub total: f64,
}

/// Total consumption of one campus in one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyTotal {
    pub year: i32,
    pub month: u32,
    pub campus_id: CampusId,
    pub total: f64,
}

/// Mean consumption per hour-of-day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HourlyMean {
    pub hour: u32,
    pub mean: f64,
}

/// Mean consumption per weekday (rows, Monday first) and hour (columns).
///
/// Cells without data are `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekdayHourHeatmap {
    pub cells: [[Option<f64>; 24]; 7],
}

/// Peak and off-peak sums of one day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyPeakSplit {
    pub date: NaiveDate,
    pub peak: f64,
    pub off_peak: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakComparison {
    pub days: Vec<DailyPeakSplit>,
    pub peak_total: f64,
    pub off_peak_total: f64,
    /// `peak_total / off_peak_total`; `None` when nothing was used off-peak.
    pub ratio: Option<f64>,
}

/// Relative efficiency of a campus: lowest campus mean over this campus mean.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EfficiencyScore {
    pub campus_id: CampusId,
    pub mean: f64,
    /// In `(0, 1]`, with 1 for the most efficient campus.
    pub score: f64,
}

/// CO₂ of one campus per resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Co2Breakdown {
    pub campus_id: CampusId,
    pub by_resource: ResourceTriple<f64>,
    pub total: f64,
}

pub fn daily_totals<'a, I>(records: I) -> Vec<DailyTotal>
where
    I: IntoIterator<Item = &'a ConsumptionRecord>,
{
    let mut by_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for r in records {
        *by_day.entry(r.day).or_default() += r.consumption;
    }
    by_day
        .into_iter()
        .map(|(date, total)| DailyTotal { date, total })
        .collect()
}

/// Daily totals of the last `days` calendar days, counted back from the
/// latest reading.
pub fn recent_daily_totals<'a, I>(records: I, days: u64) -> Vec<DailyTotal>
where
    I: IntoIterator<Item = &'a ConsumptionRecord>,
{
    let all = daily_totals(records);
    let Some(last) = all.last().map(|d| d.date) else {
        return all;
    };
    if days == 0 {
        return Vec::new();
    }
    let first = last.checked_sub_days(Days::new(days - 1)).unwrap_or(NaiveDate::MIN);
    all.into_iter().filter(|d| d.date >= first).collect()
}

pub fn totals_by_campus<'a, I>(records: I) -> BTreeMap<CampusId, f64>
where
    I: IntoIterator<Item = &'a ConsumptionRecord>,
{
    let mut totals: BTreeMap<CampusId, f64> = BTreeMap::new();
    for r in records {
        *totals.entry(r.campus_id.clone()).or_default() += r.consumption;
    }
    totals
}

/// Monthly totals ordered by (year, month, campus).
pub fn monthly_by_campus<'a, I>(records: I) -> Vec<MonthlyTotal>
where
    I: IntoIterator<Item = &'a ConsumptionRecord>,
{
    let mut totals: BTreeMap<(i32, u32, &str), f64> = BTreeMap::new();
    for r in records {
        *totals
            .entry((r.day.year(), r.month, r.campus_id.as_str()))
            .or_default() += r.consumption;
    }
    totals
        .into_iter()
        .map(|((year, month, campus), total)| MonthlyTotal {
            year,
            month,
            campus_id: campus.to_string(),
            total,
        })
        .collect()
}

/// Mean per hour-of-day, only for hours with data.
pub fn hourly_mean<'a, I>(records: I) -> Vec<HourlyMean>
where
    I: IntoIterator<Item = &'a ConsumptionRecord>,
{
    let mut acc: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
    for r in records {
        let e = acc.entry(r.hour).or_default();
        e.0 += r.consumption;
        e.1 += 1;
    }
    acc.into_iter()
        .map(|(hour, (sum, n))| HourlyMean {
            hour,
            mean: sum / n as f64,
        })
        .collect()
}

pub fn weekday_hour_heatmap<'a, I>(records: I) -> WeekdayHourHeatmap
where
    I: IntoIterator<Item = &'a ConsumptionRecord>,
{
    let mut sums = [[(0.0_f64, 0_usize); 24]; 7];
    for r in records {
        let cell = &mut sums[r.weekday.num_days_from_monday() as usize][r.hour as usize];
        cell.0 += r.consumption;
        cell.1 += 1;
    }
    WeekdayHourHeatmap {
        cells: sums.map(|row| row.map(|(sum, n)| (n > 0).then(|| sum / n as f64))),
    }
}

/// Splits each day's consumption into `peak_hours` and the rest.
pub fn peak_vs_off_peak<'a, I>(records: I, peak_hours: &BTreeSet<u32>) -> PeakComparison
where
    I: IntoIterator<Item = &'a ConsumptionRecord>,
{
    let mut by_day: BTreeMap<NaiveDate, (f64, f64)> = BTreeMap::new();
    for r in records {
        let e = by_day.entry(r.day).or_default();
        if peak_hours.contains(&r.hour) {
            e.0 += r.consumption;
        } else {
            e.1 += r.consumption;
        }
    }
    let days: Vec<DailyPeakSplit> = by_day
        .into_iter()
        .map(|(date, (peak, off_peak))| DailyPeakSplit {
            date,
            peak,
            off_peak,
        })
        .collect();
    let peak_total = days.iter().map(|d| d.peak).sum::<f64>();
    let off_peak_total = days.iter().map(|d| d.off_peak).sum::<f64>();
    PeakComparison {
        ratio: (off_peak_total > 0.0).then(|| peak_total / off_peak_total),
        days,
        peak_total,
        off_peak_total,
    }
}

/// Efficiency of every campus with data for `resource`, ascending by campus.
///
/// A campus with zero mean consumption scores 1.
pub fn efficiency_scores(store: &TimeSeriesStore, resource: Resource) -> Vec<EfficiencyScore> {
    let means: Vec<(CampusId, f64)> = store
        .partitions(resource)
        .filter(|(_, series)| !series.is_empty())
        .map(|(id, series)| {
            let sum = series.iter().map(|r| r.consumption).sum::<f64>();
            (id.clone(), sum / series.len() as f64)
        })
        .collect();
    let Some(best) = means.iter().map(|(_, m)| *m).reduce(f64::min) else {
        return Vec::new();
    };
    means
        .into_iter()
        .map(|(campus_id, mean)| EfficiencyScore {
            score: if mean > 0.0 { best / mean } else { 1.0 },
            campus_id,
            mean,
        })
        .collect()
}

/// CO₂ per campus and resource from full-history totals.
pub fn co2_breakdown(
    store: &TimeSeriesStore,
    emission_factors: &ResourceTriple<f64>,
) -> Vec<Co2Breakdown> {
    store
        .campuses()
        .into_iter()
        .map(|campus_id| {
            let snapshot = store.campus_snapshot(&campus_id);
            let by_resource =
                ResourceTriple::from_fn(|r| snapshot.totals.get(r) * emission_factors.get(r));
            Co2Breakdown {
                total: by_resource.total(),
                by_resource,
                campus_id,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDateTime, Weekday};

    use super::*;

    fn ts(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
            .expect("valid timestamp")
    }

    fn rec(campus: &str, day: u32, hour: u32, value: f64) -> ConsumptionRecord {
        ConsumptionRecord::new(ts(day, hour), campus, value)
    }

    fn sample() -> Vec<ConsumptionRecord> {
        vec![
            rec("A", 1, 2, 5.0),
            rec("A", 1, 8, 20.0),
            rec("B", 1, 8, 10.0),
            rec("A", 2, 18, 30.0),
            rec("B", 3, 3, 1.0),
        ]
    }

    #[test]
    fn daily_totals_sum_per_date() {
        let totals = daily_totals(&sample());
        let values: Vec<f64> = totals.iter().map(|d| d.total).collect();
        assert_eq!(values, vec![35.0, 30.0, 1.0]);
    }

    #[test]
    fn recent_window_anchors_at_latest_day() {
        let recent = recent_daily_totals(&sample(), 2);
        let days: Vec<u32> = recent.iter().map(|d| d.date.day()).collect();
        assert_eq!(days, vec![2, 3]);
        assert!(recent_daily_totals(&sample(), 0).is_empty());
        assert_eq!(recent_daily_totals(&sample(), 30).len(), 3);
    }

    #[test]
    fn campus_and_month_totals() {
        let by_campus = totals_by_campus(&sample());
        assert_eq!(by_campus.get("A"), Some(&55.0));
        assert_eq!(by_campus.get("B"), Some(&11.0));

        let monthly = monthly_by_campus(&sample());
        assert_eq!(monthly.len(), 2);
        assert_eq!(monthly[0].campus_id, "A");
        assert_eq!(monthly[0].month, 1);
    }

    #[test]
    fn hourly_mean_and_heatmap() {
        let hourly = hourly_mean(&sample());
        assert_eq!(hourly.iter().find(|h| h.hour == 8).map(|h| h.mean), Some(15.0));

        let heat = weekday_hour_heatmap(&sample());
        // 2024-01-01 is a Monday
        assert_eq!(ts(1, 0).weekday(), Weekday::Mon);
        assert_eq!(heat.cells[0][8], Some(15.0));
        assert_eq!(heat.cells[0][9], None);
        assert_eq!(heat.cells[1][18], Some(30.0));
    }

    #[test]
    fn peak_split_uses_peak_hours() {
        let peak: BTreeSet<u32> = (6..=9).chain(17..=21).collect();
        let cmp = peak_vs_off_peak(&sample(), &peak);
        assert_eq!(cmp.peak_total, 60.0);
        assert_eq!(cmp.off_peak_total, 6.0);
        assert_eq!(cmp.ratio, Some(10.0));
        assert_eq!(cmp.days.len(), 3);

        let only_peak = vec![rec("A", 1, 8, 4.0)];
        assert_eq!(peak_vs_off_peak(&only_peak, &peak).ratio, None);
    }

    #[test]
    fn efficiency_relative_to_best_campus() {
        let mut store = TimeSeriesStore::new();
        store
            .extend(
                Resource::Electricity,
                vec![rec("A", 1, 0, 10.0), rec("A", 1, 1, 30.0), rec("B", 1, 0, 10.0)],
            )
            .expect("valid records");
        let scores = efficiency_scores(&store, Resource::Electricity);
        assert_eq!(scores[0].campus_id, "A");
        assert_eq!(scores[0].score, 0.5);
        assert_eq!(scores[1].score, 1.0);
        assert!(efficiency_scores(&store, Resource::Gas).is_empty());
    }

    #[test]
    fn co2_breakdown_applies_factors() {
        let mut store = TimeSeriesStore::new();
        store
            .extend(Resource::Electricity, vec![rec("A", 1, 0, 100.0)])
            .expect("valid records");
        store
            .extend(Resource::Gas, vec![rec("A", 1, 0, 10.0)])
            .expect("valid records");
        let rows = co2_breakdown(&store, &ResourceTriple::new(0.5, 2.0, 0.0));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].by_resource, ResourceTriple::new(50.0, 20.0, 0.0));
        assert_eq!(rows[0].total, 70.0);
    }
}

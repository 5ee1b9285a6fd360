//! In-memory consumption store partitioned by resource and campus.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use crate::error::{AnalyticsError, Result};

use super::types::{CampusId, ConsumptionRecord, Resource, ResourceTriple, SeriesPoint};

/// Ordered-by-timestamp consumption data for every (resource, campus) pair.
///
/// Each partition holds strictly increasing timestamps and non-negative,
/// finite consumption values. The store is built once and then shared
/// read-only by every analytics component.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeriesStore {
    partitions: BTreeMap<Resource, BTreeMap<CampusId, Vec<ConsumptionRecord>>>,
}

impl TimeSeriesStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from unordered records of one resource.
    ///
    /// Records are sorted by `(campus_id, timestamp)` before insertion.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Data`] on negative or non-finite consumption
    /// or a duplicated `(campus_id, timestamp)` key.
    pub fn from_records(resource: Resource, records: Vec<ConsumptionRecord>) -> Result<Self> {
        let mut store = Self::new();
        store.extend(resource, records)?;
        Ok(store)
    }

    /// Adds unordered records of one resource to the store.
    ///
    /// The batch is checked as a whole before anything is stored, so on error
    /// the store is left unchanged.
    ///
    /// # Errors
    ///
    /// Same as [`TimeSeriesStore::insert`], after sorting.
    pub fn extend(&mut self, resource: Resource, mut records: Vec<ConsumptionRecord>) -> Result<()> {
        records.sort_by(|a, b| {
            a.campus_id
                .cmp(&b.campus_id)
                .then_with(|| a.timestamp.cmp(&b.timestamp))
        });

        let mut prev: Option<&ConsumptionRecord> = None;
        for record in &records {
            let last = match prev {
                Some(p) if p.campus_id == record.campus_id => Some(p),
                _ => self.series(resource, &record.campus_id).last(),
            };
            check_append(resource, last, record)?;
            prev = Some(record);
        }

        for record in records {
            self.partition_mut(resource, &record.campus_id).push(record);
        }
        Ok(())
    }

    /// Appends one record to its partition.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Data`] if consumption is negative or not
    /// finite, or if the timestamp does not come after the partition's last
    /// timestamp.
    pub fn insert(&mut self, resource: Resource, record: ConsumptionRecord) -> Result<()> {
        check_append(resource, self.series(resource, &record.campus_id).last(), &record)?;
        self.partition_mut(resource, &record.campus_id).push(record);
        Ok(())
    }

    fn partition_mut(&mut self, resource: Resource, campus_id: &str) -> &mut Vec<ConsumptionRecord> {
        self.partitions
            .entry(resource)
            .or_default()
            .entry(campus_id.to_string())
            .or_default()
    }

    /// Returns true when no resource holds any record.
    pub fn is_empty(&self) -> bool {
        self.partitions
            .values()
            .all(|campuses| campuses.values().all(Vec::is_empty))
    }

    /// Number of records stored for `resource`.
    pub fn len(&self, resource: Resource) -> usize {
        self.partitions
            .get(&resource)
            .map_or(0, |campuses| campuses.values().map(Vec::len).sum())
    }

    /// Campus identifiers present for any resource, ascending.
    pub fn campuses(&self) -> Vec<CampusId> {
        let mut ids: Vec<CampusId> = self
            .partitions
            .values()
            .flat_map(|campuses| campuses.keys().cloned())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Campus identifiers present for `resource`, ascending.
    pub fn campuses_for(&self, resource: Resource) -> Vec<CampusId> {
        self.partitions
            .get(&resource)
            .map(|campuses| campuses.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// One campus partition; empty when absent.
    pub fn series(&self, resource: Resource, campus_id: &str) -> &[ConsumptionRecord] {
        self.partitions
            .get(&resource)
            .and_then(|campuses| campuses.get(campus_id))
            .map_or(&[], Vec::as_slice)
    }

    /// Iterates every partition of `resource` in campus order.
    pub fn partitions(
        &self,
        resource: Resource,
    ) -> impl Iterator<Item = (&CampusId, &[ConsumptionRecord])> {
        self.partitions
            .get(&resource)
            .into_iter()
            .flat_map(|campuses| campuses.iter().map(|(id, s)| (id, s.as_slice())))
    }

    /// All records of `resource`, ordered by timestamp then campus.
    pub fn records(&self, resource: Resource) -> Vec<&ConsumptionRecord> {
        let mut all: Vec<&ConsumptionRecord> = self
            .partitions(resource)
            .flat_map(|(_, series)| series.iter())
            .collect();
        all.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.campus_id.cmp(&b.campus_id))
        });
        all
    }

    /// Total consumption per timestamp across all campuses, ascending.
    pub fn total_by_timestamp(&self, resource: Resource) -> Vec<SeriesPoint> {
        let mut totals: BTreeMap<NaiveDateTime, f64> = BTreeMap::new();
        for (_, series) in self.partitions(resource) {
            for r in series {
                *totals.entry(r.timestamp).or_default() += r.consumption;
            }
        }
        totals
            .into_iter()
            .map(|(timestamp, value)| SeriesPoint {
                timestamp,
                campus_id: None,
                value,
            })
            .collect()
    }

    /// Immutable per-campus summary used by the policy calculators.
    pub fn campus_snapshot(&self, campus_id: &str) -> CampusSnapshot {
        let totals = ResourceTriple::from_fn(|r| {
            self.series(r, campus_id)
                .iter()
                .map(|rec| rec.consumption)
                .sum()
        });
        let counts = ResourceTriple::from_fn(|r| self.series(r, campus_id).len());
        CampusSnapshot {
            campus_id: campus_id.to_string(),
            totals,
            counts,
        }
    }
}

fn check_append(
    resource: Resource,
    last: Option<&ConsumptionRecord>,
    record: &ConsumptionRecord,
) -> Result<()> {
    if !record.consumption.is_finite() || record.consumption < 0.0 {
        return Err(data_error(
            record,
            format!("consumption must be finite and >= 0, got {}", record.consumption),
        ));
    }
    if let Some(last) = last {
        if record.timestamp == last.timestamp {
            return Err(data_error(record, format!("duplicate {resource} reading")));
        }
        if record.timestamp < last.timestamp {
            return Err(data_error(
                record,
                format!("out of order, previous reading at {}", last.timestamp),
            ));
        }
    }
    Ok(())
}

fn data_error(record: &ConsumptionRecord, reason: String) -> AnalyticsError {
    AnalyticsError::Data {
        campus_id: record.campus_id.clone(),
        timestamp: record.timestamp.to_string(),
        reason,
    }
}

/// Aggregate consumption of one campus over its full history.
#[derive(Debug, Clone, PartialEq)]
pub struct CampusSnapshot {
    pub campus_id: CampusId,
    /// Sum of consumption per resource.
    pub totals: ResourceTriple<f64>,
    /// Number of readings per resource.
    pub counts: ResourceTriple<usize>,
}

impl CampusSnapshot {
    /// Builds a snapshot directly from totals, mostly for tests and callers
    /// that aggregate elsewhere.
    pub fn from_totals(campus_id: impl Into<CampusId>, totals: ResourceTriple<f64>) -> Self {
        Self {
            campus_id: campus_id.into(),
            totals,
            counts: ResourceTriple::new(1, 1, 1),
        }
    }

    /// Mean consumption per resource; zero for resources without readings.
    pub fn means(&self) -> ResourceTriple<f64> {
        ResourceTriple::from_fn(|r| {
            let n = self.counts.get(r);
            if n == 0 {
                0.0
            } else {
                self.totals.get(r) / n as f64
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn ts(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
            .expect("valid timestamp")
    }

    fn rec(day: u32, campus: &str, value: f64) -> ConsumptionRecord {
        ConsumptionRecord::new(ts(day, 0), campus, value)
    }

    #[test]
    fn from_records_sorts_partitions() {
        let store = TimeSeriesStore::from_records(
            Resource::Gas,
            vec![rec(3, "B", 3.0), rec(1, "A", 1.0), rec(2, "A", 2.0), rec(1, "B", 4.0)],
        )
        .expect("valid records");

        let a: Vec<f64> = store.series(Resource::Gas, "A").iter().map(|r| r.consumption).collect();
        assert_eq!(a, vec![1.0, 2.0]);
        assert_eq!(store.campuses(), vec!["A".to_string(), "B".to_string()]);
        assert_eq!(store.len(Resource::Gas), 4);
        assert_eq!(store.len(Resource::Water), 0);
    }

    #[test]
    fn rejects_duplicate_timestamp() {
        let err = TimeSeriesStore::from_records(Resource::Water, vec![rec(1, "A", 1.0), rec(1, "A", 2.0)]);
        assert!(matches!(err, Err(AnalyticsError::Data { .. })));
    }

    #[test]
    fn same_timestamp_on_different_campuses_is_allowed() {
        let store = TimeSeriesStore::from_records(Resource::Water, vec![rec(1, "A", 1.0), rec(1, "B", 2.0)]);
        assert!(store.is_ok());
    }

    #[test]
    fn rejects_negative_and_nan_consumption() {
        let mut store = TimeSeriesStore::new();
        assert!(store.insert(Resource::Gas, rec(1, "A", -1.0)).is_err());
        assert!(store.insert(Resource::Gas, rec(1, "A", f64::NAN)).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn insert_rejects_out_of_order() {
        let mut store = TimeSeriesStore::new();
        store.insert(Resource::Gas, rec(2, "A", 1.0)).expect("first insert");
        assert!(store.insert(Resource::Gas, rec(1, "A", 1.0)).is_err());
    }

    #[test]
    fn failed_extend_leaves_store_unchanged() {
        let mut store = TimeSeriesStore::new();
        store
            .insert(Resource::Gas, ConsumptionRecord::new(ts(1, 5), "B", 1.0))
            .expect("first insert");
        let before = store.clone();

        let batch = vec![
            ConsumptionRecord::new(ts(1, 0), "A", 1.0),
            ConsumptionRecord::new(ts(1, 1), "A", 2.0),
            ConsumptionRecord::new(ts(1, 0), "B", 3.0),
        ];
        assert!(store.extend(Resource::Gas, batch).is_err());
        assert_eq!(store.len(Resource::Gas), 1);
        assert_eq!(store, before);

        let dup = vec![rec(2, "C", 1.0), rec(2, "C", 2.0)];
        assert!(store.extend(Resource::Gas, dup).is_err());
        assert_eq!(store, before);
    }

    #[test]
    fn total_by_timestamp_sums_campuses() {
        let store = TimeSeriesStore::from_records(
            Resource::Electricity,
            vec![rec(1, "A", 1.0), rec(1, "B", 2.0), rec(2, "A", 5.0)],
        )
        .expect("valid records");
        let totals: Vec<f64> = store
            .total_by_timestamp(Resource::Electricity)
            .iter()
            .map(|p| p.value)
            .collect();
        assert_eq!(totals, vec![3.0, 5.0]);
    }

    #[test]
    fn snapshot_totals_and_means() {
        let mut store = TimeSeriesStore::from_records(
            Resource::Electricity,
            vec![rec(1, "A", 10.0), rec(2, "A", 30.0)],
        )
        .expect("valid records");
        store
            .extend(Resource::Gas, vec![rec(1, "A", 4.0)])
            .expect("valid gas");

        let snap = store.campus_snapshot("A");
        assert_eq!(snap.totals, ResourceTriple::new(40.0, 4.0, 0.0));
        assert_eq!(snap.means(), ResourceTriple::new(20.0, 4.0, 0.0));

        let missing = store.campus_snapshot("Z");
        assert_eq!(missing.totals.total(), 0.0);
    }
}

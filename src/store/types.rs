//! Core data types: resources, consumption records, and series points.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Campus (or building) identifier used to partition series.
pub type CampusId = String;

/// Metered utility resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Electricity,
    Gas,
    Water,
}

impl Resource {
    /// All resources in the fixed order used for random draws and reports.
    pub const ALL: [Resource; 3] = [Resource::Electricity, Resource::Gas, Resource::Water];

    /// Lower-case name, also the CSV file stem.
    pub fn as_str(self) -> &'static str {
        match self {
            Resource::Electricity => "electricity",
            Resource::Gas => "gas",
            Resource::Water => "water",
        }
    }

    /// Display unit of consumption values.
    pub fn unit(self) -> &'static str {
        match self {
            Resource::Electricity => "kWh",
            Resource::Gas => "m³",
            Resource::Water => "L",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resource {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "electricity" | "energy" => Ok(Resource::Electricity),
            "gas" => Ok(Resource::Gas),
            "water" => Ok(Resource::Water),
            other => Err(ConfigError::new(
                "resource",
                format!("unknown resource \"{other}\", expected electricity, gas or water"),
            )),
        }
    }
}

/// One value per resource: emission factors, cost factors, variability, means.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceTriple<T> {
    pub electricity: T,
    pub gas: T,
    pub water: T,
}

impl<T: Copy> ResourceTriple<T> {
    pub fn new(electricity: T, gas: T, water: T) -> Self {
        Self {
            electricity,
            gas,
            water,
        }
    }

    /// Returns the value bound to `resource`.
    pub fn get(&self, resource: Resource) -> T {
        match resource {
            Resource::Electricity => self.electricity,
            Resource::Gas => self.gas,
            Resource::Water => self.water,
        }
    }

    /// Mutable access to the value bound to `resource`.
    pub fn get_mut(&mut self, resource: Resource) -> &mut T {
        match resource {
            Resource::Electricity => &mut self.electricity,
            Resource::Gas => &mut self.gas,
            Resource::Water => &mut self.water,
        }
    }

    /// Builds a triple by evaluating `f` for each resource.
    pub fn from_fn(mut f: impl FnMut(Resource) -> T) -> Self {
        Self {
            electricity: f(Resource::Electricity),
            gas: f(Resource::Gas),
            water: f(Resource::Water),
        }
    }
}

impl ResourceTriple<f64> {
    /// Sum of the three values.
    pub fn total(&self) -> f64 {
        self.electricity + self.gas + self.water
    }
}

/// A single metered reading with derived calendar fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsumptionRecord {
    pub timestamp: NaiveDateTime,
    pub campus_id: CampusId,
    pub consumption: f64,
    /// Hour of day (0–23).
    pub hour: u32,
    pub weekday: Weekday,
    /// Month of year (1–12).
    pub month: u32,
    /// Calendar day the reading belongs to.
    pub day: NaiveDate,
}

impl ConsumptionRecord {
    /// Creates a record and derives its calendar fields from `timestamp`.
    pub fn new(timestamp: NaiveDateTime, campus_id: impl Into<CampusId>, consumption: f64) -> Self {
        Self {
            timestamp,
            campus_id: campus_id.into(),
            consumption,
            hour: timestamp.hour(),
            weekday: timestamp.weekday(),
            month: timestamp.month(),
            day: timestamp.date(),
        }
    }

    /// Projects the record onto a detector input point.
    pub fn to_point(&self) -> SeriesPoint {
        SeriesPoint {
            timestamp: self.timestamp,
            campus_id: Some(self.campus_id.clone()),
            value: self.consumption,
        }
    }
}

/// Detector input: a value at a timestamp, optionally tied to a campus.
///
/// `campus_id` is `None` for series aggregated across campuses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub timestamp: NaiveDateTime,
    pub campus_id: Option<CampusId>,
    pub value: f64,
}

impl SeriesPoint {
    pub fn new(timestamp: NaiveDateTime, campus_id: Option<&str>, value: f64) -> Self {
        Self {
            timestamp,
            campus_id: campus_id.map(str::to_string),
            value,
        }
    }
}

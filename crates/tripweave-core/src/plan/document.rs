//! The reasoner-facing itinerary shape.
//!
//! A [`PlanDocument`] serializes as a bare JSON array of days so it can be
//! embedded directly in reasoner prompts and replies. Field names are
//! camelCase on the wire.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A full itinerary: one entry per day, in travel order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanDocument {
    pub days: Vec<DayPlan>,
}

/// A geographic coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

/// Everything planned for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayPlan {
    pub date: NaiveDate,
    #[serde(default)]
    pub activities: Vec<Activity>,
    #[serde(default)]
    pub meals: Vec<Meal>,
    #[serde(default)]
    pub transportation: Vec<Transport>,
    #[serde(default)]
    pub estimated_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: Location,
    /// Minutes.
    #[serde(default)]
    pub duration: u32,
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub category: String,
    // Presentation only; never persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meal {
    pub name: String,
    /// breakfast, lunch, dinner, snack...
    #[serde(rename = "type", default)]
    pub meal_type: String,
    #[serde(default)]
    pub location: Location,
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub cuisine: String,
    // Presentation only; never persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

/// One leg of travel between two named places.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transport {
    pub mode: String,
    pub from: Waypoint,
    pub to: Waypoint,
    /// Minutes.
    #[serde(default)]
    pub duration: u32,
    #[serde(default)]
    pub cost: f64,
}

/// A transport endpoint. Coordinates are optional because the reasoner
/// usually only names the place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl Waypoint {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: None,
        }
    }
}

/// Reasons a plan document is rejected before it reaches the store.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanValidationError {
    #[error("day {day}: {kind} at index {index} has an empty name")]
    EmptyName {
        day: usize,
        kind: &'static str,
        index: usize,
    },
    #[error("day {day}: {what} has invalid cost {cost}")]
    InvalidCost { day: usize, what: String, cost: f64 },
    #[error("day {day}: {what} has out-of-range coordinates ({lat}, {lon})")]
    InvalidLocation {
        day: usize,
        what: String,
        lat: f64,
        lon: f64,
    },
    #[error("day {day} ({date}) is not after the previous day")]
    DatesOutOfOrder { day: usize, date: NaiveDate },
}

impl PlanDocument {
    pub fn new(days: Vec<DayPlan>) -> Self {
        Self { days }
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Sum of every day's estimated cost.
    pub fn total_estimated_cost(&self) -> f64 {
        self.days.iter().map(|d| d.estimated_cost).sum()
    }

    /// Check structural sanity: named items, finite non-negative costs,
    /// coordinates within range, strictly increasing dates.
    pub fn validate(&self) -> Result<(), PlanValidationError> {
        let mut previous: Option<NaiveDate> = None;
        for (day_idx, day) in self.days.iter().enumerate() {
            if previous.is_some_and(|p| day.date <= p) {
                return Err(PlanValidationError::DatesOutOfOrder {
                    day: day_idx,
                    date: day.date,
                });
            }
            previous = Some(day.date);

            check_cost(day_idx, "estimated cost", day.estimated_cost)?;

            for (i, a) in day.activities.iter().enumerate() {
                check_name(day_idx, "activity", i, &a.name)?;
                check_cost(day_idx, &a.name, a.cost)?;
                check_location(day_idx, &a.name, a.location)?;
            }
            for (i, m) in day.meals.iter().enumerate() {
                check_name(day_idx, "meal", i, &m.name)?;
                check_cost(day_idx, &m.name, m.cost)?;
                check_location(day_idx, &m.name, m.location)?;
            }
            for (i, t) in day.transportation.iter().enumerate() {
                check_name(day_idx, "transport", i, &t.mode)?;
                check_cost(day_idx, &t.mode, t.cost)?;
                for endpoint in [&t.from, &t.to] {
                    if let Some(loc) = endpoint.location {
                        check_location(day_idx, &endpoint.name, loc)?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn check_name(
    day: usize,
    kind: &'static str,
    index: usize,
    name: &str,
) -> Result<(), PlanValidationError> {
    if name.trim().is_empty() {
        return Err(PlanValidationError::EmptyName { day, kind, index });
    }
    Ok(())
}

fn check_cost(day: usize, what: &str, cost: f64) -> Result<(), PlanValidationError> {
    if !cost.is_finite() || cost < 0.0 {
        return Err(PlanValidationError::InvalidCost {
            day,
            what: what.to_owned(),
            cost,
        });
    }
    Ok(())
}

fn check_location(day: usize, what: &str, loc: Location) -> Result<(), PlanValidationError> {
    let lat_ok = loc.lat.is_finite() && (-90.0..=90.0).contains(&loc.lat);
    let lon_ok = loc.lon.is_finite() && (-180.0..=180.0).contains(&loc.lon);
    if !(lat_ok && lon_ok) {
        return Err(PlanValidationError::InvalidLocation {
            day,
            what: what.to_owned(),
            lat: loc.lat,
            lon: loc.lon,
        });
    }
    Ok(())
}

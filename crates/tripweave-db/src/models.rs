use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Itinerary generation status of a trip.
///
/// A trip is created in `generating`; the background generation task moves
/// it to `completed` or `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    Generating,
    Completed,
    Failed,
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Generating => "generating",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row in the `trips` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Trip {
    pub id: Uuid,
    pub user_id: String,
    pub destination: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub budget: Option<f64>,
    pub status: TripStatus,
    /// Failure reason when `status = failed`.
    pub status_detail: Option<String>,
    /// Incremented on every plan replace.
    pub plan_version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row in the `day_plans` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DayPlanRecord {
    pub id: Uuid,
    pub trip_id: Uuid,
    /// Zero-based position of the day within the trip.
    pub day_index: i32,
    pub date: NaiveDate,
    pub estimated_cost: f64,
}

/// A row in the `activities` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ActivityRecord {
    pub id: Uuid,
    pub day_plan_id: Uuid,
    pub position: i32,
    pub name: String,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub duration_minutes: i32,
    pub cost: f64,
    pub category: String,
}

/// A row in the `meals` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct MealRecord {
    pub id: Uuid,
    pub day_plan_id: Uuid,
    pub position: i32,
    pub name: String,
    pub meal_type: String,
    pub latitude: f64,
    pub longitude: f64,
    pub cost: f64,
    pub cuisine: String,
}

/// A row in the `transports` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TransportRecord {
    pub id: Uuid,
    pub day_plan_id: Uuid,
    pub position: i32,
    pub mode: String,
    pub from_name: String,
    pub from_latitude: f64,
    pub from_longitude: f64,
    pub to_name: String,
    pub to_latitude: f64,
    pub to_longitude: f64,
    pub duration_minutes: i32,
    pub cost: f64,
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// One persisted day together with its child rows, each ordered by position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayRecords {
    pub day: DayPlanRecord,
    pub activities: Vec<ActivityRecord>,
    pub meals: Vec<MealRecord>,
    pub transports: Vec<TransportRecord>,
}

/// A trip and its full persisted itinerary, days ordered by `day_index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRecord {
    pub trip: Trip,
    pub days: Vec<DayRecords>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trip_status_display_matches_stored_text() {
        assert_eq!(TripStatus::Generating.to_string(), "generating");
        assert_eq!(TripStatus::Completed.to_string(), "completed");
        assert_eq!(TripStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn trip_status_serializes_snake_case() {
        let json = serde_json::to_string(&TripStatus::Generating).unwrap();
        assert_eq!(json, "\"generating\"");
    }
}

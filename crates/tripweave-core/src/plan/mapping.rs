//! Pure mapping between [`PlanDocument`] and the persisted itinerary rows.
//!
//! Document -> rows drops the presentation-only fields (`address`,
//! `startTime`, `endTime`, `time`); rows -> document leaves them `None`.
//! Transport endpoints without coordinates are stored as `(0, 0)`, and a
//! stored `(0, 0)` endpoint reads back as "no coordinates".

use uuid::Uuid;

use tripweave_db::models::{ActivityRecord, DayPlanRecord, DayRecords, MealRecord, TransportRecord};
use tripweave_db::queries::itinerary::{NewActivity, NewDayPlan, NewMeal, NewTransport};

use super::document::{Activity, DayPlan, Location, Meal, PlanDocument, Transport, Waypoint};

// -----------------------------------------------------------------------
// Rows -> document
// -----------------------------------------------------------------------

/// Build a document from persisted days. Input order is preserved; callers
/// pass days sorted by `day_index` and children sorted by `position`.
pub fn plan_from_records(days: &[DayRecords]) -> PlanDocument {
    PlanDocument::new(days.iter().map(day_from_records).collect())
}

fn day_from_records(records: &DayRecords) -> DayPlan {
    DayPlan {
        date: records.day.date,
        activities: records.activities.iter().map(activity_from_record).collect(),
        meals: records.meals.iter().map(meal_from_record).collect(),
        transportation: records.transports.iter().map(transport_from_record).collect(),
        estimated_cost: records.day.estimated_cost,
    }
}

fn activity_from_record(r: &ActivityRecord) -> Activity {
    Activity {
        name: r.name.clone(),
        description: r.description.clone(),
        location: Location {
            lat: r.latitude,
            lon: r.longitude,
        },
        duration: minutes_from_db(r.duration_minutes),
        cost: r.cost,
        category: r.category.clone(),
        address: None,
        start_time: None,
        end_time: None,
    }
}

fn meal_from_record(r: &MealRecord) -> Meal {
    Meal {
        name: r.name.clone(),
        meal_type: r.meal_type.clone(),
        location: Location {
            lat: r.latitude,
            lon: r.longitude,
        },
        cost: r.cost,
        cuisine: r.cuisine.clone(),
        address: None,
        time: None,
    }
}

fn transport_from_record(r: &TransportRecord) -> Transport {
    Transport {
        mode: r.mode.clone(),
        from: waypoint_from_columns(&r.from_name, r.from_latitude, r.from_longitude),
        to: waypoint_from_columns(&r.to_name, r.to_latitude, r.to_longitude),
        duration: minutes_from_db(r.duration_minutes),
        cost: r.cost,
    }
}

fn waypoint_from_columns(name: &str, lat: f64, lon: f64) -> Waypoint {
    let location = if lat == 0.0 && lon == 0.0 {
        None
    } else {
        Some(Location { lat, lon })
    };
    Waypoint {
        name: name.to_owned(),
        location,
    }
}

fn minutes_from_db(minutes: i32) -> u32 {
    u32::try_from(minutes).unwrap_or(0)
}

// -----------------------------------------------------------------------
// Document -> rows
// -----------------------------------------------------------------------

/// Flatten a document into insertable rows. `day_index` follows document
/// order starting at 0.
pub fn records_from_plan(plan: &PlanDocument) -> Vec<NewDayPlan> {
    plan.days
        .iter()
        .enumerate()
        .map(|(idx, day)| NewDayPlan {
            day_index: idx as i32,
            date: day.date,
            estimated_cost: day.estimated_cost,
            activities: day.activities.iter().map(new_activity).collect(),
            meals: day.meals.iter().map(new_meal).collect(),
            transports: day.transportation.iter().map(new_transport).collect(),
        })
        .collect()
}

fn new_activity(a: &Activity) -> NewActivity {
    NewActivity {
        name: a.name.clone(),
        description: a.description.clone(),
        latitude: a.location.lat,
        longitude: a.location.lon,
        duration_minutes: minutes_to_db(a.duration),
        cost: a.cost,
        category: a.category.clone(),
    }
}

fn new_meal(m: &Meal) -> NewMeal {
    NewMeal {
        name: m.name.clone(),
        meal_type: m.meal_type.clone(),
        latitude: m.location.lat,
        longitude: m.location.lon,
        cost: m.cost,
        cuisine: m.cuisine.clone(),
    }
}

fn new_transport(t: &Transport) -> NewTransport {
    let from = t.from.location.unwrap_or_default();
    let to = t.to.location.unwrap_or_default();
    NewTransport {
        mode: t.mode.clone(),
        from_name: t.from.name.clone(),
        from_latitude: from.lat,
        from_longitude: from.lon,
        to_name: t.to.name.clone(),
        to_latitude: to.lat,
        to_longitude: to.lon,
        duration_minutes: minutes_to_db(t.duration),
        cost: t.cost,
    }
}

fn minutes_to_db(minutes: u32) -> i32 {
    i32::try_from(minutes).unwrap_or(i32::MAX)
}

/// Give insertable rows fresh IDs and foreign keys, producing what a store
/// would hand back after persisting them.
pub fn materialize_records(trip_id: Uuid, days: &[NewDayPlan]) -> Vec<DayRecords> {
    days.iter()
        .map(|day| {
            let day_id = Uuid::new_v4();
            DayRecords {
                day: DayPlanRecord {
                    id: day_id,
                    trip_id,
                    day_index: day.day_index,
                    date: day.date,
                    estimated_cost: day.estimated_cost,
                },
                activities: day
                    .activities
                    .iter()
                    .enumerate()
                    .map(|(pos, a)| ActivityRecord {
                        id: Uuid::new_v4(),
                        day_plan_id: day_id,
                        position: pos as i32,
                        name: a.name.clone(),
                        description: a.description.clone(),
                        latitude: a.latitude,
                        longitude: a.longitude,
                        duration_minutes: a.duration_minutes,
                        cost: a.cost,
                        category: a.category.clone(),
                    })
                    .collect(),
                meals: day
                    .meals
                    .iter()
                    .enumerate()
                    .map(|(pos, m)| MealRecord {
                        id: Uuid::new_v4(),
                        day_plan_id: day_id,
                        position: pos as i32,
                        name: m.name.clone(),
                        meal_type: m.meal_type.clone(),
                        latitude: m.latitude,
                        longitude: m.longitude,
                        cost: m.cost,
                        cuisine: m.cuisine.clone(),
                    })
                    .collect(),
                transports: day
                    .transports
                    .iter()
                    .enumerate()
                    .map(|(pos, t)| TransportRecord {
                        id: Uuid::new_v4(),
                        day_plan_id: day_id,
                        position: pos as i32,
                        mode: t.mode.clone(),
                        from_name: t.from_name.clone(),
                        from_latitude: t.from_latitude,
                        from_longitude: t.from_longitude,
                        to_name: t.to_name.clone(),
                        to_latitude: t.to_latitude,
                        to_longitude: t.to_longitude,
                        duration_minutes: t.duration_minutes,
                        cost: t.cost,
                    })
                    .collect(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_plan() -> PlanDocument {
        PlanDocument::new(vec![
            DayPlan {
                date: "2026-05-01".parse().unwrap(),
                activities: vec![Activity {
                    name: "Sao Jorge Castle".into(),
                    description: "Moorish castle above Alfama".into(),
                    location: Location {
                        lat: 38.7139,
                        lon: -9.1335,
                    },
                    duration: 120,
                    cost: 15.0,
                    category: "sightseeing".into(),
                    address: Some("R. de Santa Cruz do Castelo".into()),
                    start_time: Some("10:00".into()),
                    end_time: Some("12:00".into()),
                }],
                meals: vec![Meal {
                    name: "Cervejaria Ramiro".into(),
                    meal_type: "dinner".into(),
                    location: Location {
                        lat: 38.7205,
                        lon: -9.1357,
                    },
                    cost: 45.5,
                    cuisine: "seafood".into(),
                    address: Some("Av. Almirante Reis 1".into()),
                    time: Some("20:00".into()),
                }],
                transportation: vec![Transport {
                    mode: "tram".into(),
                    from: Waypoint {
                        name: "Baixa".into(),
                        location: Some(Location {
                            lat: 38.7110,
                            lon: -9.1366,
                        }),
                    },
                    to: Waypoint::named("Alfama"),
                    duration: 20,
                    cost: 3.0,
                }],
                estimated_cost: 63.5,
            },
            DayPlan {
                date: "2026-05-02".parse().unwrap(),
                activities: vec![],
                meals: vec![],
                transportation: vec![],
                estimated_cost: 0.0,
            },
        ])
    }

    fn round_trip(plan: &PlanDocument) -> PlanDocument {
        let rows = records_from_plan(plan);
        let persisted = materialize_records(Uuid::new_v4(), &rows);
        plan_from_records(&persisted)
    }

    #[test]
    fn round_trip_preserves_persisted_fields() {
        let original = sample_plan();
        let reloaded = round_trip(&original);

        assert_eq!(reloaded.days.len(), 2);
        let (a0, a1) = (&original.days[0], &reloaded.days[0]);
        assert_eq!(a1.date, a0.date);
        assert_eq!(a1.estimated_cost, a0.estimated_cost);

        let (act0, act1) = (&a0.activities[0], &a1.activities[0]);
        assert_eq!(act1.name, act0.name);
        assert_eq!(act1.cost, act0.cost);
        assert_eq!(act1.category, act0.category);
        assert_eq!(act1.location.lat, act0.location.lat);
        assert_eq!(act1.location.lon, act0.location.lon);
        assert_eq!(act1.duration, act0.duration);
        assert_eq!(act1.description, act0.description);

        let (m0, m1) = (&a0.meals[0], &a1.meals[0]);
        assert_eq!(m1.name, m0.name);
        assert_eq!(m1.cost, m0.cost);
        assert_eq!(m1.meal_type, m0.meal_type);
        assert_eq!(m1.location, m0.location);
        assert_eq!(m1.cuisine, m0.cuisine);

        let (t0, t1) = (&a0.transportation[0], &a1.transportation[0]);
        assert_eq!(t1.mode, t0.mode);
        assert_eq!(t1.cost, t0.cost);
        assert_eq!(t1.from, t0.from);
        assert_eq!(t1.to.name, "Alfama");
    }

    #[test]
    fn round_trip_clears_display_only_fields() {
        let reloaded = round_trip(&sample_plan());
        let activity = &reloaded.days[0].activities[0];
        assert!(activity.address.is_none());
        assert!(activity.start_time.is_none());
        assert!(activity.end_time.is_none());
        let meal = &reloaded.days[0].meals[0];
        assert!(meal.address.is_none());
        assert!(meal.time.is_none());
    }

    #[test]
    fn round_trip_is_stable_after_first_persist() {
        let once = round_trip(&sample_plan());
        let twice = round_trip(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn missing_transport_coordinates_default_to_zero() {
        let rows = records_from_plan(&sample_plan());
        let leg = &rows[0].transports[0];
        assert_eq!(leg.to_name, "Alfama");
        assert_eq!((leg.to_latitude, leg.to_longitude), (0.0, 0.0));
        assert_eq!((leg.from_latitude, leg.from_longitude), (38.7110, -9.1366));
    }

    #[test]
    fn day_index_and_positions_follow_document_order() {
        let rows = records_from_plan(&sample_plan());
        assert_eq!(rows[0].day_index, 0);
        assert_eq!(rows[1].day_index, 1);

        let persisted = materialize_records(Uuid::nil(), &rows);
        assert_eq!(persisted[0].day.trip_id, Uuid::nil());
        assert_eq!(persisted[0].activities[0].position, 0);
        assert_eq!(persisted[0].activities[0].day_plan_id, persisted[0].day.id);
    }

    #[test]
    fn negative_stored_duration_reads_as_zero() {
        assert_eq!(minutes_from_db(-10), 0);
        assert_eq!(minutes_to_db(u32::MAX), i32::MAX);
    }
}

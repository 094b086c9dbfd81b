// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::NaiveDate;
use fleetbook::application::{FleetService, NewUser, TripInput};
use fleetbook::domain::{
    Actor, BookingDetails, ClockTime, Role, TripExpenses, Vehicle, VehicleId, VehicleStatus,
};
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(FleetService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = FleetService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// URL of the database created by [`test_service`], for opening a second
/// connection behind the service's back.
pub fn db_url(temp_dir: &TempDir) -> String {
    format!("sqlite:{}", temp_dir.path().join("test.db").display())
}

pub fn admin() -> Actor {
    Actor::system_admin()
}

/// Helper to parse a `YYYY-MM-DD` date
pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// Helper to parse an `HH:MM` time
pub fn clock(s: &str) -> ClockTime {
    s.parse().unwrap()
}

pub async fn add_vehicle(service: &FleetService, vehicle_no: &str) -> Result<Vehicle> {
    Ok(service
        .create_vehicle(&admin(), vehicle_no, VehicleStatus::Active)
        .await?)
}

/// Create a user with `role` and return the actor it signs in as.
pub async fn add_user(service: &FleetService, name: &str, role: Role) -> Result<Actor> {
    let email = format!("{}@fleet.test", name.to_lowercase());
    let user = service
        .create_user(
            &admin(),
            NewUser {
                name: name.to_string(),
                email,
                role,
                assigned_vehicles: Vec::new(),
            },
        )
        .await?;
    Ok(user.actor())
}

/// Trip input with income and a single fuel expense
pub fn trip(vehicle_id: VehicleId, day: &str, income: i64, fuel: i64) -> TripInput {
    TripInput {
        trip_date: date(day),
        vehicle_id,
        driver_id: None,
        trip_route: "Kochi - Munnar".to_string(),
        income,
        expenses: TripExpenses {
            fuel,
            ..Default::default()
        },
        notes: None,
    }
}

/// Booking request for `vehicle_id` over the given days and times
pub fn booking(
    vehicle_id: VehicleId,
    start: &str,
    end: &str,
    start_time: &str,
    end_time: &str,
) -> BookingDetails {
    BookingDetails {
        customer_name: "Anand".to_string(),
        customer_address: None,
        customer_phone: "9800000000".to_string(),
        pickup_location: "Thalassery".to_string(),
        trip_destination: "Wayanad".to_string(),
        total_persons: 4,
        journey_start_date: date(start),
        journey_return_date: date(end),
        trip_start_time: clock(start_time),
        trip_end_time: clock(end_time),
        total_kilometers: 0,
        night_halt_places: None,
        vehicle_type: None,
        advance_amount: 0,
        total_amount: 0,
        other_expenses: None,
        driver_food_accommodation: None,
        vehicle_id,
    }
}

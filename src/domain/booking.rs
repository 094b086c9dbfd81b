use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{amount_problem, Cents, ClockTime, UserId, VehicleId};

pub type BookingId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Approved => "approved",
            BookingStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Some(BookingStatus::Pending),
            "approved" => Some(BookingStatus::Approved),
            "rejected" => Some(BookingStatus::Rejected),
            _ => None,
        }
    }

    /// Pending and approved bookings hold the vehicle; rejected ones do not.
    pub fn blocks_vehicle(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Approved)
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, BookingStatus::Pending)
    }

    /// `pending -> approved` and `pending -> rejected` are the only moves.
    pub fn transition(self, target: BookingStatus) -> Result<BookingStatus, TransitionError> {
        match (self, target) {
            (BookingStatus::Pending, BookingStatus::Approved | BookingStatus::Rejected) => {
                Ok(target)
            }
            (BookingStatus::Pending, BookingStatus::Pending) => {
                Err(TransitionError::InvalidTarget(target))
            }
            (from, _) => Err(TransitionError::AlreadyDecided(from)),
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    /// The booking was already approved or rejected.
    AlreadyDecided(BookingStatus),
    /// Only `approved` and `rejected` are valid targets.
    InvalidTarget(BookingStatus),
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionError::AlreadyDecided(status) => {
                write!(f, "Cannot change status of {} booking", status)
            }
            TransitionError::InvalidTarget(status) => write!(
                f,
                "Invalid status '{}'. Must be \"approved\" or \"rejected\"",
                status
            ),
        }
    }
}

impl std::error::Error for TransitionError {}

fn one() -> u32 {
    1
}

/// Everything a customer asks for when booking a vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingDetails {
    pub customer_name: String,
    #[serde(default)]
    pub customer_address: Option<String>,
    pub customer_phone: String,
    pub pickup_location: String,
    pub trip_destination: String,
    #[serde(default = "one")]
    pub total_persons: u32,
    pub journey_start_date: NaiveDate,
    pub journey_return_date: NaiveDate,
    pub trip_start_time: ClockTime,
    pub trip_end_time: ClockTime,
    #[serde(default)]
    pub total_kilometers: i64,
    #[serde(default)]
    pub night_halt_places: Option<String>,
    #[serde(default)]
    pub vehicle_type: Option<String>,
    #[serde(default)]
    pub advance_amount: Cents,
    #[serde(default)]
    pub total_amount: Cents,
    #[serde(default)]
    pub other_expenses: Option<String>,
    #[serde(default)]
    pub driver_food_accommodation: Option<String>,
    pub vehicle_id: VehicleId,
}

impl BookingDetails {
    /// Collect every problem with the request; empty means valid.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        for (field, value) in [
            ("customer name", &self.customer_name),
            ("customer phone", &self.customer_phone),
            ("pickup location", &self.pickup_location),
            ("trip destination", &self.trip_destination),
        ] {
            if value.trim().is_empty() {
                problems.push(format!("{} is required", field));
            }
        }

        if self.journey_return_date < self.journey_start_date {
            problems.push("journey return date is before the start date".to_string());
        }
        if self.total_persons < 1 {
            problems.push("total persons must be at least 1".to_string());
        }
        if self.total_kilometers < 0 {
            problems.push("total kilometers must not be negative".to_string());
        }
        problems.extend(amount_problem("advance amount", self.advance_amount));
        problems.extend(amount_problem("total amount", self.total_amount));

        problems
    }

    pub fn window(&self) -> ReservationWindow {
        ReservationWindow {
            vehicle_id: self.vehicle_id,
            start_date: self.journey_start_date,
            end_date: self.journey_return_date,
            start_time: self.trip_start_time,
            end_time: self.trip_end_time,
        }
    }

    /// Calendar days covered, counting both ends.
    pub fn total_days(&self) -> i64 {
        (self.journey_return_date - self.journey_start_date).num_days() + 1
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub booking_no: String,
    pub booking_date: NaiveDate,
    pub created_by: UserId,
    pub status: BookingStatus,
    #[serde(flatten)]
    pub details: BookingDetails,
    pub total_days: i64,
    /// Registration number captured when the booking was made.
    pub vehicle_no: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(
        booking_no: String,
        booking_date: NaiveDate,
        details: BookingDetails,
        vehicle_no: String,
        created_by: UserId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            booking_no,
            booking_date,
            created_by,
            status: BookingStatus::Pending,
            total_days: details.total_days(),
            details,
            vehicle_no,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn window(&self) -> ReservationWindow {
        self.details.window()
    }

    /// Replace the editable details, keeping identity and status.
    pub fn apply_details(&mut self, details: BookingDetails, vehicle_no: String) {
        self.total_days = details.total_days();
        self.details = details;
        self.vehicle_no = vehicle_no;
        self.updated_at = Utc::now();
    }
}

/// The slice of a booking that decides whether it collides with another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationWindow {
    pub vehicle_id: VehicleId,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
}

impl ReservationWindow {
    pub fn is_multi_day(&self) -> bool {
        self.start_date != self.end_date
    }
}

/// `BK-YYYYMMDD-NNN`, where NNN counts bookings issued that day from 001.
pub fn format_booking_no(date: NaiveDate, issued_today: i64) -> String {
    format!("BK-{}-{:03}", date.format("%Y%m%d"), issued_today + 1)
}

/// Daily counter of `BK-20250201-042`, i.e. 42.
pub fn parse_booking_seq(booking_no: &str) -> Option<i64> {
    booking_no.rsplit_once('-')?.1.parse().ok()
}

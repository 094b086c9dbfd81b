use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{Booking, BookingId, BookingStatus, ClockTime, ReservationWindow};

/// A proposed reservation, optionally ignoring one existing booking
/// (the one being edited or approved).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityRequest {
    #[serde(flatten)]
    pub window: ReservationWindow,
    #[serde(default)]
    pub exclude_id: Option<BookingId>,
}

impl AvailabilityRequest {
    pub fn new(window: ReservationWindow) -> Self {
        Self {
            window,
            exclude_id: None,
        }
    }

    pub fn excluding(mut self, id: BookingId) -> Self {
        self.exclude_id = Some(id);
        self
    }
}

/// An existing booking that blocks the request, with enough detail to
/// explain the refusal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub booking_id: BookingId,
    pub booking_no: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
    pub status: BookingStatus,
    /// "10/01/2025 - 12/01/2025"
    pub dates: String,
    /// "09:00 - 18:00"
    pub times: String,
}

impl Conflict {
    fn from_booking(booking: &Booking) -> Self {
        let w = booking.window();
        Self {
            booking_id: booking.id,
            booking_no: booking.booking_no.clone(),
            start_date: w.start_date,
            end_date: w.end_date,
            start_time: w.start_time,
            end_time: w.end_time,
            status: booking.status,
            dates: format!(
                "{} - {}",
                w.start_date.format("%d/%m/%Y"),
                w.end_date.format("%d/%m/%Y")
            ),
            times: format!("{} - {}", w.start_time, w.end_time),
        }
    }
}

impl std::fmt::Display for Conflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}, {}, {})",
            self.booking_no, self.dates, self.times, self.status
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub available: bool,
    pub conflicts: Vec<Conflict>,
}

/// Closed-interval date overlap: `a.start <= b.end && a.end >= b.start`.
pub fn dates_overlap(a: &ReservationWindow, b: &ReservationWindow) -> bool {
    a.start_date <= b.end_date && a.end_date >= b.start_date
}

/// Half-open clock overlap: touching at a boundary is not a clash.
pub fn times_overlap(a: &ReservationWindow, b: &ReservationWindow) -> bool {
    a.start_time < b.end_time && a.end_time > b.start_time
}

/// Whether two windows for the same vehicle clash.
///
/// Multi-day spans degrade to whole days: any shared date conflicts.
/// Two single-day windows on the same date conflict only if their clock
/// ranges overlap.
pub fn windows_conflict(existing: &ReservationWindow, new: &ReservationWindow) -> bool {
    if existing.vehicle_id != new.vehicle_id || !dates_overlap(existing, new) {
        return false;
    }
    if existing.is_multi_day() || new.is_multi_day() {
        return true;
    }
    times_overlap(existing, new)
}

/// Decide whether `request` can be booked given `existing` bookings.
///
/// `existing` may be any superset of the relevant bookings (the store
/// pre-filters by vehicle, status and date range); every filter is applied
/// again here.
pub fn check_availability(request: &AvailabilityRequest, existing: &[Booking]) -> Availability {
    let conflicts: Vec<Conflict> = existing
        .iter()
        .filter(|b| b.status.blocks_vehicle())
        .filter(|b| Some(b.id) != request.exclude_id)
        .filter(|b| windows_conflict(&b.window(), &request.window))
        .map(Conflict::from_booking)
        .collect();

    Availability {
        available: conflicts.is_empty(),
        conflicts,
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::domain::{BookingDetails, VehicleId};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn window(vehicle_id: VehicleId, from: &str, to: &str, t0: &str, t1: &str) -> ReservationWindow {
        ReservationWindow {
            vehicle_id,
            start_date: date(from),
            end_date: date(to),
            start_time: t0.parse().unwrap(),
            end_time: t1.parse().unwrap(),
        }
    }

    fn booking(w: ReservationWindow, status: BookingStatus) -> Booking {
        let details = BookingDetails {
            customer_name: "Guest".into(),
            customer_address: None,
            customer_phone: "1".into(),
            pickup_location: "A".into(),
            trip_destination: "B".into(),
            total_persons: 1,
            journey_start_date: w.start_date,
            journey_return_date: w.end_date,
            trip_start_time: w.start_time,
            trip_end_time: w.end_time,
            total_kilometers: 0,
            night_halt_places: None,
            vehicle_type: None,
            advance_amount: 0,
            total_amount: 0,
            other_expenses: None,
            driver_food_accommodation: None,
            vehicle_id: w.vehicle_id,
        };
        let mut b = Booking::new(
            "BK-TEST-001".into(),
            w.start_date,
            details,
            "KL-01".into(),
            Uuid::nil(),
        );
        b.status = status;
        b
    }

    #[test]
    fn test_multi_day_overlap_ignores_times() {
        let v = Uuid::new_v4();
        let existing = vec![booking(
            window(v, "2025-01-10", "2025-01-12", "09:00", "18:00"),
            BookingStatus::Approved,
        )];
        let request = AvailabilityRequest::new(window(v, "2025-01-12", "2025-01-14", "19:00", "20:00"));

        let result = check_availability(&request, &existing);
        assert!(!result.available);
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].times, "09:00 - 18:00");
        assert_eq!(result.conflicts[0].dates, "10/01/2025 - 12/01/2025");
    }

    #[test]
    fn test_single_day_time_overlap() {
        let v = Uuid::new_v4();
        let existing = vec![booking(
            window(v, "2025-02-01", "2025-02-01", "09:00", "12:00"),
            BookingStatus::Approved,
        )];

        let clash = AvailabilityRequest::new(window(v, "2025-02-01", "2025-02-01", "11:00", "14:00"));
        assert!(!check_availability(&clash, &existing).available);

        let touching = AvailabilityRequest::new(window(v, "2025-02-01", "2025-02-01", "12:00", "15:00"));
        assert!(check_availability(&touching, &existing).available);

        let before = AvailabilityRequest::new(window(v, "2025-02-01", "2025-02-01", "06:00", "09:00"));
        assert!(check_availability(&before, &existing).available);
    }

    #[test]
    fn test_disjoint_days_never_conflict() {
        let v = Uuid::new_v4();
        let existing = vec![booking(
            window(v, "2025-03-01", "2025-03-01", "00:00", "23:59"),
            BookingStatus::Pending,
        )];
        let request = AvailabilityRequest::new(window(v, "2025-03-02", "2025-03-02", "00:00", "23:59"));
        assert!(check_availability(&request, &existing).available);
    }

    #[test]
    fn test_rejected_and_other_vehicles_are_ignored() {
        let v = Uuid::new_v4();
        let other = Uuid::new_v4();
        let existing = vec![
            booking(window(v, "2025-04-01", "2025-04-03", "09:00", "18:00"), BookingStatus::Rejected),
            booking(window(other, "2025-04-01", "2025-04-03", "09:00", "18:00"), BookingStatus::Approved),
        ];
        let request = AvailabilityRequest::new(window(v, "2025-04-02", "2025-04-02", "10:00", "11:00"));
        assert!(check_availability(&request, &existing).available);
    }

    #[test]
    fn test_booking_never_conflicts_with_itself() {
        let v = Uuid::new_v4();
        let own = booking(window(v, "2025-05-05", "2025-05-07", "08:00", "20:00"), BookingStatus::Pending);
        let request = AvailabilityRequest::new(own.window()).excluding(own.id);
        assert!(check_availability(&request, std::slice::from_ref(&own)).available);

        let without_exclusion = AvailabilityRequest::new(own.window());
        assert!(!check_availability(&without_exclusion, &[own]).available);
    }

    #[test]
    fn test_single_day_request_inside_multi_day_booking() {
        let v = Uuid::new_v4();
        let existing = vec![booking(
            window(v, "2025-06-01", "2025-06-05", "10:00", "11:00"),
            BookingStatus::Pending,
        )];
        let request = AvailabilityRequest::new(window(v, "2025-06-03", "2025-06-03", "15:00", "16:00"));
        assert!(!check_availability(&request, &existing).available);
    }

    #[test]
    fn test_windows_conflict_is_symmetric_for_same_day() {
        let v = Uuid::new_v4();
        let a = window(v, "2025-07-01", "2025-07-01", "09:00", "12:00");
        let b = window(v, "2025-07-01", "2025-07-01", "11:30", "13:00");
        assert_eq!(windows_conflict(&a, &b), windows_conflict(&b, &a));
        assert!(windows_conflict(&a, &b));
    }
}

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::{Row, SqliteExecutor};

use crate::domain::{Booking, BookingDetails, BookingId, BookingStatus, ClockTime, UserId, VehicleId};

use super::repository::{format_date, parse_date, parse_timestamp, parse_uuid, Repository};

/// Narrowing options for booking lists. Every field is optional.
#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    pub created_by: Option<UserId>,
    pub status: Option<BookingStatus>,
    pub vehicle_id: Option<VehicleId>,
    /// Bookings whose journey ends on or after this date.
    pub start_date: Option<NaiveDate>,
    /// Bookings whose journey starts on or before this date.
    pub end_date: Option<NaiveDate>,
}

impl BookingFilter {
    pub fn created_by(mut self, user_id: UserId) -> Self {
        self.created_by = Some(user_id);
        self
    }

    pub fn with_status(mut self, status: BookingStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_vehicle(mut self, vehicle_id: VehicleId) -> Self {
        self.vehicle_id = Some(vehicle_id);
        self
    }
}

const BOOKING_COLUMNS: &str = r#"
    id, booking_no, booking_date, created_by, status, customer_name, customer_address,
    customer_phone, pickup_location, trip_destination, total_persons, journey_start_date,
    journey_return_date, trip_start_time, trip_end_time, total_days, total_kilometers,
    night_halt_places, vehicle_type, advance_amount, total_amount, other_expenses,
    driver_food_accommodation, vehicle_id, vehicle_no, created_at, updated_at
"#;

impl Repository {
    // ========================
    // Booking operations
    // ========================

    /// Booking numbers issued on `date`.
    pub async fn booking_nos_on<'e, E>(&self, executor: E, date: NaiveDate) -> Result<Vec<String>>
    where
        E: SqliteExecutor<'e>,
    {
        let rows = sqlx::query("SELECT booking_no FROM bookings WHERE booking_date = ?")
            .bind(format_date(date))
            .fetch_all(executor)
            .await
            .context("Failed to read booking numbering")?;
        Ok(rows.iter().map(|row| row.get("booking_no")).collect())
    }

    /// Bump and return the booking counter for `date`. The counter never
    /// falls back, and starts above `on_file`, the highest sequence already
    /// stored for that day.
    pub async fn next_booking_seq<'e, E>(&self, executor: E, date: NaiveDate, on_file: i64) -> Result<i64>
    where
        E: SqliteExecutor<'e>,
    {
        let row = sqlx::query(
            r#"
            INSERT INTO sequence_counter (name, value) VALUES (?1, ?2 + 1)
            ON CONFLICT(name) DO UPDATE SET value = MAX(value, ?2) + 1
            RETURNING value
            "#,
        )
        .bind(format!("booking_{}", date.format("%Y%m%d")))
        .bind(on_file)
        .fetch_one(executor)
        .await
        .context("Failed to get next booking number")?;
        Ok(row.get("value"))
    }

    pub async fn count_vehicle_bookings(&self, vehicle_id: VehicleId) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM bookings WHERE vehicle_id = ?")
            .bind(vehicle_id.to_string())
            .fetch_one(self.pool())
            .await
            .context("Failed to count bookings")?;
        Ok(row.get("count"))
    }

    pub async fn insert_booking<'e, E>(&self, executor: E, booking: &Booking) -> Result<()>
    where
        E: SqliteExecutor<'e>,
    {
        let d = &booking.details;
        sqlx::query(
            r#"
            INSERT INTO bookings (id, booking_no, booking_date, created_by, status, customer_name,
                customer_address, customer_phone, pickup_location, trip_destination, total_persons,
                journey_start_date, journey_return_date, trip_start_time, trip_end_time, total_days,
                total_kilometers, night_halt_places, vehicle_type, advance_amount, total_amount,
                other_expenses, driver_food_accommodation, vehicle_id, vehicle_no, created_at,
                updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(booking.id.to_string())
        .bind(&booking.booking_no)
        .bind(format_date(booking.booking_date))
        .bind(booking.created_by.to_string())
        .bind(booking.status.as_str())
        .bind(&d.customer_name)
        .bind(&d.customer_address)
        .bind(&d.customer_phone)
        .bind(&d.pickup_location)
        .bind(&d.trip_destination)
        .bind(d.total_persons)
        .bind(format_date(d.journey_start_date))
        .bind(format_date(d.journey_return_date))
        .bind(d.trip_start_time.to_string())
        .bind(d.trip_end_time.to_string())
        .bind(booking.total_days)
        .bind(d.total_kilometers)
        .bind(&d.night_halt_places)
        .bind(&d.vehicle_type)
        .bind(d.advance_amount)
        .bind(d.total_amount)
        .bind(&d.other_expenses)
        .bind(&d.driver_food_accommodation)
        .bind(d.vehicle_id.to_string())
        .bind(&booking.vehicle_no)
        .bind(booking.created_at.to_rfc3339())
        .bind(booking.updated_at.to_rfc3339())
        .execute(executor)
        .await
        .context("Failed to save booking")?;
        Ok(())
    }

    /// Overwrite the details and status of a booking. Number, creator and
    /// booking date never change.
    pub async fn update_booking<'e, E>(&self, executor: E, booking: &Booking) -> Result<()>
    where
        E: SqliteExecutor<'e>,
    {
        let d = &booking.details;
        sqlx::query(
            r#"
            UPDATE bookings
            SET status = ?, customer_name = ?, customer_address = ?, customer_phone = ?,
                pickup_location = ?, trip_destination = ?, total_persons = ?,
                journey_start_date = ?, journey_return_date = ?, trip_start_time = ?,
                trip_end_time = ?, total_days = ?, total_kilometers = ?, night_halt_places = ?,
                vehicle_type = ?, advance_amount = ?, total_amount = ?, other_expenses = ?,
                driver_food_accommodation = ?, vehicle_id = ?, vehicle_no = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(booking.status.as_str())
        .bind(&d.customer_name)
        .bind(&d.customer_address)
        .bind(&d.customer_phone)
        .bind(&d.pickup_location)
        .bind(&d.trip_destination)
        .bind(d.total_persons)
        .bind(format_date(d.journey_start_date))
        .bind(format_date(d.journey_return_date))
        .bind(d.trip_start_time.to_string())
        .bind(d.trip_end_time.to_string())
        .bind(booking.total_days)
        .bind(d.total_kilometers)
        .bind(&d.night_halt_places)
        .bind(&d.vehicle_type)
        .bind(d.advance_amount)
        .bind(d.total_amount)
        .bind(&d.other_expenses)
        .bind(&d.driver_food_accommodation)
        .bind(d.vehicle_id.to_string())
        .bind(&booking.vehicle_no)
        .bind(booking.updated_at.to_rfc3339())
        .bind(booking.id.to_string())
        .execute(executor)
        .await
        .context("Failed to update booking")?;
        Ok(())
    }

    pub async fn delete_booking(&self, id: BookingId) -> Result<()> {
        sqlx::query("DELETE FROM bookings WHERE id = ?")
            .bind(id.to_string())
            .execute(self.pool())
            .await
            .context("Failed to delete booking")?;
        Ok(())
    }

    pub async fn get_booking<'e, E>(&self, executor: E, id: BookingId) -> Result<Option<Booking>>
    where
        E: SqliteExecutor<'e>,
    {
        let sql = format!("SELECT {} FROM bookings WHERE id = ?", BOOKING_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(executor)
            .await
            .context("Failed to fetch booking")?;

        row.as_ref().map(Self::row_to_booking).transpose()
    }

    /// Bookings matching `filter`, most recently created first.
    pub async fn list_bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM bookings
            WHERE (?1 IS NULL OR created_by = ?1)
              AND (?2 IS NULL OR status = ?2)
              AND (?3 IS NULL OR vehicle_id = ?3)
              AND (?4 IS NULL OR journey_return_date >= ?4)
              AND (?5 IS NULL OR journey_start_date <= ?5)
            ORDER BY created_at DESC, booking_no DESC
            "#,
            BOOKING_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(filter.created_by.map(|id| id.to_string()))
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.vehicle_id.map(|id| id.to_string()))
            .bind(filter.start_date.map(format_date))
            .bind(filter.end_date.map(format_date))
            .fetch_all(self.pool())
            .await
            .context("Failed to list bookings")?;

        rows.iter().map(Self::row_to_booking).collect()
    }

    /// Coarse overlap query: blocking bookings of `vehicle_id` whose date
    /// span touches `[start_date, end_date]`. Time-of-day is left to the
    /// caller.
    pub async fn find_overlapping_bookings<'e, E>(
        &self,
        executor: E,
        vehicle_id: VehicleId,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Booking>>
    where
        E: SqliteExecutor<'e>,
    {
        let sql = format!(
            r#"
            SELECT {}
            FROM bookings
            WHERE vehicle_id = ?
              AND status IN ('pending', 'approved')
              AND journey_start_date <= ?
              AND journey_return_date >= ?
            ORDER BY journey_start_date ASC, trip_start_time ASC
            "#,
            BOOKING_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(vehicle_id.to_string())
            .bind(format_date(end_date))
            .bind(format_date(start_date))
            .fetch_all(executor)
            .await
            .context("Failed to query overlapping bookings")?;

        rows.iter().map(Self::row_to_booking).collect()
    }

    fn row_to_booking(row: &sqlx::sqlite::SqliteRow) -> Result<Booking> {
        let id: String = row.get("id");
        let booking_date: String = row.get("booking_date");
        let created_by: String = row.get("created_by");
        let status: String = row.get("status");
        let start_date: String = row.get("journey_start_date");
        let return_date: String = row.get("journey_return_date");
        let start_time: String = row.get("trip_start_time");
        let end_time: String = row.get("trip_end_time");
        let vehicle_id: String = row.get("vehicle_id");
        let created_at: String = row.get("created_at");
        let updated_at: String = row.get("updated_at");

        let details = BookingDetails {
            customer_name: row.get("customer_name"),
            customer_address: row.get("customer_address"),
            customer_phone: row.get("customer_phone"),
            pickup_location: row.get("pickup_location"),
            trip_destination: row.get("trip_destination"),
            total_persons: row.get("total_persons"),
            journey_start_date: parse_date(&start_date)?,
            journey_return_date: parse_date(&return_date)?,
            trip_start_time: parse_clock(&start_time)?,
            trip_end_time: parse_clock(&end_time)?,
            total_kilometers: row.get("total_kilometers"),
            night_halt_places: row.get("night_halt_places"),
            vehicle_type: row.get("vehicle_type"),
            advance_amount: row.get("advance_amount"),
            total_amount: row.get("total_amount"),
            other_expenses: row.get("other_expenses"),
            driver_food_accommodation: row.get("driver_food_accommodation"),
            vehicle_id: parse_uuid(&vehicle_id, "vehicle ID")?,
        };

        Ok(Booking {
            id: parse_uuid(&id, "booking ID")?,
            booking_no: row.get("booking_no"),
            booking_date: parse_date(&booking_date)?,
            created_by: parse_uuid(&created_by, "user ID")?,
            status: BookingStatus::from_str(&status)
                .ok_or_else(|| anyhow::anyhow!("Invalid booking status: {}", status))?,
            details,
            total_days: row.get("total_days"),
            vehicle_no: row.get("vehicle_no"),
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        })
    }
}

fn parse_clock(s: &str) -> Result<ClockTime> {
    s.parse().context("Invalid clock time")
}

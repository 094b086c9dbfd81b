use chrono::Utc;
use sqlx::{Sqlite, Transaction};
use tracing::{info, instrument, warn};

use crate::domain::{
    check_availability, format_booking_no, parse_booking_seq, Actor, Availability,
    AvailabilityRequest, Booking, BookingDetails, BookingId, BookingStatus, ReservationWindow,
};
use crate::storage::BookingFilter;

use super::{AppError, FleetService, LockKey};

impl FleetService {
    // ========================
    // Booking operations
    // ========================

    /// Check whether a vehicle is free for the requested window.
    pub async fn check_availability(
        &self,
        request: &AvailabilityRequest,
    ) -> Result<Availability, AppError> {
        validate_window(&request.window)?;
        self.require_vehicle(self.repo.pool(), request.window.vehicle_id)
            .await?;

        let candidates = self
            .repo
            .find_overlapping_bookings(
                self.repo.pool(),
                request.window.vehicle_id,
                request.window.start_date,
                request.window.end_date,
            )
            .await?;
        Ok(check_availability(request, &candidates))
    }

    /// Run the availability check inside `tx` and fail with the conflicts
    /// when the window is taken.
    async fn ensure_available(
        &self,
        tx: &mut Transaction<'static, Sqlite>,
        request: AvailabilityRequest,
    ) -> Result<(), AppError> {
        let window = request.window;
        let candidates = self
            .repo
            .find_overlapping_bookings(&mut **tx, window.vehicle_id, window.start_date, window.end_date)
            .await?;
        let availability = check_availability(&request, &candidates);
        if availability.available {
            return Ok(());
        }

        warn!(
            vehicle_id = %window.vehicle_id,
            conflicts = availability.conflicts.len(),
            "vehicle unavailable"
        );
        Err(AppError::VehicleUnavailable {
            conflicts: availability.conflicts,
        })
    }

    /// Create a pending booking. Fails with the conflicting bookings when
    /// the vehicle is already held for the window.
    #[instrument(skip(self, details), fields(user_id = %actor.user_id, vehicle_id = %details.vehicle_id))]
    pub async fn create_booking(
        &self,
        actor: &Actor,
        details: BookingDetails,
    ) -> Result<Booking, AppError> {
        AppError::check_problems(details.problems())?;

        let _guards = self
            .locks
            .lock_all(&[LockKey::Vehicle(details.vehicle_id), LockKey::BookingNumbers])
            .await;
        let mut tx = self.repo.begin().await?;

        let vehicle = self.require_vehicle(&mut *tx, details.vehicle_id).await?;
        if !vehicle.is_active() {
            return Err(AppError::Validation(format!(
                "vehicle {} is inactive",
                vehicle.vehicle_no
            )));
        }
        self.ensure_available(&mut tx, AvailabilityRequest::new(details.window()))
            .await?;

        let today = Utc::now().date_naive();
        let on_file = self
            .repo
            .booking_nos_on(&mut *tx, today)
            .await?
            .iter()
            .filter_map(|no| parse_booking_seq(no))
            .max()
            .unwrap_or(0);
        let seq = self.repo.next_booking_seq(&mut *tx, today, on_file).await?;
        let booking = Booking::new(
            format_booking_no(today, seq - 1),
            today,
            details,
            vehicle.vehicle_no,
            actor.user_id,
        );
        self.repo.insert_booking(&mut *tx, &booking).await?;
        tx.commit().await?;

        info!(booking_no = %booking.booking_no, "booking created");
        Ok(booking)
    }

    /// Get a booking. Drivers may only see their own.
    pub async fn get_booking(&self, actor: &Actor, id: BookingId) -> Result<Booking, AppError> {
        let booking = self.load_booking(id).await?;
        if !actor.owns_or_admin(booking.created_by) {
            return Err(AppError::Forbidden("not your booking".to_string()));
        }
        Ok(booking)
    }

    /// Bookings matching `filter`. Drivers only ever see their own.
    pub async fn list_bookings(
        &self,
        actor: &Actor,
        mut filter: BookingFilter,
    ) -> Result<Vec<Booking>, AppError> {
        if !actor.is_admin() {
            filter.created_by = Some(actor.user_id);
        }
        Ok(self.repo.list_bookings(&filter).await?)
    }

    /// Replace a booking's details. Creators may edit while pending; admins
    /// in any status. Moving the window re-checks availability.
    #[instrument(skip(self, details), fields(user_id = %actor.user_id))]
    pub async fn update_booking(
        &self,
        actor: &Actor,
        id: BookingId,
        details: BookingDetails,
    ) -> Result<Booking, AppError> {
        AppError::check_problems(details.problems())?;

        let current = self.load_booking(id).await?;
        ensure_can_modify(actor, &current, "edit")?;

        let _guards = self
            .locks
            .lock_all(&[
                LockKey::Vehicle(current.details.vehicle_id),
                LockKey::Vehicle(details.vehicle_id),
            ])
            .await;
        let mut tx = self.repo.begin().await?;
        let mut booking = self
            .repo
            .get_booking(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::BookingNotFound(id.to_string()))?;
        ensure_can_modify(actor, &booking, "edit")?;

        let vehicle = self.require_vehicle(&mut *tx, details.vehicle_id).await?;
        let window = details.window();
        if window != booking.window() && booking.status.blocks_vehicle() {
            self.ensure_available(&mut tx, AvailabilityRequest::new(window).excluding(id))
                .await?;
        }

        booking.apply_details(details, vehicle.vehicle_no);
        self.repo.update_booking(&mut *tx, &booking).await?;
        tx.commit().await?;

        info!(booking_no = %booking.booking_no, "booking updated");
        Ok(booking)
    }

    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn delete_booking(&self, actor: &Actor, id: BookingId) -> Result<(), AppError> {
        let booking = self.load_booking(id).await?;
        ensure_can_modify(actor, &booking, "delete")?;

        self.repo.delete_booking(id).await?;
        info!(booking_no = %booking.booking_no, "booking deleted");
        Ok(())
    }

    /// Approve or reject a pending booking. Approval re-checks availability
    /// in the same transaction as the status write.
    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn set_booking_status(
        &self,
        actor: &Actor,
        id: BookingId,
        target: BookingStatus,
    ) -> Result<Booking, AppError> {
        Self::require_admin(actor, "approve or reject bookings")?;

        let current = self.load_booking(id).await?;
        let _guard = self
            .locks
            .lock(LockKey::Vehicle(current.details.vehicle_id))
            .await;

        let mut tx = self.repo.begin().await?;
        let mut booking = self
            .repo
            .get_booking(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::BookingNotFound(id.to_string()))?;
        let next = booking.status.transition(target)?;

        if next == BookingStatus::Approved {
            self.ensure_available(&mut tx, AvailabilityRequest::new(booking.window()).excluding(id))
                .await?;
        }

        booking.status = next;
        booking.updated_at = Utc::now();
        self.repo.update_booking(&mut *tx, &booking).await?;
        tx.commit().await?;

        info!(booking_no = %booking.booking_no, status = %booking.status, "booking decided");
        Ok(booking)
    }

    async fn load_booking(&self, id: BookingId) -> Result<Booking, AppError> {
        self.repo
            .get_booking(self.repo.pool(), id)
            .await?
            .ok_or_else(|| AppError::BookingNotFound(id.to_string()))
    }
}

fn validate_window(window: &ReservationWindow) -> Result<(), AppError> {
    if window.end_date < window.start_date {
        return Err(AppError::Validation(
            "journey return date is before the start date".to_string(),
        ));
    }
    Ok(())
}

fn ensure_can_modify(actor: &Actor, booking: &Booking, action: &str) -> Result<(), AppError> {
    if actor.is_admin() {
        return Ok(());
    }
    if booking.created_by != actor.user_id {
        return Err(AppError::Forbidden(format!("cannot {} another user's booking", action)));
    }
    if booking.status != BookingStatus::Pending {
        return Err(AppError::Forbidden(format!(
            "cannot {} a booking that is already {}",
            action, booking.status
        )));
    }
    Ok(())
}

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
};
use tracing::{info, instrument};

use crate::api::schemas::{
    ApiError, ApiJson, ApiPath, ApiQuery, ApiResponse, ApiResult, AppState, BookingQuery,
    CurrentActor, StatusRequest,
};
use crate::domain::{Availability, AvailabilityRequest, Booking, BookingDetails, BookingId};
use crate::storage::BookingFilter;

impl From<BookingQuery> for BookingFilter {
    fn from(query: BookingQuery) -> Self {
        BookingFilter {
            created_by: None,
            status: query.status,
            vehicle_id: query.vehicle_id,
            start_date: query.start_date,
            end_date: query.end_date,
        }
    }
}

#[instrument(skip(state))]
pub async fn list_bookings(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiQuery(query): ApiQuery<BookingQuery>,
) -> ApiResult<Vec<Booking>> {
    let bookings = state.service.list_bookings(&actor, query.into()).await?;
    Ok(ApiResponse::ok(bookings, "Bookings retrieved successfully"))
}

#[instrument(skip(state, details))]
pub async fn create_booking(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(details): ApiJson<BookingDetails>,
) -> Result<(StatusCode, Json<ApiResponse<Booking>>), ApiError> {
    let booking = state.service.create_booking(&actor, details).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(booking, "Booking created successfully"),
    ))
}

#[instrument(skip(state))]
pub async fn get_booking(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath(id): ApiPath<BookingId>,
) -> ApiResult<Booking> {
    let booking = state.service.get_booking(&actor, id).await?;
    Ok(ApiResponse::ok(booking, "Booking retrieved successfully"))
}

#[instrument(skip(state, details))]
pub async fn update_booking(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath(id): ApiPath<BookingId>,
    ApiJson(details): ApiJson<BookingDetails>,
) -> ApiResult<Booking> {
    let booking = state.service.update_booking(&actor, id, details).await?;
    Ok(ApiResponse::ok(booking, "Booking updated successfully"))
}

#[instrument(skip(state))]
pub async fn delete_booking(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath(id): ApiPath<BookingId>,
) -> ApiResult<()> {
    state.service.delete_booking(&actor, id).await?;
    Ok(ApiResponse::ok((), "Booking deleted successfully"))
}

/// Approve or reject a pending booking.
#[instrument(skip(state))]
pub async fn set_booking_status(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath(id): ApiPath<BookingId>,
    ApiJson(request): ApiJson<StatusRequest>,
) -> ApiResult<Booking> {
    let booking = state
        .service
        .set_booking_status(&actor, id, request.status)
        .await?;
    let message = format!("Booking {} successfully", booking.status);
    Ok(ApiResponse::ok(booking, message))
}

#[instrument(skip(state))]
pub async fn check_availability(
    State(state): State<AppState>,
    CurrentActor(_actor): CurrentActor,
    ApiJson(request): ApiJson<AvailabilityRequest>,
) -> ApiResult<Availability> {
    let availability = state.service.check_availability(&request).await?;
    info!(
        available = availability.available,
        conflicts = availability.conflicts.len(),
        "Availability checked"
    );
    let message = if availability.available {
        "Vehicle is available"
    } else {
        "Vehicle is not available for the selected dates and times"
    };
    Ok(ApiResponse::ok(availability, message))
}

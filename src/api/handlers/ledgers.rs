use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
};
use tracing::instrument;

use crate::api::schemas::{
    ApiError, ApiJson, ApiPath, ApiQuery, ApiResponse, ApiResult, AppState, CurrentActor,
    DateRangeQuery, MonthQuery, OpeningBalanceRequest, YearQuery,
};
use crate::application::{CashEntryInput, CashLedger, MonthlySummary, TripInput, VehicleLedger};
use crate::domain::{CashEntry, CashEntryId, OpeningBalance, Trip, TripId, VehicleId};

// ========================
// Trips
// ========================

#[instrument(skip(state, input))]
pub async fn create_trip(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(input): ApiJson<TripInput>,
) -> Result<(StatusCode, Json<ApiResponse<Trip>>), ApiError> {
    let trip = state.service.create_trip(&actor, input).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(trip, "Trip recorded successfully"),
    ))
}

#[instrument(skip(state))]
pub async fn get_trip(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath(id): ApiPath<TripId>,
) -> ApiResult<Trip> {
    let trip = state.service.get_trip(&actor, id).await?;
    Ok(ApiResponse::ok(trip, "Trip retrieved successfully"))
}

#[instrument(skip(state, input))]
pub async fn update_trip(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath(id): ApiPath<TripId>,
    ApiJson(input): ApiJson<TripInput>,
) -> ApiResult<Trip> {
    let trip = state.service.update_trip(&actor, id, input).await?;
    Ok(ApiResponse::ok(trip, "Trip updated successfully"))
}

#[instrument(skip(state))]
pub async fn delete_trip(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath(id): ApiPath<TripId>,
) -> ApiResult<()> {
    state.service.delete_trip(&actor, id).await?;
    Ok(ApiResponse::ok((), "Trip deleted successfully"))
}

// ========================
// Vehicle ledger and opening balances
// ========================

#[instrument(skip(state))]
pub async fn get_vehicle_ledger(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath(vehicle_id): ApiPath<VehicleId>,
    ApiQuery(query): ApiQuery<YearQuery>,
) -> ApiResult<VehicleLedger> {
    let ledger = state
        .service
        .vehicle_ledger(&actor, vehicle_id, query.year)
        .await?;
    Ok(ApiResponse::ok(ledger, "Ledger retrieved successfully"))
}

#[instrument(skip(state))]
pub async fn list_opening_balances(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiQuery(query): ApiQuery<YearQuery>,
) -> ApiResult<Vec<OpeningBalance>> {
    let balances = state
        .service
        .list_opening_balances(&actor, query.year)
        .await?;
    Ok(ApiResponse::ok(balances, "Opening balances retrieved successfully"))
}

#[instrument(skip(state))]
pub async fn set_opening_balance(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(request): ApiJson<OpeningBalanceRequest>,
) -> ApiResult<OpeningBalance> {
    let balance = state
        .service
        .set_opening_balance(&actor, request.vehicle_id, request.year, request.amount)
        .await?;
    Ok(ApiResponse::ok(balance, "Opening balance saved successfully"))
}

// ========================
// Admin cash ledger
// ========================

#[instrument(skip(state))]
pub async fn get_cash_ledger(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiQuery(query): ApiQuery<DateRangeQuery>,
) -> ApiResult<CashLedger> {
    let ledger = state
        .service
        .cash_ledger(&actor, query.start_date, query.end_date)
        .await?;
    Ok(ApiResponse::ok(ledger, "Cash ledger retrieved successfully"))
}

#[instrument(skip(state, input))]
pub async fn create_cash_entry(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(input): ApiJson<CashEntryInput>,
) -> Result<(StatusCode, Json<ApiResponse<CashEntry>>), ApiError> {
    let entry = state.service.create_cash_entry(&actor, input).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(entry, "Cash entry recorded successfully"),
    ))
}

#[instrument(skip(state, input))]
pub async fn update_cash_entry(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath(id): ApiPath<CashEntryId>,
    ApiJson(input): ApiJson<CashEntryInput>,
) -> ApiResult<CashEntry> {
    let entry = state.service.update_cash_entry(&actor, id, input).await?;
    Ok(ApiResponse::ok(entry, "Cash entry updated successfully"))
}

#[instrument(skip(state))]
pub async fn delete_cash_entry(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath(id): ApiPath<CashEntryId>,
) -> ApiResult<()> {
    state.service.delete_cash_entry(&actor, id).await?;
    Ok(ApiResponse::ok((), "Cash entry deleted successfully"))
}

// ========================
// Summary
// ========================

#[instrument(skip(state))]
pub async fn get_monthly_summary(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiQuery(query): ApiQuery<MonthQuery>,
) -> ApiResult<MonthlySummary> {
    let summary = state
        .service
        .monthly_summary(&actor, query.month.as_deref())
        .await?;
    Ok(ApiResponse::ok(summary, "Monthly summary retrieved successfully"))
}

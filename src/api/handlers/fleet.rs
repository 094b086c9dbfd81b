use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
};
use tracing::{debug, instrument};

use crate::api::schemas::{
    ApiError, ApiJson, ApiPath, ApiResponse, ApiResult, AppState, CreateVehicleRequest,
    CurrentActor, UpdateVehicleRequest,
};
use crate::application::NewUser;
use crate::domain::{
    ServiceDetails, ServiceLog, ServiceLogId, Trip, User, Vehicle, VehicleId, VehicleOverview,
};

// ========================
// Vehicles
// ========================

#[instrument(skip(state))]
pub async fn list_vehicles(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> ApiResult<Vec<VehicleOverview>> {
    let vehicles = state.service.list_vehicles(&actor).await?;
    debug!("Listed {} vehicles", vehicles.len());
    Ok(ApiResponse::ok(vehicles, "Vehicles retrieved successfully"))
}

#[instrument(skip(state))]
pub async fn create_vehicle(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(request): ApiJson<CreateVehicleRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Vehicle>>), ApiError> {
    let vehicle = state
        .service
        .create_vehicle(&actor, &request.vehicle_no, request.status)
        .await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(vehicle, "Vehicle created successfully"),
    ))
}

#[instrument(skip(state))]
pub async fn get_vehicle(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath(id): ApiPath<VehicleId>,
) -> ApiResult<Vehicle> {
    let vehicle = state.service.get_vehicle(&actor, id).await?;
    Ok(ApiResponse::ok(vehicle, "Vehicle retrieved successfully"))
}

#[instrument(skip(state))]
pub async fn update_vehicle(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath(id): ApiPath<VehicleId>,
    ApiJson(request): ApiJson<UpdateVehicleRequest>,
) -> ApiResult<Vehicle> {
    let vehicle = state
        .service
        .update_vehicle(&actor, id, request.vehicle_no.as_deref(), request.status)
        .await?;
    Ok(ApiResponse::ok(vehicle, "Vehicle updated successfully"))
}

#[instrument(skip(state))]
pub async fn delete_vehicle(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath(id): ApiPath<VehicleId>,
) -> ApiResult<()> {
    state.service.delete_vehicle(&actor, id).await?;
    Ok(ApiResponse::ok((), "Vehicle deleted successfully"))
}

/// Active vehicles, for booking and trip forms. Any signed-in role.
#[instrument(skip(state))]
pub async fn list_active_vehicles(
    State(state): State<AppState>,
    CurrentActor(_actor): CurrentActor,
) -> ApiResult<Vec<Vehicle>> {
    let vehicles = state.service.list_active_vehicles().await?;
    Ok(ApiResponse::ok(vehicles, "Vehicles retrieved successfully"))
}

#[instrument(skip(state))]
pub async fn list_vehicle_trips(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath(id): ApiPath<VehicleId>,
) -> ApiResult<Vec<Trip>> {
    let trips = state.service.list_vehicle_trips(&actor, id).await?;
    Ok(ApiResponse::ok(trips, "Trips retrieved successfully"))
}

// ========================
// Service logs
// ========================

#[instrument(skip(state))]
pub async fn list_service_logs(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath(vehicle_id): ApiPath<VehicleId>,
) -> ApiResult<Vec<ServiceLog>> {
    let logs = state.service.list_service_logs(&actor, vehicle_id).await?;
    Ok(ApiResponse::ok(logs, "Service logs retrieved successfully"))
}

#[instrument(skip(state, details))]
pub async fn create_service_log(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath(vehicle_id): ApiPath<VehicleId>,
    ApiJson(details): ApiJson<ServiceDetails>,
) -> Result<(StatusCode, Json<ApiResponse<ServiceLog>>), ApiError> {
    let log = state
        .service
        .create_service_log(&actor, vehicle_id, details)
        .await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(log, "Service log created successfully"),
    ))
}

#[instrument(skip(state, details))]
pub async fn update_service_log(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath((vehicle_id, log_id)): ApiPath<(VehicleId, ServiceLogId)>,
    ApiJson(details): ApiJson<ServiceDetails>,
) -> ApiResult<ServiceLog> {
    let log = state
        .service
        .update_service_log(&actor, vehicle_id, log_id, details)
        .await?;
    Ok(ApiResponse::ok(log, "Service log updated successfully"))
}

#[instrument(skip(state))]
pub async fn delete_service_log(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath((vehicle_id, log_id)): ApiPath<(VehicleId, ServiceLogId)>,
) -> ApiResult<()> {
    state
        .service
        .delete_service_log(&actor, vehicle_id, log_id)
        .await?;
    Ok(ApiResponse::ok((), "Service log deleted successfully"))
}

// ========================
// Users
// ========================

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> ApiResult<Vec<User>> {
    let users = state.service.list_users(&actor).await?;
    Ok(ApiResponse::ok(users, "Users retrieved successfully"))
}

#[instrument(skip(state, request))]
pub async fn create_user(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(request): ApiJson<NewUser>,
) -> Result<(StatusCode, Json<ApiResponse<User>>), ApiError> {
    let user = state.service.create_user(&actor, request).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(user, "User created successfully"),
    ))
}

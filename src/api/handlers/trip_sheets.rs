use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use tracing::{error, instrument};

use crate::api::schemas::{
    ApiError, ApiJson, ApiPath, ApiQuery, ApiResponse, ApiResult, AppState, CurrentActor,
    TripSheetQuery,
};
use crate::application::AppError;
use crate::domain::{TripSheet, TripSheetDetails, TripSheetId};
use crate::io::{TextRenderer, TripSheetLayout, TripSheetRenderer};
use crate::storage::TripSheetFilter;

impl From<TripSheetQuery> for TripSheetFilter {
    fn from(query: TripSheetQuery) -> Self {
        TripSheetFilter {
            start_date: query.start_date,
            end_date: query.end_date,
            vehicle_reg: query.vehicle_reg,
            guest_name: query.guest_name,
        }
    }
}

#[instrument(skip(state))]
pub async fn list_trip_sheets(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiQuery(query): ApiQuery<TripSheetQuery>,
) -> ApiResult<Vec<TripSheet>> {
    let sheets = state.service.list_trip_sheets(&actor, query.into()).await?;
    Ok(ApiResponse::ok(sheets, "Trip sheets retrieved successfully"))
}

#[instrument(skip(state, details))]
pub async fn create_trip_sheet(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(details): ApiJson<TripSheetDetails>,
) -> Result<(StatusCode, Json<ApiResponse<TripSheet>>), ApiError> {
    let sheet = state.service.create_trip_sheet(&actor, details).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(sheet, "Trip sheet created successfully"),
    ))
}

#[instrument(skip(state))]
pub async fn get_trip_sheet(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath(id): ApiPath<TripSheetId>,
) -> ApiResult<TripSheet> {
    let sheet = state.service.get_trip_sheet(&actor, id).await?;
    Ok(ApiResponse::ok(sheet, "Trip sheet retrieved successfully"))
}

#[instrument(skip(state, details))]
pub async fn update_trip_sheet(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath(id): ApiPath<TripSheetId>,
    ApiJson(details): ApiJson<TripSheetDetails>,
) -> ApiResult<TripSheet> {
    let sheet = state.service.update_trip_sheet(&actor, id, details).await?;
    Ok(ApiResponse::ok(sheet, "Trip sheet updated successfully"))
}

#[instrument(skip(state))]
pub async fn delete_trip_sheet(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath(id): ApiPath<TripSheetId>,
) -> ApiResult<()> {
    state.service.delete_trip_sheet(&actor, id).await?;
    Ok(ApiResponse::ok((), "Trip sheet deleted successfully"))
}

/// The printable sheet as plain text, offered as a download.
#[instrument(skip(state))]
pub async fn render_trip_sheet(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath(id): ApiPath<TripSheetId>,
) -> Result<impl IntoResponse, ApiError> {
    let sheet = state.service.get_trip_sheet(&actor, id).await?;
    let layout = TripSheetLayout::build(&sheet, &state.letterhead);
    let renderer = TextRenderer::default();
    let body = renderer.render(&layout).map_err(|err| {
        error!("Failed to render trip sheet {}: {}", sheet.trip_sheet_no, err);
        ApiError::App(AppError::Database(err))
    })?;

    let disposition = format!(
        "attachment; filename=\"{}.{}\"",
        layout.file_stem,
        renderer.file_extension()
    );
    Ok((
        [
            (header::CONTENT_TYPE, renderer.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

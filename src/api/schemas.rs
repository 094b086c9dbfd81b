use axum::{
    async_trait,
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts,
    },
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use uuid::Uuid;

use crate::application::{AppError, ErrorKind, FleetService};
use crate::domain::{Actor, BookingStatus, Cents, Conflict, Role, VehicleId, VehicleStatus};
use crate::io::Letterhead;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: FleetService,
    pub letterhead: Letterhead,
}

/// Standard API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Response message
    pub message: String,
    /// Success status
    pub success: bool,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Json<Self> {
        Json(Self {
            data,
            message: message.into(),
            success: true,
        })
    }
}

/// Error response model
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    pub code: String,
    /// Success status (always false for errors)
    pub success: bool,
    /// Bookings that block the requested window, on availability failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflicts: Option<Vec<Conflict>>,
}

/// Anything a handler can fail with.
#[derive(Debug)]
pub enum ApiError {
    App(AppError),
    Unauthorized(String),
    /// The body, path or query string could not be decoded.
    BadRequest(String),
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError::App(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// `Json` body extractor that fails with the standard error body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Unauthorized(message) => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse {
                    error: message,
                    code: "UNAUTHORIZED".to_string(),
                    success: false,
                    conflicts: None,
                },
            ),
            ApiError::BadRequest(message) => {
                warn!(code = ErrorKind::Validation.as_str(), "Malformed request: {}", message);
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse {
                        error: message,
                        code: ErrorKind::Validation.as_str().to_string(),
                        success: false,
                        conflicts: None,
                    },
                )
            }
            ApiError::App(err) => {
                let kind = err.kind();
                let status = status_for(kind);
                let error = if kind == ErrorKind::Internal {
                    error!("Internal error: {}", err);
                    "Internal server error".to_string()
                } else {
                    warn!(code = kind.as_str(), "Request refused: {}", err);
                    err.to_string()
                };
                (
                    status,
                    ErrorResponse {
                        error,
                        code: kind.as_str().to_string(),
                        success: false,
                        conflicts: err.conflicts().map(<[Conflict]>::to_vec),
                    },
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// The caller, as vouched for by the authenticating proxy in front of us.
#[derive(Debug, Clone, Copy)]
pub struct CurrentActor(pub Actor);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentActor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let user_id = header(USER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("missing user id".to_string()))?;
        let user_id = Uuid::parse_str(user_id)
            .map_err(|_| ApiError::Unauthorized("invalid user id".to_string()))?;
        let role = header(USER_ROLE_HEADER)
            .and_then(Role::from_str)
            .ok_or_else(|| ApiError::Unauthorized("missing or invalid user role".to_string()))?;

        Ok(CurrentActor(Actor::new(user_id, role)))
    }
}

// ========================
// Request bodies
// ========================

#[derive(Debug, Deserialize, Serialize)]
pub struct CreateVehicleRequest {
    pub vehicle_no: String,
    #[serde(default)]
    pub status: VehicleStatus,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct UpdateVehicleRequest {
    pub vehicle_no: Option<String>,
    pub status: Option<VehicleStatus>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct OpeningBalanceRequest {
    pub vehicle_id: VehicleId,
    pub year: i32,
    pub amount: Cents,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct StatusRequest {
    pub status: BookingStatus,
}

// ========================
// Query strings
// ========================

#[derive(Debug, Default, Deserialize)]
pub struct YearQuery {
    pub year: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DateRangeQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BookingQuery {
    pub status: Option<BookingStatus>,
    pub vehicle_id: Option<VehicleId>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TripSheetQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub vehicle_reg: Option<String>,
    pub guest_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MonthQuery {
    pub month: Option<String>,
}

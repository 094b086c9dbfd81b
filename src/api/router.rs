use std::time::Duration;

use axum::{
    routing::{get, patch, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use super::handlers::{bookings, fleet, health::health_check, ledgers, trip_sheets};
use super::schemas::AppState;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Create application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Vehicles and their service logs
        .route(
            "/api/vehicles",
            get(fleet::list_vehicles).post(fleet::create_vehicle),
        )
        .route(
            "/api/vehicles/:id",
            get(fleet::get_vehicle)
                .put(fleet::update_vehicle)
                .delete(fleet::delete_vehicle),
        )
        .route("/api/vehicles/:id/trips", get(fleet::list_vehicle_trips))
        .route(
            "/api/vehicles/:id/service-logs",
            get(fleet::list_service_logs).post(fleet::create_service_log),
        )
        .route(
            "/api/vehicles/:id/service-logs/:log_id",
            put(fleet::update_service_log).delete(fleet::delete_service_log),
        )
        .route("/api/user/vehicles", get(fleet::list_active_vehicles))
        // Users
        .route("/api/users", get(fleet::list_users).post(fleet::create_user))
        // Trips and ledgers
        .route("/api/trips", post(ledgers::create_trip))
        .route(
            "/api/trips/:id",
            get(ledgers::get_trip)
                .put(ledgers::update_trip)
                .delete(ledgers::delete_trip),
        )
        .route("/api/ledger/:vehicle_id", get(ledgers::get_vehicle_ledger))
        .route(
            "/api/opening-balances",
            get(ledgers::list_opening_balances).post(ledgers::set_opening_balance),
        )
        .route(
            "/api/admin-cash-ledger",
            get(ledgers::get_cash_ledger).post(ledgers::create_cash_entry),
        )
        .route(
            "/api/admin-cash-ledger/:id",
            put(ledgers::update_cash_entry).delete(ledgers::delete_cash_entry),
        )
        .route("/api/summary/monthly", get(ledgers::get_monthly_summary))
        // Bookings
        .route(
            "/api/bookings",
            get(bookings::list_bookings).post(bookings::create_booking),
        )
        .route(
            "/api/bookings/check-availability",
            post(bookings::check_availability),
        )
        .route(
            "/api/bookings/:id",
            get(bookings::get_booking)
                .put(bookings::update_booking)
                .delete(bookings::delete_booking),
        )
        .route("/api/bookings/:id/status", patch(bookings::set_booking_status))
        // Trip sheets
        .route(
            "/api/trip-sheets",
            get(trip_sheets::list_trip_sheets).post(trip_sheets::create_trip_sheet),
        )
        .route(
            "/api/trip-sheets/:id",
            get(trip_sheets::get_trip_sheet)
                .put(trip_sheets::update_trip_sheet)
                .delete(trip_sheets::delete_trip_sheet),
        )
        .route("/api/trip-sheets/:id/render", get(trip_sheets::render_trip_sheet))
        // Add middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

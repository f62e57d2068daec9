//! CropMate API Library
//!
//! Order/delivery lifecycle core for the CropMate farm-to-table marketplace:
//! the order state machine with its payment split, the delivery state machine,
//! the driver-bidding broker, and the commission ledger.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod services;
pub mod storage;

use std::sync::Arc;

use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub auth_service: Arc<auth::AuthService>,
    pub services: handlers::AppServices,
}

// Common response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// API v1 routes: the lifecycle operations exposed one-to-one.
pub fn api_v1_routes() -> Router<AppState> {
    let orders = Router::new()
        .route("/orders", post(handlers::orders::create_order))
        .route("/orders", get(handlers::orders::list_orders))
        .route("/orders/:id", get(handlers::orders::get_order))
        .route(
            "/orders/:id/confirm-payment",
            post(handlers::orders::confirm_payment),
        )
        .route(
            "/orders/:id/reject-payment",
            post(handlers::orders::reject_payment),
        )
        .route(
            "/orders/:id/ready",
            post(handlers::orders::mark_ready_for_delivery),
        )
        .route("/orders/:id/cancel", post(handlers::orders::cancel_order));

    let deliveries = Router::new()
        .route(
            "/deliveries/available",
            get(handlers::deliveries::list_available),
        )
        .route("/deliveries/mine", get(handlers::deliveries::list_mine))
        .route("/deliveries/:id", get(handlers::deliveries::get_delivery))
        .route(
            "/deliveries/:id/accept",
            post(handlers::deliveries::accept_delivery),
        )
        .route(
            "/deliveries/:id/pickup",
            post(handlers::deliveries::pickup_delivery),
        )
        .route(
            "/deliveries/:id/complete",
            post(handlers::deliveries::complete_delivery),
        )
        .route(
            "/deliveries/:id/commission",
            get(handlers::deliveries::commission_summary),
        )
        .route(
            "/deliveries/:id/requests",
            post(handlers::delivery_requests::create_request),
        );

    let delivery_requests = Router::new()
        .route(
            "/delivery-requests",
            get(handlers::delivery_requests::list_requests),
        )
        .route(
            "/delivery-requests/:id/accept",
            post(handlers::delivery_requests::accept_request),
        )
        .route(
            "/delivery-requests/:id/reject",
            post(handlers::delivery_requests::reject_request),
        )
        .route(
            "/delivery-requests/:id/commission-payment",
            post(handlers::delivery_requests::submit_commission_payment),
        );

    Router::new()
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        .merge(orders)
        .merge(deliveries)
        .merge(delivery_requests)
}

async fn api_status() -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let status_data = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "cropmate-api",
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let db_status = if db::ping(&state.db).await {
        "healthy"
    } else {
        "unhealthy"
    };

    let health_data = json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}

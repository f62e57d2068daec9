use axum::{
    extract::{Path, State},
    response::Json,
};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    entities::delivery,
    errors::ServiceError,
    services::commission::CommissionSummary,
    ApiResponse, AppState,
};

/// GET /deliveries/available
pub async fn list_available(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<Vec<delivery::Model>>>, ServiceError> {
    let deliveries = state.services.deliveries.list_available(&user).await?;
    Ok(Json(ApiResponse::success(deliveries)))
}

/// GET /deliveries/mine
pub async fn list_mine(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<Vec<delivery::Model>>>, ServiceError> {
    let deliveries = state.services.deliveries.list_for_driver(&user).await?;
    Ok(Json(ApiResponse::success(deliveries)))
}

/// GET /deliveries/{id}
pub async fn get_delivery(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<delivery::Model>>, ServiceError> {
    let delivery = state.services.deliveries.get_delivery(id).await?;
    Ok(Json(ApiResponse::success(delivery)))
}

/// POST /deliveries/{id}/accept
pub async fn accept_delivery(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<delivery::Model>>, ServiceError> {
    let delivery = state.services.deliveries.accept_delivery(&user, id).await?;
    Ok(Json(ApiResponse::success(delivery)))
}

/// POST /deliveries/{id}/pickup
pub async fn pickup_delivery(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<delivery::Model>>, ServiceError> {
    let delivery = state.services.deliveries.pickup_delivery(&user, id).await?;
    Ok(Json(ApiResponse::success(delivery)))
}

/// POST /deliveries/{id}/complete
pub async fn complete_delivery(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<delivery::Model>>, ServiceError> {
    let delivery = state
        .services
        .deliveries
        .complete_delivery(&user, id)
        .await?;
    Ok(Json(ApiResponse::success(delivery)))
}

/// GET /deliveries/{id}/commission
pub async fn commission_summary(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<CommissionSummary>>, ServiceError> {
    let summary = state.services.commission.commission_summary(id).await?;
    Ok(Json(ApiResponse::success(summary)))
}

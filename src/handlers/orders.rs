use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::{AuthUser, UserRole},
    entities::order,
    errors::ServiceError,
    handlers::ProofUpload,
    services::orders::CreateOrderRequest,
    ApiResponse, AppState,
};

#[derive(Debug, Deserialize)]
pub struct CreateOrderBody {
    pub crop_id: Uuid,
    pub quantity: i32,
    pub delivery_address: String,
    pub payment_proof: ProofUpload,
}

/// POST /orders
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<CreateOrderBody>,
) -> Result<(StatusCode, Json<ApiResponse<order::Model>>), ServiceError> {
    let request = CreateOrderRequest {
        crop_id: body.crop_id,
        quantity: body.quantity,
        delivery_address: body.delivery_address,
        payment_proof: body.payment_proof.into_upload_file()?,
    };

    let created = state.services.orders.create_order(&user, request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

/// GET /orders/{id}
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<order::Model>>, ServiceError> {
    let order = state.services.orders.get_order(id).await?;

    // Buyers see their own orders; farmers and admins are checked by the
    // mutation paths, reads only hide other buyers' orders.
    if user.role == UserRole::Customer && !user.can_act_for(order.buyer_id) {
        return Err(ServiceError::NotFound("Order not found".to_string()));
    }

    Ok(Json(ApiResponse::success(order)))
}

/// GET /orders — role-scoped listing
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<Vec<order::Model>>>, ServiceError> {
    let orders = match user.role {
        UserRole::Farmer => state.services.orders.list_for_farmer(&user).await?,
        _ => state.services.orders.list_for_buyer(&user).await?,
    };
    Ok(Json(ApiResponse::success(orders)))
}

/// POST /orders/{id}/confirm-payment
pub async fn confirm_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<order::Model>>, ServiceError> {
    let order = state.services.orders.confirm_payment(&user, id).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// POST /orders/{id}/reject-payment
pub async fn reject_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<order::Model>>, ServiceError> {
    let order = state.services.orders.reject_payment(&user, id).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// POST /orders/{id}/ready
pub async fn mark_ready_for_delivery(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<order::Model>>, ServiceError> {
    let order = state
        .services
        .orders
        .mark_ready_for_delivery(&user, id)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

/// POST /orders/{id}/cancel
pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<order::Model>>, ServiceError> {
    let order = state.services.orders.cancel_order(&user, id).await?;
    Ok(Json(ApiResponse::success(order)))
}

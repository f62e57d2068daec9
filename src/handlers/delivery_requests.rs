use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::{AuthUser, UserRole},
    entities::delivery_request,
    errors::ServiceError,
    handlers::ProofUpload,
    services::delivery_requests::CreateDeliveryRequestInput,
    ApiResponse, AppState,
};

#[derive(Debug, Deserialize)]
pub struct CreateDeliveryRequestBody {
    pub custom_fee: Decimal,
    pub message: Option<String>,
}

/// POST /deliveries/{id}/requests
pub async fn create_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(delivery_id): Path<Uuid>,
    Json(body): Json<CreateDeliveryRequestBody>,
) -> Result<(StatusCode, Json<ApiResponse<delivery_request::Model>>), ServiceError> {
    let request = state
        .services
        .delivery_requests
        .create_request(
            &user,
            CreateDeliveryRequestInput {
                delivery_id,
                custom_fee: body.custom_fee,
                message: body.message,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(request))))
}

/// GET /delivery-requests — role-scoped listing
pub async fn list_requests(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<Vec<delivery_request::Model>>>, ServiceError> {
    let requests = match user.role {
        UserRole::Driver => state.services.delivery_requests.list_for_driver(&user).await?,
        _ => {
            state
                .services
                .delivery_requests
                .list_for_customer(&user)
                .await?
        }
    };
    Ok(Json(ApiResponse::success(requests)))
}

/// POST /delivery-requests/{id}/accept
pub async fn accept_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<delivery_request::Model>>, ServiceError> {
    let request = state
        .services
        .delivery_requests
        .accept_request(&user, id)
        .await?;
    Ok(Json(ApiResponse::success(request)))
}

/// POST /delivery-requests/{id}/reject
pub async fn reject_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<delivery_request::Model>>, ServiceError> {
    let request = state
        .services
        .delivery_requests
        .reject_request(&user, id)
        .await?;
    Ok(Json(ApiResponse::success(request)))
}

/// POST /delivery-requests/{id}/commission-payment
pub async fn submit_commission_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<ProofUpload>,
) -> Result<Json<ApiResponse<delivery_request::Model>>, ServiceError> {
    let proof = body.into_upload_file()?;
    let request = state
        .services
        .commission
        .submit_admin_payment(&user, id, proof)
        .await?;
    Ok(Json(ApiResponse::success(request)))
}

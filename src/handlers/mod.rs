//! Thin HTTP layer: handlers extract the authenticated caller, delegate to
//! the lifecycle services, and wrap results in the common response envelope.

pub mod deliveries;
pub mod delivery_requests;
pub mod orders;

use std::sync::Arc;

use base64::Engine as _;
use serde::Deserialize;

use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::events::EventSender;
use crate::services::{
    commission::CommissionService, deliveries::DeliveryService,
    delivery_requests::DeliveryRequestService, orders::OrderService,
};
use crate::storage::{ObjectStorage, UploadFile};

/// Container wiring every lifecycle service to shared infrastructure.
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<OrderService>,
    pub deliveries: Arc<DeliveryService>,
    pub delivery_requests: Arc<DeliveryRequestService>,
    pub commission: Arc<CommissionService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        storage: Arc<dyn ObjectStorage>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            orders: Arc::new(OrderService::new(
                db_pool.clone(),
                storage.clone(),
                Some(event_sender.clone()),
            )),
            deliveries: Arc::new(DeliveryService::new(
                db_pool.clone(),
                Some(event_sender.clone()),
            )),
            delivery_requests: Arc::new(DeliveryRequestService::new(
                db_pool.clone(),
                Some(event_sender.clone()),
            )),
            commission: Arc::new(CommissionService::new(
                db_pool,
                storage,
                Some(event_sender),
            )),
        }
    }
}

/// A file submitted inline as base64; the wire shape for payment proofs.
#[derive(Debug, Deserialize)]
pub struct ProofUpload {
    pub file_name: String,
    pub content_type: String,
    /// Base64-encoded file contents
    pub data: String,
}

impl ProofUpload {
    pub fn into_upload_file(self) -> Result<UploadFile, ServiceError> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(self.data.as_bytes())
            .map_err(|e| ServiceError::ValidationError(format!("invalid base64 payload: {e}")))?;

        Ok(UploadFile {
            file_name: self.file_name,
            content_type: self.content_type,
            bytes,
        })
    }
}

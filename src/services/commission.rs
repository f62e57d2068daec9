use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
};
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{AuthUser, UserRole},
    entities::{
        delivery::Entity as DeliveryEntity,
        delivery_request::{
            self, ActiveModel as RequestActiveModel, Entity as RequestEntity, RequestStatus,
        },
        order::Entity as OrderEntity,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    storage::{ObjectStorage, UploadFile},
};

/// Platform commission rate applied both to the order total (admin share) and
/// to driver earnings on an accepted delivery request.
pub const ADMIN_COMMISSION_RATE: Decimal = dec!(0.02);

/// Payment shares of an order total, fixed at creation time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentSplit {
    pub admin_payment: Decimal,
    pub farmer_payment: Decimal,
    pub driver_payment: Decimal,
}

/// Splits an order total into the 2% platform share and 98% farmer share.
///
/// The admin share is rounded to cents first and the farmer share is the
/// remainder, so `admin_payment + farmer_payment == total` holds exactly.
/// The driver share is always zero: driver compensation is negotiated later
/// through delivery requests.
pub fn order_payment_split(total_price: Decimal) -> PaymentSplit {
    let admin_payment = (total_price * ADMIN_COMMISSION_RATE).round_dp(2);
    PaymentSplit {
        admin_payment,
        farmer_payment: total_price - admin_payment,
        driver_payment: Decimal::ZERO,
    }
}

/// Admin commission owed on driver earnings.
pub fn admin_commission_on(earnings: Decimal) -> Decimal {
    (earnings * ADMIN_COMMISSION_RATE).round_dp(2)
}

/// Read-time view of a delivery's driver earnings and commission state.
#[derive(Debug, Clone, Serialize)]
pub struct CommissionSummary {
    pub delivery_id: Uuid,
    pub driver_earnings: Decimal,
    pub admin_commission: Decimal,
    pub commission_paid: bool,
}

/// Derives commission figures on read and handles proof-based settlement.
/// Nothing here is stored as derived state; only the settlement flags on the
/// accepted request are ever written.
#[derive(Clone)]
pub struct CommissionService {
    db: Arc<DatabaseConnection>,
    storage: Arc<dyn ObjectStorage>,
    event_sender: Option<Arc<EventSender>>,
}

impl CommissionService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        storage: Arc<dyn ObjectStorage>,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db,
            storage,
            event_sender,
        }
    }

    async fn accepted_request_for(
        &self,
        delivery_id: Uuid,
    ) -> Result<Option<delivery_request::Model>, ServiceError> {
        RequestEntity::find()
            .filter(delivery_request::Column::DeliveryId.eq(delivery_id))
            .filter(delivery_request::Column::Status.eq(RequestStatus::Accepted))
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Driver payment recorded on the delivery's order; compatibility path
    /// for data predating the delivery-request feature. Under current
    /// creation logic it is always zero.
    async fn legacy_driver_payment(&self, delivery_id: Uuid) -> Result<Decimal, ServiceError> {
        let delivery = DeliveryEntity::find_by_id(delivery_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Delivery not found".to_string()))?;

        let order = OrderEntity::find_by_id(delivery.order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        Ok(order.driver_payment)
    }

    /// Driver earnings for a delivery: the accepted request's fee, or the
    /// order's driver payment when no accepted request exists.
    #[instrument(skip(self), fields(delivery_id = %delivery_id))]
    pub async fn driver_earnings(&self, delivery_id: Uuid) -> Result<Decimal, ServiceError> {
        match self.accepted_request_for(delivery_id).await? {
            Some(accepted) => Ok(accepted.custom_fee),
            None => self.legacy_driver_payment(delivery_id).await,
        }
    }

    /// Full commission view for a delivery.
    #[instrument(skip(self), fields(delivery_id = %delivery_id))]
    pub async fn commission_summary(
        &self,
        delivery_id: Uuid,
    ) -> Result<CommissionSummary, ServiceError> {
        let accepted = self.accepted_request_for(delivery_id).await?;

        let driver_earnings = match &accepted {
            Some(request) => request.custom_fee,
            None => self.legacy_driver_payment(delivery_id).await?,
        };

        Ok(CommissionSummary {
            delivery_id,
            driver_earnings,
            admin_commission: admin_commission_on(driver_earnings),
            commission_paid: accepted.map(|r| r.admin_commission_paid).unwrap_or(false),
        })
    }

    /// Driver submits proof of paying the platform its commission. Manual
    /// settlement: the proof is stored and the paid flag set, with no
    /// automatic verification.
    #[instrument(skip(self, actor, proof), fields(request_id = %request_id, driver_id = %actor.user_id))]
    pub async fn submit_admin_payment(
        &self,
        actor: &AuthUser,
        request_id: Uuid,
        proof: UploadFile,
    ) -> Result<delivery_request::Model, ServiceError> {
        actor.require_role(UserRole::Driver)?;

        let request = RequestEntity::find_by_id(request_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Delivery request not found".to_string()))?;

        if !actor.can_act_for(request.driver_id) {
            return Err(ServiceError::Unauthorized(
                "Delivery request does not belong to this driver".to_string(),
            ));
        }

        if request.status != RequestStatus::Accepted {
            return Err(ServiceError::InvalidState(
                "Commission is only settled on an accepted delivery request".to_string(),
            ));
        }

        let stored = self.storage.upload(proof).await?;

        let driver_id = request.driver_id;
        let mut active: RequestActiveModel = request.into();
        active.payment_proof = Set(Some(stored.secure_url));
        active.admin_commission_paid = Set(true);
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&*self.db).await?;

        info!(request_id = %request_id, "Admin commission settled");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender
                .send(Event::CommissionSettled {
                    request_id,
                    driver_id,
                })
                .await
            {
                warn!(error = %e, request_id = %request_id, "Failed to send commission settled event");
            }
        }

        Ok(updated)
    }
}

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, JoinType,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, TransactionTrait,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::{AuthUser, UserRole},
    entities::{
        crop::{self, Entity as CropEntity},
        delivery::{
            self, ActiveModel as DeliveryActiveModel, DeliveryStatus, Entity as DeliveryEntity,
        },
        order::{self, ActiveModel as OrderActiveModel, Entity as OrderEntity, OrderStatus},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::commission::order_payment_split,
    storage::{ObjectStorage, UploadFile},
};

/// Input for order creation. The payment proof is the raw file; the service
/// uploads it and stores only the returned URL.
#[derive(Debug, Validate)]
pub struct CreateOrderRequest {
    pub crop_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    #[validate(length(min = 1, message = "Delivery address is required"))]
    pub delivery_address: String,
    pub payment_proof: UploadFile,
}

/// Owns the order state machine: creation with the payment split, payment
/// confirmation/rejection, ready-for-delivery, and cancellation.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    storage: Arc<dyn ObjectStorage>,
    event_sender: Option<Arc<EventSender>>,
}

impl OrderService {
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

    async fn send_event(&self, event: Event) {
        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, "Failed to send order event");
            }
        }
    }

    /// Loads an order together with the crop it was placed against and checks
    /// the caller is the farmer owning that crop.
    async fn owned_order<C: sea_orm::ConnectionTrait>(
        &self,
        conn: &C,
        actor: &AuthUser,
        order_id: Uuid,
    ) -> Result<order::Model, ServiceError> {
        let order = OrderEntity::find_by_id(order_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        let crop = CropEntity::find_by_id(order.crop_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Crop not found".to_string()))?;

        if !actor.can_act_for(crop.farmer_id) {
            return Err(ServiceError::Unauthorized(
                "Order does not belong to this farmer's crop".to_string(),
            ));
        }

        Ok(order)
    }

    /// Creates a new order. Any authenticated role may buy.
    ///
    /// The total and the 2%/98% admin/farmer split are computed here and
    /// fixed for the order's lifetime; later crop price changes never touch
    /// existing orders. Crop stock is deliberately not decremented: inventory
    /// is managed manually by admins.
    #[instrument(skip(self, actor, request), fields(buyer_id = %actor.user_id, crop_id = %request.crop_id))]
    pub async fn create_order(
        &self,
        actor: &AuthUser,
        request: CreateOrderRequest,
    ) -> Result<order::Model, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let crop = CropEntity::find_by_id(request.crop_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Crop not found".to_string()))?;

        let total_price = (crop.price_per_unit * Decimal::from(request.quantity)).round_dp(2);
        let split = order_payment_split(total_price);

        // Upload before opening the transaction; a storage failure must not
        // leave a half-created order behind.
        let stored = self.storage.upload(request.payment_proof).await?;

        let now = Utc::now();
        let order_id = Uuid::new_v4();

        let order_active_model = OrderActiveModel {
            id: Set(order_id),
            quantity: Set(request.quantity),
            total_price: Set(total_price),
            status: Set(OrderStatus::PendingPayment),
            delivery_address: Set(request.delivery_address),
            payment_proof: Set(Some(stored.secure_url)),
            buyer_id: Set(actor.user_id),
            crop_id: Set(crop.id),
            admin_payment: Set(split.admin_payment),
            driver_payment: Set(split.driver_payment),
            farmer_payment: Set(split.farmer_payment),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        };

        let order_model = order_active_model.insert(&*self.db).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to create order");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %order_id, total_price = %total_price, "Order created");
        self.send_event(Event::OrderCreated(order_id)).await;

        Ok(order_model)
    }

    /// Farmer confirms the buyer's payment. Moves the order to
    /// `PaymentReceived` and creates its delivery in one transaction.
    ///
    /// Deliberately idempotent: confirming an already-confirmed (or later)
    /// order is a silent no-op success so a double-invocation never creates a
    /// second delivery row. Only a cancelled order is an error.
    #[instrument(skip(self, actor), fields(order_id = %order_id, farmer_id = %actor.user_id))]
    pub async fn confirm_payment(
        &self,
        actor: &AuthUser,
        order_id: Uuid,
    ) -> Result<order::Model, ServiceError> {
        actor.require_role(UserRole::Farmer)?;

        let txn = self.db.begin().await?;

        let order = self.owned_order(&txn, actor, order_id).await?;

        match order.status {
            OrderStatus::PendingPayment => {}
            OrderStatus::Cancelled => {
                return Err(ServiceError::InvalidState(
                    "Order must be awaiting payment; it is cancelled".to_string(),
                ));
            }
            _ => {
                // Already confirmed or further along; no-op by design.
                info!(order_id = %order_id, status = %order.status, "Payment already confirmed");
                return Ok(order);
            }
        }

        let now = Utc::now();

        let mut order_active: OrderActiveModel = order.into();
        order_active.status = Set(OrderStatus::PaymentReceived);
        order_active.updated_at = Set(Some(now));
        let updated = order_active.update(&txn).await?;

        let delivery_id = Uuid::new_v4();
        let delivery_active = DeliveryActiveModel {
            id: Set(delivery_id),
            status: Set(DeliveryStatus::Pending),
            pickup_date: Set(None),
            delivery_date: Set(None),
            driver_id: Set(None),
            order_id: Set(order_id),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        };
        delivery_active.insert(&txn).await?;

        txn.commit().await?;

        info!(order_id = %order_id, delivery_id = %delivery_id, "Payment confirmed, delivery created");
        self.send_event(Event::PaymentConfirmed(order_id)).await;
        self.send_event(Event::DeliveryCreated {
            delivery_id,
            order_id,
        })
        .await;

        Ok(updated)
    }

    /// Farmer rejects the submitted payment proof, asking the buyer to
    /// resubmit. Unlike confirmation this is not idempotent: the order must
    /// be awaiting payment.
    #[instrument(skip(self, actor), fields(order_id = %order_id, farmer_id = %actor.user_id))]
    pub async fn reject_payment(
        &self,
        actor: &AuthUser,
        order_id: Uuid,
    ) -> Result<order::Model, ServiceError> {
        actor.require_role(UserRole::Farmer)?;

        let order = self.owned_order(&*self.db, actor, order_id).await?;

        if order.status != OrderStatus::PendingPayment {
            return Err(ServiceError::InvalidState(
                "Order must be awaiting payment confirmation".to_string(),
            ));
        }

        let mut order_active: OrderActiveModel = order.into();
        order_active.payment_proof = Set(None);
        order_active.updated_at = Set(Some(Utc::now()));
        let updated = order_active.update(&*self.db).await?;

        info!(order_id = %order_id, "Payment proof rejected");
        self.send_event(Event::PaymentRejected(order_id)).await;

        Ok(updated)
    }

    /// Farmer marks a paid order as ready for drivers to bid on or claim.
    #[instrument(skip(self, actor), fields(order_id = %order_id, farmer_id = %actor.user_id))]
    pub async fn mark_ready_for_delivery(
        &self,
        actor: &AuthUser,
        order_id: Uuid,
    ) -> Result<order::Model, ServiceError> {
        actor.require_role(UserRole::Farmer)?;

        let order = self.owned_order(&*self.db, actor, order_id).await?;

        if !order
            .status
            .can_transition_to(OrderStatus::ReadyForDelivery)
        {
            return Err(ServiceError::InvalidState(
                "Order must have payment received first".to_string(),
            ));
        }

        let mut order_active: OrderActiveModel = order.into();
        order_active.status = Set(OrderStatus::ReadyForDelivery);
        order_active.updated_at = Set(Some(Utc::now()));
        let updated = order_active.update(&*self.db).await?;

        info!(order_id = %order_id, "Order ready for delivery");
        self.send_event(Event::OrderReadyForDelivery(order_id)).await;

        Ok(updated)
    }

    /// Farmer cancels an order. The associated delivery, if one exists and is
    /// not already terminal, is cancelled in the same transaction.
    #[instrument(skip(self, actor), fields(order_id = %order_id, farmer_id = %actor.user_id))]
    pub async fn cancel_order(
        &self,
        actor: &AuthUser,
        order_id: Uuid,
    ) -> Result<order::Model, ServiceError> {
        actor.require_role(UserRole::Farmer)?;

        let txn = self.db.begin().await?;

        let order = self.owned_order(&txn, actor, order_id).await?;

        if !order.status.can_transition_to(OrderStatus::Cancelled) {
            return Err(ServiceError::InvalidState(
                "Order is already delivered or cancelled".to_string(),
            ));
        }

        let now = Utc::now();

        let mut order_active: OrderActiveModel = order.into();
        order_active.status = Set(OrderStatus::Cancelled);
        order_active.updated_at = Set(Some(now));
        let updated = order_active.update(&txn).await?;

        let delivery = DeliveryEntity::find()
            .filter(delivery::Column::OrderId.eq(order_id))
            .one(&txn)
            .await?;

        let mut cancelled_delivery_id = None;
        if let Some(delivery) = delivery {
            if delivery.status.can_transition_to(DeliveryStatus::Cancelled) {
                cancelled_delivery_id = Some(delivery.id);
                let mut delivery_active: DeliveryActiveModel = delivery.into();
                delivery_active.status = Set(DeliveryStatus::Cancelled);
                delivery_active.updated_at = Set(Some(now));
                delivery_active.update(&txn).await?;
            }
        }

        txn.commit().await?;

        info!(order_id = %order_id, "Order cancelled");
        self.send_event(Event::OrderCancelled(order_id)).await;
        if let Some(delivery_id) = cancelled_delivery_id {
            self.send_event(Event::DeliveryCancelled(delivery_id)).await;
        }

        Ok(updated)
    }

    /// Retrieves an order by id.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<order::Model, ServiceError> {
        OrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))
    }

    /// Lists the caller's own orders, newest first.
    #[instrument(skip(self, actor), fields(buyer_id = %actor.user_id))]
    pub async fn list_for_buyer(&self, actor: &AuthUser) -> Result<Vec<order::Model>, ServiceError> {
        OrderEntity::find()
            .filter(order::Column::BuyerId.eq(actor.user_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Lists orders placed against the farmer's crops, newest first.
    #[instrument(skip(self, actor), fields(farmer_id = %actor.user_id))]
    pub async fn list_for_farmer(
        &self,
        actor: &AuthUser,
    ) -> Result<Vec<order::Model>, ServiceError> {
        actor.require_role(UserRole::Farmer)?;

        OrderEntity::find()
            .join(JoinType::InnerJoin, order::Relation::Crop.def())
            .filter(crop::Column::FarmerId.eq(actor.user_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }
}

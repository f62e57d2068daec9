use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection,
    EntityTrait, JoinType, QueryFilter, QueryOrder, QuerySelect, RelationTrait, TransactionTrait,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{AuthUser, UserRole},
    entities::{
        delivery::{self, DeliveryStatus, Entity as DeliveryEntity},
        order::{self, ActiveModel as OrderActiveModel, Entity as OrderEntity, OrderStatus},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Owns the delivery state machine for the driver-facing operations: direct
/// claim, pickup, completion. Cancellation arrives only through the order
/// service.
#[derive(Clone)]
pub struct DeliveryService {
    db: Arc<DatabaseConnection>,
    event_sender: Option<Arc<EventSender>>,
}

impl DeliveryService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    async fn send_event(&self, event: Event) {
        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, "Failed to send delivery event");
            }
        }
    }

    /// Loads a delivery and checks it is assigned to the caller.
    async fn assigned_delivery(
        &self,
        actor: &AuthUser,
        delivery_id: Uuid,
    ) -> Result<delivery::Model, ServiceError> {
        let delivery = DeliveryEntity::find_by_id(delivery_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Delivery not found".to_string()))?;

        match delivery.driver_id {
            Some(driver_id) if actor.can_act_for(driver_id) => Ok(delivery),
            _ => Err(ServiceError::Unauthorized(
                "Delivery is not assigned to this driver".to_string(),
            )),
        }
    }

    /// Driver claims an unassigned delivery directly, bypassing the bidding
    /// flow. The claim is a conditional update on `status = Pending`, so two
    /// concurrent claims cannot both succeed; the loser sees `Conflict`.
    /// Advances the parent order to `InTransit` in the same transaction.
    #[instrument(skip(self, actor), fields(delivery_id = %delivery_id, driver_id = %actor.user_id))]
    pub async fn accept_delivery(
        &self,
        actor: &AuthUser,
        delivery_id: Uuid,
    ) -> Result<delivery::Model, ServiceError> {
        actor.require_role(UserRole::Driver)?;

        let txn = self.db.begin().await?;

        let delivery = DeliveryEntity::find_by_id(delivery_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Delivery not found".to_string()))?;

        let order = OrderEntity::find_by_id(delivery.order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        if !order.status.can_transition_to(OrderStatus::InTransit) {
            return Err(ServiceError::InvalidState(
                "Order must be ready for delivery".to_string(),
            ));
        }

        let now = Utc::now();

        // Check-and-set claim: only a still-pending row is updated.
        let claim = DeliveryEntity::update_many()
            .col_expr(delivery::Column::Status, Expr::value(DeliveryStatus::Accepted))
            .col_expr(delivery::Column::DriverId, Expr::value(Some(actor.user_id)))
            .col_expr(delivery::Column::UpdatedAt, Expr::value(Some(now)))
            .filter(delivery::Column::Id.eq(delivery_id))
            .filter(delivery::Column::Status.eq(DeliveryStatus::Pending))
            .exec(&txn)
            .await?;

        if claim.rows_affected == 0 {
            return Err(ServiceError::Conflict(
                "Delivery has already been claimed".to_string(),
            ));
        }

        let mut order_active: OrderActiveModel = order.into();
        order_active.status = Set(OrderStatus::InTransit);
        order_active.updated_at = Set(Some(now));
        order_active.update(&txn).await?;

        let claimed = DeliveryEntity::find_by_id(delivery_id)
            .one(&txn)
            .await?
            .ok_or(ServiceError::InternalServerError)?;

        txn.commit().await?;

        info!(delivery_id = %delivery_id, "Delivery claimed");
        self.send_event(Event::DeliveryAccepted {
            delivery_id,
            driver_id: actor.user_id,
        })
        .await;

        Ok(claimed)
    }

    /// Assigned driver picks up the goods from the farmer.
    #[instrument(skip(self, actor), fields(delivery_id = %delivery_id, driver_id = %actor.user_id))]
    pub async fn pickup_delivery(
        &self,
        actor: &AuthUser,
        delivery_id: Uuid,
    ) -> Result<delivery::Model, ServiceError> {
        actor.require_role(UserRole::Driver)?;

        let delivery = self.assigned_delivery(actor, delivery_id).await?;

        if !delivery.status.can_transition_to(DeliveryStatus::PickedUp) {
            return Err(ServiceError::InvalidState(
                "Delivery must be accepted before pickup".to_string(),
            ));
        }

        let now = Utc::now();

        // Check-and-set: the status read above is re-checked at write time so
        // a concurrent cancellation is never overwritten.
        let updated_rows = DeliveryEntity::update_many()
            .col_expr(delivery::Column::Status, Expr::value(DeliveryStatus::PickedUp))
            .col_expr(delivery::Column::PickupDate, Expr::value(Some(now)))
            .col_expr(delivery::Column::UpdatedAt, Expr::value(Some(now)))
            .filter(delivery::Column::Id.eq(delivery_id))
            .filter(delivery::Column::Status.eq(DeliveryStatus::Accepted))
            .exec(&*self.db)
            .await?;

        if updated_rows.rows_affected == 0 {
            return Err(ServiceError::Conflict(
                "Delivery status changed concurrently".to_string(),
            ));
        }

        let updated = DeliveryEntity::find_by_id(delivery_id)
            .one(&*self.db)
            .await?
            .ok_or(ServiceError::InternalServerError)?;

        info!(delivery_id = %delivery_id, "Delivery picked up");
        self.send_event(Event::DeliveryPickedUp(delivery_id)).await;

        Ok(updated)
    }

    /// Assigned driver completes the delivery. Marks both the delivery and
    /// the parent order as delivered in one transaction.
    #[instrument(skip(self, actor), fields(delivery_id = %delivery_id, driver_id = %actor.user_id))]
    pub async fn complete_delivery(
        &self,
        actor: &AuthUser,
        delivery_id: Uuid,
    ) -> Result<delivery::Model, ServiceError> {
        actor.require_role(UserRole::Driver)?;

        let delivery = self.assigned_delivery(actor, delivery_id).await?;

        if !delivery.status.can_transition_to(DeliveryStatus::Delivered) {
            return Err(ServiceError::InvalidState(
                "Delivery must be picked up before completion".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        let order = OrderEntity::find_by_id(delivery.order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        let now = Utc::now();
        let order_id = order.id;

        // Check-and-set like the claim: only an in-progress row is closed, so
        // a concurrent cancellation is never overwritten.
        let updated_rows = DeliveryEntity::update_many()
            .col_expr(delivery::Column::Status, Expr::value(DeliveryStatus::Delivered))
            .col_expr(delivery::Column::DeliveryDate, Expr::value(Some(now)))
            .col_expr(delivery::Column::UpdatedAt, Expr::value(Some(now)))
            .filter(delivery::Column::Id.eq(delivery_id))
            .filter(delivery::Column::Status.is_in([
                DeliveryStatus::PickedUp,
                DeliveryStatus::InTransit,
            ]))
            .exec(&txn)
            .await?;

        if updated_rows.rows_affected == 0 {
            return Err(ServiceError::Conflict(
                "Delivery status changed concurrently".to_string(),
            ));
        }

        let mut order_active: OrderActiveModel = order.into();
        order_active.status = Set(OrderStatus::Delivered);
        order_active.updated_at = Set(Some(now));
        order_active.update(&txn).await?;

        let updated = DeliveryEntity::find_by_id(delivery_id)
            .one(&txn)
            .await?
            .ok_or(ServiceError::InternalServerError)?;

        txn.commit().await?;

        info!(delivery_id = %delivery_id, order_id = %order_id, "Delivery completed");
        self.send_event(Event::DeliveryCompleted(delivery_id)).await;
        self.send_event(Event::OrderDelivered(order_id)).await;

        Ok(updated)
    }

    /// Retrieves a delivery by id.
    #[instrument(skip(self), fields(delivery_id = %delivery_id))]
    pub async fn get_delivery(&self, delivery_id: Uuid) -> Result<delivery::Model, ServiceError> {
        DeliveryEntity::find_by_id(delivery_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Delivery not found".to_string()))
    }

    /// Unassigned deliveries whose orders are ready; what a driver browses
    /// before bidding or claiming.
    #[instrument(skip(self, actor))]
    pub async fn list_available(
        &self,
        actor: &AuthUser,
    ) -> Result<Vec<delivery::Model>, ServiceError> {
        actor.require_role(UserRole::Driver)?;

        DeliveryEntity::find()
            .filter(delivery::Column::Status.eq(DeliveryStatus::Pending))
            .join(JoinType::InnerJoin, delivery::Relation::Order.def())
            .filter(order::Column::Status.eq(OrderStatus::ReadyForDelivery))
            .order_by_desc(delivery::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Deliveries assigned to the calling driver, newest first.
    #[instrument(skip(self, actor), fields(driver_id = %actor.user_id))]
    pub async fn list_for_driver(
        &self,
        actor: &AuthUser,
    ) -> Result<Vec<delivery::Model>, ServiceError> {
        actor.require_role(UserRole::Driver)?;

        DeliveryEntity::find()
            .filter(delivery::Column::DriverId.eq(actor.user_id))
            .order_by_desc(delivery::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }
}

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection,
    EntityTrait, JoinType, QueryFilter, QueryOrder, QuerySelect, RelationTrait, TransactionTrait,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{AuthUser, UserRole},
    entities::{
        delivery::{
            self, ActiveModel as DeliveryActiveModel, DeliveryStatus, Entity as DeliveryEntity,
        },
        delivery_request::{
            self, ActiveModel as RequestActiveModel, Entity as RequestEntity, RequestStatus,
        },
        order::{self, ActiveModel as OrderActiveModel, Entity as OrderEntity, OrderStatus},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Input for a driver's bid on a pending delivery.
#[derive(Debug)]
pub struct CreateDeliveryRequestInput {
    pub delivery_id: Uuid,
    pub custom_fee: Decimal,
    pub message: Option<String>,
}

/// Brokers the bidding protocol between drivers and customers: bid creation
/// with the one-bid-per-driver rule, role-scoped listings, and the exclusive
/// accept that binds a driver to the delivery while rejecting all rivals.
#[derive(Clone)]
pub struct DeliveryRequestService {
    db: Arc<DatabaseConnection>,
    event_sender: Option<Arc<EventSender>>,
}

impl DeliveryRequestService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    async fn send_event(&self, event: Event) {
        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, "Failed to send delivery request event");
            }
        }
    }

    /// Driver bids on a pending delivery whose order is ready. A driver gets
    /// one bid per delivery, whatever its status; the check runs in the same
    /// transaction as the insert and is backed by a unique index on
    /// `(delivery_id, driver_id)`.
    #[instrument(skip(self, actor, input), fields(delivery_id = %input.delivery_id, driver_id = %actor.user_id))]
    pub async fn create_request(
        &self,
        actor: &AuthUser,
        input: CreateDeliveryRequestInput,
    ) -> Result<delivery_request::Model, ServiceError> {
        actor.require_role(UserRole::Driver)?;

        if input.custom_fee <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Delivery fee must be positive".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        let delivery = DeliveryEntity::find_by_id(input.delivery_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Delivery not found".to_string()))?;

        if delivery.status != DeliveryStatus::Pending {
            return Err(ServiceError::InvalidState(
                "Delivery must be pending to receive requests".to_string(),
            ));
        }

        let order = OrderEntity::find_by_id(delivery.order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        if order.status != OrderStatus::ReadyForDelivery {
            return Err(ServiceError::InvalidState(
                "Order must be ready for delivery".to_string(),
            ));
        }

        let existing = RequestEntity::find()
            .filter(delivery_request::Column::DeliveryId.eq(delivery.id))
            .filter(delivery_request::Column::DriverId.eq(actor.user_id))
            .one(&txn)
            .await?;

        if existing.is_some() {
            return Err(ServiceError::Conflict(
                "You have already made a request for this delivery".to_string(),
            ));
        }

        let now = Utc::now();
        let request_id = Uuid::new_v4();

        let request_active = RequestActiveModel {
            id: Set(request_id),
            delivery_id: Set(delivery.id),
            driver_id: Set(actor.user_id),
            custom_fee: Set(input.custom_fee.round_dp(2)),
            message: Set(input.message),
            status: Set(RequestStatus::Pending),
            admin_commission_paid: Set(false),
            payment_proof: Set(None),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        };
        let request = request_active.insert(&txn).await?;

        txn.commit().await?;

        info!(request_id = %request_id, "Delivery request created");
        self.send_event(Event::DeliveryRequestCreated {
            request_id,
            delivery_id: delivery.id,
            driver_id: actor.user_id,
        })
        .await;

        Ok(request)
    }

    /// Pending requests against still-pending deliveries on the caller's own
    /// orders; what a customer reviews before accepting a driver.
    #[instrument(skip(self, actor), fields(buyer_id = %actor.user_id))]
    pub async fn list_for_customer(
        &self,
        actor: &AuthUser,
    ) -> Result<Vec<delivery_request::Model>, ServiceError> {
        actor.require_role(UserRole::Customer)?;

        RequestEntity::find()
            .filter(delivery_request::Column::Status.eq(RequestStatus::Pending))
            .join(JoinType::InnerJoin, delivery_request::Relation::Delivery.def())
            .filter(delivery::Column::Status.eq(DeliveryStatus::Pending))
            .join(JoinType::InnerJoin, delivery::Relation::Order.def())
            .filter(order::Column::BuyerId.eq(actor.user_id))
            .order_by_desc(delivery_request::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// All of the calling driver's own requests, any status.
    #[instrument(skip(self, actor), fields(driver_id = %actor.user_id))]
    pub async fn list_for_driver(
        &self,
        actor: &AuthUser,
    ) -> Result<Vec<delivery_request::Model>, ServiceError> {
        actor.require_role(UserRole::Driver)?;

        RequestEntity::find()
            .filter(delivery_request::Column::DriverId.eq(actor.user_id))
            .order_by_desc(delivery_request::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Customer accepts a driver's bid. One transaction performs the whole
    /// exclusivity dance: the target request becomes accepted, every other
    /// pending request on the delivery is rejected, the delivery is bound to
    /// the driver, and the order advances to in-transit. The pending-status
    /// precondition re-checked here inside the transaction is the concurrency
    /// guard against racing accepts.
    #[instrument(skip(self, actor), fields(request_id = %request_id, buyer_id = %actor.user_id))]
    pub async fn accept_request(
        &self,
        actor: &AuthUser,
        request_id: Uuid,
    ) -> Result<delivery_request::Model, ServiceError> {
        actor.require_role(UserRole::Customer)?;

        let txn = self.db.begin().await?;

        let request = RequestEntity::find_by_id(request_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Delivery request not found".to_string()))?;

        let delivery = DeliveryEntity::find_by_id(request.delivery_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Delivery not found".to_string()))?;

        let order = OrderEntity::find_by_id(delivery.order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        if !actor.can_act_for(order.buyer_id) {
            return Err(ServiceError::Unauthorized(
                "Order does not belong to this customer".to_string(),
            ));
        }

        if request.status != RequestStatus::Pending {
            return Err(ServiceError::InvalidState(
                "Request has already been processed".to_string(),
            ));
        }

        if delivery.status != DeliveryStatus::Pending {
            return Err(ServiceError::Conflict(
                "Delivery has already been assigned".to_string(),
            ));
        }

        let now = Utc::now();
        let driver_id = request.driver_id;
        let delivery_id = delivery.id;

        // Fan-out: every rival pending bid on this delivery loses.
        RequestEntity::update_many()
            .col_expr(
                delivery_request::Column::Status,
                Expr::value(RequestStatus::Rejected),
            )
            .col_expr(delivery_request::Column::UpdatedAt, Expr::value(Some(now)))
            .filter(delivery_request::Column::DeliveryId.eq(delivery_id))
            .filter(delivery_request::Column::Status.eq(RequestStatus::Pending))
            .filter(delivery_request::Column::Id.ne(request_id))
            .exec(&txn)
            .await?;

        let mut request_active: RequestActiveModel = request.into();
        request_active.status = Set(RequestStatus::Accepted);
        request_active.updated_at = Set(Some(now));
        let accepted = request_active.update(&txn).await?;

        let mut delivery_active: DeliveryActiveModel = delivery.into();
        delivery_active.driver_id = Set(Some(driver_id));
        delivery_active.status = Set(DeliveryStatus::Accepted);
        delivery_active.updated_at = Set(Some(now));
        delivery_active.update(&txn).await?;

        let mut order_active: OrderActiveModel = order.into();
        order_active.status = Set(OrderStatus::InTransit);
        order_active.updated_at = Set(Some(now));
        order_active.update(&txn).await?;

        txn.commit().await?;

        info!(request_id = %request_id, delivery_id = %delivery_id, driver_id = %driver_id, "Delivery request accepted");
        self.send_event(Event::DeliveryRequestAccepted {
            request_id,
            delivery_id,
            driver_id,
        })
        .await;
        self.send_event(Event::DeliveryAccepted {
            delivery_id,
            driver_id,
        })
        .await;

        Ok(accepted)
    }

    /// Customer declines a single bid. Sibling requests and the delivery are
    /// untouched.
    #[instrument(skip(self, actor), fields(request_id = %request_id, buyer_id = %actor.user_id))]
    pub async fn reject_request(
        &self,
        actor: &AuthUser,
        request_id: Uuid,
    ) -> Result<delivery_request::Model, ServiceError> {
        actor.require_role(UserRole::Customer)?;

        let request = RequestEntity::find_by_id(request_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Delivery request not found".to_string()))?;

        let delivery = DeliveryEntity::find_by_id(request.delivery_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Delivery not found".to_string()))?;

        let order = OrderEntity::find_by_id(delivery.order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        if !actor.can_act_for(order.buyer_id) {
            return Err(ServiceError::Unauthorized(
                "Order does not belong to this customer".to_string(),
            ));
        }

        if request.status != RequestStatus::Pending {
            return Err(ServiceError::InvalidState(
                "Request has already been processed".to_string(),
            ));
        }

        let mut request_active: RequestActiveModel = request.into();
        request_active.status = Set(RequestStatus::Rejected);
        request_active.updated_at = Set(Some(Utc::now()));
        let rejected = request_active.update(&*self.db).await?;

        info!(request_id = %request_id, "Delivery request rejected");
        self.send_event(Event::DeliveryRequestRejected(request_id)).await;

        Ok(rejected)
    }
}

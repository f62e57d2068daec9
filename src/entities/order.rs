use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of an order through its lifecycle. Transitions are validated by
/// [`OrderStatus::can_transition_to`]; no service mutates a status without
/// consulting the table.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum OrderStatus {
    #[sea_orm(string_value = "PENDING_PAYMENT")]
    PendingPayment,
    #[sea_orm(string_value = "PAYMENT_RECEIVED")]
    PaymentReceived,
    #[sea_orm(string_value = "READY_FOR_DELIVERY")]
    ReadyForDelivery,
    #[sea_orm(string_value = "IN_TRANSIT")]
    InTransit,
    #[sea_orm(string_value = "DELIVERED")]
    Delivered,
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
}

impl OrderStatus {
    /// Explicit transition table for the order state machine.
    ///
    /// Linear path with a cancellation branch: cancellation is reachable from
    /// every state except the two terminals.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (PendingPayment, PaymentReceived) => true,
            (PaymentReceived, ReadyForDelivery) => true,
            (ReadyForDelivery, InTransit) => true,
            (InTransit, Delivered) => true,
            (from, Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub quantity: i32,

    /// `quantity * crop.price_per_unit` captured at creation. Later price
    /// changes to the crop never touch existing orders.
    pub total_price: Decimal,

    pub status: OrderStatus,
    pub delivery_address: String,

    /// URL of the buyer's uploaded payment proof; cleared when the farmer
    /// rejects the payment.
    pub payment_proof: Option<String>,

    pub buyer_id: Uuid,
    pub crop_id: Uuid,

    /// 2% platform share of `total_price`, fixed at creation.
    pub admin_payment: Decimal,
    /// Always zero at creation; driver compensation is negotiated through
    /// delivery requests, not derived from the order split.
    pub driver_payment: Decimal,
    /// 98% farmer share of `total_price`, fixed at creation.
    pub farmer_payment: Decimal,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::crop::Entity",
        from = "Column::CropId",
        to = "super::crop::Column::Id"
    )]
    Crop,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::BuyerId",
        to = "super::user::Column::Id"
    )]
    Buyer,
    #[sea_orm(has_one = "super::delivery::Entity")]
    Delivery,
}

impl Related<super::crop::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Crop.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Buyer.def()
    }
}

impl Related<super::delivery::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Delivery.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

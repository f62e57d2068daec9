use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a delivery. A `Pending` delivery has no driver; every other
/// non-`Cancelled` status implies `driver_id` is set.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum DeliveryStatus {
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "ACCEPTED")]
    Accepted,
    #[sea_orm(string_value = "PICKED_UP")]
    PickedUp,
    #[sea_orm(string_value = "IN_TRANSIT")]
    InTransit,
    #[sea_orm(string_value = "DELIVERED")]
    Delivered,
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
}

impl DeliveryStatus {
    /// Explicit transition table for the delivery state machine.
    ///
    /// Cancellation is not a driver action; it happens only when the parent
    /// order is cancelled, and a delivered delivery can no longer be cancelled.
    pub fn can_transition_to(self, next: DeliveryStatus) -> bool {
        use DeliveryStatus::*;
        match (self, next) {
            (Pending, Accepted) => true,
            (Accepted, PickedUp) => true,
            (PickedUp, InTransit) => true,
            (PickedUp, Delivered) => true,
            (InTransit, Delivered) => true,
            (from, Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryStatus::Delivered | DeliveryStatus::Cancelled)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "deliveries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub status: DeliveryStatus,
    pub pickup_date: Option<DateTime<Utc>>,
    pub delivery_date: Option<DateTime<Utc>>,
    /// Assigned driver; null while the delivery is unclaimed.
    pub driver_id: Option<Uuid>,
    /// One delivery per order, created when payment is confirmed.
    #[sea_orm(unique)]
    pub order_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::DriverId",
        to = "super::user::Column::Id"
    )]
    Driver,
    #[sea_orm(has_many = "super::delivery_request::Entity")]
    DeliveryRequests,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Driver.def()
    }
}

impl Related<super::delivery_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DeliveryRequests.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::DeliveryStatus::*;

    #[test]
    fn driver_path_edges_are_allowed() {
        assert!(Pending.can_transition_to(Accepted));
        assert!(Accepted.can_transition_to(PickedUp));
        assert!(PickedUp.can_transition_to(Delivered));
        assert!(PickedUp.can_transition_to(InTransit));
        assert!(InTransit.can_transition_to(Delivered));
    }

    #[test]
    fn claiming_a_non_pending_delivery_is_rejected() {
        assert!(!Accepted.can_transition_to(Accepted));
        assert!(!PickedUp.can_transition_to(Accepted));
        assert!(!Delivered.can_transition_to(Accepted));
        assert!(!Cancelled.can_transition_to(Accepted));
    }

    #[test]
    fn cancellation_follows_the_parent_order() {
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Accepted.can_transition_to(Cancelled));
        assert!(PickedUp.can_transition_to(Cancelled));
        assert!(!Delivered.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Cancelled));
    }
}

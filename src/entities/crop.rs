use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A farmer's listed produce. The lifecycle core reads crops for pricing and
/// ownership checks; listing management itself lives outside this core.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "crops")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price_per_unit: Decimal,
    /// Remaining stock. Never decremented by order creation; stock is
    /// adjusted manually by admins.
    pub available_quantity: i32,
    pub unit: String,
    pub image_url: Option<String>,
    pub farmer_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::FarmerId",
        to = "super::user::Column::Id"
    )]
    Farmer,
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Farmer.def()
    }
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role a marketplace account acts under. Every lifecycle operation is gated
/// on the caller's role before any ownership check.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    strum::Display, strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum UserRole {
    #[sea_orm(string_value = "CUSTOMER")]
    #[strum(serialize = "CUSTOMER")]
    Customer,
    #[sea_orm(string_value = "FARMER")]
    #[strum(serialize = "FARMER")]
    Farmer,
    #[sea_orm(string_value = "DRIVER")]
    #[strum(serialize = "DRIVER")]
    Driver,
    #[sea_orm(string_value = "ADMIN")]
    #[strum(serialize = "ADMIN")]
    Admin,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    #[sea_orm(unique)]
    pub email: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::crop::Entity")]
    Crops,
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
}

impl Related<super::crop::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Crops.def()
    }
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

//! `SeaORM` Entity for the sales table.
//! One row per recorded sale; rows are written by the seeding tool and are read-only to the API.

use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[schema(as = entity::sales::Model)]
#[sea_orm(schema_name = "sales_forecast", table_name = "sales")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    #[serde(skip_deserializing)]
    pub id: Id,

    #[schema(value_type = String, format = Date)]
    pub date: Date,

    /// Realized sales amount for the row
    #[sea_orm(column_type = "Double")]
    pub actualsales: f64,

    pub product: Option<String>,

    pub region: Option<String>,

    #[serde(skip_deserializing)]
    #[schema(value_type = String, format = DateTime)]
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

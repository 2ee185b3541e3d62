//! `SeaORM` Entity for the prices table (per-account price agreements)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "prices")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub price_id: String,
    pub product_id: String,
    pub item_selection: Option<String>,
    pub account_code: Option<String>,
    pub account_description: Option<String>,
    pub product_name: Option<String>,
    pub valid_from: Option<Date>,
    pub valid_to: Option<Date>,
    pub quantity_from: Option<String>,
    pub quantity_to: Option<String>,
    pub unit_price: Option<Decimal>,
    pub currency: Option<String>,
    pub price_unit: Option<String>,
    pub active: bool,
    pub content_hash: String,
    pub created_at: Option<DateTime>,
    pub updated_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

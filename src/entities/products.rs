//! `SeaORM` Entity for the products table (Archibald "Articoli" registry)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub article_id: String,
    pub name: String,
    pub description: Option<String>,
    pub article_group: Option<String>,
    pub package_content: Option<String>,
    pub search_name: Option<String>,
    pub price_unit: Option<String>,
    pub product_group_id: Option<String>,
    pub min_quantity: Option<String>,
    pub multiple_quantity: Option<String>,
    pub max_quantity: Option<String>,
    pub blocked: bool,
    pub active: bool,
    pub content_hash: String,
    pub created_at: Option<DateTime>,
    pub updated_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

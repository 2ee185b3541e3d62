//! `SeaORM` Entity for the customers table (Archibald "Clienti" registry)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "customers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub account_id: String,
    pub name: String,
    pub vat_number: Option<String>,
    pub pec: Option<String>,
    pub sdi: Option<String>,
    pub fiscal_code: Option<String>,
    pub delivery_terms: Option<String>,
    pub street: Option<String>,
    pub logistics_address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub mobile: Option<String>,
    pub url: Option<String>,
    pub attention_to: Option<String>,
    pub last_order_date: Option<Date>,
    pub active: bool,
    pub content_hash: String,
    pub created_at: Option<DateTime>,
    pub updated_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

//! `SeaORM` Entity for the orders table (Archibald "Ordini")

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub order_id: String,
    /// None while the order is still pending in the ERP
    pub order_number: Option<String>,
    pub customer_account: Option<String>,
    pub customer_name: Option<String>,
    pub delivery_name: Option<String>,
    pub delivery_address: Option<String>,
    pub creation_date: Option<Date>,
    pub delivery_date: Option<Date>,
    pub customer_reference: Option<String>,
    pub sales_status: Option<String>,
    pub document_status: Option<String>,
    pub order_type: Option<String>,
    pub total_amount: Option<Decimal>,
    pub content_hash: String,
    pub created_at: Option<DateTime>,
    pub updated_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

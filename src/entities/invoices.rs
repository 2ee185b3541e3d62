//! `SeaORM` Entity for the invoices table (Archibald "Fatture")

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invoices")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub invoice_id: String,
    pub invoice_number: String,
    pub invoice_date: Option<Date>,
    pub customer_account: Option<String>,
    pub billing_name: Option<String>,
    pub quantity: Option<String>,
    pub line_sum: Option<Decimal>,
    pub discount_amount: Option<Decimal>,
    pub tax_sum: Option<Decimal>,
    pub invoice_amount: Option<Decimal>,
    pub purchase_order: Option<String>,
    pub customer_reference: Option<String>,
    pub due_date: Option<Date>,
    pub payment_term_id: Option<String>,
    pub overdue_days: Option<i32>,
    pub content_hash: String,
    pub created_at: Option<DateTime>,
    pub updated_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

//! `SeaORM` Entity for the transport_documents table (Archibald DDT)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "transport_documents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub ddt_id: String,
    pub ddt_number: String,
    pub delivery_date: Option<Date>,
    /// Match key back to the originating sales order, e.g. "ORD/26000695"
    pub order_number: Option<String>,
    pub customer_account: Option<String>,
    pub delivery_name: Option<String>,
    pub tracking_number: Option<String>,
    pub delivery_terms: Option<String>,
    pub delivery_method: Option<String>,
    pub delivery_city: Option<String>,
    pub content_hash: String,
    pub created_at: Option<DateTime>,
    pub updated_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

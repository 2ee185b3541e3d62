//! `SeaORM` Entity for order_jobs — queued order placements and their
//! terminal outcomes

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "order_jobs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub job_id: Uuid,
    pub user_id: String,
    pub payload: Json,
    /// queued | running | completed | failed
    pub status: String,
    pub attempts: i32,
    /// Order id reported by the ERP on success
    pub erp_order_id: Option<String>,
    pub error: Option<String>,
    /// Set when this job was created through the manual retry path
    pub retry_of: Option<Uuid>,
    pub created_at: DateTime,
    pub started_at: Option<DateTime>,
    pub finished_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

//! `SeaORM` Entity for sync_checkpoints — durable resume points, one row per
//! sync domain

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "sync_checkpoints")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub domain: String,
    /// Last fully committed page; the next run resumes at last_page + 1
    pub last_page: i32,
    pub total_pages: Option<i32>,
    pub items_synced: i64,
    /// idle | running | completed | failed
    pub state: String,
    pub last_success_at: Option<DateTime>,
    pub last_failure_at: Option<DateTime>,
    pub last_error: Option<String>,
    pub updated_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

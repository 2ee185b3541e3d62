use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One line of an order to place in the ERP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub article_id: String,
    pub quantity: u32,
    /// ERP variant-dropdown selection, when the article has variants
    pub variant: Option<String>,
}

/// Payload of one order job, handed verbatim to the automation driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPayload {
    pub customer_account: String,
    pub lines: Vec<OrderLine>,
    pub customer_reference: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnqueueOrderRequest {
    pub user_id: String,
    pub order: OrderPayload,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnqueueOrderResponse {
    pub job_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderJobResponse {
    pub job_id: Uuid,
    pub user_id: String,
    pub status: String,
    pub attempts: i32,
    pub erp_order_id: Option<String>,
    pub error: Option<String>,
    pub retry_of: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub started_at: Option<NaiveDateTime>,
    pub finished_at: Option<NaiveDateTime>,
}

//! Invoice sync (Archibald "Fatture" PDF export)

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use serde::Deserialize;

use super::{canon_amount, canon_date, date_string, decimal_string, to_date, to_decimal, value_of};
use crate::browser::backend::BrowserSession;
use crate::entities::invoices;
use crate::error::BridgeError;
use crate::models::domain::Domain;
use crate::services::delta_sync::{
    MissingPolicy, SourceRecord, StoredRecord, SyncDomain,
};
use crate::services::erp_driver::ErpDriver;
use crate::services::pdf_extract::PdfExtractor;

#[derive(Debug, Deserialize)]
struct ExtractedInvoice {
    id: String,
    invoice_number: String,
    #[serde(default)]
    invoice_date: Option<String>,
    #[serde(default)]
    customer_account: Option<String>,
    #[serde(default)]
    billing_name: Option<String>,
    #[serde(default)]
    quantity: Option<String>,
    #[serde(default)]
    line_sum: Option<String>,
    #[serde(default)]
    discount_amount: Option<String>,
    #[serde(default)]
    tax_sum: Option<String>,
    #[serde(default)]
    invoice_amount: Option<String>,
    #[serde(default)]
    purchase_order: Option<String>,
    #[serde(default)]
    customer_reference: Option<String>,
    #[serde(default)]
    due_date: Option<String>,
    #[serde(default)]
    payment_term_id: Option<String>,
    #[serde(default)]
    overdue_days: Option<String>,
}

pub struct InvoiceDomain {
    db: DatabaseConnection,
    driver: Arc<dyn ErpDriver>,
    extractor: PdfExtractor,
}

impl InvoiceDomain {
    pub fn new(db: DatabaseConnection, driver: Arc<dyn ErpDriver>, extractor: PdfExtractor) -> Self {
        Self { db, driver, extractor }
    }

    fn to_source(invoice: &ExtractedInvoice) -> SourceRecord {
        let overdue_days = invoice
            .overdue_days
            .as_deref()
            .and_then(|v| v.trim().parse::<i32>().ok())
            .map(|v| v.to_string());
        SourceRecord {
            id: invoice.id.clone(),
            fields: vec![
                ("invoice_number", Some(invoice.invoice_number.clone())),
                ("invoice_date", canon_date(invoice.invoice_date.clone())),
                ("customer_account", invoice.customer_account.clone()),
                ("billing_name", invoice.billing_name.clone()),
                ("quantity", invoice.quantity.clone()),
                ("line_sum", canon_amount(invoice.line_sum.clone())),
                ("discount_amount", canon_amount(invoice.discount_amount.clone())),
                ("tax_sum", canon_amount(invoice.tax_sum.clone())),
                ("invoice_amount", canon_amount(invoice.invoice_amount.clone())),
                ("purchase_order", invoice.purchase_order.clone()),
                ("customer_reference", invoice.customer_reference.clone()),
                ("due_date", canon_date(invoice.due_date.clone())),
                ("payment_term_id", invoice.payment_term_id.clone()),
                ("overdue_days", overdue_days),
            ],
        }
    }

    fn stored_fields(model: &invoices::Model) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("invoice_number", Some(model.invoice_number.clone())),
            ("invoice_date", date_string(model.invoice_date)),
            ("customer_account", model.customer_account.clone()),
            ("billing_name", model.billing_name.clone()),
            ("quantity", model.quantity.clone()),
            ("line_sum", decimal_string(model.line_sum)),
            ("discount_amount", decimal_string(model.discount_amount)),
            ("tax_sum", decimal_string(model.tax_sum)),
            ("invoice_amount", decimal_string(model.invoice_amount)),
            ("purchase_order", model.purchase_order.clone()),
            ("customer_reference", model.customer_reference.clone()),
            ("due_date", date_string(model.due_date)),
            ("payment_term_id", model.payment_term_id.clone()),
            ("overdue_days", model.overdue_days.map(|v| v.to_string())),
        ]
    }
}

#[async_trait]
impl SyncDomain for InvoiceDomain {
    fn domain(&self) -> Domain {
        Domain::Invoices
    }

    fn missing_policy(&self) -> MissingPolicy {
        MissingPolicy::Ignore
    }

    async fn total_pages(&self, _session: &BrowserSession) -> Result<u32, BridgeError> {
        Ok(1)
    }

    async fn fetch_page(
        &self,
        session: &BrowserSession,
        _page: u32,
    ) -> Result<Vec<SourceRecord>, BridgeError> {
        let path = self
            .driver
            .download_export(session, Domain::Invoices)
            .await?;
        let records: Vec<ExtractedInvoice> =
            self.extractor.extract(Domain::Invoices, &path).await?;
        Ok(records.iter().map(Self::to_source).collect())
    }

    async fn load_stored(&self, id: &str) -> Result<Option<StoredRecord>, BridgeError> {
        Ok(invoices::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(|model| StoredRecord {
                content_hash: model.content_hash.clone(),
                fields: Self::stored_fields(&model),
            }))
    }

    async fn upsert(&self, record: &SourceRecord, content_hash: &str) -> Result<(), BridgeError> {
        let now = Utc::now().naive_utc();
        let overdue_days = value_of(record, "overdue_days").and_then(|v| v.parse::<i32>().ok());

        match invoices::Entity::find_by_id(record.id.as_str()).one(&self.db).await? {
            Some(model) => {
                let mut active: invoices::ActiveModel = model.into();
                active.invoice_number = Set(value_of(record, "invoice_number").unwrap_or_default());
                active.invoice_date = Set(to_date(value_of(record, "invoice_date")));
                active.customer_account = Set(value_of(record, "customer_account"));
                active.billing_name = Set(value_of(record, "billing_name"));
                active.quantity = Set(value_of(record, "quantity"));
                active.line_sum = Set(to_decimal(value_of(record, "line_sum")));
                active.discount_amount = Set(to_decimal(value_of(record, "discount_amount")));
                active.tax_sum = Set(to_decimal(value_of(record, "tax_sum")));
                active.invoice_amount = Set(to_decimal(value_of(record, "invoice_amount")));
                active.purchase_order = Set(value_of(record, "purchase_order"));
                active.customer_reference = Set(value_of(record, "customer_reference"));
                active.due_date = Set(to_date(value_of(record, "due_date")));
                active.payment_term_id = Set(value_of(record, "payment_term_id"));
                active.overdue_days = Set(overdue_days);
                active.content_hash = Set(content_hash.to_string());
                active.updated_at = Set(Some(now));
                active.update(&self.db).await?;
            }
            None => {
                let active = invoices::ActiveModel {
                    invoice_id: Set(record.id.clone()),
                    invoice_number: Set(value_of(record, "invoice_number").unwrap_or_default()),
                    invoice_date: Set(to_date(value_of(record, "invoice_date"))),
                    customer_account: Set(value_of(record, "customer_account")),
                    billing_name: Set(value_of(record, "billing_name")),
                    quantity: Set(value_of(record, "quantity")),
                    line_sum: Set(to_decimal(value_of(record, "line_sum"))),
                    discount_amount: Set(to_decimal(value_of(record, "discount_amount"))),
                    tax_sum: Set(to_decimal(value_of(record, "tax_sum"))),
                    invoice_amount: Set(to_decimal(value_of(record, "invoice_amount"))),
                    purchase_order: Set(value_of(record, "purchase_order")),
                    customer_reference: Set(value_of(record, "customer_reference")),
                    due_date: Set(to_date(value_of(record, "due_date"))),
                    payment_term_id: Set(value_of(record, "payment_term_id")),
                    overdue_days: Set(overdue_days),
                    content_hash: Set(content_hash.to_string()),
                    created_at: Set(Some(now)),
                    updated_at: Set(Some(now)),
                };
                active.insert(&self.db).await?;
            }
        }
        Ok(())
    }

    async fn known_ids(&self) -> Result<HashSet<String>, BridgeError> {
        let models = invoices::Entity::find().all(&self.db).await?;
        Ok(models.into_iter().map(|m| m.invoice_id).collect())
    }

    async fn deactivate(&self, _ids: &[String]) -> Result<u64, BridgeError> {
        // Unreachable under MissingPolicy::Ignore
        Ok(0)
    }
}

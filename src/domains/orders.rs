//! Sales order sync (Archibald "Ordini" grid)
//!
//! Orders disappear from the grid once archived by the ERP; absence is not
//! deletion, so the cleanup pass leaves stored orders untouched.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};

use super::{canon_amount, canon_date, date_string, decimal_string, scraped, to_date, to_decimal, value_of};
use crate::browser::backend::BrowserSession;
use crate::entities::orders;
use crate::error::BridgeError;
use crate::models::domain::Domain;
use crate::services::delta_sync::{
    MissingPolicy, SourceRecord, StoredRecord, SyncDomain,
};
use crate::services::erp_driver::{ErpDriver, ScrapedRecord};

pub struct OrderDomain {
    db: DatabaseConnection,
    driver: Arc<dyn ErpDriver>,
}

impl OrderDomain {
    pub fn new(db: DatabaseConnection, driver: Arc<dyn ErpDriver>) -> Self {
        Self { db, driver }
    }

    fn to_source(record: &ScrapedRecord) -> SourceRecord {
        SourceRecord {
            id: record.id.clone(),
            fields: vec![
                ("order_number", scraped(record, "NUMERO ORDINE")),
                ("customer_account", scraped(record, "ID PROFILO CLIENTE")),
                ("customer_name", scraped(record, "NOME CLIENTE")),
                ("delivery_name", scraped(record, "NOME CONSEGNA")),
                ("delivery_address", scraped(record, "INDIRIZZO DI CONSEGNA")),
                ("creation_date", canon_date(scraped(record, "DATA DI CREAZIONE"))),
                ("delivery_date", canon_date(scraped(record, "DATA DI CONSEGNA"))),
                ("customer_reference", scraped(record, "RIFERIMENTO CLIENTE")),
                ("sales_status", scraped(record, "STATO VENDITE")),
                ("document_status", scraped(record, "STATO DOCUMENTO")),
                ("order_type", scraped(record, "TIPO DI ORDINE")),
                ("total_amount", canon_amount(scraped(record, "IMPORTO TOTALE"))),
            ],
        }
    }

    fn stored_fields(model: &orders::Model) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("order_number", model.order_number.clone()),
            ("customer_account", model.customer_account.clone()),
            ("customer_name", model.customer_name.clone()),
            ("delivery_name", model.delivery_name.clone()),
            ("delivery_address", model.delivery_address.clone()),
            ("creation_date", date_string(model.creation_date)),
            ("delivery_date", date_string(model.delivery_date)),
            ("customer_reference", model.customer_reference.clone()),
            ("sales_status", model.sales_status.clone()),
            ("document_status", model.document_status.clone()),
            ("order_type", model.order_type.clone()),
            ("total_amount", decimal_string(model.total_amount)),
        ]
    }
}

#[async_trait]
impl SyncDomain for OrderDomain {
    fn domain(&self) -> Domain {
        Domain::Orders
    }

    fn missing_policy(&self) -> MissingPolicy {
        MissingPolicy::Ignore
    }

    async fn total_pages(&self, session: &BrowserSession) -> Result<u32, BridgeError> {
        self.driver.count_pages(session, Domain::Orders).await
    }

    async fn fetch_page(
        &self,
        session: &BrowserSession,
        page: u32,
    ) -> Result<Vec<SourceRecord>, BridgeError> {
        let records = self
            .driver
            .scrape_page(session, Domain::Orders, page)
            .await?;
        Ok(records.iter().map(Self::to_source).collect())
    }

    async fn load_stored(&self, id: &str) -> Result<Option<StoredRecord>, BridgeError> {
        Ok(orders::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(|model| StoredRecord {
                content_hash: model.content_hash.clone(),
                fields: Self::stored_fields(&model),
            }))
    }

    async fn upsert(&self, record: &SourceRecord, content_hash: &str) -> Result<(), BridgeError> {
        let now = Utc::now().naive_utc();

        match orders::Entity::find_by_id(record.id.as_str()).one(&self.db).await? {
            Some(model) => {
                let mut active: orders::ActiveModel = model.into();
                active.order_number = Set(value_of(record, "order_number"));
                active.customer_account = Set(value_of(record, "customer_account"));
                active.customer_name = Set(value_of(record, "customer_name"));
                active.delivery_name = Set(value_of(record, "delivery_name"));
                active.delivery_address = Set(value_of(record, "delivery_address"));
                active.creation_date = Set(to_date(value_of(record, "creation_date")));
                active.delivery_date = Set(to_date(value_of(record, "delivery_date")));
                active.customer_reference = Set(value_of(record, "customer_reference"));
                active.sales_status = Set(value_of(record, "sales_status"));
                active.document_status = Set(value_of(record, "document_status"));
                active.order_type = Set(value_of(record, "order_type"));
                active.total_amount = Set(to_decimal(value_of(record, "total_amount")));
                active.content_hash = Set(content_hash.to_string());
                active.updated_at = Set(Some(now));
                active.update(&self.db).await?;
            }
            None => {
                let active = orders::ActiveModel {
                    order_id: Set(record.id.clone()),
                    order_number: Set(value_of(record, "order_number")),
                    customer_account: Set(value_of(record, "customer_account")),
                    customer_name: Set(value_of(record, "customer_name")),
                    delivery_name: Set(value_of(record, "delivery_name")),
                    delivery_address: Set(value_of(record, "delivery_address")),
                    creation_date: Set(to_date(value_of(record, "creation_date"))),
                    delivery_date: Set(to_date(value_of(record, "delivery_date"))),
                    customer_reference: Set(value_of(record, "customer_reference")),
                    sales_status: Set(value_of(record, "sales_status")),
                    document_status: Set(value_of(record, "document_status")),
                    order_type: Set(value_of(record, "order_type")),
                    total_amount: Set(to_decimal(value_of(record, "total_amount"))),
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
        let models = orders::Entity::find().all(&self.db).await?;
        Ok(models.into_iter().map(|m| m.order_id).collect())
    }

    async fn deactivate(&self, _ids: &[String]) -> Result<u64, BridgeError> {
        // Unreachable under MissingPolicy::Ignore
        Ok(0)
    }
}

//! Transport document (DDT) sync
//!
//! DDTs are not scraped from a grid: the ERP's "Documenti di trasporto" PDF
//! export is downloaded by the bot and handed to the extraction subprocess.
//! The whole export is surfaced to the engine as a single logical page.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use serde::Deserialize;

use super::{canon_date, date_string, to_date, value_of};
use crate::browser::backend::BrowserSession;
use crate::entities::transport_documents;
use crate::error::BridgeError;
use crate::models::domain::Domain;
use crate::services::delta_sync::{
    MissingPolicy, SourceRecord, StoredRecord, SyncDomain,
};
use crate::services::erp_driver::ErpDriver;
use crate::services::pdf_extract::PdfExtractor;

/// One record as the parser script prints it.
#[derive(Debug, Deserialize)]
struct ExtractedDdt {
    id: String,
    ddt_number: String,
    #[serde(default)]
    delivery_date: Option<String>,
    #[serde(default)]
    order_number: Option<String>,
    #[serde(default)]
    customer_account: Option<String>,
    #[serde(default)]
    delivery_name: Option<String>,
    #[serde(default)]
    tracking_number: Option<String>,
    #[serde(default)]
    delivery_terms: Option<String>,
    #[serde(default)]
    delivery_method: Option<String>,
    #[serde(default)]
    delivery_city: Option<String>,
}

pub struct TransportDocumentDomain {
    db: DatabaseConnection,
    driver: Arc<dyn ErpDriver>,
    extractor: PdfExtractor,
}

impl TransportDocumentDomain {
    pub fn new(db: DatabaseConnection, driver: Arc<dyn ErpDriver>, extractor: PdfExtractor) -> Self {
        Self { db, driver, extractor }
    }

    fn to_source(ddt: &ExtractedDdt) -> SourceRecord {
        SourceRecord {
            id: ddt.id.clone(),
            fields: vec![
                ("ddt_number", Some(ddt.ddt_number.clone())),
                ("delivery_date", canon_date(ddt.delivery_date.clone())),
                ("order_number", ddt.order_number.clone()),
                ("customer_account", ddt.customer_account.clone()),
                ("delivery_name", ddt.delivery_name.clone()),
                ("tracking_number", ddt.tracking_number.clone()),
                ("delivery_terms", ddt.delivery_terms.clone()),
                ("delivery_method", ddt.delivery_method.clone()),
                ("delivery_city", ddt.delivery_city.clone()),
            ],
        }
    }

    fn stored_fields(model: &transport_documents::Model) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("ddt_number", Some(model.ddt_number.clone())),
            ("delivery_date", date_string(model.delivery_date)),
            ("order_number", model.order_number.clone()),
            ("customer_account", model.customer_account.clone()),
            ("delivery_name", model.delivery_name.clone()),
            ("tracking_number", model.tracking_number.clone()),
            ("delivery_terms", model.delivery_terms.clone()),
            ("delivery_method", model.delivery_method.clone()),
            ("delivery_city", model.delivery_city.clone()),
        ]
    }
}

#[async_trait]
impl SyncDomain for TransportDocumentDomain {
    fn domain(&self) -> Domain {
        Domain::TransportDocuments
    }

    fn missing_policy(&self) -> MissingPolicy {
        MissingPolicy::Ignore
    }

    async fn total_pages(&self, _session: &BrowserSession) -> Result<u32, BridgeError> {
        // One export, one logical page
        Ok(1)
    }

    async fn fetch_page(
        &self,
        session: &BrowserSession,
        _page: u32,
    ) -> Result<Vec<SourceRecord>, BridgeError> {
        let path = self
            .driver
            .download_export(session, Domain::TransportDocuments)
            .await?;
        let records: Vec<ExtractedDdt> = self
            .extractor
            .extract(Domain::TransportDocuments, &path)
            .await?;
        Ok(records.iter().map(Self::to_source).collect())
    }

    async fn load_stored(&self, id: &str) -> Result<Option<StoredRecord>, BridgeError> {
        Ok(transport_documents::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(|model| StoredRecord {
                content_hash: model.content_hash.clone(),
                fields: Self::stored_fields(&model),
            }))
    }

    async fn upsert(&self, record: &SourceRecord, content_hash: &str) -> Result<(), BridgeError> {
        let now = Utc::now().naive_utc();

        match transport_documents::Entity::find_by_id(record.id.as_str())
            .one(&self.db)
            .await?
        {
            Some(model) => {
                let mut active: transport_documents::ActiveModel = model.into();
                active.ddt_number = Set(value_of(record, "ddt_number").unwrap_or_default());
                active.delivery_date = Set(to_date(value_of(record, "delivery_date")));
                active.order_number = Set(value_of(record, "order_number"));
                active.customer_account = Set(value_of(record, "customer_account"));
                active.delivery_name = Set(value_of(record, "delivery_name"));
                active.tracking_number = Set(value_of(record, "tracking_number"));
                active.delivery_terms = Set(value_of(record, "delivery_terms"));
                active.delivery_method = Set(value_of(record, "delivery_method"));
                active.delivery_city = Set(value_of(record, "delivery_city"));
                active.content_hash = Set(content_hash.to_string());
                active.updated_at = Set(Some(now));
                active.update(&self.db).await?;
            }
            None => {
                let active = transport_documents::ActiveModel {
                    ddt_id: Set(record.id.clone()),
                    ddt_number: Set(value_of(record, "ddt_number").unwrap_or_default()),
                    delivery_date: Set(to_date(value_of(record, "delivery_date"))),
                    order_number: Set(value_of(record, "order_number")),
                    customer_account: Set(value_of(record, "customer_account")),
                    delivery_name: Set(value_of(record, "delivery_name")),
                    tracking_number: Set(value_of(record, "tracking_number")),
                    delivery_terms: Set(value_of(record, "delivery_terms")),
                    delivery_method: Set(value_of(record, "delivery_method")),
                    delivery_city: Set(value_of(record, "delivery_city")),
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
        let models = transport_documents::Entity::find().all(&self.db).await?;
        Ok(models.into_iter().map(|m| m.ddt_id).collect())
    }

    async fn deactivate(&self, _ids: &[String]) -> Result<u64, BridgeError> {
        // Unreachable under MissingPolicy::Ignore
        Ok(0)
    }
}

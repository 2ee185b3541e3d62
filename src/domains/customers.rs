//! Customer registry sync (Archibald "Clienti" grid)

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};

use super::{canon_date, date_string, scraped, to_date, value_of};
use crate::browser::backend::BrowserSession;
use crate::entities::customers;
use crate::error::BridgeError;
use crate::models::domain::Domain;
use crate::services::delta_sync::{
    MissingPolicy, SourceRecord, StoredRecord, SyncDomain,
};
use crate::services::erp_driver::{ErpDriver, ScrapedRecord};

pub struct CustomerDomain {
    db: DatabaseConnection,
    driver: Arc<dyn ErpDriver>,
}

impl CustomerDomain {
    pub fn new(db: DatabaseConnection, driver: Arc<dyn ErpDriver>) -> Self {
        Self { db, driver }
    }

    fn to_source(record: &ScrapedRecord) -> SourceRecord {
        SourceRecord {
            id: record.id.clone(),
            fields: vec![
                ("name", scraped(record, "NOME")),
                ("vat_number", scraped(record, "PARTITA IVA")),
                ("pec", scraped(record, "PEC")),
                ("sdi", scraped(record, "SDI")),
                ("fiscal_code", scraped(record, "CODICE FISCALE")),
                ("delivery_terms", scraped(record, "TERMINI DI CONSEGNA")),
                ("street", scraped(record, "VIA")),
                ("logistics_address", scraped(record, "INDIRIZZO LOGISTICO")),
                ("postal_code", scraped(record, "CAP")),
                ("city", scraped(record, "CITTÀ")),
                ("phone", scraped(record, "TELEFONO")),
                ("mobile", scraped(record, "CELLULARE")),
                ("url", scraped(record, "URL")),
                ("attention_to", scraped(record, "ALL'ATTENZIONE DI")),
                (
                    "last_order_date",
                    canon_date(scraped(record, "DATA DELL'ULTIMO ORDINE")),
                ),
            ],
        }
    }

    fn stored_fields(model: &customers::Model) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("name", Some(model.name.clone())),
            ("vat_number", model.vat_number.clone()),
            ("pec", model.pec.clone()),
            ("sdi", model.sdi.clone()),
            ("fiscal_code", model.fiscal_code.clone()),
            ("delivery_terms", model.delivery_terms.clone()),
            ("street", model.street.clone()),
            ("logistics_address", model.logistics_address.clone()),
            ("postal_code", model.postal_code.clone()),
            ("city", model.city.clone()),
            ("phone", model.phone.clone()),
            ("mobile", model.mobile.clone()),
            ("url", model.url.clone()),
            ("attention_to", model.attention_to.clone()),
            ("last_order_date", date_string(model.last_order_date)),
        ]
    }
}

#[async_trait]
impl SyncDomain for CustomerDomain {
    fn domain(&self) -> Domain {
        Domain::Customers
    }

    fn missing_policy(&self) -> MissingPolicy {
        MissingPolicy::Deactivate
    }

    async fn total_pages(&self, session: &BrowserSession) -> Result<u32, BridgeError> {
        self.driver.count_pages(session, Domain::Customers).await
    }

    async fn fetch_page(
        &self,
        session: &BrowserSession,
        page: u32,
    ) -> Result<Vec<SourceRecord>, BridgeError> {
        let records = self
            .driver
            .scrape_page(session, Domain::Customers, page)
            .await?;
        Ok(records.iter().map(Self::to_source).collect())
    }

    async fn load_stored(&self, id: &str) -> Result<Option<StoredRecord>, BridgeError> {
        Ok(customers::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(|model| StoredRecord {
                content_hash: model.content_hash.clone(),
                fields: Self::stored_fields(&model),
            }))
    }

    async fn upsert(&self, record: &SourceRecord, content_hash: &str) -> Result<(), BridgeError> {
        let now = Utc::now().naive_utc();
        let name = value_of(record, "name").unwrap_or_default();

        match customers::Entity::find_by_id(record.id.as_str()).one(&self.db).await? {
            Some(model) => {
                let mut active: customers::ActiveModel = model.into();
                active.name = Set(name);
                active.vat_number = Set(value_of(record, "vat_number"));
                active.pec = Set(value_of(record, "pec"));
                active.sdi = Set(value_of(record, "sdi"));
                active.fiscal_code = Set(value_of(record, "fiscal_code"));
                active.delivery_terms = Set(value_of(record, "delivery_terms"));
                active.street = Set(value_of(record, "street"));
                active.logistics_address = Set(value_of(record, "logistics_address"));
                active.postal_code = Set(value_of(record, "postal_code"));
                active.city = Set(value_of(record, "city"));
                active.phone = Set(value_of(record, "phone"));
                active.mobile = Set(value_of(record, "mobile"));
                active.url = Set(value_of(record, "url"));
                active.attention_to = Set(value_of(record, "attention_to"));
                active.last_order_date = Set(to_date(value_of(record, "last_order_date")));
                // A record present in the source is live again by definition
                active.active = Set(true);
                active.content_hash = Set(content_hash.to_string());
                active.updated_at = Set(Some(now));
                active.update(&self.db).await?;
            }
            None => {
                let active = customers::ActiveModel {
                    account_id: Set(record.id.clone()),
                    name: Set(name),
                    vat_number: Set(value_of(record, "vat_number")),
                    pec: Set(value_of(record, "pec")),
                    sdi: Set(value_of(record, "sdi")),
                    fiscal_code: Set(value_of(record, "fiscal_code")),
                    delivery_terms: Set(value_of(record, "delivery_terms")),
                    street: Set(value_of(record, "street")),
                    logistics_address: Set(value_of(record, "logistics_address")),
                    postal_code: Set(value_of(record, "postal_code")),
                    city: Set(value_of(record, "city")),
                    phone: Set(value_of(record, "phone")),
                    mobile: Set(value_of(record, "mobile")),
                    url: Set(value_of(record, "url")),
                    attention_to: Set(value_of(record, "attention_to")),
                    last_order_date: Set(to_date(value_of(record, "last_order_date"))),
                    active: Set(true),
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
        let models = customers::Entity::find()
            .filter(customers::Column::Active.eq(true))
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(|m| m.account_id).collect())
    }

    async fn deactivate(&self, ids: &[String]) -> Result<u64, BridgeError> {
        let result = customers::Entity::update_many()
            .col_expr(customers::Column::Active, Expr::value(false))
            .col_expr(
                customers::Column::UpdatedAt,
                Expr::value(Utc::now().naive_utc()),
            )
            .filter(customers::Column::AccountId.is_in(ids.to_vec()))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }
}

//! Product registry sync (Archibald "Articoli" grid)

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};

use super::{scraped, value_of};
use crate::browser::backend::BrowserSession;
use crate::entities::products;
use crate::error::BridgeError;
use crate::models::domain::Domain;
use crate::services::delta_sync::{
    MissingPolicy, SourceRecord, StoredRecord, SyncDomain,
};
use crate::services::erp_driver::{ErpDriver, ScrapedRecord};

pub struct ProductDomain {
    db: DatabaseConnection,
    driver: Arc<dyn ErpDriver>,
}

impl ProductDomain {
    pub fn new(db: DatabaseConnection, driver: Arc<dyn ErpDriver>) -> Self {
        Self { db, driver }
    }

    fn to_source(record: &ScrapedRecord) -> SourceRecord {
        // An article with a block id is not orderable
        let blocked = scraped(record, "ID BLOCCO ARTICOLO").is_some();
        SourceRecord {
            id: record.id.clone(),
            fields: vec![
                ("name", scraped(record, "NOME ARTICOLO")),
                ("description", scraped(record, "DESCRIZIONE")),
                ("article_group", scraped(record, "GRUPPO ARTICOLO")),
                ("package_content", scraped(record, "CONTENUTO IMBALLAGGIO")),
                ("search_name", scraped(record, "NOME RICERCA")),
                ("price_unit", scraped(record, "UNITÀ PREZZO")),
                ("product_group_id", scraped(record, "ID GRUPPO PRODOTTI")),
                ("min_quantity", scraped(record, "QTÀ MINIMA")),
                ("multiple_quantity", scraped(record, "QTÀ MULTIPLI")),
                ("max_quantity", scraped(record, "QTÀ MASSIMA")),
                ("blocked", Some(blocked.to_string())),
            ],
        }
    }

    fn stored_fields(model: &products::Model) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("name", Some(model.name.clone())),
            ("description", model.description.clone()),
            ("article_group", model.article_group.clone()),
            ("package_content", model.package_content.clone()),
            ("search_name", model.search_name.clone()),
            ("price_unit", model.price_unit.clone()),
            ("product_group_id", model.product_group_id.clone()),
            ("min_quantity", model.min_quantity.clone()),
            ("multiple_quantity", model.multiple_quantity.clone()),
            ("max_quantity", model.max_quantity.clone()),
            ("blocked", Some(model.blocked.to_string())),
        ]
    }
}

#[async_trait]
impl SyncDomain for ProductDomain {
    fn domain(&self) -> Domain {
        Domain::Products
    }

    fn missing_policy(&self) -> MissingPolicy {
        MissingPolicy::Deactivate
    }

    async fn total_pages(&self, session: &BrowserSession) -> Result<u32, BridgeError> {
        self.driver.count_pages(session, Domain::Products).await
    }

    async fn fetch_page(
        &self,
        session: &BrowserSession,
        page: u32,
    ) -> Result<Vec<SourceRecord>, BridgeError> {
        let records = self
            .driver
            .scrape_page(session, Domain::Products, page)
            .await?;
        Ok(records.iter().map(Self::to_source).collect())
    }

    async fn load_stored(&self, id: &str) -> Result<Option<StoredRecord>, BridgeError> {
        Ok(products::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(|model| StoredRecord {
                content_hash: model.content_hash.clone(),
                fields: Self::stored_fields(&model),
            }))
    }

    async fn upsert(&self, record: &SourceRecord, content_hash: &str) -> Result<(), BridgeError> {
        let now = Utc::now().naive_utc();
        let blocked = value_of(record, "blocked").as_deref() == Some("true");

        match products::Entity::find_by_id(record.id.as_str()).one(&self.db).await? {
            Some(model) => {
                let mut active: products::ActiveModel = model.into();
                active.name = Set(value_of(record, "name").unwrap_or_default());
                active.description = Set(value_of(record, "description"));
                active.article_group = Set(value_of(record, "article_group"));
                active.package_content = Set(value_of(record, "package_content"));
                active.search_name = Set(value_of(record, "search_name"));
                active.price_unit = Set(value_of(record, "price_unit"));
                active.product_group_id = Set(value_of(record, "product_group_id"));
                active.min_quantity = Set(value_of(record, "min_quantity"));
                active.multiple_quantity = Set(value_of(record, "multiple_quantity"));
                active.max_quantity = Set(value_of(record, "max_quantity"));
                active.blocked = Set(blocked);
                active.active = Set(true);
                active.content_hash = Set(content_hash.to_string());
                active.updated_at = Set(Some(now));
                active.update(&self.db).await?;
            }
            None => {
                let active = products::ActiveModel {
                    article_id: Set(record.id.clone()),
                    name: Set(value_of(record, "name").unwrap_or_default()),
                    description: Set(value_of(record, "description")),
                    article_group: Set(value_of(record, "article_group")),
                    package_content: Set(value_of(record, "package_content")),
                    search_name: Set(value_of(record, "search_name")),
                    price_unit: Set(value_of(record, "price_unit")),
                    product_group_id: Set(value_of(record, "product_group_id")),
                    min_quantity: Set(value_of(record, "min_quantity")),
                    multiple_quantity: Set(value_of(record, "multiple_quantity")),
                    max_quantity: Set(value_of(record, "max_quantity")),
                    blocked: Set(blocked),
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
        let models = products::Entity::find()
            .filter(products::Column::Active.eq(true))
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(|m| m.article_id).collect())
    }

    async fn deactivate(&self, ids: &[String]) -> Result<u64, BridgeError> {
        let result = products::Entity::update_many()
            .col_expr(products::Column::Active, Expr::value(false))
            .col_expr(
                products::Column::UpdatedAt,
                Expr::value(Utc::now().naive_utc()),
            )
            .filter(products::Column::ArticleId.is_in(ids.to_vec()))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }
}

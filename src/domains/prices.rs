//! Price agreement sync (per-account price lists)

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};

use super::{canon_amount, canon_date, date_string, decimal_string, scraped, to_date, to_decimal, value_of};
use crate::browser::backend::BrowserSession;
use crate::entities::prices;
use crate::error::BridgeError;
use crate::models::domain::Domain;
use crate::services::delta_sync::{
    MissingPolicy, SourceRecord, StoredRecord, SyncDomain,
};
use crate::services::erp_driver::{ErpDriver, ScrapedRecord};

pub struct PriceDomain {
    db: DatabaseConnection,
    driver: Arc<dyn ErpDriver>,
}

impl PriceDomain {
    pub fn new(db: DatabaseConnection, driver: Arc<dyn ErpDriver>) -> Self {
        Self { db, driver }
    }

    fn to_source(record: &ScrapedRecord) -> SourceRecord {
        SourceRecord {
            id: record.id.clone(),
            fields: vec![
                ("product_id", scraped(record, "ID")),
                ("item_selection", scraped(record, "ITEM SELECTION")),
                ("account_code", scraped(record, "CODICE CONTO")),
                ("account_description", scraped(record, "ACCOUNT: DESCRIZIONE")),
                ("product_name", scraped(record, "ITEM DESCRIPTION")),
                ("valid_from", canon_date(scraped(record, "DA DATA"))),
                ("valid_to", canon_date(scraped(record, "DATA"))),
                ("quantity_from", scraped(record, "QUANTITÀ (DA)")),
                ("quantity_to", scraped(record, "QUANTITÀ (A)")),
                ("unit_price", canon_amount(scraped(record, "IMPORTO UNITARIO"))),
                ("currency", scraped(record, "VALUTA")),
                ("price_unit", scraped(record, "UNITÀ DI PREZZO")),
            ],
        }
    }

    fn stored_fields(model: &prices::Model) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("product_id", Some(model.product_id.clone())),
            ("item_selection", model.item_selection.clone()),
            ("account_code", model.account_code.clone()),
            ("account_description", model.account_description.clone()),
            ("product_name", model.product_name.clone()),
            ("valid_from", date_string(model.valid_from)),
            ("valid_to", date_string(model.valid_to)),
            ("quantity_from", model.quantity_from.clone()),
            ("quantity_to", model.quantity_to.clone()),
            ("unit_price", decimal_string(model.unit_price)),
            ("currency", model.currency.clone()),
            ("price_unit", model.price_unit.clone()),
        ]
    }
}

#[async_trait]
impl SyncDomain for PriceDomain {
    fn domain(&self) -> Domain {
        Domain::Prices
    }

    fn missing_policy(&self) -> MissingPolicy {
        MissingPolicy::Deactivate
    }

    async fn total_pages(&self, session: &BrowserSession) -> Result<u32, BridgeError> {
        self.driver.count_pages(session, Domain::Prices).await
    }

    async fn fetch_page(
        &self,
        session: &BrowserSession,
        page: u32,
    ) -> Result<Vec<SourceRecord>, BridgeError> {
        let records = self
            .driver
            .scrape_page(session, Domain::Prices, page)
            .await?;
        Ok(records.iter().map(Self::to_source).collect())
    }

    async fn load_stored(&self, id: &str) -> Result<Option<StoredRecord>, BridgeError> {
        Ok(prices::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(|model| StoredRecord {
                content_hash: model.content_hash.clone(),
                fields: Self::stored_fields(&model),
            }))
    }

    async fn upsert(&self, record: &SourceRecord, content_hash: &str) -> Result<(), BridgeError> {
        let now = Utc::now().naive_utc();

        match prices::Entity::find_by_id(record.id.as_str()).one(&self.db).await? {
            Some(model) => {
                let mut active: prices::ActiveModel = model.into();
                active.product_id = Set(value_of(record, "product_id").unwrap_or_default());
                active.item_selection = Set(value_of(record, "item_selection"));
                active.account_code = Set(value_of(record, "account_code"));
                active.account_description = Set(value_of(record, "account_description"));
                active.product_name = Set(value_of(record, "product_name"));
                active.valid_from = Set(to_date(value_of(record, "valid_from")));
                active.valid_to = Set(to_date(value_of(record, "valid_to")));
                active.quantity_from = Set(value_of(record, "quantity_from"));
                active.quantity_to = Set(value_of(record, "quantity_to"));
                active.unit_price = Set(to_decimal(value_of(record, "unit_price")));
                active.currency = Set(value_of(record, "currency"));
                active.price_unit = Set(value_of(record, "price_unit"));
                active.active = Set(true);
                active.content_hash = Set(content_hash.to_string());
                active.updated_at = Set(Some(now));
                active.update(&self.db).await?;
            }
            None => {
                let active = prices::ActiveModel {
                    price_id: Set(record.id.clone()),
                    product_id: Set(value_of(record, "product_id").unwrap_or_default()),
                    item_selection: Set(value_of(record, "item_selection")),
                    account_code: Set(value_of(record, "account_code")),
                    account_description: Set(value_of(record, "account_description")),
                    product_name: Set(value_of(record, "product_name")),
                    valid_from: Set(to_date(value_of(record, "valid_from"))),
                    valid_to: Set(to_date(value_of(record, "valid_to"))),
                    quantity_from: Set(value_of(record, "quantity_from")),
                    quantity_to: Set(value_of(record, "quantity_to")),
                    unit_price: Set(to_decimal(value_of(record, "unit_price"))),
                    currency: Set(value_of(record, "currency")),
                    price_unit: Set(value_of(record, "price_unit")),
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
        let models = prices::Entity::find()
            .filter(prices::Column::Active.eq(true))
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(|m| m.price_id).collect())
    }

    async fn deactivate(&self, ids: &[String]) -> Result<u64, BridgeError> {
        let result = prices::Entity::update_many()
            .col_expr(prices::Column::Active, Expr::value(false))
            .col_expr(
                prices::Column::UpdatedAt,
                Expr::value(Utc::now().naive_utc()),
            )
            .filter(prices::Column::PriceId.is_in(ids.to_vec()))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }
}

//! Sync domain adapters
//!
//! One adapter per ERP data category. The grid domains (customers, products,
//! prices, orders) map the bot's scraped rows into canonical records; the
//! document domains (transport documents, invoices) go through the ERP's PDF
//! export and the extraction subprocess. Values are normalized here — ISO
//! dates, plain decimals — so hashing and field diffing are stable across
//! runs.

pub mod customers;
pub mod invoices;
pub mod orders;
pub mod prices;
pub mod products;
pub mod transport_documents;

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;

use crate::models::domain::Domain;
use crate::services::delta_sync::{SourceRecord, SyncDomain};
use crate::services::erp_driver::{ErpDriver, ScrapedRecord};
use crate::services::pdf_extract::PdfExtractor;

pub fn build_domains(
    db: &DatabaseConnection,
    driver: &Arc<dyn ErpDriver>,
    extractor: &PdfExtractor,
) -> HashMap<Domain, Arc<dyn SyncDomain>> {
    let mut domains: HashMap<Domain, Arc<dyn SyncDomain>> = HashMap::new();
    domains.insert(
        Domain::Customers,
        Arc::new(customers::CustomerDomain::new(db.clone(), Arc::clone(driver))),
    );
    domains.insert(
        Domain::Products,
        Arc::new(products::ProductDomain::new(db.clone(), Arc::clone(driver))),
    );
    domains.insert(
        Domain::Prices,
        Arc::new(prices::PriceDomain::new(db.clone(), Arc::clone(driver))),
    );
    domains.insert(
        Domain::Orders,
        Arc::new(orders::OrderDomain::new(db.clone(), Arc::clone(driver))),
    );
    domains.insert(
        Domain::TransportDocuments,
        Arc::new(transport_documents::TransportDocumentDomain::new(
            db.clone(),
            Arc::clone(driver),
            extractor.clone(),
        )),
    );
    domains.insert(
        Domain::Invoices,
        Arc::new(invoices::InvoiceDomain::new(
            db.clone(),
            Arc::clone(driver),
            extractor.clone(),
        )),
    );
    domains
}

/// Scraped column lookup; blank cells count as absent.
fn scraped(record: &ScrapedRecord, key: &str) -> Option<String> {
    record
        .fields
        .iter()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Canonical value lookup on a normalized record, used by the upserts.
fn value_of(record: &SourceRecord, name: &str) -> Option<String> {
    record
        .fields
        .iter()
        .find(|(field, _)| *field == name)
        .and_then(|(_, value)| value.clone())
}

/// The ERP renders dates as DD/MM/YYYY; exports already carry ISO dates.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
}

/// Normalize a date to ISO, dropping unparseable values.
fn canon_date(raw: Option<String>) -> Option<String> {
    raw.as_deref()
        .and_then(parse_date)
        .map(|date| date.format("%Y-%m-%d").to_string())
}

/// Parse an Italian-formatted amount ("1.234,56 €") into a decimal.
fn parse_amount(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.' || *c == '-')
        .collect();
    let normalized = cleaned.replace('.', "").replace(',', ".");
    Decimal::from_str(&normalized).ok()
}

fn canon_amount(raw: Option<String>) -> Option<String> {
    raw.as_deref().and_then(parse_amount).map(|d| d.to_string())
}

fn to_date(canonical: Option<String>) -> Option<NaiveDate> {
    canonical
        .as_deref()
        .and_then(|v| NaiveDate::parse_from_str(v, "%Y-%m-%d").ok())
}

fn to_decimal(canonical: Option<String>) -> Option<Decimal> {
    canonical.as_deref().and_then(|v| Decimal::from_str(v).ok())
}

fn date_string(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format("%Y-%m-%d").to_string())
}

fn decimal_string(value: Option<Decimal>) -> Option<String> {
    value.map(|d| d.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_italian_dates_and_iso_dates() {
        assert_eq!(
            parse_date("03/02/2026"),
            NaiveDate::from_ymd_opt(2026, 2, 3)
        );
        assert_eq!(
            parse_date("2026-02-03"),
            NaiveDate::from_ymd_opt(2026, 2, 3)
        );
        assert_eq!(parse_date("never"), None);
    }

    #[test]
    fn parses_italian_amounts() {
        assert_eq!(parse_amount("105,60 €"), Decimal::from_str("105.60").ok());
        assert_eq!(
            parse_amount("1.234,56 €"),
            Decimal::from_str("1234.56").ok()
        );
        assert_eq!(parse_amount(""), None);
    }

    #[test]
    fn blank_scraped_cells_are_absent() {
        let record = ScrapedRecord {
            id: "1".into(),
            fields: vec![
                ("NOME".into(), "Rossi".into()),
                ("PEC".into(), "  ".into()),
            ],
        };
        assert_eq!(scraped(&record, "NOME").as_deref(), Some("Rossi"));
        assert_eq!(scraped(&record, "PEC"), None);
        assert_eq!(scraped(&record, "SDI"), None);
    }
}

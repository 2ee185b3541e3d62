//! Automation driver interface
//!
//! The core never touches the ERP's pages itself: all UI automation lives in
//! an external bot. `ErpDriver` is the seam — opaque async operations with
//! success/failure outcomes. The production implementation forwards each call
//! to the bot sidecar over HTTP, handing it the browser session to drive.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::browser::backend::BrowserSession;
use crate::error::BridgeError;
use crate::models::domain::Domain;
use crate::models::order::OrderPayload;

/// One row scraped from an ERP grid, as raw column name/value pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedRecord {
    pub id: String,
    pub fields: Vec<(String, String)>,
}

#[async_trait]
pub trait ErpDriver: Send + Sync {
    /// Ensure the session is authenticated against the ERP. Idempotent.
    async fn login(&self, session: &BrowserSession) -> Result<(), BridgeError>;

    /// Number of grid pages the ERP currently reports for a domain.
    async fn count_pages(
        &self,
        session: &BrowserSession,
        domain: Domain,
    ) -> Result<u32, BridgeError>;

    /// Scrape one grid page (1-based).
    async fn scrape_page(
        &self,
        session: &BrowserSession,
        domain: Domain,
        page: u32,
    ) -> Result<Vec<ScrapedRecord>, BridgeError>;

    /// Trigger the ERP's PDF export for a domain; returns the downloaded path.
    async fn download_export(
        &self,
        session: &BrowserSession,
        domain: Domain,
    ) -> Result<PathBuf, BridgeError>;

    /// Drive the order-entry flow; returns the ERP's order id.
    async fn place_order(
        &self,
        session: &BrowserSession,
        order: &OrderPayload,
    ) -> Result<String, BridgeError>;
}

/// HTTP client for the automation bot sidecar.
#[derive(Clone)]
pub struct HttpBotDriver {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct SessionCall<'a, T: Serialize> {
    session: &'a BrowserSession,
    #[serde(flatten)]
    body: T,
}

#[derive(Deserialize)]
struct CountPagesResponse {
    total_pages: u32,
}

#[derive(Deserialize)]
struct ScrapePageResponse {
    records: Vec<ScrapedRecord>,
}

#[derive(Deserialize)]
struct DownloadExportResponse {
    path: PathBuf,
}

#[derive(Deserialize)]
struct PlaceOrderResponse {
    order_id: String,
}

impl HttpBotDriver {
    pub fn new(base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, base_url }
    }

    async fn call<T: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        session: &BrowserSession,
        body: T,
    ) -> Result<R, BridgeError> {
        let url = format!("{}/{}", self.base_url, endpoint);

        let response = self
            .client
            .post(&url)
            .json(&SessionCall { session, body })
            .send()
            .await
            .map_err(|e| BridgeError::Driver(format!("bot unreachable: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(BridgeError::Driver(format!(
                "bot error {}: {}",
                status, error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| BridgeError::Driver(format!("malformed bot response: {}", e)))
    }
}

#[async_trait]
impl ErpDriver for HttpBotDriver {
    async fn login(&self, session: &BrowserSession) -> Result<(), BridgeError> {
        let _: serde_json::Value = self.call("login", session, serde_json::json!({})).await?;
        Ok(())
    }

    async fn count_pages(
        &self,
        session: &BrowserSession,
        domain: Domain,
    ) -> Result<u32, BridgeError> {
        let resp: CountPagesResponse = self
            .call(
                "count-pages",
                session,
                serde_json::json!({ "domain": domain }),
            )
            .await?;
        Ok(resp.total_pages)
    }

    async fn scrape_page(
        &self,
        session: &BrowserSession,
        domain: Domain,
        page: u32,
    ) -> Result<Vec<ScrapedRecord>, BridgeError> {
        let resp: ScrapePageResponse = self
            .call(
                "scrape-page",
                session,
                serde_json::json!({ "domain": domain, "page": page }),
            )
            .await?;
        Ok(resp.records)
    }

    async fn download_export(
        &self,
        session: &BrowserSession,
        domain: Domain,
    ) -> Result<PathBuf, BridgeError> {
        let resp: DownloadExportResponse = self
            .call(
                "download-export",
                session,
                serde_json::json!({ "domain": domain }),
            )
            .await?;
        Ok(resp.path)
    }

    async fn place_order(
        &self,
        session: &BrowserSession,
        order: &OrderPayload,
    ) -> Result<String, BridgeError> {
        let resp: PlaceOrderResponse = self
            .call("place-order", session, serde_json::json!({ "order": order }))
            .await?;
        Ok(resp.order_id)
    }
}

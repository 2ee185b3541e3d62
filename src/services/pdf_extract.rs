//! PDF extraction subprocess
//!
//! The ERP's document domains come out as PDF exports; parsing them is the
//! job of the per-domain Python scripts, run as external processes. Each
//! script prints one JSON record per stdout line; a non-zero exit code is a
//! failure and stderr is captured for the error message.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::de::DeserializeOwned;
use tokio::process::Command;

use crate::error::BridgeError;
use crate::models::domain::Domain;

#[derive(Clone)]
pub struct PdfExtractor {
    script_dir: PathBuf,
}

impl PdfExtractor {
    pub fn new(script_dir: PathBuf) -> Self {
        Self { script_dir }
    }

    fn script_for(&self, domain: Domain) -> PathBuf {
        let name = match domain {
            Domain::Customers => "parse-clienti-pdf.py",
            Domain::Products => "parse-products-pdf.py",
            Domain::Prices => "parse-prices-pdf.py",
            Domain::Orders => "parse-orders-pdf.py",
            Domain::TransportDocuments => "parse-ddt-pdf.py",
            Domain::Invoices => "parse-invoices-pdf.py",
        };
        self.script_dir.join(name)
    }

    /// Run the extraction script for `domain` on `pdf_path` and parse its
    /// JSON-lines output.
    pub async fn extract<T: DeserializeOwned>(
        &self,
        domain: Domain,
        pdf_path: &Path,
    ) -> Result<Vec<T>, BridgeError> {
        let script = self.script_for(domain);

        tracing::debug!(
            "[{}] Extracting {} via {}",
            domain,
            pdf_path.display(),
            script.display()
        );

        let output = Command::new("python3")
            .arg(&script)
            .arg(pdf_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| BridgeError::Extract(format!("failed to spawn parser: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BridgeError::Extract(format!(
                "parser exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut records = Vec::new();
        for (lineno, line) in stdout.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let record = serde_json::from_str(line).map_err(|e| {
                BridgeError::Extract(format!("bad record on line {}: {}", lineno + 1, e))
            })?;
            records.push(record);
        }

        tracing::debug!("[{}] Extracted {} records", domain, records.len());
        Ok(records)
    }
}

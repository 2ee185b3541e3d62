//! Browser process backend
//!
//! The pool talks to browsers only through these traits: launching a process,
//! opening/closing isolated contexts inside it, and checking that a context
//! still carries a live ERP login. The production backend drives headless
//! Chromium over the DevTools protocol; tests swap in an in-memory double.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::process::Command;
use tokio::sync::{Notify, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::config::PoolConfig;
use crate::error::BridgeError;

/// One isolated browser automation context, bound to one user's ERP login.
///
/// Serializable because the automation bot receives it verbatim with every
/// driver call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSession {
    pub user_id: String,
    pub process_index: usize,
    /// DevTools browser-context id (cookie isolation boundary)
    pub context_id: String,
    /// DevTools target id of the context's page
    pub target_id: String,
    /// Page-level WebSocket endpoint the bot attaches to
    pub ws_url: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait BrowserProcess: Send + Sync {
    fn index(&self) -> usize;

    async fn open_context(&self, user_id: &str) -> Result<BrowserSession, BridgeError>;

    async fn close_context(&self, session: &BrowserSession) -> Result<(), BridgeError>;

    /// True when the session still carries the required, unexpired ERP auth
    /// cookies.
    async fn validate(&self, session: &BrowserSession) -> Result<bool, BridgeError>;

    fn is_connected(&self) -> bool;

    /// Resolves once the process has exited, however that happened.
    async fn closed(&self);

    /// Best-effort termination.
    fn kill(&self);
}

#[async_trait]
pub trait BrowserBackend: Send + Sync {
    async fn launch(&self, index: usize) -> Result<Arc<dyn BrowserProcess>, BridgeError>;
}

// ---------------------------------------------------------------------------
// Headless Chromium over the DevTools protocol

pub struct CdpBackend {
    config: PoolConfig,
    client: reqwest::Client,
}

impl CdpBackend {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionInfo {
    web_socket_debugger_url: String,
}

#[async_trait]
impl BrowserBackend for CdpBackend {
    async fn launch(&self, index: usize) -> Result<Arc<dyn BrowserProcess>, BridgeError> {
        let port = self.config.devtools_base_port + index as u16;
        let profile_dir =
            std::env::temp_dir().join(format!("archibald-bridge-profile-{}", index));

        let mut child = Command::new(&self.config.chromium_binary)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-first-run")
            .arg(format!("--remote-debugging-port={}", port))
            .arg(format!("--user-data-dir={}", profile_dir.display()))
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BridgeError::Session(format!("failed to spawn chromium: {}", e)))?;

        // Wait for the DevTools endpoint to come up
        let version_url = format!("http://127.0.0.1:{}/json/version", port);
        let mut browser_ws_url = None;
        for _ in 0..40 {
            if let Ok(resp) = self.client.get(&version_url).send().await {
                if let Ok(info) = resp.json::<VersionInfo>().await {
                    browser_ws_url = Some(info.web_socket_debugger_url);
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
        let Some(browser_ws_url) = browser_ws_url else {
            let _ = child.kill().await;
            return Err(BridgeError::Session(format!(
                "chromium on port {} never became ready",
                port
            )));
        };

        let (alive_tx, alive_rx) = watch::channel(true);
        let kill_notify = Arc::new(Notify::new());

        {
            let kill_notify = Arc::clone(&kill_notify);
            tokio::spawn(async move {
                tokio::select! {
                    status = child.wait() => {
                        tracing::warn!("Browser process exited: {:?}", status);
                    }
                    _ = kill_notify.notified() => {
                        let _ = child.kill().await;
                    }
                }
                let _ = alive_tx.send(false);
            });
        }

        tracing::info!("Launched browser process {} on port {}", index, port);

        // Cookie scope: "https://erp.example.com" -> "erp.example.com"
        let erp_host = self
            .config
            .erp_origin
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/')
            .to_string();

        Ok(Arc::new(CdpProcess {
            index,
            port,
            browser_ws_url,
            alive_rx,
            kill_notify,
            required_cookies: self.config.required_cookies.clone(),
            erp_host,
            call_timeout: self.config.validation_timeout,
        }))
    }
}

pub struct CdpProcess {
    index: usize,
    port: u16,
    browser_ws_url: String,
    alive_rx: watch::Receiver<bool>,
    kill_notify: Arc<Notify>,
    required_cookies: Vec<String>,
    erp_host: String,
    call_timeout: Duration,
}

impl CdpProcess {
    /// One DevTools command over a short-lived browser-level connection.
    async fn cdp_call(&self, method: &str, params: Value) -> Result<Value, BridgeError> {
        if !self.is_connected() {
            return Err(BridgeError::ProcessCrashed { index: self.index });
        }
        let call = async {
            let (ws, _) = connect_async(&self.browser_ws_url)
                .await
                .map_err(|e| BridgeError::Session(format!("devtools connect: {}", e)))?;
            let (mut write, mut read) = ws.split();

            let payload = json!({ "id": 1, "method": method, "params": params });
            write
                .send(Message::Text(payload.to_string()))
                .await
                .map_err(|e| BridgeError::Session(format!("devtools send: {}", e)))?;

            while let Some(msg) = read.next().await {
                let msg = msg.map_err(|e| BridgeError::Session(format!("devtools recv: {}", e)))?;
                let Message::Text(text) = msg else { continue };
                let value: Value = serde_json::from_str(&text)
                    .map_err(|e| BridgeError::Session(format!("devtools json: {}", e)))?;
                if value.get("id").and_then(Value::as_i64) != Some(1) {
                    continue;
                }
                if let Some(error) = value.get("error") {
                    return Err(BridgeError::Session(format!("{}: {}", method, error)));
                }
                return Ok(value.get("result").cloned().unwrap_or(Value::Null));
            }
            Err(BridgeError::Session("devtools connection closed".into()))
        };

        tokio::time::timeout(self.call_timeout, call)
            .await
            .map_err(|_| BridgeError::Session(format!("{} timed out", method)))?
    }
}

#[async_trait]
impl BrowserProcess for CdpProcess {
    fn index(&self) -> usize {
        self.index
    }

    async fn open_context(&self, user_id: &str) -> Result<BrowserSession, BridgeError> {
        let result = self.cdp_call("Target.createBrowserContext", json!({})).await?;
        let context_id = result
            .get("browserContextId")
            .and_then(Value::as_str)
            .ok_or_else(|| BridgeError::Session("missing browserContextId".into()))?
            .to_string();

        let result = self
            .cdp_call(
                "Target.createTarget",
                json!({ "url": "about:blank", "browserContextId": context_id }),
            )
            .await?;
        let target_id = result
            .get("targetId")
            .and_then(Value::as_str)
            .ok_or_else(|| BridgeError::Session("missing targetId".into()))?
            .to_string();

        Ok(BrowserSession {
            user_id: user_id.to_string(),
            process_index: self.index,
            ws_url: format!("ws://127.0.0.1:{}/devtools/page/{}", self.port, target_id),
            context_id,
            target_id,
            created_at: Utc::now(),
        })
    }

    async fn close_context(&self, session: &BrowserSession) -> Result<(), BridgeError> {
        self.cdp_call(
            "Target.disposeBrowserContext",
            json!({ "browserContextId": session.context_id }),
        )
        .await?;
        Ok(())
    }

    async fn validate(&self, session: &BrowserSession) -> Result<bool, BridgeError> {
        let result = self
            .cdp_call(
                "Storage.getCookies",
                json!({ "browserContextId": session.context_id }),
            )
            .await?;

        let cookies = result
            .get("cookies")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let now = Utc::now().timestamp() as f64;

        for required in &self.required_cookies {
            let live = cookies.iter().any(|cookie| {
                cookie.get("name").and_then(Value::as_str) == Some(required.as_str())
                    && cookie
                        .get("domain")
                        .and_then(Value::as_str)
                        .is_none_or(|domain| self.erp_host.ends_with(domain.trim_start_matches('.')))
                    && match cookie.get("expires").and_then(Value::as_f64) {
                        // -1 marks a session cookie
                        Some(expires) if expires >= 0.0 => expires > now + 60.0,
                        _ => true,
                    }
            });
            if !live {
                tracing::debug!(
                    "Session for {} missing auth cookie {}",
                    session.user_id,
                    required
                );
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn is_connected(&self) -> bool {
        *self.alive_rx.borrow()
    }

    async fn closed(&self) {
        let mut rx = self.alive_rx.clone();
        while *rx.borrow() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }

    fn kill(&self) {
        self.kill_notify.notify_one();
    }
}

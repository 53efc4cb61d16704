//! Chrome DevTools Protocol page driver.
//!
//! Attaches to an already running Chrome (started with
//! `--remote-debugging-port`) whose agent tab is logged in to the platform,
//! and exchanges CDP commands over the tab's WebSocket.

use super::BrowserPage;
use async_trait::async_trait;
use autoseat_core::{AutoseatError, Result};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, trace, warn};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Entry of the DevTools `/json/list` endpoint.
#[derive(Debug, Deserialize)]
struct TargetInfo {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    url: String,
    #[serde(rename = "webSocketDebuggerUrl")]
    web_socket_debugger_url: Option<String>,
}

/// One attached tab.
pub struct DevToolsPage {
    socket: Mutex<Socket>,
    next_id: AtomicU64,
    timeout: Duration,
    target_id: String,
    /// Set once the socket failed; later commands fail without touching it
    disconnected: AtomicBool,
}

impl DevToolsPage {
    /// Finds the first page target whose URL contains `url_fragment` and connects to it.
    pub async fn attach(devtools_url: &str, url_fragment: &str, timeout: Duration) -> Result<Self> {
        let list_url = format!("{}/json/list", devtools_url.trim_end_matches('/'));
        let targets: Vec<TargetInfo> = reqwest::Client::new()
            .get(&list_url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| AutoseatError::browser(format!("DevTools not reachable at {}: {}", list_url, e)))?
            .json()
            .await
            .map_err(|e| AutoseatError::browser(format!("Failed to parse target list: {}", e)))?;

        let target = targets
            .into_iter()
            .find(|t| t.kind == "page" && t.url.contains(url_fragment))
            .ok_or_else(|| {
                AutoseatError::browser(format!("No open page matching '{}'", url_fragment))
            })?;
        let ws_url = target.web_socket_debugger_url.clone().ok_or_else(|| {
            AutoseatError::browser(format!(
                "Page {} is already attached to another debugger",
                target.id
            ))
        })?;

        let (socket, _) = tokio::time::timeout(timeout, connect_async(ws_url.as_str()))
            .await
            .map_err(|_| AutoseatError::browser("Timed out connecting to DevTools"))?
            .map_err(|e| AutoseatError::browser(format!("DevTools connection failed: {}", e)))?;

        info!(target = %target.id, url = %target.url, "Attached to agent page");
        Ok(Self {
            socket: Mutex::new(socket),
            next_id: AtomicU64::new(1),
            timeout,
            target_id: target.id,
            disconnected: AtomicBool::new(false),
        })
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// Whether the automation connection has been lost.
    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }

    /// Sends one CDP command and waits for its response, skipping events.
    ///
    /// A send or read failure on the socket is [`AutoseatError::BrowserDisconnected`];
    /// a timeout or a CDP error reply is not.
    async fn command(&self, method: &str, params: Value) -> Result<Value> {
        if self.is_disconnected() {
            return Err(AutoseatError::browser_disconnected(format!(
                "{} not sent: DevTools connection already lost",
                method
            )));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let frame = json!({ "id": id, "method": method, "params": params }).to_string();

        let mut socket = self.socket.lock().await;
        if let Err(e) = socket.send(WsMessage::Text(frame)).await {
            return Err(self.lost(format!("{} send failed: {}", method, e)));
        }
        trace!(id, method, "CDP command sent");

        match tokio::time::timeout(self.timeout, read_response(&mut socket, id, method)).await {
            Err(_) => Err(AutoseatError::browser(format!("{} timed out", method))),
            Ok(Err(AutoseatError::BrowserDisconnected(message))) => Err(self.lost(message)),
            Ok(result) => result,
        }
    }

    fn lost(&self, message: String) -> AutoseatError {
        if !self.disconnected.swap(true, Ordering::SeqCst) {
            error!(target = %self.target_id, reason = %message, "DevTools connection lost");
        }
        AutoseatError::browser_disconnected(message)
    }
}

/// Reads frames until the response to command `id` arrives.
async fn read_response(socket: &mut Socket, id: u64, method: &str) -> Result<Value> {
    while let Some(message) = socket.next().await {
        let message = message.map_err(|e| {
            AutoseatError::browser_disconnected(format!("DevTools read failed: {}", e))
        })?;
        match message {
            WsMessage::Text(text) => {
                let value: Value = serde_json::from_str(&text)?;
                if value.get("id").and_then(Value::as_u64) != Some(id) {
                    continue;
                }
                if let Some(error) = value.get("error") {
                    return Err(AutoseatError::browser(format!("{} failed: {}", method, error)));
                }
                return Ok(value.get("result").cloned().unwrap_or(Value::Null));
            }
            WsMessage::Close(_) => break,
            _ => {}
        }
    }
    Err(AutoseatError::browser_disconnected("DevTools connection closed"))
}

#[async_trait]
impl BrowserPage for DevToolsPage {
    async fn evaluate(&self, expression: &str) -> Result<Value> {
        let result = self
            .command(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;

        if let Some(details) = result.get("exceptionDetails") {
            let text = details
                .pointer("/exception/description")
                .or_else(|| details.get("text"))
                .and_then(Value::as_str)
                .unwrap_or("script exception");
            return Err(AutoseatError::browser(text.to_string()));
        }

        Ok(result
            .pointer("/result/value")
            .cloned()
            .unwrap_or(Value::Null))
    }

    async fn cookies(&self) -> Result<Vec<(String, String)>> {
        let result = self.command("Network.getCookies", json!({})).await?;
        let cookies: Vec<(String, String)> = result
            .get("cookies")
            .and_then(Value::as_array)
            .map(|cookies| {
                cookies
                    .iter()
                    .filter_map(|c| {
                        let name = c.get("name")?.as_str()?;
                        let value = c.get("value")?.as_str()?;
                        Some((name.to_string(), value.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();
        debug!(count = cookies.len(), "Harvested page cookies");
        Ok(cookies)
    }

    async fn close(&self) -> Result<()> {
        if self.is_disconnected() {
            debug!("DevTools connection already lost; nothing to close");
            return Ok(());
        }
        if let Err(e) = self.command("Page.close", json!({})).await {
            warn!(error = %e, "Page.close failed");
        }
        let mut socket = self.socket.lock().await;
        socket
            .close(None)
            .await
            .map_err(|e| AutoseatError::browser(format!("Failed to close DevTools socket: {}", e)))
    }
}

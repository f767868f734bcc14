//! MCP client over the SSE transport (connect, communicate, lifecycle).

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use futures_util::Stream;
use reqwest::header::ACCEPT;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::{
    CallToolParams, CallToolResult, GetPromptParams, GetPromptResult, Incoming, InitializeParams,
    InitializeResult, JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    ListPromptsResult, ListToolsResult, METHOD_NOT_FOUND, PaginatedParams, Prompt, RawMessage,
    RequestId, Tool,
};
use crate::sse::{EventStream, SseEvent};

/// Path of the event stream, relative to the server URL.
pub const SSE_PATH: &str = "sse";

type Pending = Arc<Mutex<PendingRequests>>;

/// Requests awaiting a reply, keyed by id. Once closed, no new request may
/// register, since no reader is left to answer it.
#[derive(Default)]
struct PendingRequests {
    waiters: HashMap<RequestId, oneshot::Sender<JsonRpcResponse>>,
    closed: bool,
}

impl PendingRequests {
    fn register(&mut self, id: RequestId, tx: oneshot::Sender<JsonRpcResponse>) -> Result<()> {
        if self.closed {
            return Err(Error::Disconnected);
        }
        self.waiters.insert(id, tx);
        Ok(())
    }

    /// Dropping the senders wakes every waiter with `Disconnected`.
    fn close(&mut self) {
        self.closed = true;
        self.waiters.clear();
    }
}

/// Configuration for an MCP server connection.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the server; the stream lives at `<url>/sse`.
    pub url: String,
    /// Per-request limit. `None` waits for as long as the server takes.
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Handle to a connected MCP server.
pub struct Client {
    http: reqwest::Client,
    endpoint: Url,
    pending: Pending,
    next_id: AtomicI64,
    timeout: Option<Duration>,
    reader: JoinHandle<()>,
    server_info: Mutex<Option<InitializeResult>>,
    tools: Mutex<Vec<Tool>>,
    prompts: Mutex<Vec<Prompt>>,
}

impl Client {
    /// Open the event stream, run the initialize handshake and fetch the
    /// tool catalog (and prompt catalog, if the server has one).
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let sse_url = sse_url(&config.url)?;
        let http = reqwest::Client::new();

        debug!(url = %sse_url, "opening MCP event stream");
        let response = http
            .get(sse_url.clone())
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| Error::Connection(format!("{sse_url}: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(Error::Connection(format!("{sse_url}: {status}")));
        }

        let mut events = EventStream::new(Box::pin(response.bytes_stream()));
        let endpoint = wait_for_endpoint(&mut events, &sse_url).await?;
        debug!(endpoint = %endpoint, "MCP message endpoint announced");

        let pending: Pending = Arc::new(Mutex::new(PendingRequests::default()));
        let reader = tokio::spawn(read_events(
            events,
            http.clone(),
            endpoint.clone(),
            pending.clone(),
        ));

        let client = Self {
            http,
            endpoint,
            pending,
            next_id: AtomicI64::new(1),
            timeout: config.timeout,
            reader,
            server_info: Mutex::new(None),
            tools: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
        };

        client.initialize().await.map_err(|e| match e {
            e @ Error::Connection(_) => e,
            other => Error::Connection(format!("handshake failed: {other}")),
        })?;

        Ok(client)
    }

    async fn initialize(&self) -> Result<()> {
        let params = InitializeParams::default();
        let result: InitializeResult = self.request("initialize", Some(params)).await?;
        info!(
            server = %result.server_info.name,
            protocol = %result.protocol_version,
            "MCP server initialized"
        );

        self.notify("notifications/initialized").await?;

        let has_prompts = result.capabilities.prompts.is_some();
        *self.server_info.lock().await = Some(result);

        self.refresh_tools().await?;
        if has_prompts {
            self.refresh_prompts().await?;
        }

        Ok(())
    }

    /// URL that client messages are posted to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Get server info (after initialization).
    pub async fn server_info(&self) -> Option<InitializeResult> {
        self.server_info.lock().await.clone()
    }

    /// Refresh the list of available tools, following pagination.
    pub async fn refresh_tools(&self) -> Result<()> {
        let mut tools = Vec::new();
        let mut cursor = None;
        loop {
            let page: ListToolsResult = self
                .request("tools/list", Some(PaginatedParams { cursor }))
                .await?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        *self.tools.lock().await = tools;
        Ok(())
    }

    /// Get the list of available tools.
    pub async fn tools(&self) -> Vec<Tool> {
        self.tools.lock().await.clone()
    }

    /// Refresh the list of prompt templates, following pagination.
    pub async fn refresh_prompts(&self) -> Result<()> {
        let mut prompts = Vec::new();
        let mut cursor = None;
        loop {
            let page: ListPromptsResult = self
                .request("prompts/list", Some(PaginatedParams { cursor }))
                .await?;
            prompts.extend(page.prompts);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        *self.prompts.lock().await = prompts;
        Ok(())
    }

    /// Get the list of prompt templates (empty if the server has none).
    pub async fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().await.clone()
    }

    /// Render a prompt template.
    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: Option<HashMap<String, String>>,
    ) -> Result<GetPromptResult> {
        let params = GetPromptParams {
            name: name.to_string(),
            arguments,
        };
        self.request("prompts/get", Some(params)).await
    }

    /// Call a tool by name.
    pub async fn call_tool(&self, name: &str, arguments: Option<Value>) -> Result<CallToolResult> {
        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };

        let result: CallToolResult = self.request("tools/call", Some(params)).await?;

        if result.is_error {
            return Err(Error::ToolCallFailed(result.text()));
        }

        Ok(result)
    }

    /// Whether the event stream is still being read.
    pub fn is_connected(&self) -> bool {
        !self.reader.is_finished()
    }

    /// Close the connection. Requests still in flight fail with
    /// [`Error::Disconnected`].
    pub async fn shutdown(self) -> Result<()> {
        self.reader.abort();
        self.pending.lock().await.close();
        Ok(())
    }

    // --- Internal methods ---

    fn next_request_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn request<P, R>(&self, method: &str, params: Option<P>) -> Result<R>
    where
        P: Serialize,
        R: serde::de::DeserializeOwned,
    {
        let id = self.next_request_id();
        let mut request = JsonRpcRequest::new(id.clone(), method);
        if let Some(p) = params {
            request = request.with_params(p);
        }

        // Register before posting: the reply may beat the POST response.
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.register(id.clone(), tx)?;

        debug!(method, id = ?id, "sending MCP request");
        if let Err(e) = post(&self.http, &self.endpoint, &request).await {
            self.pending.lock().await.waiters.remove(&id);
            return Err(e);
        }

        let reply = match self.timeout {
            Some(limit) => match timeout(limit, rx).await {
                Ok(reply) => reply,
                Err(_) => {
                    self.pending.lock().await.waiters.remove(&id);
                    return Err(Error::Timeout);
                }
            },
            None => rx.await,
        };
        let response = reply.map_err(|_| Error::Disconnected)?;

        let result_value = response.into_result()?;
        let result: R = serde_json::from_value(result_value)
            .map_err(|e| Error::InvalidResponse(format!("{method}: {e}")))?;

        Ok(result)
    }

    async fn notify(&self, method: &str) -> Result<()> {
        post(&self.http, &self.endpoint, &JsonRpcNotification::new(method)).await
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Resolve `<base>/sse`, accepting a base that already names the stream.
fn sse_url(base: &str) -> Result<Url> {
    let trimmed = base.trim_end_matches('/');
    let url = if trimmed.ends_with(&format!("/{SSE_PATH}")) {
        Url::parse(trimmed)?
    } else {
        Url::parse(&format!("{trimmed}/{SSE_PATH}"))?
    };
    Ok(url)
}

async fn wait_for_endpoint<S, B, E>(events: &mut EventStream<S>, sse_url: &Url) -> Result<Url>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    loop {
        let event = events
            .next_event()
            .await
            .map_err(|e| Error::Connection(e.to_string()))?
            .ok_or_else(|| {
                Error::Connection("stream closed before endpoint was announced".to_string())
            })?;

        if event.event == "endpoint" {
            return sse_url
                .join(event.data.trim())
                .map_err(|e| Error::Connection(format!("bad endpoint {:?}: {e}", event.data)));
        }
        debug!(event = %event.event, "ignoring event before endpoint");
    }
}

async fn post(http: &reqwest::Client, endpoint: &Url, message: &impl Serialize) -> Result<()> {
    let response = http
        .post(endpoint.clone())
        .json(message)
        .send()
        .await
        .map_err(|e| Error::Transport(e.to_string()))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Transport(format!("{status}: {body}")));
    }
    Ok(())
}

async fn read_events<S, B, E>(
    mut events: EventStream<S>,
    http: reqwest::Client,
    endpoint: Url,
    pending: Pending,
) where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    loop {
        match events.next_event().await {
            Ok(Some(event)) => handle_event(event, &http, &endpoint, &pending).await,
            Ok(None) => {
                warn!("MCP event stream closed by server");
                break;
            }
            Err(e) => {
                warn!(error = %e, "MCP event stream failed");
                break;
            }
        }
    }

    pending.lock().await.close();
}

async fn handle_event(event: SseEvent, http: &reqwest::Client, endpoint: &Url, pending: &Pending) {
    if event.event != "message" {
        debug!(event = %event.event, "ignoring non-message event");
        return;
    }

    let message: RawMessage = match serde_json::from_str(&event.data) {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, "discarding malformed MCP message");
            return;
        }
    };

    match message.classify() {
        Some(Incoming::Response(response)) => {
            let waiter = pending.lock().await.waiters.remove(&response.id);
            match waiter {
                Some(tx) => {
                    let _ = tx.send(response);
                }
                None => debug!(id = ?response.id, "response for unknown request"),
            }
        }
        Some(Incoming::Request { id, method }) => {
            let reply = if method == "ping" {
                JsonRpcResponse::success(id, Value::Object(Default::default()))
            } else {
                JsonRpcResponse::failure(
                    id,
                    JsonRpcError {
                        code: METHOD_NOT_FOUND,
                        message: format!("method not supported: {method}"),
                        data: None,
                    },
                )
            };
            if let Err(e) = post(http, endpoint, &reply).await {
                warn!(error = %e, "failed to answer server request");
            }
        }
        Some(Incoming::Notification { method }) => {
            debug!(method = %method, "server notification");
        }
        None => debug!("ignoring message without id or method"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_url_appends_stream_path() {
        assert_eq!(
            sse_url("http://localhost:8000").unwrap().as_str(),
            "http://localhost:8000/sse"
        );
        assert_eq!(
            sse_url("http://localhost:8000/").unwrap().as_str(),
            "http://localhost:8000/sse"
        );
        assert_eq!(
            sse_url("http://localhost:8000/sse").unwrap().as_str(),
            "http://localhost:8000/sse"
        );
    }

    #[test]
    fn sse_url_rejects_garbage() {
        assert!(matches!(sse_url("not a url"), Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn endpoint_resolves_relative_to_stream() {
        let base = sse_url("http://localhost:8000").unwrap();
        let endpoint = base.join("/messages/?session_id=abc").unwrap();
        assert_eq!(
            endpoint.as_str(),
            "http://localhost:8000/messages/?session_id=abc"
        );
    }

    #[test]
    fn config_timeout_is_opt_in() {
        let config = ClientConfig::new("http://localhost:8000");
        assert!(config.timeout.is_none());
        let config = config.with_timeout(Duration::from_secs(5));
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn closed_registry_refuses_new_requests() {
        let mut pending = PendingRequests::default();
        let (tx, rx) = oneshot::channel();
        pending.register(RequestId::Number(1), tx).unwrap();

        pending.close();
        assert!(rx.await.is_err());

        let (tx, _rx) = oneshot::channel();
        let err = pending.register(RequestId::Number(2), tx).unwrap_err();
        assert!(matches!(err, Error::Disconnected));
        assert!(pending.waiters.is_empty());
    }

    #[tokio::test]
    async fn connect_to_closed_port_fails() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = Client::connect(ClientConfig::new(format!("http://127.0.0.1:{port}"))).await;
        assert!(matches!(result, Err(Error::Connection(_))));
    }
}

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::StreamExt as _;
use reqwest::Url;
use reqwest::header::CONTENT_TYPE;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use xiyan_core::MCP_PROTOCOL_VERSION;

use crate::ClientError;
use crate::dispatcher::Dispatcher;
use crate::sse::{SseEvent, SseParser};

const ENDPOINT_EVENT: &str = "endpoint";

/// How long an open stream may stay silent about its message endpoint
/// before the configured URL is used.
pub const ENDPOINT_GRACE: Duration = Duration::from_secs(2);

/// MCP client: requests go out by POST, responses come back on one SSE stream.
pub struct McpClient {
    http: reqwest::Client,
    stream_url: String,
    dispatcher: Arc<Dispatcher>,
    connected: Arc<AtomicBool>,
    listener: Mutex<Option<JoinHandle<()>>>,
    request_timeout: Option<Duration>,
}

impl std::fmt::Debug for McpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClient")
            .field("stream_url", &self.stream_url)
            .field("message_url", &self.dispatcher.message_url())
            .field("connected", &self.is_connected())
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl McpClient {
    /// Client for a server at `host:port`, streaming from `/sse` and posting
    /// to `/message` until the server announces another endpoint.
    #[must_use]
    pub fn new(host: &str, port: u16) -> Self {
        let base = format!("http://{host}:{port}");
        Self::with_urls(format!("{base}/sse"), format!("{base}/message"))
    }

    #[must_use]
    pub fn with_urls(stream_url: String, message_url: String) -> Self {
        let http = reqwest::Client::new();
        Self {
            dispatcher: Arc::new(Dispatcher::new(http.clone(), message_url)),
            http,
            stream_url,
            connected: Arc::new(AtomicBool::new(false)),
            listener: Mutex::new(None),
            request_timeout: None,
        }
    }

    /// Bounds every request made through [`Self::request`] and the MCP
    /// helpers built on it.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn stream_url(&self) -> &str {
        &self.stream_url
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Starts the background listener. Calling it again while the listener
    /// is alive does nothing; there is no automatic reconnect. A new stream
    /// starts from the configured message URL, since session endpoints do
    /// not outlive their stream.
    pub fn connect(&self) {
        let mut listener = self.listener.lock().unwrap_or_else(PoisonError::into_inner);
        if listener.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        self.dispatcher.reset_message_url();
        *listener = Some(tokio::spawn(listen(
            self.http.clone(),
            self.stream_url.clone(),
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.connected),
        )));
    }

    /// Waits until the stream is open or `timeout` elapses.
    pub async fn wait_connected(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while !self.is_connected() {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        true
    }

    /// Waits until requests can be routed: the server has announced its
    /// message endpoint, or the stream has been open for [`ENDPOINT_GRACE`]
    /// without one. Returns false if neither happens within `timeout`.
    pub async fn wait_ready(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut open_since = None;
        loop {
            if self.dispatcher.endpoint_announced() {
                return true;
            }
            let now = tokio::time::Instant::now();
            if self.is_connected() {
                let since = *open_since.get_or_insert(now);
                if now >= since + ENDPOINT_GRACE {
                    tracing::info!(
                        url = %self.dispatcher.message_url(),
                        "No endpoint announced, using configured message URL"
                    );
                    return true;
                }
            }
            if now >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// Stops the listener.
    pub fn close(&self) {
        if let Some(handle) = self.listener.lock().unwrap_or_else(PoisonError::into_inner).take() {
            handle.abort();
        }
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Sends a request and waits for its response, bounded by the request
    /// timeout when one is configured.
    ///
    /// # Errors
    /// Returns an error if the request cannot be sent, times out, or the
    /// client shuts down before the response arrives.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        if let Some(timeout) = self.request_timeout {
            return self.request_with_timeout(method, params, timeout).await;
        }
        let (id, rx) = self.dispatcher.send(method, params).await?;
        rx.await.map_err(|_| ClientError::Dropped { id })
    }

    /// Like [`Self::request`], giving up after `timeout` and forgetting the
    /// pending request.
    ///
    /// # Errors
    /// Returns [`ClientError::Timeout`] when no response arrives in time.
    pub async fn request_with_timeout(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, ClientError> {
        let (id, rx) = self.dispatcher.send(method, params).await?;
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(message)) => Ok(message),
            Ok(Err(_)) => Err(ClientError::Dropped { id }),
            Err(_) => {
                self.dispatcher.pending().remove(&id);
                tracing::warn!(%id, method, "Request timed out");
                Err(ClientError::Timeout { id, after: timeout })
            },
        }
    }

    /// MCP handshake followed by the `notifications/initialized` notification.
    ///
    /// # Errors
    /// Returns an error if either message cannot be delivered.
    pub async fn initialize(&self) -> Result<Value, ClientError> {
        let response = self
            .request(
                "initialize",
                json!({
                    "protocolVersion": MCP_PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": { "name": "xiyan-client", "version": env!("CARGO_PKG_VERSION") }
                }),
            )
            .await?;
        self.dispatcher.notify("notifications/initialized", json!({})).await?;
        Ok(result(response).unwrap_or(Value::Null))
    }

    /// # Errors
    /// Returns an error if the request cannot be sent.
    pub async fn list_tools(&self) -> Result<Vec<Value>, ClientError> {
        let response = self.request("tools/list", json!({})).await?;
        Ok(result_list(response, "tools"))
    }

    /// # Errors
    /// Returns an error if the request cannot be sent.
    pub async fn list_resources(&self) -> Result<Vec<Value>, ClientError> {
        let response = self.request("resources/list", json!({})).await?;
        Ok(result_list(response, "resources"))
    }

    /// Text of the first content block, or an empty string.
    ///
    /// # Errors
    /// Returns an error if the request cannot be sent.
    pub async fn read_resource(&self, uri: &str) -> Result<String, ClientError> {
        let response = self.request("resources/read", json!({ "uri": uri })).await?;
        Ok(result(response)
            .and_then(|r| r.pointer("/contents/0/text").and_then(Value::as_str).map(str::to_owned))
            .unwrap_or_default())
    }

    /// The tool's `result`, or `None` when the server answered with an error.
    ///
    /// # Errors
    /// Returns an error if the request cannot be sent.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
    ) -> Result<Option<Value>, ClientError> {
        let response =
            self.request("tools/call", json!({ "name": name, "arguments": arguments })).await?;
        if let Some(error) = response.get("error") {
            tracing::warn!(tool = name, %error, "Tool call failed");
        }
        Ok(result(response))
    }

    /// `GET /health` on the server hosting the stream.
    ///
    /// # Errors
    /// Returns an error if the URL is malformed, the request fails or the
    /// server answers with a non-success status.
    pub async fn health(&self) -> Result<Value, ClientError> {
        let url = resolve(&self.stream_url, "/health")?;
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status { code: status.as_u16(), body });
        }
        Ok(response.json().await?)
    }
}

impl Drop for McpClient {
    fn drop(&mut self) {
        self.close();
    }
}

fn result(mut response: Value) -> Option<Value> {
    response.get_mut("result").map(Value::take)
}

fn result_list(response: Value, key: &str) -> Vec<Value> {
    match result(response) {
        Some(Value::Object(mut map)) => match map.remove(key) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

fn resolve(base: &str, path: &str) -> Result<String, ClientError> {
    let invalid = |reason: String| ClientError::InvalidUrl { url: base.to_owned(), reason };
    let base = Url::parse(base).map_err(|e| invalid(e.to_string()))?;
    base.join(path).map(String::from).map_err(|e| invalid(e.to_string()))
}

/// Reads the event stream until it ends, resolving pending requests.
pub(crate) async fn listen(
    http: reqwest::Client,
    stream_url: String,
    dispatcher: Arc<Dispatcher>,
    connected: Arc<AtomicBool>,
) {
    tracing::info!(url = %stream_url, "Connecting to SSE stream");
    let response = match http.get(&stream_url).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "SSE connection failed");
            connected.store(false, Ordering::SeqCst);
            return;
        },
    };

    connected.store(true, Ordering::SeqCst);
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_owned();
    tracing::info!(status = %response.status(), %content_type, "SSE stream open");
    if !content_type.contains("text/event-stream") {
        tracing::warn!(%content_type, "Response is not an event stream");
    }

    let mut parser = SseParser::new();
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(bytes) => {
                for event in parser.feed_bytes(&bytes) {
                    handle_event(&dispatcher, &stream_url, event);
                }
            },
            Err(e) => {
                tracing::error!(error = %e, "SSE stream error");
                break;
            },
        }
    }

    connected.store(false, Ordering::SeqCst);
    tracing::info!("SSE listener finished");
}

fn handle_event(dispatcher: &Dispatcher, stream_url: &str, event: SseEvent) {
    if event.event == ENDPOINT_EVENT {
        match resolve(stream_url, &event.data) {
            Ok(url) => dispatcher.set_message_url(url),
            Err(e) => tracing::warn!(error = %e, "Ignoring bad endpoint event"),
        }
        return;
    }

    match serde_json::from_str::<Value>(&event.data) {
        Ok(message) => {
            dispatcher.pending().resolve(message);
        },
        Err(e) => tracing::warn!(error = %e, data = %event.data, "Invalid JSON on SSE stream"),
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn message(data: &str) -> SseEvent {
        SseEvent { event: "message".to_owned(), data: data.to_owned() }
    }

    #[test]
    fn test_endpoint_event_updates_message_url() {
        let dispatcher = Dispatcher::new(reqwest::Client::new(), "http://h:8012/message".into());
        handle_event(
            &dispatcher,
            "http://h:8012/sse",
            SseEvent { event: "endpoint".to_owned(), data: "/messages/?session_id=ab".to_owned() },
        );
        assert_eq!(dispatcher.message_url(), "http://h:8012/messages/?session_id=ab");
    }

    #[tokio::test]
    async fn test_message_event_resolves_pending() {
        let dispatcher = Dispatcher::new(reqwest::Client::new(), "http://h/message".into());
        let rx = dispatcher.pending().register("req_1");
        handle_event(&dispatcher, "http://h/sse", message(r#"{"id":"req_1","result":{"ok":1}}"#));
        assert_eq!(rx.await.unwrap()["result"]["ok"], 1);
    }

    #[test]
    fn test_malformed_json_leaves_table_unchanged() {
        let dispatcher = Dispatcher::new(reqwest::Client::new(), "http://h/message".into());
        let _rx = dispatcher.pending().register("req_1");
        handle_event(&dispatcher, "http://h/sse", message("{not json"));
        assert!(dispatcher.pending().contains("req_1"));
        assert_eq!(dispatcher.pending().len(), 1);
    }

    #[test]
    fn test_result_list_defaults() {
        assert_eq!(result_list(json!({"result": {"tools": [1, 2]}}), "tools").len(), 2);
        assert!(result_list(json!({"error": {"code": -1}}), "tools").is_empty());
        assert!(result_list(json!({"result": {}}), "tools").is_empty());
    }

    #[tokio::test]
    async fn test_listener_reads_stream_to_end() {
        let server = MockServer::start().await;
        let body = "event: endpoint\r\ndata: /messages/?session_id=s1\r\n\r\n\
                    id: 7\r\ndata: {\"jsonrpc\":\"2.0\",\"id\":\"req_1\",\"result\":{\"tools\":[]}}\r\n\r\n";
        Mock::given(method("GET"))
            .and(path("/sse"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(body.as_bytes(), "text/event-stream"),
            )
            .mount(&server)
            .await;

        let stream_url = format!("{}/sse", server.uri());
        let dispatcher =
            Arc::new(Dispatcher::new(reqwest::Client::new(), format!("{}/message", server.uri())));
        let rx = dispatcher.pending().register("req_1");
        let connected = Arc::new(AtomicBool::new(false));

        listen(reqwest::Client::new(), stream_url, Arc::clone(&dispatcher), Arc::clone(&connected))
            .await;

        assert_eq!(rx.await.unwrap()["result"]["tools"], json!([]));
        assert_eq!(
            dispatcher.message_url(),
            format!("{}/messages/?session_id=s1", server.uri())
        );
        assert!(!connected.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_unreachable_stream_stays_disconnected() {
        let client = McpClient::with_urls(
            "http://127.0.0.1:1/sse".to_owned(),
            "http://127.0.0.1:1/message".to_owned(),
        );
        client.connect();
        assert!(!client.wait_connected(Duration::from_millis(200)).await);
    }

    #[tokio::test]
    async fn test_request_timeout_removes_slot() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/message"))
            .respond_with(ResponseTemplate::new(202))
            .mount(&server)
            .await;

        let client = McpClient::new("127.0.0.1", server.address().port());
        let err = client
            .request_with_timeout("tools/list", json!({}), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Timeout { ref id, .. } if id == "req_1"));
        assert!(client.dispatcher().pending().is_empty());
    }

    #[tokio::test]
    async fn test_configured_timeout_bounds_helpers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/message"))
            .respond_with(ResponseTemplate::new(202))
            .mount(&server)
            .await;

        let client = McpClient::new("127.0.0.1", server.address().port())
            .with_request_timeout(Duration::from_millis(50));
        let err = client.list_tools().await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout { .. }));
        let err = client.call_tool("get_data", json!({"query": "q"})).await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout { ref id, .. } if id == "req_2"));
        assert!(client.dispatcher().pending().is_empty());
    }

    #[tokio::test]
    async fn test_wait_ready_waits_for_endpoint() {
        let server = MockServer::start().await;
        let body = "event: endpoint\ndata: /messages/?session_id=s9\n\n";
        Mock::given(method("GET"))
            .and(path("/sse"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(body.as_bytes(), "text/event-stream"),
            )
            .mount(&server)
            .await;

        let client = McpClient::new("127.0.0.1", server.address().port());
        client.connect();
        assert!(client.wait_ready(Duration::from_secs(5)).await);
        assert_eq!(
            client.dispatcher().message_url(),
            format!("http://127.0.0.1:{}/messages/?session_id=s9", server.address().port())
        );
    }

    #[tokio::test]
    async fn test_wait_ready_fails_without_stream() {
        let client = McpClient::with_urls(
            "http://127.0.0.1:1/sse".to_owned(),
            "http://127.0.0.1:1/message".to_owned(),
        );
        client.connect();
        assert!(!client.wait_ready(Duration::from_millis(200)).await);
    }

    #[tokio::test]
    async fn test_connect_forgets_previous_session_endpoint() {
        let client = McpClient::with_urls(
            "http://127.0.0.1:1/sse".to_owned(),
            "http://127.0.0.1:1/message".to_owned(),
        );
        client.dispatcher().set_message_url("http://127.0.0.1:1/messages/?session_id=old".into());
        client.connect();
        assert_eq!(client.dispatcher().message_url(), "http://127.0.0.1:1/message");
        assert!(!client.dispatcher().endpoint_announced());
    }

    #[tokio::test]
    async fn test_health_reads_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"status": "running"})),
            )
            .mount(&server)
            .await;

        let client = McpClient::new("127.0.0.1", server.address().port());
        assert_eq!(client.health().await.unwrap()["status"], "running");
    }
}

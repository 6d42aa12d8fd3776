//! Outgoing JSON-RPC requests and the table of responses still awaited.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

use serde_json::Value;
use tokio::sync::oneshot;
use xiyan_core::JsonRpcRequest;

use crate::ClientError;

/// Requests sent but not yet answered, keyed by identifier.
#[derive(Debug, Default)]
pub struct PendingRequests {
    slots: Mutex<HashMap<String, oneshot::Sender<Value>>>,
}

impl PendingRequests {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, oneshot::Sender<Value>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, id: &str) -> oneshot::Receiver<Value> {
        let (tx, rx) = oneshot::channel();
        if self.lock().insert(id.to_owned(), tx).is_some() {
            tracing::warn!(id, "Pending request replaced");
        }
        rx
    }

    pub fn remove(&self, id: &str) -> bool {
        self.lock().remove(id).is_some()
    }

    /// Hands `message` to the request named by its `id`. Returns false when
    /// no such request is waiting, in which case the message is discarded.
    pub fn resolve(&self, message: Value) -> bool {
        let id = match message.get("id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                tracing::debug!("Message without id discarded");
                return false;
            },
        };
        let Some(tx) = self.lock().remove(&id) else {
            tracing::debug!(%id, "No pending request for id");
            return false;
        };
        if tx.send(message).is_err() {
            tracing::debug!(%id, "Requester went away before the response");
        }
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// POSTs requests to the server's message endpoint.
#[derive(Debug)]
pub struct Dispatcher {
    http: reqwest::Client,
    configured_url: String,
    message_url: RwLock<String>,
    endpoint_announced: AtomicBool,
    next_id: AtomicU64,
    pending: PendingRequests,
}

impl Dispatcher {
    #[must_use]
    pub fn new(http: reqwest::Client, message_url: String) -> Self {
        Self {
            http,
            message_url: RwLock::new(message_url.clone()),
            configured_url: message_url,
            endpoint_announced: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            pending: PendingRequests::default(),
        }
    }

    #[must_use]
    pub const fn pending(&self) -> &PendingRequests {
        &self.pending
    }

    #[must_use]
    pub fn message_url(&self) -> String {
        self.message_url.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set_message_url(&self, url: String) {
        tracing::info!(%url, "Message endpoint updated");
        *self.message_url.write().unwrap_or_else(PoisonError::into_inner) = url;
        self.endpoint_announced.store(true, Ordering::SeqCst);
    }

    /// Whether the current stream has announced its own message endpoint.
    #[must_use]
    pub fn endpoint_announced(&self) -> bool {
        self.endpoint_announced.load(Ordering::SeqCst)
    }

    /// Drops any endpoint learned from a previous stream.
    pub fn reset_message_url(&self) {
        let mut url = self.message_url.write().unwrap_or_else(PoisonError::into_inner);
        self.configured_url.clone_into(&mut url);
        drop(url);
        self.endpoint_announced.store(false, Ordering::SeqCst);
    }

    /// `req_1`, `req_2`, ...
    pub fn next_request_id(&self) -> String {
        format!("req_{}", self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Sends a request and returns its identifier together with a receiver
    /// that resolves once the matching response arrives on the event stream.
    ///
    /// # Errors
    /// Returns an error if the POST fails or is rejected; the pending slot is
    /// removed in that case.
    pub async fn send(
        &self,
        method: &str,
        params: Value,
    ) -> Result<(String, oneshot::Receiver<Value>), ClientError> {
        let id = self.next_request_id();
        let rx = self.pending.register(&id);
        let request = JsonRpcRequest::new(id.as_str(), method, params);

        if let Err(e) = self.post(&request).await {
            tracing::error!(%id, method, error = %e, "Failed to send request");
            self.pending.remove(&id);
            return Err(e);
        }
        tracing::debug!(%id, method, "Request sent");
        Ok((id, rx))
    }

    /// Sends a notification; no response is expected.
    ///
    /// # Errors
    /// Returns an error if the POST fails or is rejected.
    pub async fn notify(&self, method: &str, params: Value) -> Result<(), ClientError> {
        self.post(&JsonRpcRequest::notification(method, params)).await
    }

    async fn post(&self, request: &JsonRpcRequest) -> Result<(), ClientError> {
        let response = self.http.post(self.message_url()).json(request).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Status { code: status.as_u16(), body })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn dispatcher(url: String) -> Dispatcher {
        Dispatcher::new(reqwest::Client::new(), url)
    }

    #[test]
    fn test_ids_strictly_increase() {
        let d = dispatcher("http://localhost/message".to_owned());
        let ids: Vec<String> = (0..5).map(|_| d.next_request_id()).collect();
        assert_eq!(ids, vec!["req_1", "req_2", "req_3", "req_4", "req_5"]);
    }

    #[test]
    fn test_reset_restores_configured_url() {
        let d = dispatcher("http://localhost/message".to_owned());
        assert!(!d.endpoint_announced());
        d.set_message_url("http://localhost/messages/?session_id=abc".to_owned());
        assert!(d.endpoint_announced());

        d.reset_message_url();
        assert_eq!(d.message_url(), "http://localhost/message");
        assert!(!d.endpoint_announced());
    }

    #[tokio::test]
    async fn test_resolve_matches_by_id() {
        let pending = PendingRequests::default();
        let rx1 = pending.register("req_1");
        let rx2 = pending.register("req_2");

        assert!(pending.resolve(json!({"id": "req_2", "result": {"n": 2}})));
        assert!(pending.resolve(json!({"id": "req_1", "result": {"n": 1}})));
        assert_eq!(rx1.await.unwrap()["result"]["n"], 1);
        assert_eq!(rx2.await.unwrap()["result"]["n"], 2);
        assert!(pending.is_empty());
    }

    #[test]
    fn test_unmatched_and_idless_messages_discarded() {
        let pending = PendingRequests::default();
        let _rx = pending.register("req_1");
        assert!(!pending.resolve(json!({"id": "req_9", "result": {}})));
        assert!(!pending.resolve(json!({"method": "notifications/progress"})));
        assert!(pending.contains("req_1"));
    }

    #[test]
    fn test_second_response_for_same_id_ignored() {
        let pending = PendingRequests::default();
        let _rx = pending.register("req_1");
        assert!(pending.resolve(json!({"id": "req_1", "result": 1})));
        assert!(!pending.resolve(json!({"id": "req_1", "result": 2})));
    }

    #[tokio::test]
    async fn test_send_posts_envelope_and_keeps_slot() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/message"))
            .and(body_partial_json(json!({
                "jsonrpc": "2.0",
                "id": "req_1",
                "method": "tools/list",
                "params": {}
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let d = dispatcher(format!("{}/message", server.uri()));
        let (id, _rx) = d.send("tools/list", json!({})).await.unwrap();
        assert_eq!(id, "req_1");
        assert!(d.pending().contains("req_1"));
    }

    #[tokio::test]
    async fn test_rejected_post_removes_slot() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/message"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let d = dispatcher(format!("{}/message", server.uri()));
        let err = d.send("tools/list", json!({})).await.unwrap_err();
        assert!(matches!(err, ClientError::Status { code: 500, .. }));
        assert!(d.pending().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_server_removes_slot() {
        let d = dispatcher("http://127.0.0.1:1/message".to_owned());
        let err = d.send("ping", json!({})).await.unwrap_err();
        assert!(matches!(err, ClientError::Http(_)));
        assert!(d.pending().is_empty());
        assert_eq!(d.next_request_id(), "req_2");
    }
}

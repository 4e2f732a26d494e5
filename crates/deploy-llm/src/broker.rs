use crate::client::LlmClient;
use crate::types::{ChatMessage, LlmTurn, ToolSchema};
use deploy_core::defaults::{LLM_RETRY_ATTEMPTS, LLM_RETRY_BASE};
use deploy_core::{DeployError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::sleep;

/// Called when the broker wants to surface a progress note to the user
/// ("retrying...", "switching to backup model...") without depending on the
/// Progress Bus or Gateway directly (spec.md §4.3).
pub type Notifier = Arc<dyn Fn(String) + Send + Sync>;

fn silent_notifier() -> Notifier {
    Arc::new(|_msg: String| {})
}

/// Fronts two LLM endpoints behind one interface and performs transparent
/// failover (spec.md §4.3). One instance per session, owning its own chat
/// history and failover state — see SPEC_FULL.md §9 design note
/// ("Global LLM state → per-session Broker").
pub struct ModelBroker {
    primary: Arc<dyn LlmClient>,
    backup: Option<Arc<dyn LlmClient>>,
    failed_over: AtomicBool,
    history: Mutex<Vec<ChatMessage>>,
    tools: Vec<ToolSchema>,
    notify: Notifier,
}

impl ModelBroker {
    pub fn new(primary: Arc<dyn LlmClient>, backup: Option<Arc<dyn LlmClient>>, tools: Vec<ToolSchema>) -> Self {
        Self {
            primary,
            backup,
            failed_over: AtomicBool::new(false),
            history: Mutex::new(Vec::new()),
            tools,
            notify: silent_notifier(),
        }
    }

    pub fn with_notifier(mut self, notify: Notifier) -> Self {
        self.notify = notify;
        self
    }

    fn active_client(&self) -> Arc<dyn LlmClient> {
        if self.failed_over.load(Ordering::SeqCst) {
            self.backup.clone().unwrap_or_else(|| self.primary.clone())
        } else {
            self.primary.clone()
        }
    }

    /// Discard chat history (spec.md §4.3 `reset()`).
    pub async fn reset(&self) {
        self.history.lock().await.clear();
    }

    pub async fn send(&self, message: ChatMessage) -> Result<LlmTurn> {
        self.history.lock().await.push(message.clone());
        self.send_turn(message).await
    }

    /// Send the result of a function call back to the model and read the
    /// next text/function turn (spec.md §4.2, §4.3).
    pub async fn send_tool_response(&self, name: &str, payload: serde_json::Value) -> Result<LlmTurn> {
        let tool_message = ChatMessage::tool(name, &payload);
        self.history.lock().await.push(tool_message.clone());
        self.send_turn(tool_message).await
    }

    async fn send_turn(&self, last_message: ChatMessage) -> Result<LlmTurn> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let client = self.active_client();
            let history_snapshot = self.history.lock().await.clone();
            match client.send(&history_snapshot, &self.tools).await {
                Ok(turn) => return Ok(turn),
                Err(err) => {
                    let text = err.0;
                    if DeployError::is_quota_text(&text) {
                        if let Some(result) = self.try_failover(&last_message).await {
                            return result;
                        }
                        return Err(DeployError::ModelQuota(text));
                    }
                    if DeployError::is_transient_text(&text) && attempt < LLM_RETRY_ATTEMPTS {
                        (self.notify)(format!("retrying model request (attempt {attempt})"));
                        let backoff = LLM_RETRY_BASE * 2u32.pow(attempt - 1);
                        sleep(backoff).await;
                        continue;
                    }
                    if DeployError::is_transient_text(&text) {
                        return Err(DeployError::ModelTransient(text));
                    }
                    return Err(DeployError::ModelAuth(text));
                }
            }
        }
    }

    /// On quota exhaustion, switch permanently to the backup endpoint and
    /// re-issue the message on a fresh chat history — the prior history is
    /// discarded (spec.md §4.3). Returns `None` if no backup is configured
    /// or the backup has already been activated — the caller then fails
    /// terminally.
    async fn try_failover(&self, last_message: &ChatMessage) -> Option<Result<LlmTurn>> {
        if self.failed_over.swap(true, Ordering::SeqCst) {
            // Already failed over once; don't retry failover, and don't
            // send to the primary again (spec.md §8.6 failover idempotence).
            return None;
        }
        let backup = self.backup.clone()?;

        (self.notify)("model quota exhausted, switching to backup model".to_string());

        let mut history = self.history.lock().await;
        *history = vec![last_message.clone()];
        let snapshot = history.clone();
        drop(history);

        Some(
            backup
                .send(&snapshot, &self.tools)
                .await
                .map_err(|e| DeployError::ModelQuota(e.0)),
        )
    }

    pub fn is_failed_over(&self) -> bool {
        self.failed_over.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::LlmCallError;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct ScriptedClient {
        responses: Mutex<Vec<Result<LlmTurn, LlmCallError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedClient {
        fn new(responses: Vec<Result<LlmTurn, LlmCallError>>) -> Self {
            Self { responses: Mutex::new(responses), calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        async fn send(&self, _history: &[ChatMessage], _tools: &[ToolSchema]) -> Result<LlmTurn, LlmCallError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().await;
            if responses.is_empty() {
                return Err(LlmCallError("exhausted script".to_string()));
            }
            responses.remove(0)
        }
    }

    #[tokio::test]
    async fn retries_transient_errors_then_succeeds() {
        let primary = Arc::new(ScriptedClient::new(vec![
            Err(LlmCallError("connection refused".to_string())),
            Ok(LlmTurn::Text("hello".to_string())),
        ]));
        let broker = ModelBroker::new(primary, None, vec![]);
        let result = broker.send(ChatMessage::user("hi")).await.unwrap();
        assert!(matches!(result, LlmTurn::Text(t) if t == "hello"));
    }

    #[tokio::test]
    async fn fails_over_to_backup_on_quota_and_stays_there() {
        let primary = Arc::new(ScriptedClient::new(vec![
            Err(LlmCallError("429 rate limit".to_string())),
            Err(LlmCallError("429 rate limit".to_string())),
        ]));
        let backup = Arc::new(ScriptedClient::new(vec![
            Ok(LlmTurn::Text("from backup".to_string())),
            Ok(LlmTurn::Text("still backup".to_string())),
        ]));
        let broker = ModelBroker::new(primary.clone(), Some(backup.clone()), vec![]);

        let first = broker.send(ChatMessage::user("hi")).await.unwrap();
        assert!(matches!(first, LlmTurn::Text(t) if t == "from backup"));
        assert!(broker.is_failed_over());

        let second = broker.send(ChatMessage::user("again")).await.unwrap();
        assert!(matches!(second, LlmTurn::Text(t) if t == "still backup"));

        // Failover idempotence (spec.md §8.6): primary never called again.
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn terminal_quota_error_without_backup() {
        let primary = Arc::new(ScriptedClient::new(vec![Err(LlmCallError("quota exceeded".to_string()))]));
        let broker = ModelBroker::new(primary, None, vec![]);
        let result = broker.send(ChatMessage::user("hi")).await;
        assert!(matches!(result, Err(DeployError::ModelQuota(_))));
    }

    #[tokio::test]
    async fn reset_clears_history() {
        let primary = Arc::new(ScriptedClient::new(vec![
            Ok(LlmTurn::Text("a".to_string())),
            Ok(LlmTurn::Text("b".to_string())),
        ]));
        let broker = ModelBroker::new(primary, None, vec![]);
        broker.send(ChatMessage::user("hi")).await.unwrap();
        broker.reset().await;
        assert!(broker.history.lock().await.is_empty());
    }
}

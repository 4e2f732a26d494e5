//! Process-wide registries (spec.md §5): session-to-transport and
//! session-to-orchestrator, each mutated under its own per-entry lock via
//! `dashmap` rather than one global `RwLock`, generalizing
//! `agent-server::AppState`'s `Arc<RwLock<HashMap<...>>>` pattern the way
//! SPEC_FULL.md §4.1 calls for.

use crate::session_actor::ClientSession;
use actix::Addr;
use dashmap::DashMap;
use deploy_core::{AppConfig, SessionId, SessionMeta};
use deploy_llm::{ChatMessage, LlmClient, LlmTurn, ModelBroker, ToolSchema};
use deploy_orchestrator::{Orchestrator, OrchestratorConfig};
use deploy_pipeline::PipelineClients;
use deploy_progress::ProgressBus;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex as StdMutex};

/// An orchestrator plus the bookkeeping the sweeper needs (spec.md §5):
/// retained across transport loss, reclaimed only once idle past grace and
/// not mid-pipeline.
pub struct OrchestratorEntry {
    pub orchestrator: Arc<Orchestrator>,
    pub meta: StdMutex<SessionMeta>,
    pub pipeline_running: AtomicBool,
}

impl OrchestratorEntry {
    pub fn touch(&self) {
        self.meta.lock().expect("session meta mutex poisoned").touch();
    }
}

/// Outcome of a gateway-initiated send, distinguishing the three failure
/// reasons spec.md §4.1 calls out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    UnknownSession,
    NotSendable,
    AlreadyClosed,
}

/// A live transport binding. `conn_id` disambiguates reconnects: a stale
/// actor's `stopping()` callback must not evict a binding a newer connection
/// already replaced (`Addr<A>` has no stable identity to compare against).
#[derive(Clone)]
pub struct TransportEntry {
    pub addr: Addr<ClientSession>,
    pub conn_id: uuid::Uuid,
}

pub struct AppState {
    pub transports: DashMap<SessionId, TransportEntry>,
    pub orchestrators: DashMap<SessionId, Arc<OrchestratorEntry>>,
    pub git: Arc<dyn deploy_cloud::GitClient>,
    pub build: Arc<dyn deploy_cloud::BuildClient>,
    pub serverless: Arc<dyn deploy_cloud::ServerlessClient>,
    pub http_client: reqwest::Client,
    pub progress: ProgressBus,
    pub primary_llm: Arc<dyn LlmClient>,
    pub backup_llm: Option<Arc<dyn LlmClient>>,
    pub tools: Vec<ToolSchema>,
    pub orchestrator_config: OrchestratorConfig,
    pub app_config: AppConfig,
}

impl AppState {
    /// Build a fresh, per-session Model Broker and Orchestrator (spec.md
    /// §4.2, §4.3: one Broker per session, owning its own chat history and
    /// failover state).
    pub fn new_orchestrator(&self, session_id: SessionId, user_id: impl Into<String>) -> Arc<Orchestrator> {
        let broker = Arc::new(ModelBroker::new(self.primary_llm.clone(), self.backup_llm.clone(), self.tools.clone()));
        let pipeline = PipelineClients {
            git: self.git.clone(),
            build: self.build.clone(),
            serverless: self.serverless.clone(),
            broker: broker.clone(),
            http_client: self.http_client.clone(),
            progress: self.progress.clone(),
        };
        Arc::new(Orchestrator::new(session_id, user_id, broker, pipeline, self.orchestrator_config.clone()))
    }

    /// Register (or replace) the live orchestrator entry for a session,
    /// returning the existing one if this session was already known —
    /// orchestrators outlive transport churn, so a reconnect must reuse the
    /// same instance rather than discard its ProjectContext (spec.md §5).
    pub fn orchestrator_for(&self, session_id: &SessionId, user_id: &str) -> Arc<OrchestratorEntry> {
        if let Some(existing) = self.orchestrators.get(session_id) {
            existing.touch();
            return existing.clone();
        }
        let orchestrator = self.new_orchestrator(session_id.clone(), user_id);
        let entry = Arc::new(OrchestratorEntry {
            orchestrator,
            meta: StdMutex::new(SessionMeta::new(session_id.clone(), user_id)),
            pipeline_running: AtomicBool::new(false),
        });
        self.orchestrators.insert(session_id.clone(), entry.clone());
        entry
    }

    /// Close any prior live transport for this session before a new one is
    /// installed (spec.md §4.1 `accept`), then install the new binding.
    pub fn install_transport(&self, session_id: SessionId, entry: TransportEntry) {
        if let Some((_, prior)) = self.transports.remove(&session_id) {
            prior.addr.do_send(crate::session_actor::CloseGracefully);
        }
        self.transports.insert(session_id, entry);
    }

    pub fn remove_transport_if_current(&self, session_id: &SessionId, conn_id: uuid::Uuid) {
        self.transports.remove_if(session_id, |_, existing| existing.conn_id == conn_id);
    }

    /// A single send attempt (spec.md §4.1 `send`). Distinguishes the three
    /// failure reasons: unknown session; transport not in a sendable state
    /// (closing handshake underway); transport already closed, which
    /// additionally evicts the stale binding.
    pub async fn send(&self, session_id: &SessionId, frame: crate::wire::OutboundFrame) -> SendOutcome {
        let Some(entry) = self.transports.get(session_id).map(|e| e.value().clone()) else {
            return SendOutcome::UnknownSession;
        };

        match entry.addr.send(crate::session_actor::SendFrame(frame)).await {
            Ok(Ok(())) => SendOutcome::Sent,
            Ok(Err(())) => SendOutcome::NotSendable,
            Err(_mailbox_closed) => {
                self.remove_transport_if_current(session_id, entry.conn_id);
                SendOutcome::AlreadyClosed
            }
        }
    }

    /// Retries a transient ("not sendable") failure up to
    /// `SEND_RETRY_ATTEMPTS` times, spaced `SEND_RETRY_SPACING` apart
    /// (spec.md §4.1). Unknown-session and already-closed failures are not
    /// retried — there's nothing a retry would fix.
    pub async fn send_with_retry(&self, session_id: &SessionId, frame: crate::wire::OutboundFrame) -> SendOutcome {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.send(session_id, frame.clone()).await {
                SendOutcome::NotSendable if attempt < deploy_core::defaults::SEND_RETRY_ATTEMPTS => {
                    tokio::time::sleep(deploy_core::defaults::SEND_RETRY_SPACING).await;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::tests_support::bare_state;
    use super::*;

    #[test]
    fn orchestrator_for_reuses_existing_entry_across_reconnect() {
        let state = bare_state();
        let id = SessionId::from("s1");
        let first = state.orchestrator_for(&id, "user-1");
        let second = state.orchestrator_for(&id, "user-1");
        assert!(Arc::ptr_eq(&first.orchestrator, &second.orchestrator));
    }

    #[test]
    fn distinct_sessions_get_distinct_orchestrators() {
        let state = bare_state();
        let a = state.orchestrator_for(&SessionId::from("a"), "user-1");
        let b = state.orchestrator_for(&SessionId::from("b"), "user-1");
        assert!(!Arc::ptr_eq(&a.orchestrator, &b.orchestrator));
    }
}

/// Shared fixtures for this crate's unit tests (`sweeper`'s in particular,
/// which needs an `AppState` and an `Orchestrator` without pulling in an
/// actix runtime).
#[cfg(test)]
pub(crate) mod tests_support {
    use super::*;
    use async_trait::async_trait;

    struct DummyLlm;
    #[async_trait]
    impl LlmClient for DummyLlm {
        async fn send(&self, _history: &[ChatMessage], _tools: &[ToolSchema]) -> Result<LlmTurn, deploy_llm::LlmCallError> {
            Ok(LlmTurn::Text("ok".to_string()))
        }
    }

    pub(crate) fn bare_state() -> AppState {
        AppState {
            transports: DashMap::new(),
            orchestrators: DashMap::new(),
            git: Arc::new(deploy_cloud::HttpGitClient::new(deploy_cloud::build_http_client(1), "http://localhost")),
            build: Arc::new(deploy_cloud::HttpBuildClient::new(deploy_cloud::build_http_client(1), "http://localhost")),
            serverless: Arc::new(deploy_cloud::HttpServerlessClient::new(deploy_cloud::build_http_client(1), "http://localhost")),
            http_client: reqwest::Client::new(),
            progress: ProgressBus::new(),
            primary_llm: Arc::new(DummyLlm),
            backup_llm: None,
            tools: deploy_orchestrator::tool_schemas(),
            orchestrator_config: OrchestratorConfig {
                project_id: "proj".to_string(),
                region: "us-central1".to_string(),
                registry: "deploy-images".to_string(),
                git_credential: "token".to_string(),
                working_copy_root: std::env::temp_dir(),
            },
            app_config: AppConfig::from_env(),
        }
    }

    pub(crate) fn fake_orchestrator(session_id: SessionId) -> Arc<Orchestrator> {
        bare_state().new_orchestrator(session_id, "user-1")
    }
}

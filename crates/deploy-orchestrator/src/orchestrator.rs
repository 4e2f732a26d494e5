use crate::context_injection::build_prompt;
use crate::event::{EventSink, OrchestratorEvent};
use crate::functions::{self, FunctionOutcome};
use crate::response::OrchestratorResponse;
use deploy_core::{DeployError, DeploymentId, DeploymentRecord, ProjectContext, Result, SessionId};
use deploy_llm::{ChatMessage, LlmTurn, ModelBroker};
use deploy_pipeline::{DeploySpec, PipelineClients};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex as AsyncMutex;

/// Process-wide inputs an orchestrator needs beyond what lives in its
/// ProjectContext (spec.md §6 "environment inputs"): read once at startup,
/// not reloadable.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub project_id: String,
    pub region: String,
    pub registry: String,
    pub git_credential: String,
    pub working_copy_root: PathBuf,
}

/// Single-session conversational core (spec.md §4.2). Holds the
/// ProjectContext and mediates between the Model Broker and the Pipeline
/// Engine. One instance per session, owned by the Session Gateway for the
/// session's lifetime — orchestrators outlive transport churn.
pub struct Orchestrator {
    session_id: SessionId,
    user_id: String,
    config: OrchestratorConfig,
    context: AsyncMutex<ProjectContext>,
    broker: Arc<ModelBroker>,
    pipeline: PipelineClients,
    sink: StdMutex<Option<EventSink>>,
}

impl Orchestrator {
    pub fn new(
        session_id: SessionId,
        user_id: impl Into<String>,
        broker: Arc<ModelBroker>,
        pipeline: PipelineClients,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            session_id,
            user_id: user_id.into(),
            config,
            context: AsyncMutex::new(ProjectContext::new()),
            broker,
            pipeline,
            sink: StdMutex::new(None),
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Store the Gateway's send path (spec.md §4.2 "progress channel").
    /// Must be called before the first `process` call — it's a plain
    /// synchronous store, so it precedes any suspension point and every
    /// later await (including ones inside a spawned pipeline task) can
    /// observe it.
    pub fn attach_sink(&self, sink: EventSink) {
        *self.sink.lock().expect("sink mutex poisoned") = Some(sink);
    }

    fn emit(&self, event: OrchestratorEvent) {
        if let Some(sink) = self.sink.lock().expect("sink mutex poisoned").as_ref() {
            sink(event);
        }
    }

    /// A read-only snapshot of the current project context — used by the
    /// Gateway to reflect session state between turns.
    pub async fn snapshot_context(&self) -> ProjectContext {
        self.context.lock().await.clone()
    }

    /// Apply a bulk environment-variable upload (spec.md §6
    /// `env_vars_uploaded`). Values pass through unmodified; only the key
    /// shape is validated.
    pub async fn apply_env_vars(&self, vars: Vec<deploy_core::EnvVar>) {
        let mut context = self.context.lock().await;
        for var in vars {
            if deploy_core::EnvVar::validate_key(&var.key) {
                context.set_env_var(var);
            }
        }
    }

    /// The single inbound operation the Gateway calls (spec.md §4.2).
    pub async fn process(&self, user_message: &str) -> Result<OrchestratorResponse> {
        self.emit(OrchestratorEvent::Typing);

        let prompt = {
            let context = self.context.lock().await;
            build_prompt(&context, user_message)
        };

        match self.broker.send(ChatMessage::user(prompt)).await? {
            LlmTurn::Text(text) => Ok(OrchestratorResponse::text(text)),
            LlmTurn::FunctionCall { name, arguments } => self.handle_function_call(&name, arguments).await,
        }
    }

    async fn handle_function_call(&self, name: &str, arguments: Value) -> Result<OrchestratorResponse> {
        let outcome = match name {
            "clone-and-analyze" => self.handle_clone_and_analyze(&arguments).await,
            "deploy" => self.handle_deploy(&arguments).await,
            "list-repositories" => self.handle_list_repositories(&arguments).await,
            "get-logs" => self.handle_get_logs(&arguments).await,
            other => return Err(DeployError::Validation(format!("unrecognized function: {other}"))),
        };

        let final_turn = self.broker.send_tool_response(name, outcome.tool_payload.clone()).await?;
        let text = match final_turn {
            LlmTurn::Text(text) => text,
            LlmTurn::FunctionCall { name, .. } => {
                format!("(requested `{name}` next — please resend your message to continue)")
            }
        };

        Ok(OrchestratorResponse {
            text,
            request_env_vars: outcome.request_env_vars,
            detected_env_vars: outcome.detected_env_vars,
            actions: outcome.actions,
            data: outcome.data,
            deployment_url: outcome.deployment_url,
            warning: outcome.warning,
        })
    }

    /// Subscribe to this deployment's progress before any stage can
    /// publish to it, then forward every event to the Gateway's sink. The
    /// subscribe is awaited here, synchronously relative to the caller, so
    /// there's no race between "stage starts publishing" and "forwarder
    /// starts listening".
    async fn spawn_progress_forwarder(&self, deployment_id: DeploymentId) {
        let mut rx = self.pipeline.progress.subscribe(deployment_id).await;
        let sink = self.sink.lock().expect("sink mutex poisoned").clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let Some(sink) = &sink {
                    sink(OrchestratorEvent::Progress(event));
                }
            }
        });
    }

    /// Stages 1-2 (spec.md §4.4). Enforces the anti-reclone invariant at
    /// the routing boundary: if a working copy already exists, the clone
    /// function is never invoked again in this session, even though the
    /// model asked for it.
    async fn handle_clone_and_analyze(&self, arguments: &Value) -> FunctionOutcome {
        let already_analyzed = self.context.lock().await.has_working_copy();
        if already_analyzed {
            return FunctionOutcome {
                tool_payload: serde_json::json!({
                    "status": "already-analyzed",
                    "message": "a project is already loaded in this session",
                }),
                actions: vec!["reset".to_string(), "deploy".to_string()],
                ..Default::default()
            };
        }

        let repo_url = match functions::required_str(arguments, "repo_url") {
            Ok(url) => url.to_string(),
            Err(err) => return FunctionOutcome::error(err),
        };
        let branch = functions::optional_str(arguments, "branch", "main").to_string();

        let placeholder_service_name = deploy_core::naming::service_name_from_repo_url(&repo_url);
        let record = DeploymentRecord::new(placeholder_service_name, self.config.project_id.clone(), self.config.region.clone());
        let deployment_id = record.deployment_id;
        self.spawn_progress_forwarder(deployment_id).await;

        match deploy_pipeline::clone_and_analyze(&self.pipeline, record, &self.config.working_copy_root, &repo_url, &branch).await {
            Ok((_record, working_copy, analysis)) => {
                let mut context = self.context.lock().await;
                context.repository_url = Some(repo_url);
                context.working_copy_path = Some(working_copy);
                context.language = Some(analysis.language.clone());
                context.framework = analysis.framework.clone();
                context.last_deployment_id = Some(deployment_id.to_string());
                context.analysis = Some(analysis.clone());
                drop(context);

                FunctionOutcome {
                    tool_payload: serde_json::json!({
                        "status": "analyzed",
                        "language": analysis.language,
                        "framework": analysis.framework,
                        "entry_point": analysis.entry_point,
                        "env_var_names": analysis.env_var_names,
                        "warnings": analysis.warnings,
                    }),
                    request_env_vars: !analysis.env_var_names.is_empty(),
                    detected_env_vars: analysis.env_var_names.clone(),
                    actions: vec!["deploy".to_string()],
                    data: Some(serde_json::to_value(&analysis).unwrap_or_default()),
                    deployment_url: None,
                    warning: None,
                }
            }
            Err(err) => FunctionOutcome::error(err),
        }
    }

    /// Stages 3-7 (spec.md §4.4). Requires a prior successful
    /// clone-and-analyze in this session.
    async fn handle_deploy(&self, _arguments: &Value) -> FunctionOutcome {
        let (repo_url, mut service_name, env_vars, has_working_copy, missing_on_disk) = {
            let context = self.context.lock().await;
            (
                context.repository_url.clone(),
                context.service_name.clone(),
                context.env_vars.clone(),
                context.has_working_copy(),
                context.working_copy_missing_on_disk(),
            )
        };

        if missing_on_disk {
            return FunctionOutcome::error(DeployError::NotFound(
                "working copy no longer exists on disk; please re-analyze the repository".to_string(),
            ));
        }
        if !has_working_copy {
            return FunctionOutcome::error(DeployError::Validation(
                "no project analyzed yet; provide a repository URL first".to_string(),
            ));
        }

        let (working_copy, analysis) = {
            let context = self.context.lock().await;
            match (&context.working_copy_path, &context.analysis) {
                (Some(path), Some(analysis)) => (path.clone(), analysis.clone()),
                _ => {
                    return FunctionOutcome::error(DeployError::Validation(
                        "analysis snapshot missing; please re-analyze the repository".to_string(),
                    ));
                }
            }
        };

        if service_name.is_none() {
            service_name = Some(deploy_core::naming::service_name_from_repo_url(repo_url.as_deref().unwrap_or_default()));
        }
        let service_name = service_name.expect("just populated above");

        {
            let mut context = self.context.lock().await;
            context.service_name = Some(service_name.clone());
        }

        let record = DeploymentRecord::new(service_name.clone(), self.config.project_id.clone(), self.config.region.clone());
        let deployment_id = record.deployment_id;

        self.spawn_progress_forwarder(deployment_id).await;
        self.emit(OrchestratorEvent::DeploymentStarted { deployment_id });

        let spec = DeploySpec {
            service_name: service_name.clone(),
            project_id: self.config.project_id.clone(),
            region: self.config.region.clone(),
            registry: self.config.registry.clone(),
            user_id: self.user_id.clone(),
            env_vars: &env_vars,
        };

        match deploy_pipeline::deploy(&self.pipeline, record, deployment_id, &working_copy, &analysis, spec).await {
            Ok(outcome) => {
                let mut context = self.context.lock().await;
                context.deployment_url = Some(outcome.service_url.clone());
                context.last_deployment_id = Some(deployment_id.to_string());
                drop(context);

                if let Some(warning) = &outcome.health_warning {
                    self.emit(OrchestratorEvent::Warning(warning.clone()));
                }

                FunctionOutcome {
                    tool_payload: serde_json::json!({
                        "status": if outcome.health_warning.is_some() { "deployed-with-warning" } else { "deployed" },
                        "service_url": outcome.service_url,
                        "estimated_hourly_cost_usd": outcome.estimated_hourly_cost_usd,
                        "health_warning": outcome.health_warning,
                    }),
                    request_env_vars: false,
                    detected_env_vars: Vec::new(),
                    actions: Vec::new(),
                    data: Some(serde_json::json!({
                        "deployment_id": deployment_id.to_string(),
                        "estimated_hourly_cost_usd": outcome.estimated_hourly_cost_usd,
                    })),
                    deployment_url: Some(outcome.service_url),
                    warning: outcome.health_warning,
                }
            }
            Err(err) => FunctionOutcome::error(err),
        }
    }

    async fn handle_list_repositories(&self, _arguments: &Value) -> FunctionOutcome {
        match self.pipeline.git.list_repositories(&self.config.git_credential).await {
            Ok(repositories) => FunctionOutcome {
                tool_payload: serde_json::json!({ "status": "ok", "repositories": repositories }),
                data: Some(serde_json::json!({ "repositories": repositories })),
                ..Default::default()
            },
            Err(err) => FunctionOutcome::error(map_cloud_error(err)),
        }
    }

    /// Fetches logs for the currently deployed service. Reads from the
    /// serverless collaborator rather than the build collaborator's
    /// operation logs — once a service exists, its own logs are the more
    /// useful signal to surface in chat.
    async fn handle_get_logs(&self, _arguments: &Value) -> FunctionOutcome {
        let service_name = self.context.lock().await.service_name.clone();
        let Some(service_name) = service_name else {
            return FunctionOutcome::error(DeployError::Validation("no deployment yet; nothing to fetch logs for".to_string()));
        };

        match self
            .pipeline
            .serverless
            .fetch_logs(&self.config.project_id, &self.config.region, &service_name)
            .await
        {
            Ok(logs) => FunctionOutcome {
                tool_payload: serde_json::json!({ "status": "ok", "logs": logs }),
                data: Some(serde_json::json!({ "logs": logs })),
                ..Default::default()
            },
            Err(err) => FunctionOutcome::error(map_cloud_error(err)),
        }
    }
}

fn map_cloud_error(err: deploy_cloud::CloudError) -> DeployError {
    use deploy_cloud::CloudError;
    match err {
        CloudError::NotFound(msg) => DeployError::NotFound(msg),
        CloudError::Auth(msg) => DeployError::Validation(msg),
        CloudError::Http(msg) | CloudError::TimedOut(msg) => DeployError::Transport(msg),
        CloudError::Io(err) => DeployError::Transport(err.to_string()),
        CloudError::OperationFailed(msg) => DeployError::Validation(msg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use deploy_cloud::{BuildClient, CloneOutcome, GitClient, OperationStatus, ProgressFn, ServerlessClient, ServiceSpec};
    use deploy_llm::{ChatMessage as LlmChatMessage, LlmCallError, LlmClient, ToolSchema};
    use deploy_progress::ProgressBus;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex as TokioMutex;

    struct FakeGit {
        clone_calls: AtomicUsize,
    }

    #[async_trait]
    impl GitClient for FakeGit {
        async fn clone_repo(&self, _repo_url: &str, _branch: &str, dest: &Path, _on_progress: ProgressFn) -> deploy_cloud::Result<CloneOutcome> {
            self.clone_calls.fetch_add(1, Ordering::SeqCst);
            std::fs::create_dir_all(dest).unwrap();
            std::fs::write(dest.join("requirements.txt"), "flask==3.0.0\n").unwrap();
            Ok(CloneOutcome { file_count: 1, total_bytes: 16 })
        }

        async fn validate_credential(&self, _credential: &str) -> deploy_cloud::Result<bool> {
            Ok(true)
        }

        async fn list_repositories(&self, _credential: &str) -> deploy_cloud::Result<Vec<String>> {
            Ok(vec!["acme/flask-app".to_string()])
        }
    }

    struct FakeBuild;

    #[async_trait]
    impl BuildClient for FakeBuild {
        async fn verify_project_access(&self, _project_id: &str, _region: &str) -> deploy_cloud::Result<()> {
            Ok(())
        }
        async fn ensure_image_registry(&self, _project_id: &str, _region: &str, registry: &str) -> deploy_cloud::Result<String> {
            Ok(registry.to_string())
        }
        async fn ensure_source_bucket(&self, project_id: &str, region: &str) -> deploy_cloud::Result<String> {
            Ok(format!("{project_id}-{region}-bucket"))
        }
        async fn upload_blob(&self, _bucket: &str, _object_name: &str, _data: Vec<u8>) -> deploy_cloud::Result<()> {
            Ok(())
        }
        async fn submit_build(&self, _project_id: &str, _bucket: &str, _object_name: &str, _image_tag: &str) -> deploy_cloud::Result<String> {
            Ok("build-op".to_string())
        }
        async fn poll_operation(&self, _operation_id: &str) -> deploy_cloud::Result<OperationStatus> {
            Ok(OperationStatus::Done { success: true, error: None })
        }
        async fn fetch_logs(&self, _operation_id: &str) -> deploy_cloud::Result<String> {
            Ok(String::new())
        }
    }

    struct FakeServerless;

    #[async_trait]
    impl ServerlessClient for FakeServerless {
        async fn get_service(&self, _project_id: &str, _region: &str, _name: &str) -> deploy_cloud::Result<Option<String>> {
            Ok(Some("https://flask-app.example.run".to_string()))
        }
        async fn create_service(&self, _project_id: &str, _region: &str, _spec: &ServiceSpec) -> deploy_cloud::Result<String> {
            Ok("create-op".to_string())
        }
        async fn update_service(&self, _project_id: &str, _region: &str, _spec: &ServiceSpec) -> deploy_cloud::Result<String> {
            Ok("update-op".to_string())
        }
        async fn fetch_logs(&self, _project_id: &str, _region: &str, _name: &str) -> deploy_cloud::Result<String> {
            Ok("log line".to_string())
        }
        async fn poll_operation(&self, _operation_id: &str) -> deploy_cloud::Result<OperationStatus> {
            Ok(OperationStatus::Done { success: true, error: None })
        }
    }

    struct ScriptedLlm {
        responses: TokioMutex<Vec<std::result::Result<LlmTurn, LlmCallError>>>,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<std::result::Result<LlmTurn, LlmCallError>>) -> Self {
            Self { responses: TokioMutex::new(responses) }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn send(&self, _history: &[LlmChatMessage], _tools: &[ToolSchema]) -> std::result::Result<LlmTurn, LlmCallError> {
            let mut responses = self.responses.lock().await;
            if responses.is_empty() {
                return Err(LlmCallError("exhausted script".to_string()));
            }
            responses.remove(0)
        }
    }

    fn test_orchestrator(
        git: Arc<FakeGit>,
        responses: Vec<std::result::Result<LlmTurn, LlmCallError>>,
        working_copy_root: PathBuf,
    ) -> Orchestrator {
        let broker = Arc::new(ModelBroker::new(Arc::new(ScriptedLlm::new(responses)), None, vec![]));
        let pipeline = PipelineClients {
            git,
            build: Arc::new(FakeBuild),
            serverless: Arc::new(FakeServerless),
            broker: broker.clone(),
            http_client: reqwest::Client::new(),
            progress: ProgressBus::new(),
        };
        let config = OrchestratorConfig {
            project_id: "proj".to_string(),
            region: "us-central1".to_string(),
            registry: "deploy-images".to_string(),
            git_credential: "token".to_string(),
            working_copy_root,
        };
        Orchestrator::new(SessionId::from("s1"), "user-1", broker, pipeline, config)
    }

    #[tokio::test]
    async fn clone_and_analyze_populates_context_and_preserves_actions() {
        let dir = tempfile::tempdir().unwrap();
        let git = Arc::new(FakeGit { clone_calls: AtomicUsize::new(0) });
        let orchestrator = test_orchestrator(
            git.clone(),
            vec![
                Ok(LlmTurn::FunctionCall {
                    name: "clone-and-analyze".to_string(),
                    arguments: serde_json::json!({ "repo_url": "https://example.org/u/flask-app" }),
                }),
                Ok(LlmTurn::Text("Analyzed your flask app.".to_string())),
            ],
            dir.path().to_path_buf(),
        );

        let response = orchestrator.process("deploy https://example.org/u/flask-app").await.unwrap();
        assert_eq!(response.text, "Analyzed your flask app.");
        assert!(response.actions.contains(&"deploy".to_string()));
        assert_eq!(git.clone_calls.load(Ordering::SeqCst), 1);

        let context = orchestrator.snapshot_context().await;
        assert!(context.has_working_copy());
    }

    #[tokio::test]
    async fn anti_reclone_invariant_blocks_second_clone() {
        let dir = tempfile::tempdir().unwrap();
        let git = Arc::new(FakeGit { clone_calls: AtomicUsize::new(0) });
        let orchestrator = test_orchestrator(
            git.clone(),
            vec![
                Ok(LlmTurn::FunctionCall {
                    name: "clone-and-analyze".to_string(),
                    arguments: serde_json::json!({ "repo_url": "https://example.org/u/a" }),
                }),
                Ok(LlmTurn::Text("Analyzed a.".to_string())),
                Ok(LlmTurn::FunctionCall {
                    name: "clone-and-analyze".to_string(),
                    arguments: serde_json::json!({ "repo_url": "https://example.org/u/b" }),
                }),
                Ok(LlmTurn::Text("A project is already loaded; reset or deploy it.".to_string())),
            ],
            dir.path().to_path_buf(),
        );

        orchestrator.process("analyze https://example.org/u/a").await.unwrap();
        assert_eq!(git.clone_calls.load(Ordering::SeqCst), 1);

        let second = orchestrator.process("analyze https://example.org/u/b").await.unwrap();
        assert_eq!(git.clone_calls.load(Ordering::SeqCst), 1);
        assert!(second.actions.contains(&"reset".to_string()) || second.actions.contains(&"deploy".to_string()));
    }

    #[tokio::test]
    async fn list_repositories_surfaces_data_payload() {
        let dir = tempfile::tempdir().unwrap();
        let git = Arc::new(FakeGit { clone_calls: AtomicUsize::new(0) });
        let orchestrator = test_orchestrator(
            git,
            vec![
                Ok(LlmTurn::FunctionCall {
                    name: "list-repositories".to_string(),
                    arguments: serde_json::json!({}),
                }),
                Ok(LlmTurn::Text("Here are your repositories.".to_string())),
            ],
            dir.path().to_path_buf(),
        );

        let response = orchestrator.process("list my repos").await.unwrap();
        let data = response.data.expect("data payload");
        assert_eq!(data["repositories"][0], "acme/flask-app");
    }

    #[tokio::test]
    async fn unknown_function_name_yields_structured_error() {
        let dir = tempfile::tempdir().unwrap();
        let git = Arc::new(FakeGit { clone_calls: AtomicUsize::new(0) });
        let orchestrator = test_orchestrator(
            git,
            vec![Ok(LlmTurn::FunctionCall {
                name: "delete-everything".to_string(),
                arguments: serde_json::json!({}),
            })],
            dir.path().to_path_buf(),
        );

        let result = orchestrator.process("do something weird").await;
        assert!(matches!(result, Err(DeployError::Validation(_))));
    }
}

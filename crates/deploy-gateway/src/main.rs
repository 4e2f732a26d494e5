//! Session Gateway binary (spec.md §4.1, SPEC_FULL.md §4.1). An actix-web
//! `HttpServer` exposing `GET /ws` upgraded via `actix-web-actors::ws`,
//! wiring every other crate together. Bootstrap and middleware style
//! (`Cors`, `Logger`) grounded on `web_service::server::WebService`.

mod cli;
mod session_actor;
mod state;
mod sweeper;
mod wire;

use actix_cors::Cors;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use clap::Parser;
use deploy_core::defaults::ORCHESTRATOR_GRACE_PERIOD;
use deploy_core::{AppConfig, SessionId};
use deploy_llm::HttpLlmClient;
use deploy_orchestrator::{OrchestratorConfig, OrchestratorEvent};
use deploy_progress::ProgressBus;
use session_actor::ClientSession;
use state::{AppState, SendOutcome};
use std::sync::Arc;
use std::time::Duration;
use wire::{MessageData, OutboundFrame};

async fn ws_handler(req: HttpRequest, stream: web::Payload, state: web::Data<Arc<AppState>>) -> Result<HttpResponse, actix_web::Error> {
    actix_web_actors::ws::start(ClientSession::new(state.get_ref().clone()), &req, stream)
}

async fn healthz(state: web::Data<Arc<AppState>>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "active_sessions": state.orchestrators.len(),
        "live_transports": state.transports.len(),
    }))
}

/// Turn an `OrchestratorEvent` into the outbound frame(s) it corresponds to
/// and send them down this session's current transport, if any (spec.md
/// §5 backpressure: a disconnected client simply misses these — the next
/// text turn reflects terminal state).
async fn forward_orchestrator_event(state: &Arc<AppState>, session_id: &SessionId, event: OrchestratorEvent) {
    let frame = match event {
        OrchestratorEvent::Typing => OutboundFrame::typing(),
        OrchestratorEvent::DeploymentStarted { deployment_id } => OutboundFrame::deployment_started(deployment_id),
        OrchestratorEvent::Progress(stage_event) => OutboundFrame::stage_progress(stage_event),
        OrchestratorEvent::Warning(message) => OutboundFrame::warning(message),
    };

    match state.send_with_retry(session_id, frame).await {
        SendOutcome::Sent => {}
        SendOutcome::UnknownSession => tracing::debug!(session_id = %session_id, "dropped progress event: no known session"),
        SendOutcome::NotSendable | SendOutcome::AlreadyClosed => {
            tracing::debug!(session_id = %session_id, "dropped progress event: transport unavailable")
        }
    }
}

/// Drive one conversational turn (spec.md §4.2) and deliver the result as
/// a `message`/`warning`/`error` frame. Run off the actor's own task so the
/// receive loop stays responsive to heartbeats and further inbound frames
/// while the LLM/pipeline call is in flight.
async fn run_turn(state: Arc<AppState>, session_id: SessionId, user_message: String) {
    let Some(entry) = state.orchestrators.get(&session_id).map(|e| e.value().clone()) else {
        return;
    };

    entry.pipeline_running.store(true, std::sync::atomic::Ordering::SeqCst);
    let result = entry.orchestrator.process(&user_message).await;
    entry.pipeline_running.store(false, std::sync::atomic::Ordering::SeqCst);

    match result {
        Ok(response) => {
            let data = serde_json::json!({
                "request_env_vars": response.request_env_vars,
                "detected_env_vars": response.detected_env_vars,
                "actions": response.actions,
                "data": response.data,
                "deployment_url": response.deployment_url,
            });
            let frame = OutboundFrame::message(MessageData {
                content: response.text,
                intent: None,
                metadata: Some(data),
            });
            state.send_with_retry(&session_id, frame).await;

            if let Some(warning) = response.warning {
                state.send_with_retry(&session_id, OutboundFrame::warning(warning)).await;
            }
        }
        Err(err) => {
            let code = err.kind().wire_code().unwrap_or("API_ERROR");
            state.send_with_retry(&session_id, OutboundFrame::error(err.to_string(), code)).await;
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).json().init();

    let args = cli::Args::parse();
    let env_config = AppConfig::from_env();

    let bind = args.bind.unwrap_or(env_config.bind_address.clone());
    let port = args.port.unwrap_or(env_config.port);
    let project_id = args.project_id.unwrap_or(env_config.project_id.clone());
    let region = args.region.unwrap_or(env_config.default_region.clone());
    let sweep_interval_secs = args.sweep_interval_secs.unwrap_or(env_config.sweep_interval_secs);

    let http_client = deploy_cloud::build_http_client(deploy_core::defaults::BUILD_DEPLOY_RETRY_ATTEMPTS);
    let git_api_base = std::env::var("DEPLOY_GIT_API_BASE").unwrap_or_else(|_| "https://git.example.internal".to_string());
    let build_api_base = std::env::var("DEPLOY_BUILD_API_BASE").unwrap_or_else(|_| "https://build.example.internal".to_string());
    let serverless_api_base = std::env::var("DEPLOY_SERVERLESS_API_BASE").unwrap_or_else(|_| "https://serverless.example.internal".to_string());
    let llm_api_base = std::env::var("DEPLOY_LLM_API_BASE").unwrap_or_else(|_| "https://llm.example.internal".to_string());
    let backup_llm_api_base = std::env::var("DEPLOY_LLM_BACKUP_API_BASE").ok();

    let primary_llm: Arc<dyn deploy_llm::LlmClient> =
        Arc::new(HttpLlmClient::new(reqwest::Client::new(), llm_api_base, env_config.primary_llm_key.clone()));
    let backup_llm: Option<Arc<dyn deploy_llm::LlmClient>> = match (&backup_llm_api_base, &env_config.backup_llm_key) {
        (Some(base), Some(key)) => Some(Arc::new(HttpLlmClient::new(reqwest::Client::new(), base.clone(), key.clone()))),
        _ => None,
    };

    let working_copy_root = std::env::var("DEPLOY_WORKING_COPY_ROOT")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::env::temp_dir().join("deploy-orchestrator"));
    std::fs::create_dir_all(&working_copy_root)?;

    let state = Arc::new(AppState {
        transports: dashmap::DashMap::new(),
        orchestrators: dashmap::DashMap::new(),
        git: Arc::new(deploy_cloud::HttpGitClient::new(http_client.clone(), git_api_base)),
        build: Arc::new(deploy_cloud::HttpBuildClient::new(http_client.clone(), build_api_base)),
        serverless: Arc::new(deploy_cloud::HttpServerlessClient::new(http_client.clone(), serverless_api_base)),
        http_client: reqwest::Client::new(),
        progress: ProgressBus::new(),
        primary_llm,
        backup_llm,
        tools: deploy_orchestrator::tool_schemas(),
        orchestrator_config: OrchestratorConfig {
            project_id: project_id.clone(),
            region: region.clone(),
            registry: std::env::var("DEPLOY_REGISTRY").unwrap_or_else(|_| "deploy-images".to_string()),
            git_credential: std::env::var("DEPLOY_GIT_CREDENTIAL").unwrap_or_default(),
            working_copy_root,
        },
        app_config: env_config,
    });

    let grace = chrono::Duration::from_std(ORCHESTRATOR_GRACE_PERIOD).unwrap_or_else(|_| chrono::Duration::hours(1));
    let _sweeper = sweeper::Sweeper::start(state.clone(), Duration::from_secs(sweep_interval_secs), grace);

    tracing::info!(%bind, port, %project_id, %region, "starting deploy-gateway");

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .wrap(actix_web::middleware::Logger::default())
            .app_data(web::Data::new(state.clone()))
            .route("/ws", web::get().to(ws_handler))
            .route("/healthz", web::get().to(healthz))
    })
    .bind((bind, port))?
    .run()
    .await?;

    Ok(())
}

use std::env;

/// Process-wide configuration read once at startup (spec.md §6). Not
/// dynamically reloadable, following `copilot_client::Config`'s plain
/// `from_env`-style construction.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub project_id: String,
    pub default_region: String,
    pub primary_llm_key: String,
    pub backup_llm_key: Option<String>,
    pub bind_address: String,
    pub port: u16,
    pub sweep_interval_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            project_id: env::var("DEPLOY_PROJECT_ID").unwrap_or_else(|_| "local-project".to_string()),
            default_region: env::var("DEPLOY_DEFAULT_REGION").unwrap_or_else(|_| "us-central1".to_string()),
            primary_llm_key: env::var("DEPLOY_LLM_PRIMARY_KEY").unwrap_or_default(),
            backup_llm_key: env::var("DEPLOY_LLM_BACKUP_KEY").ok().filter(|s| !s.is_empty()),
            bind_address: env::var("DEPLOY_BIND_ADDRESS").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("DEPLOY_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8787),
            sweep_interval_secs: env::var("DEPLOY_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(60),
        }
    }
}

//! `deploy-gateway`'s CLI surface, mirroring `agent-server`'s `clap` usage
//! (SPEC_FULL.md §2).

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "deploy-gateway", about = "Session Gateway for the deployment orchestrator")]
pub struct Args {
    #[arg(long, env = "DEPLOY_BIND_ADDRESS")]
    pub bind: Option<String>,

    #[arg(long, env = "DEPLOY_PORT")]
    pub port: Option<u16>,

    #[arg(long, env = "DEPLOY_PROJECT_ID")]
    pub project_id: Option<String>,

    #[arg(long, env = "DEPLOY_DEFAULT_REGION")]
    pub region: Option<String>,

    #[arg(long, env = "DEPLOY_SWEEP_INTERVAL_SECS")]
    pub sweep_interval_secs: Option<u64>,
}

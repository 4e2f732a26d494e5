pub mod analysis;
pub mod config;
pub mod context;
pub mod defaults;
pub mod deployment;
pub mod env_var;
pub mod error;
pub mod ids;
pub mod naming;
pub mod recipe;
pub mod resource;
pub mod session;
pub mod stage;

pub use analysis::AnalysisResult;
pub use config::AppConfig;
pub use context::ProjectContext;
pub use deployment::{DeploymentRecord, StageMetric, StageOutcome};
pub use env_var::EnvVar;
pub use error::{DeployError, ErrorKind, Result};
pub use ids::{DeploymentId, SessionId};
pub use recipe::{sanitize_entry_point, BuildRecipe, ImageSizeBucket};
pub use resource::ResourceConfig;
pub use session::SessionMeta;
pub use stage::{StageEvent, StageState, StageTag};

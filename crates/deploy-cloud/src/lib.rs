pub mod archive;
pub mod build;
pub mod error;
pub mod git;
pub mod http;
pub mod operation;
pub mod serverless;

pub use archive::create_gzipped_tar;
pub use build::{image_tag, BuildClient, HttpBuildClient};
pub use error::{CloudError, Result};
pub use git::{CloneOutcome, GitClient, HttpGitClient, ProgressFn};
pub use http::build_http_client;
pub use operation::{poll_until_done, OperationStatus};
pub use serverless::{HttpServerlessClient, ServerlessClient, ServiceSpec};

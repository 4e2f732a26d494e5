use thiserror::Error;

#[derive(Error, Debug)]
pub enum CloudError {
    #[error("http error: {0}")]
    Http(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("auth error: {0}")]
    Auth(String),

    #[error("operation failed: {0}")]
    OperationFailed(String),

    #[error("timed out waiting for operation: {0}")]
    TimedOut(String),
}

impl From<reqwest_middleware::Error> for CloudError {
    fn from(err: reqwest_middleware::Error) -> Self {
        CloudError::Http(err.to_string())
    }
}

impl From<reqwest::Error> for CloudError {
    fn from(err: reqwest::Error) -> Self {
        CloudError::Http(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;

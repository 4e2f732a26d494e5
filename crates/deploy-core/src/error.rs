use thiserror::Error;

/// Closed taxonomy of error kinds (spec.md §7). Every stage and collaborator
/// classifies its failures into one of these before it crosses a component
/// boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Transport,
    ModelTransient,
    ModelQuota,
    ModelAuth,
    AnalysisFailed,
    PreflightFailed,
    BuildFailed,
    DeployFailed,
    HealthDegraded,
    Validation,
    NotFound,
}

impl ErrorKind {
    /// Outbound wire `error` frame code (spec.md §6). Only the three
    /// user-visible kinds map to a code; everything else is handled inline
    /// (retried, failed over, or surfaced as a warning) before it would ever
    /// reach the Gateway as a terminal error frame.
    pub fn wire_code(self) -> Option<&'static str> {
        match self {
            ErrorKind::ModelQuota => Some("QUOTA_EXCEEDED"),
            ErrorKind::ModelAuth => Some("INVALID_API_KEY"),
            ErrorKind::Transport
            | ErrorKind::ModelTransient
            | ErrorKind::AnalysisFailed
            | ErrorKind::PreflightFailed
            | ErrorKind::BuildFailed
            | ErrorKind::DeployFailed
            | ErrorKind::HealthDegraded
            | ErrorKind::Validation
            | ErrorKind::NotFound => Some("API_ERROR"),
        }
    }

    /// Whether this kind seals the deployment as failed, or is recoverable
    /// in place (retried silently, failed over, or surfaced as a warning).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ErrorKind::ModelAuth
                | ErrorKind::PreflightFailed
                | ErrorKind::BuildFailed
                | ErrorKind::DeployFailed
                | ErrorKind::Validation
                | ErrorKind::NotFound
        )
    }
}

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("model transient error: {0}")]
    ModelTransient(String),

    #[error("model quota exhausted: {0}")]
    ModelQuota(String),

    #[error("model authentication failed: {0}")]
    ModelAuth(String),

    #[error("analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("preflight failed: {message}")]
    PreflightFailed {
        message: String,
        remediation: Vec<String>,
    },

    #[error("build failed: {message}")]
    BuildFailed {
        message: String,
        remediation: Vec<String>,
    },

    #[error("deploy failed: {message}")]
    DeployFailed {
        message: String,
        remediation: Vec<String>,
    },

    #[error("health verification degraded: {0}")]
    HealthDegraded(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl DeployError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeployError::Transport(_) => ErrorKind::Transport,
            DeployError::ModelTransient(_) => ErrorKind::ModelTransient,
            DeployError::ModelQuota(_) => ErrorKind::ModelQuota,
            DeployError::ModelAuth(_) => ErrorKind::ModelAuth,
            DeployError::AnalysisFailed(_) => ErrorKind::AnalysisFailed,
            DeployError::PreflightFailed { .. } => ErrorKind::PreflightFailed,
            DeployError::BuildFailed { .. } => ErrorKind::BuildFailed,
            DeployError::DeployFailed { .. } => ErrorKind::DeployFailed,
            DeployError::HealthDegraded(_) => ErrorKind::HealthDegraded,
            DeployError::Validation(_) => ErrorKind::Validation,
            DeployError::NotFound(_) => ErrorKind::NotFound,
        }
    }

    /// Remediation list, if the error kind carries one (spec.md §7).
    pub fn remediation(&self) -> &[String] {
        match self {
            DeployError::PreflightFailed { remediation, .. }
            | DeployError::BuildFailed { remediation, .. }
            | DeployError::DeployFailed { remediation, .. } => remediation,
            _ => &[],
        }
    }

    /// True when lowercased text matches the §4.3 transient-error keyword
    /// list. Shared by the Model Broker and the Pipeline's retry wrapper.
    pub fn is_transient_text(text: &str) -> bool {
        const KEYWORDS: &[&str] = &[
            "connection aborted",
            "connection refused",
            "timeout",
            "unavailable",
            "iocp",
            "socket",
            "503",
            "502",
            "504",
        ];
        let lower = text.to_lowercase();
        KEYWORDS.iter().any(|kw| lower.contains(kw))
    }

    /// True when lowercased text matches the §4.3 quota-error keyword list.
    pub fn is_quota_text(text: &str) -> bool {
        const KEYWORDS: &[&str] = &["resource exhausted", "429", "quota", "rate limit"];
        let lower = text.to_lowercase();
        KEYWORDS.iter().any(|kw| lower.contains(kw))
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_keywords_are_case_insensitive() {
        assert!(DeployError::is_transient_text("Connection ABORTED by peer"));
        assert!(DeployError::is_transient_text("got a 503 from upstream"));
        assert!(!DeployError::is_transient_text("invalid recipe syntax"));
    }

    #[test]
    fn quota_keywords_detect_429() {
        assert!(DeployError::is_quota_text("HTTP 429 Too Many Requests"));
        assert!(DeployError::is_quota_text("RESOURCE_EXHAUSTED"));
        assert!(!DeployError::is_quota_text("bad request"));
    }

    #[test]
    fn terminal_kinds_match_spec() {
        assert!(ErrorKind::BuildFailed.is_terminal());
        assert!(ErrorKind::ModelAuth.is_terminal());
        assert!(!ErrorKind::ModelTransient.is_terminal());
        assert!(!ErrorKind::HealthDegraded.is_terminal());
    }

    #[test]
    fn wire_codes_map_to_spec_set() {
        assert_eq!(ErrorKind::ModelQuota.wire_code(), Some("QUOTA_EXCEEDED"));
        assert_eq!(ErrorKind::ModelAuth.wire_code(), Some("INVALID_API_KEY"));
        assert_eq!(ErrorKind::BuildFailed.wire_code(), Some("API_ERROR"));
    }
}

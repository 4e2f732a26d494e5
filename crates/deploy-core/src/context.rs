use crate::analysis::AnalysisResult;
use crate::env_var::EnvVar;
use std::path::PathBuf;

/// Per-session record owned by that session's orchestrator (spec.md §3).
/// Created lazily on first message, mutated only by the owning orchestrator,
/// cleared on explicit reset.
///
/// Invariant: a non-empty `working_copy_path` is the authoritative signal
/// that analysis has already succeeded — see `has_working_copy`.
#[derive(Debug, Clone, Default)]
pub struct ProjectContext {
    pub repository_url: Option<String>,
    pub working_copy_path: Option<PathBuf>,
    pub framework: Option<String>,
    pub language: Option<String>,
    pub analysis: Option<AnalysisResult>,
    pub env_vars: Vec<EnvVar>,
    pub service_name: Option<String>,
    pub deployment_url: Option<String>,
    pub last_deployment_id: Option<String>,
}

impl ProjectContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// The anti-reclone invariant's source of truth (spec.md §4.2, §8.3):
    /// if this is true the Orchestrator must never invoke clone-and-analyze
    /// again in this session.
    pub fn has_working_copy(&self) -> bool {
        self.working_copy_path.is_some()
    }

    pub fn set_env_var(&mut self, var: EnvVar) {
        if let Some(existing) = self.env_vars.iter_mut().find(|v| v.key == var.key) {
            *existing = var;
        } else {
            self.env_vars.push(var);
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Detects the "working copy vanished between analysis and deploy"
    /// condition that must surface as `not-found` (spec.md §6, §7).
    pub fn working_copy_missing_on_disk(&self) -> bool {
        match &self.working_copy_path {
            Some(path) => !path.exists(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_working_copy_tracks_presence() {
        let mut ctx = ProjectContext::new();
        assert!(!ctx.has_working_copy());
        ctx.working_copy_path = Some(PathBuf::from("/tmp/x"));
        assert!(ctx.has_working_copy());
    }

    #[test]
    fn reset_clears_everything() {
        let mut ctx = ProjectContext::new();
        ctx.working_copy_path = Some(PathBuf::from("/tmp/x"));
        ctx.repository_url = Some("https://example.org/u/r".to_string());
        ctx.reset();
        assert!(!ctx.has_working_copy());
        assert!(ctx.repository_url.is_none());
    }

    #[test]
    fn set_env_var_overwrites_by_key() {
        let mut ctx = ProjectContext::new();
        ctx.set_env_var(EnvVar::new("PORT", "8080", false));
        ctx.set_env_var(EnvVar::new("PORT", "9090", false));
        assert_eq!(ctx.env_vars.len(), 1);
        assert_eq!(ctx.env_vars[0].value, "9090");
    }
}

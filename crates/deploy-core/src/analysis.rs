use serde::{Deserialize, Serialize};

/// Structured classification produced by the Analyzer (spec.md §3, §4.6).
/// `language = "unknown"` is the well-formed fallback value, never a panic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub language: String,
    pub framework: Option<String>,
    pub entry_point: Option<String>,
    pub port: Option<u16>,
    pub dependencies: Vec<String>,
    pub database_hint: Option<String>,
    pub build_tool: Option<String>,
    pub start_command: Option<String>,
    pub env_var_names: Vec<String>,
    pub recommendations: Vec<String>,
    pub warnings: Vec<String>,
    pub recipe_exists: bool,
}

impl AnalysisResult {
    pub fn unknown(warning: impl Into<String>) -> Self {
        Self {
            language: "unknown".to_string(),
            framework: None,
            entry_point: None,
            port: None,
            dependencies: Vec::new(),
            database_hint: None,
            build_tool: None,
            start_command: None,
            env_var_names: Vec::new(),
            recommendations: Vec::new(),
            warnings: vec![warning.into()],
            recipe_exists: false,
        }
    }

    /// Merge statically-extracted env-var names, deduplicated, and a
    /// recipe-exists flag into a model-produced result (spec.md §4.6 step 4).
    pub fn merge_static(&mut self, env_var_names: Vec<String>, recipe_exists: bool) {
        for name in env_var_names {
            if !self.env_var_names.contains(&name) {
                self.env_var_names.push(name);
            }
        }
        self.recipe_exists = recipe_exists;
    }
}

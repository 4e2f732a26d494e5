use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageSizeBucket {
    Small,
    Medium,
    Large,
}

/// A container build recipe produced by the Recipe Synthesizer (spec.md §3,
/// §4.7). Deterministic when a template matches `(language, framework)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRecipe {
    pub text: String,
    pub optimization_tags: Vec<String>,
    pub size_bucket: ImageSizeBucket,
}

/// Sanitize a candidate entry point for safe template substitution
/// (spec.md §4.7): strip extensions, restrict to alphanumerics plus `_-.`.
pub fn sanitize_entry_point(raw: &str) -> String {
    let stem = raw.rsplit_once('.').map(|(s, _)| s).unwrap_or(raw);
    stem.chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-' || *c == '.')
        .collect()
}

use crate::env_extract::extract_env_var_names;
use crate::fallback::static_fallback;
use crate::scan::collect_config_files;
use deploy_core::AnalysisResult;
use deploy_llm::{ChatMessage, LlmTurn, ModelBroker};
use std::path::Path;

/// Strip a ```json ... ``` or ``` ... ``` code-fence wrapper from a model
/// response before parsing (spec.md §4.6 step 3, §4.7).
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_start_matches(['\n', '\r']);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn build_prompt(config_files: &std::collections::BTreeMap<String, String>) -> String {
    let mut prompt = String::from(
        "Classify this repository and return ONLY a JSON object with keys: \
         language, framework, entry_point, port, dependencies, database_hint, \
         build_tool, start_command, env_var_names, recommendations, warnings, \
         recipe_exists. Here are the repository's config files:\n\n",
    );
    for (path, content) in config_files {
        prompt.push_str(&format!("--- {path} ---\n{content}\n\n"));
    }
    prompt
}

/// Scan a working copy and produce an `AnalysisResult` (spec.md §4.6). On
/// any failure (unparseable classification, model terminal error, I/O
/// error) this falls back to a deterministic static record rather than
/// propagating an error.
pub async fn analyze(working_copy: &Path, broker: &ModelBroker) -> AnalysisResult {
    let config_files = collect_config_files(working_copy);
    let env_var_names = extract_env_var_names(&config_files);
    let recipe_exists = config_files.contains_key("Dockerfile");

    let mut result = match broker.send(ChatMessage::user(build_prompt(&config_files))).await {
        Ok(LlmTurn::Text(text)) => match serde_json::from_str::<AnalysisResult>(strip_code_fences(&text)) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!(error = %err, "analyzer: classification unparseable, using static fallback");
                static_fallback(&config_files, "classification unparseable")
            }
        },
        Ok(LlmTurn::FunctionCall { .. }) => {
            tracing::warn!("analyzer: model returned a function call instead of classification");
            static_fallback(&config_files, "classification unparseable")
        }
        Err(err) => {
            tracing::warn!(error = %err, "analyzer: model call failed, using static fallback");
            static_fallback(&config_files, "model classification failed")
        }
    };

    result.merge_static(env_var_names, recipe_exists);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_code_fences_handles_json_tag() {
        let wrapped = "```json\n{\"a\":1}\n```";
        assert_eq!(strip_code_fences(wrapped), "{\"a\":1}");
    }

    #[test]
    fn strip_code_fences_passes_through_bare_json() {
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn strip_code_fences_handles_no_language_tag() {
        let wrapped = "```\n{\"a\":1}\n```";
        assert_eq!(strip_code_fences(wrapped), "{\"a\":1}");
    }
}

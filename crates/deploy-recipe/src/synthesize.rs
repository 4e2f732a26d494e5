use crate::catalog::lookup;
use crate::generic::minimal_generic;
use deploy_core::{sanitize_entry_point, AnalysisResult, BuildRecipe, ImageSizeBucket};
use deploy_llm::{ChatMessage, LlmTurn, ModelBroker};

const RECIPE_PROMPT_PREFIX: &str = "Produce a production Dockerfile for this project. Requirements: \
multi-stage build, a non-root user, listen on the port given by a PORT environment variable \
defaulting to 8080, and layer-caching-friendly ordering (dependency manifests copied and \
installed before the rest of the source). Return ONLY the Dockerfile text, no prose, no \
markdown code fence.\n\n";

fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("dockerfile").unwrap_or(rest);
    let rest = rest.trim_start_matches(['\n', '\r']);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn build_prompt(analysis: &AnalysisResult) -> String {
    let mut prompt = String::from(RECIPE_PROMPT_PREFIX);
    prompt.push_str(&format!("Language: {}\n", analysis.language));
    if let Some(framework) = &analysis.framework {
        prompt.push_str(&format!("Framework: {framework}\n"));
    }
    if let Some(entry_point) = &analysis.entry_point {
        prompt.push_str(&format!("Entry point: {entry_point}\n"));
    }
    if let Some(build_tool) = &analysis.build_tool {
        prompt.push_str(&format!("Build tool: {build_tool}\n"));
    }
    prompt
}

/// Produce a `BuildRecipe` for an `AnalysisResult` (spec.md §4.7): a fixed
/// template catalog first, an LLM-generated recipe second, and a minimal
/// generic recipe as the last resort. Never fails.
pub async fn synthesize(analysis: &AnalysisResult, broker: &ModelBroker) -> BuildRecipe {
    if let Some(framework) = &analysis.framework {
        if let Some((template, tags, bucket)) = lookup(&analysis.language, framework) {
            let entry_stem = analysis
                .entry_point
                .as_deref()
                .map(sanitize_entry_point)
                .unwrap_or_default();
            return BuildRecipe {
                text: template.replace("{{ENTRY_POINT}}", &entry_stem),
                optimization_tags: tags.iter().map(|s| s.to_string()).collect(),
                size_bucket: bucket,
            };
        }
    }

    match broker.send(ChatMessage::user(build_prompt(analysis))).await {
        Ok(LlmTurn::Text(text)) => {
            let text = strip_code_fences(&text);
            if text.is_empty() {
                tracing::warn!("recipe: model returned an empty recipe, using minimal generic");
                minimal_generic(&analysis.language)
            } else {
                BuildRecipe {
                    text: text.to_string(),
                    optimization_tags: vec!["model-generated".to_string()],
                    size_bucket: ImageSizeBucket::Medium,
                }
            }
        }
        Ok(LlmTurn::FunctionCall { .. }) | Err(_) => {
            tracing::warn!("recipe: model synthesis failed, using minimal generic");
            minimal_generic(&analysis.language)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_dockerfile_fence() {
        let wrapped = "```dockerfile\nFROM scratch\n```";
        assert_eq!(strip_code_fences(wrapped), "FROM scratch");
    }

    #[test]
    fn build_prompt_includes_detected_fields() {
        let mut analysis = AnalysisResult::unknown("x");
        analysis.language = "python".to_string();
        analysis.framework = Some("flask".to_string());
        let prompt = build_prompt(&analysis);
        assert!(prompt.contains("Language: python"));
        assert!(prompt.contains("Framework: flask"));
    }
}

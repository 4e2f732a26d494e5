use deploy_core::defaults::READY_COMMAND_WHITELIST;
use deploy_core::ProjectContext;

/// Build the message actually sent to the model (spec.md §4.2 step 1).
///
/// A bare whitelisted command (`deploy`, `yes`, `go`, ...) while the
/// project is already analyzed is rewritten to a minimal "ready" marker —
/// this both trims prompt tokens and biases the model toward calling
/// `deploy` rather than `clone-and-analyze` again.
pub fn build_prompt(context: &ProjectContext, user_message: &str) -> String {
    let trimmed = user_message.trim();
    let is_short_command = READY_COMMAND_WHITELIST.iter().any(|cmd| trimmed.eq_ignore_ascii_case(cmd));

    if is_short_command && context.has_working_copy() {
        return format!(
            "ready: project already analyzed (language={}, framework={}); user said \"{trimmed}\"",
            context.language.as_deref().unwrap_or("unknown"),
            context.framework.as_deref().unwrap_or("none"),
        );
    }

    if context.has_working_copy() {
        format!(
            "[context] repository={} language={} framework={}\n{trimmed}",
            context.repository_url.as_deref().unwrap_or("unknown"),
            context.language.as_deref().unwrap_or("unknown"),
            context.framework.as_deref().unwrap_or("none"),
        )
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_command_with_working_copy_becomes_ready_marker() {
        let mut ctx = ProjectContext::new();
        ctx.working_copy_path = Some("/tmp/x".into());
        ctx.language = Some("python".to_string());
        let prompt = build_prompt(&ctx, "go");
        assert!(prompt.starts_with("ready:"));
        assert!(prompt.contains("python"));
    }

    #[test]
    fn short_command_without_working_copy_is_not_rewritten() {
        let ctx = ProjectContext::new();
        let prompt = build_prompt(&ctx, "deploy");
        assert_eq!(prompt, "deploy");
    }

    #[test]
    fn non_command_message_gets_context_prefix_when_analyzed() {
        let mut ctx = ProjectContext::new();
        ctx.working_copy_path = Some("/tmp/x".into());
        ctx.repository_url = Some("https://example.org/u/flask-app".to_string());
        let prompt = build_prompt(&ctx, "what port does this use?");
        assert!(prompt.contains("[context]"));
        assert!(prompt.ends_with("what port does this use?"));
    }
}

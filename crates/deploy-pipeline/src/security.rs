use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecuritySeverity {
    Info,
    Warning,
}

/// A single finding from the container-build preamble's recipe scan
/// (spec.md §4.4: "inspect the recipe text for known red flags"). Never
/// fails the pipeline by itself — surfaced as an informational StageEvent
/// detail only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityFinding {
    pub tag: String,
    pub message: String,
    pub severity: SecuritySeverity,
}

/// Inspect a recipe's text for known red flags: running as root, literals
/// that look like secrets, and privileged container flags.
pub fn scan_recipe(text: &str) -> Vec<SecurityFinding> {
    let mut findings = Vec::new();
    let lower = text.to_lowercase();

    let has_user_directive = lower.lines().any(|line| line.trim_start().starts_with("user "));
    if !has_user_directive {
        findings.push(SecurityFinding {
            tag: "root-user".to_string(),
            message: "no USER directive found; the image will run as root".to_string(),
            severity: SecuritySeverity::Warning,
        });
    } else if lower.lines().any(|line| matches!(line.trim(), "user root" | "user 0")) {
        findings.push(SecurityFinding {
            tag: "root-user".to_string(),
            message: "recipe explicitly switches to the root user".to_string(),
            severity: SecuritySeverity::Warning,
        });
    }

    for (needle, label) in [
        ("aws_secret", "an AWS secret-shaped literal"),
        ("-----begin", "an embedded PEM key block"),
        ("api_key=", "an inline API key assignment"),
        ("password=", "an inline password assignment"),
    ] {
        if lower.contains(needle) {
            findings.push(SecurityFinding {
                tag: "secret-literal".to_string(),
                message: format!("recipe appears to embed {label}"),
                severity: SecuritySeverity::Warning,
            });
        }
    }

    if lower.contains("--privileged") {
        findings.push(SecurityFinding {
            tag: "privileged-flag".to_string(),
            message: "recipe references a privileged container flag".to_string(),
            severity: SecuritySeverity::Warning,
        });
    }

    if findings.is_empty() {
        findings.push(SecurityFinding {
            tag: "clean".to_string(),
            message: "no known red flags detected".to_string(),
            severity: SecuritySeverity::Info,
        });
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_missing_user_directive() {
        let findings = scan_recipe("FROM node:20\nCMD [\"node\", \"index.js\"]\n");
        assert!(findings.iter().any(|f| f.tag == "root-user"));
    }

    #[test]
    fn flags_inline_password() {
        let findings = scan_recipe("FROM node:20\nUSER appuser\nENV password=hunter2\n");
        assert!(findings.iter().any(|f| f.tag == "secret-literal"));
    }

    #[test]
    fn clean_recipe_has_single_info_finding() {
        let findings = scan_recipe("FROM node:20\nUSER appuser\nCMD [\"node\", \"index.js\"]\n");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, SecuritySeverity::Info);
    }
}

use deploy_core::AnalysisResult;
use std::collections::BTreeMap;

/// Deterministic static-heuristic fallback (spec.md §4.6 step 5): detect
/// language by manifest presence, set a best-guess build tool and entry
/// point, and record a warning. Never panics — this is the path that
/// guarantees the Analyzer never throws outward.
pub fn static_fallback(config_files: &BTreeMap<String, String>, warning: &str) -> AnalysisResult {
    let (language, build_tool, entry_point, framework) = if config_files.contains_key("package.json") {
        let framework = config_files
            .get("package.json")
            .and_then(|content| detect_node_framework(content));
        ("javascript", Some("npm"), Some("index.js"), framework)
    } else if config_files.contains_key("requirements.txt") || config_files.contains_key("pyproject.toml") {
        ("python", Some("pip"), Some("app.py"), None)
    } else if config_files.contains_key("go.mod") {
        ("go", Some("go build"), Some("main.go"), None)
    } else if config_files.contains_key("Cargo.toml") {
        ("rust", Some("cargo"), Some("main.rs"), None)
    } else if config_files.contains_key("pom.xml") {
        ("java", Some("maven"), None, None)
    } else if config_files.contains_key("build.gradle") {
        ("java", Some("gradle"), None, None)
    } else if config_files.contains_key("Gemfile") {
        ("ruby", Some("bundler"), Some("app.rb"), None)
    } else if config_files.contains_key("composer.json") {
        ("php", Some("composer"), Some("index.php"), None)
    } else {
        return AnalysisResult::unknown(warning);
    };

    let mut result = AnalysisResult::unknown(warning);
    result.language = language.to_string();
    result.build_tool = build_tool.map(str::to_string);
    result.entry_point = entry_point.map(str::to_string);
    result.framework = framework;
    result
}

fn detect_node_framework(package_json: &str) -> Option<String> {
    let lower = package_json.to_lowercase();
    for (needle, name) in [("\"express\"", "express"), ("\"next\"", "next"), ("\"fastify\"", "fastify")] {
        if lower.contains(needle) {
            return Some(name.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_python_from_requirements() {
        let mut files = BTreeMap::new();
        files.insert("requirements.txt".to_string(), "flask\n".to_string());
        let result = static_fallback(&files, "classification unparseable");
        assert_eq!(result.language, "python");
        assert_eq!(result.build_tool.as_deref(), Some("pip"));
        assert_eq!(result.warnings, vec!["classification unparseable"]);
    }

    #[test]
    fn unknown_language_when_no_manifest_recognized() {
        let files = BTreeMap::new();
        let result = static_fallback(&files, "no manifest found");
        assert_eq!(result.language, "unknown");
    }

    #[test]
    fn detects_express_from_package_json() {
        let mut files = BTreeMap::new();
        files.insert("package.json".to_string(), r#"{"dependencies":{"express":"^4.0.0"}}"#.to_string());
        let result = static_fallback(&files, "w");
        assert_eq!(result.framework.as_deref(), Some("express"));
    }
}

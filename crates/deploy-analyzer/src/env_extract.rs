use std::collections::BTreeMap;

/// Statically extract env-var names referenced by dotenv files and common
/// source-level accessors, deduplicated (spec.md §4.6 step 4).
pub fn extract_env_var_names(config_files: &BTreeMap<String, String>) -> Vec<String> {
    let mut names = Vec::new();
    for (path, content) in config_files {
        if path == ".env" || path == ".env.example" {
            for line in content.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                if let Some((key, _)) = line.split_once('=') {
                    push_unique(&mut names, key.trim());
                }
            }
        }
    }
    names
}

fn push_unique(names: &mut Vec<String>, candidate: &str) {
    if !candidate.is_empty() && !names.iter().any(|n| n == candidate) {
        names.push(candidate.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_keys_from_dotenv_and_dedupes() {
        let mut files = BTreeMap::new();
        files.insert(".env".to_string(), "PORT=8080\nDATABASE_URL=postgres://x\n# comment\n".to_string());
        files.insert(".env.example".to_string(), "PORT=\nAPI_KEY=\n".to_string());
        let names = extract_env_var_names(&files);
        assert_eq!(names, vec!["PORT", "DATABASE_URL", "API_KEY"]);
    }
}

use std::collections::BTreeMap;
use std::path::Path;

/// Closed config-file allowlist (spec.md §4.6 step 2, expanded per
/// SPEC_FULL.md §4.6): lockfiles/manifests for each supported ecosystem,
/// dotenv variants, container recipes, cloud manifests.
pub const CONFIG_FILES: &[&str] = &[
    "package.json",
    "requirements.txt",
    "pyproject.toml",
    "Pipfile",
    "go.mod",
    "Cargo.toml",
    "pom.xml",
    "build.gradle",
    "Gemfile",
    "composer.json",
    ".env",
    ".env.example",
    "Dockerfile",
    "app.yaml",
    "Procfile",
];

/// Depth-bounded noise directories skipped during the walk (spec.md §4.6
/// step 1).
const NOISE_DIRS: &[&str] = &[
    ".git",
    "__pycache__",
    ".venv",
    "venv",
    "node_modules",
    "target",
    "dist",
    "build",
    ".cache",
];

const MAX_DEPTH: usize = 3;
const MAX_FILE_SIZE: u64 = 50 * 1024;

/// Walk `root` to a depth bound of 3, skipping noise directories, and read
/// verbatim any file under 50 KiB whose name is in `CONFIG_FILES`.
pub fn collect_config_files(root: &Path) -> BTreeMap<String, String> {
    let mut found = BTreeMap::new();

    let walker = walkdir::WalkDir::new(root)
        .max_depth(MAX_DEPTH)
        .into_iter()
        .filter_entry(|entry| {
            entry
                .file_name()
                .to_str()
                .map(|name| !NOISE_DIRS.contains(&name))
                .unwrap_or(true)
        });

    for entry in walker.filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else { continue };
        if !CONFIG_FILES.contains(&name) {
            continue;
        }
        let Ok(metadata) = entry.metadata() else { continue };
        if metadata.len() > MAX_FILE_SIZE {
            continue;
        }
        if let Ok(content) = std::fs::read_to_string(entry.path()) {
            let relative = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .to_string();
            found.insert(relative, content);
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_manifest_and_skips_noise_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), "{}").unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules")).unwrap();
        std::fs::write(dir.path().join("node_modules/package.json"), "{}").unwrap();

        let found = collect_config_files(dir.path());
        assert_eq!(found.len(), 1);
        assert!(found.contains_key("package.json"));
    }

    #[test]
    fn skips_oversized_files() {
        let dir = tempfile::tempdir().unwrap();
        let huge = "x".repeat(60 * 1024);
        std::fs::write(dir.path().join("requirements.txt"), huge).unwrap();
        let found = collect_config_files(dir.path());
        assert!(found.is_empty());
    }
}

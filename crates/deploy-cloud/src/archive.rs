//! Packing a working copy into the gzipped tar uploaded to the build
//! collaborator's staging bucket (spec.md §4.4 stage 5).

use crate::error::Result;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::path::Path;
use tar::Builder;

/// Directory/file-name fragments excluded from the upload (spec.md §4.4):
/// `.git`, caches, local virtualenvs, `node_modules`, dotenv files.
pub const EXCLUDED: &[&str] = &[".git", "__pycache__", ".venv", "venv", "node_modules"];

fn is_excluded(name: &str) -> bool {
    EXCLUDED.contains(&name) || name.starts_with(".env")
}

/// Produce a gzip-compressed tar of `source_dir`, skipping excluded paths
/// at any depth.
pub fn create_gzipped_tar(source_dir: &Path) -> Result<Vec<u8>> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = Builder::new(encoder);

    for entry in walkdir::WalkDir::new(source_dir)
        .into_iter()
        .filter_entry(|e| {
            e.file_name()
                .to_str()
                .map(|name| !is_excluded(name))
                .unwrap_or(true)
        })
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(source_dir).unwrap_or(entry.path());
        builder.append_path_with_name(entry.path(), relative)?;
    }

    let encoder = builder.into_inner()?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn excludes_git_and_node_modules_and_dotenv() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git/HEAD"), "ref: refs/heads/main").unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        std::fs::write(dir.path().join("node_modules/pkg/index.js"), "").unwrap();
        std::fs::write(dir.path().join(".env"), "SECRET=1").unwrap();
        let mut app = std::fs::File::create(dir.path().join("app.py")).unwrap();
        app.write_all(b"print('hi')").unwrap();

        let tar_bytes = create_gzipped_tar(dir.path()).unwrap();
        let decoder = flate2::read::GzDecoder::new(tar_bytes.as_slice());
        let mut archive = tar::Archive::new(decoder);
        let names: Vec<String> = archive
            .entries()
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.path().unwrap().to_string_lossy().to_string())
            .collect();

        assert!(names.contains(&"app.py".to_string()));
        assert!(!names.iter().any(|n| n.contains(".git")));
        assert!(!names.iter().any(|n| n.contains("node_modules")));
        assert!(!names.iter().any(|n| n.contains(".env")));
    }
}

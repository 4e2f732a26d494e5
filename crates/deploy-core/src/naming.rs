/// Derive the managed-serverless service name from a repo URL (spec.md §6,
/// §8.8): lowercase, digits, hyphens only; must start with a letter; length
/// <= 63; derived from the repo's last path segment (stripping `.git`).
pub fn service_name_from_repo_url(url: &str) -> String {
    let last_segment = url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(url);
    let stripped = last_segment.strip_suffix(".git").unwrap_or(last_segment);

    let mut name = String::new();
    let mut prev_hyphen = false;
    for c in stripped.chars() {
        if c.is_ascii_alphanumeric() {
            name.push(c.to_ascii_lowercase());
            prev_hyphen = false;
        } else if !prev_hyphen && !name.is_empty() {
            name.push('-');
            prev_hyphen = true;
        }
    }
    while name.ends_with('-') {
        name.pop();
    }

    if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        name = format!("svc-{name}");
    }
    name.truncate(63);
    while name.ends_with('-') {
        name.pop();
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_dot_git_and_lowercases() {
        assert_eq!(service_name_from_repo_url("https://example.org/u/Flask-App.git"), "flask-app");
    }

    #[test]
    fn hyphenates_non_alphanumeric_separators() {
        assert_eq!(service_name_from_repo_url("https://example.org/u/my_cool_app"), "my-cool-app");
    }

    #[test]
    fn prefixes_when_leading_char_is_not_a_letter() {
        assert_eq!(service_name_from_repo_url("https://example.org/u/123-app"), "svc-123-app");
    }

    #[test]
    fn truncates_to_63_chars() {
        let long = "a".repeat(100);
        let name = service_name_from_repo_url(&format!("https://example.org/u/{long}"));
        assert!(name.len() <= 63);
    }
}

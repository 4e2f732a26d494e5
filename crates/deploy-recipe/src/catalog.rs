use deploy_core::ImageSizeBucket;

struct Template {
    language: &'static str,
    framework: &'static str,
    text: &'static str,
    tags: &'static [&'static str],
    bucket: ImageSizeBucket,
}

const TEMPLATES: &[Template] = &[
    Template {
        language: "javascript",
        framework: "express",
        text: include_str!("templates/javascript_express.dockerfile"),
        tags: &["multi-stage", "layer-caching", "non-root"],
        bucket: ImageSizeBucket::Small,
    },
    Template {
        language: "javascript",
        framework: "next",
        text: include_str!("templates/javascript_next.dockerfile"),
        tags: &["multi-stage", "layer-caching", "non-root"],
        bucket: ImageSizeBucket::Medium,
    },
    Template {
        language: "javascript",
        framework: "fastify",
        text: include_str!("templates/javascript_fastify.dockerfile"),
        tags: &["multi-stage", "layer-caching", "non-root"],
        bucket: ImageSizeBucket::Small,
    },
    Template {
        language: "python",
        framework: "flask",
        text: include_str!("templates/python_flask.dockerfile"),
        tags: &["non-root", "gunicorn"],
        bucket: ImageSizeBucket::Small,
    },
    Template {
        language: "python",
        framework: "django",
        text: include_str!("templates/python_django.dockerfile"),
        tags: &["non-root", "gunicorn"],
        bucket: ImageSizeBucket::Medium,
    },
];

/// Fixed catalog lookup for a `(language, framework)` pair (spec.md §4.7).
/// Returns the template text, its optimization tags, and a size bucket.
pub fn lookup(language: &str, framework: &str) -> Option<(&'static str, &'static [&'static str], ImageSizeBucket)> {
    TEMPLATES
        .iter()
        .find(|t| t.language == language && t.framework == framework)
        .map(|t| (t.text, t.tags, t.bucket))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_known_pair() {
        let (text, tags, bucket) = lookup("python", "flask").unwrap();
        assert!(text.contains("gunicorn"));
        assert!(tags.contains(&"non-root"));
        assert_eq!(bucket, ImageSizeBucket::Small);
    }

    #[test]
    fn unknown_pair_returns_none() {
        assert!(lookup("python", "pyramid").is_none());
    }
}

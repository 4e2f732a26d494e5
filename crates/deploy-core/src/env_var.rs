use serde::{Deserialize, Serialize};

/// A single environment variable assignment (spec.md §3). Values marked
/// secret must never be logged or echoed in a progress message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvVar {
    pub key: String,
    pub value: String,
    #[serde(rename = "isSecret", default)]
    pub is_secret: bool,
}

impl EnvVar {
    pub fn new(key: impl Into<String>, value: impl Into<String>, is_secret: bool) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            is_secret,
        }
    }

    /// Redacted form safe to embed in a progress message or log line.
    pub fn display_value(&self) -> &str {
        if self.is_secret {
            "***"
        } else {
            &self.value
        }
    }

    /// Key-shape validation only; values pass through byte-for-byte per the
    /// §9 open-question resolution recorded in SPEC_FULL.md.
    pub fn validate_key(key: &str) -> bool {
        !key.is_empty() && key.chars().all(|c| !c.is_control())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_values_are_redacted() {
        let v = EnvVar::new("DATABASE_URL", "postgres://user:pw@host/db", true);
        assert_eq!(v.display_value(), "***");
        let v = EnvVar::new("PORT", "8080", false);
        assert_eq!(v.display_value(), "8080");
    }

    #[test]
    fn key_validation_rejects_control_chars() {
        assert!(EnvVar::validate_key("API_KEY"));
        assert!(!EnvVar::validate_key(""));
        assert!(!EnvVar::validate_key("BAD\nKEY"));
    }
}

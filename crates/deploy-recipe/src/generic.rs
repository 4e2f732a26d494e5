use deploy_core::{BuildRecipe, ImageSizeBucket};

/// Minimal generic recipe tailored to a language, used when no template
/// matches and the Model Broker also fails to produce one (spec.md §4.7).
pub fn minimal_generic(language: &str) -> BuildRecipe {
    let text = match language {
        "javascript" => {
            "FROM node:20-slim\nWORKDIR /app\nCOPY . .\nRUN npm install --omit=dev\nENV PORT=8080\nEXPOSE 8080\nCMD [\"node\", \"index.js\"]\n"
        }
        "python" => {
            "FROM python:3.12-slim\nWORKDIR /app\nCOPY . .\nRUN pip install --no-cache-dir -r requirements.txt\nENV PORT=8080\nEXPOSE 8080\nCMD [\"python\", \"app.py\"]\n"
        }
        "go" => {
            "FROM golang:1.22 AS builder\nWORKDIR /app\nCOPY . .\nRUN go build -o server .\n\nFROM gcr.io/distroless/base-debian12\nCOPY --from=builder /app/server /server\nENV PORT=8080\nEXPOSE 8080\nCMD [\"/server\"]\n"
        }
        "rust" => {
            "FROM rust:1.78 AS builder\nWORKDIR /app\nCOPY . .\nRUN cargo build --release\n\nFROM debian:bookworm-slim\nCOPY --from=builder /app/target/release/app /app\nENV PORT=8080\nEXPOSE 8080\nCMD [\"/app\"]\n"
        }
        "java" => {
            "FROM eclipse-temurin:21-jdk AS builder\nWORKDIR /app\nCOPY . .\nRUN ./mvnw package -DskipTests\n\nFROM eclipse-temurin:21-jre\nCOPY --from=builder /app/target/*.jar /app.jar\nENV PORT=8080\nEXPOSE 8080\nCMD [\"java\", \"-jar\", \"/app.jar\"]\n"
        }
        "ruby" => {
            "FROM ruby:3.3-slim\nWORKDIR /app\nCOPY . .\nRUN bundle install\nENV PORT=8080\nEXPOSE 8080\nCMD [\"ruby\", \"app.rb\"]\n"
        }
        "php" => {
            "FROM php:8.3-apache\nCOPY . /var/www/html\nENV PORT=8080\nEXPOSE 8080\nCMD [\"apache2-foreground\"]\n"
        }
        _ => "FROM alpine:3.19\nWORKDIR /app\nCOPY . .\nENV PORT=8080\nEXPOSE 8080\nCMD [\"true\"]\n",
    };

    BuildRecipe {
        text: text.to_string(),
        optimization_tags: Vec::new(),
        size_bucket: ImageSizeBucket::Medium,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_language_has_port_env() {
        let recipe = minimal_generic("python");
        assert!(recipe.text.contains("ENV PORT=8080"));
    }

    #[test]
    fn unknown_language_falls_back_to_placeholder() {
        let recipe = minimal_generic("cobol");
        assert!(recipe.text.contains("alpine"));
    }
}

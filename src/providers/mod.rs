//! Provider subsystem for the external language-model call.
//!
//! Each backend implements the [`Provider`] trait defined in [`traits`] and is
//! registered in [`create_provider`] by its canonical string key. The agent
//! treats a provider as an opaque "history in, completion out" function.

pub mod compatible;
pub mod ollama;
pub mod traits;

#[cfg(test)]
pub(crate) mod mock;

pub use compatible::OpenAiCompatibleProvider;
pub use ollama::OllamaProvider;
pub use traits::{ChatMessage, Provider};

use std::time::Duration;

const MAX_API_ERROR_CHARS: usize = 200;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

fn is_secret_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':')
}

/// Scrub secret-looking tokens (`sk-...`, `ghp_...`, bearer values) from provider error strings.
pub fn scrub_secret_patterns(input: &str) -> String {
    const PREFIXES: [&str; 4] = ["sk-", "ghp_", "github_pat_", "Bearer "];

    let mut scrubbed = input.to_string();
    for prefix in PREFIXES {
        let mut search_from = 0;
        while let Some(rel) = scrubbed[search_from..].find(prefix) {
            let start = search_from + rel;
            let content_start = start + prefix.len();
            let content_len: usize = scrubbed[content_start..]
                .chars()
                .take_while(|c| is_secret_char(*c))
                .map(char::len_utf8)
                .sum();

            if content_len == 0 {
                search_from = content_start;
                continue;
            }

            scrubbed.replace_range(start..content_start + content_len, "[REDACTED]");
            search_from = start + "[REDACTED]".len();
        }
    }
    scrubbed
}

/// Sanitize API error text by scrubbing secrets and truncating length.
pub fn sanitize_api_error(input: &str) -> String {
    let scrubbed = scrub_secret_patterns(input);
    if scrubbed.chars().count() <= MAX_API_ERROR_CHARS {
        return scrubbed;
    }

    let end = scrubbed
        .char_indices()
        .nth(MAX_API_ERROR_CHARS)
        .map_or(scrubbed.len(), |(i, _)| i);
    format!("{}...", &scrubbed[..end])
}

/// Build a sanitized provider error from a failed HTTP response.
pub async fn api_error(provider: &str, response: reqwest::Response) -> anyhow::Error {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read provider error body>".to_string());
    let sanitized = sanitize_api_error(&body);
    anyhow::anyhow!("{provider} API error ({status}): {sanitized}")
}

/// Resolve an API key from the explicit value, then provider-specific env vars.
fn resolve_provider_credential(name: &str, credential_override: Option<&str>) -> Option<String> {
    if let Some(key) = credential_override.map(str::trim).filter(|k| !k.is_empty()) {
        return Some(key.to_string());
    }

    let env_candidates: &[&str] = match name {
        "openai" => &["OPENAI_API_KEY"],
        _ => &[],
    };
    env_candidates
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

/// Factory: create the provider named in config.
///
/// Accepted names: `ollama`, `openai`, and `custom:<base-url>` for any
/// OpenAI-compatible server.
pub fn create_provider(
    name: &str,
    api_key: Option<&str>,
    api_url: Option<&str>,
    timeout: Duration,
) -> anyhow::Result<Box<dyn Provider>> {
    let key = resolve_provider_credential(name, api_key);

    match name {
        "ollama" => Ok(Box::new(OllamaProvider::new(api_url, key.as_deref(), timeout))),
        "openai" => Ok(Box::new(OpenAiCompatibleProvider::new(
            "openai",
            api_url.unwrap_or(OPENAI_BASE_URL),
            key.as_deref(),
            timeout,
        ))),
        custom if custom.starts_with("custom:") => {
            let base_url = custom.trim_start_matches("custom:").trim();
            if base_url.is_empty() {
                anyhow::bail!("Custom provider requires a URL, e.g. custom:http://localhost:8080/v1");
            }
            Ok(Box::new(OpenAiCompatibleProvider::new(
                "custom",
                base_url,
                key.as_deref(),
                timeout,
            )))
        }
        _ => anyhow::bail!(
            "Unknown provider: {name}. Supported: ollama, openai, custom:<URL>."
        ),
    }
}

/// Information about a supported provider for display purposes.
pub struct ProviderInfo {
    /// Canonical name used in config (e.g. `"ollama"`)
    pub name: &'static str,
    pub display_name: &'static str,
    /// Whether the provider runs locally (no API key required)
    pub local: bool,
}

/// Return the list of known providers for `pda-agent providers`.
pub fn list_providers() -> Vec<ProviderInfo> {
    vec![
        ProviderInfo {
            name: "ollama",
            display_name: "Ollama",
            local: true,
        },
        ProviderInfo {
            name: "openai",
            display_name: "OpenAI",
            local: false,
        },
    ]
}

use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::agent::DEFAULT_SYSTEM_PROMPT;

/// Env var that relocates the config directory (set by `--config-dir`).
pub const CONFIG_DIR_ENV: &str = "PDA_AGENT_CONFIG_DIR";

// ── Top-level config ──────────────────────────────────────────────

/// Top-level pda-agent configuration, loaded from `config.toml`.
///
/// Resolution order: `PDA_AGENT_CONFIG_DIR` env → `~/.pda-agent/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,
    /// API key for the selected provider. Overridden by `PDA_AGENT_API_KEY` or `API_KEY`.
    pub api_key: Option<String>,
    /// Base URL override for the provider API.
    pub api_url: Option<String>,
    /// `ollama`, `openai`, or `custom:<url>`.
    #[serde(default = "default_provider")]
    pub default_provider: String,
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_temperature")]
    pub default_temperature: f64,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub wellbeing: WellbeingConfig,

    #[serde(default)]
    pub ethics: EthicsConfig,

    #[serde(default)]
    pub sessions: SessionsConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_provider() -> String {
    "ollama".into()
}

fn default_model() -> String {
    "mistral".into()
}

fn default_temperature() -> f64 {
    0.7
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = default_config_dir().unwrap_or_else(|_| PathBuf::from(".pda-agent"));
        Self {
            config_path: config_dir.join("config.toml"),
            api_key: None,
            api_url: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            provider: ProviderConfig::default(),
            agent: AgentConfig::default(),
            wellbeing: WellbeingConfig::default(),
            ethics: EthicsConfig::default(),
            sessions: SessionsConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

// ── Provider ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Upper bound on one model call, in seconds.
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider_timeout_secs() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_provider_timeout_secs(),
        }
    }
}

// ── Agent ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Non-system messages kept per session. `0` disables trimming.
    #[serde(default = "default_max_history_messages")]
    pub max_history_messages: usize,
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.into()
}

fn default_max_history_messages() -> usize {
    50
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            max_history_messages: default_max_history_messages(),
        }
    }
}

// ── Wellbeing ────────────────────────────────────────────────────

/// Time-based limits. Clock times are local `HH:MM`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WellbeingConfig {
    #[serde(default = "default_max_session_minutes")]
    pub max_session_minutes: u32,
    #[serde(default = "default_max_messages_per_session")]
    pub max_messages_per_session: u32,
    #[serde(default = "default_true")]
    pub enforce_night_limit: bool,
    #[serde(default = "default_night_start")]
    pub night_start: String,
    #[serde(default = "default_night_end")]
    pub night_end: String,
    #[serde(default = "default_breakfast_time")]
    pub breakfast_time: String,
    #[serde(default = "default_lunch_time")]
    pub lunch_time: String,
    #[serde(default = "default_dinner_time")]
    pub dinner_time: String,
    #[serde(default = "default_meal_window_minutes")]
    pub meal_window_minutes: u32,
    #[serde(default = "default_break_interval_minutes")]
    pub break_interval_minutes: u32,
}

fn default_true() -> bool {
    true
}

fn default_max_session_minutes() -> u32 {
    240
}

fn default_max_messages_per_session() -> u32 {
    200
}

fn default_night_start() -> String {
    "23:00".into()
}

fn default_night_end() -> String {
    "07:00".into()
}

fn default_breakfast_time() -> String {
    "08:00".into()
}

fn default_lunch_time() -> String {
    "12:30".into()
}

fn default_dinner_time() -> String {
    "18:30".into()
}

fn default_meal_window_minutes() -> u32 {
    20
}

fn default_break_interval_minutes() -> u32 {
    45
}

impl Default for WellbeingConfig {
    fn default() -> Self {
        Self {
            max_session_minutes: default_max_session_minutes(),
            max_messages_per_session: default_max_messages_per_session(),
            enforce_night_limit: true,
            night_start: default_night_start(),
            night_end: default_night_end(),
            breakfast_time: default_breakfast_time(),
            lunch_time: default_lunch_time(),
            dinner_time: default_dinner_time(),
            meal_window_minutes: default_meal_window_minutes(),
            break_interval_minutes: default_break_interval_minutes(),
        }
    }
}

// ── Ethics ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EthicsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Built-in categories to skip, e.g. `["crypto"]`. Case-insensitive.
    #[serde(default)]
    pub disabled_categories: Vec<String>,
    /// Extra keyword rules, appended after the built-ins.
    #[serde(default)]
    pub rules: Vec<CustomEthicsRule>,
}

impl Default for EthicsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            disabled_categories: Vec::new(),
            rules: Vec::new(),
        }
    }
}

/// `[[ethics.rules]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomEthicsRule {
    pub category: String,
    pub keywords: Vec<String>,
    pub warning: String,
}

// ── Sessions ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Least-recently-used sessions are dropped beyond this count.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    /// Sessions idle longer than this are swept. `0` disables the sweep.
    #[serde(default = "default_idle_timeout_minutes")]
    pub idle_timeout_minutes: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_max_sessions() -> usize {
    1000
}

fn default_idle_timeout_minutes() -> u64 {
    720
}

fn default_sweep_interval_secs() -> u64 {
    60
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            max_sessions: default_max_sessions(),
            idle_timeout_minutes: default_idle_timeout_minutes(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

// ── Gateway ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_host")]
    pub host: String,
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    /// Model id reported by `/v1/models` and chat responses.
    #[serde(default = "default_gateway_model_id")]
    pub model_id: String,
    #[serde(default = "default_gateway_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_gateway_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_gateway_host() -> String {
    "0.0.0.0".into()
}

fn default_gateway_port() -> u16 {
    5000
}

fn default_gateway_model_id() -> String {
    "pda-agent".into()
}

fn default_gateway_request_timeout_secs() -> u64 {
    180
}

fn default_gateway_max_body_bytes() -> usize {
    1_048_576
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            model_id: default_gateway_model_id(),
            request_timeout_secs: default_gateway_request_timeout_secs(),
            max_body_bytes: default_gateway_max_body_bytes(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

fn default_config_dir() -> Result<PathBuf> {
    let home = UserDirs::new()
        .map(|u| u.home_dir().to_path_buf())
        .context("Could not find home directory")?;
    Ok(home.join(".pda-agent"))
}

/// `PDA_AGENT_CONFIG_DIR` (tilde-expanded) when set, else `~/.pda-agent`.
pub fn resolve_config_dir() -> Result<PathBuf> {
    match std::env::var(CONFIG_DIR_ENV) {
        Ok(dir) if !dir.trim().is_empty() => {
            Ok(PathBuf::from(shellexpand::tilde(dir.trim()).into_owned()))
        }
        _ => default_config_dir(),
    }
}

impl Config {
    pub async fn load_or_init() -> Result<Self> {
        let config_dir = resolve_config_dir()?;
        Self::load_or_init_from(&config_dir).await
    }

    /// Load `config.toml` from `config_dir`, writing defaults on first run.
    pub async fn load_or_init_from(config_dir: &Path) -> Result<Self> {
        let config_path = config_dir.join("config.toml");

        fs::create_dir_all(config_dir).await.with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let initialized = if config_path.exists() {
            false
        } else {
            let config = Config {
                config_path: config_path.clone(),
                ..Config::default()
            };
            config.save().await?;

            // May hold an API key later on
            #[cfg(unix)]
            {
                use std::{fs::Permissions, os::unix::fs::PermissionsExt};
                let _ = fs::set_permissions(&config_path, Permissions::from_mode(0o600)).await;
            }
            true
        };

        let contents = fs::read_to_string(&config_path)
            .await
            .context("Failed to read config file")?;
        let mut config: Config =
            toml::from_str(&contents).context("Failed to parse config file")?;
        config.config_path = config_path;

        config.apply_env_overrides();
        config.validate()?;
        tracing::info!(
            path = %config.config_path.display(),
            provider = %config.default_provider,
            model = %config.default_model,
            initialized,
            "Config loaded"
        );
        Ok(config)
    }

    /// Validate configuration values that would cause runtime failures.
    pub fn validate(&self) -> Result<()> {
        if self.default_provider.trim().is_empty() {
            anyhow::bail!("default_provider must not be empty");
        }
        if self.default_model.trim().is_empty() {
            anyhow::bail!("default_model must not be empty");
        }
        if !(0.0..=2.0).contains(&self.default_temperature) {
            anyhow::bail!(
                "default_temperature must be between 0.0 and 2.0, got {}",
                self.default_temperature
            );
        }
        if self.provider.timeout_secs == 0 {
            anyhow::bail!("provider.timeout_secs must be greater than 0");
        }

        // Wellbeing: parse the clock times the same way the guard will
        crate::wellbeing::WellbeingPolicy::from_config(&self.wellbeing)?;

        for rule in &self.ethics.rules {
            if rule.category.trim().is_empty() {
                anyhow::bail!("ethics.rules[].category must not be empty");
            }
            if rule.keywords.iter().all(|k| k.trim().is_empty()) {
                anyhow::bail!(
                    "ethics rule '{}' needs at least one non-empty keyword",
                    rule.category
                );
            }
        }

        if self.sessions.max_sessions == 0 {
            anyhow::bail!("sessions.max_sessions must be greater than 0");
        }
        if self.sessions.sweep_interval_secs == 0 {
            anyhow::bail!("sessions.sweep_interval_secs must be greater than 0");
        }

        if self.gateway.host.trim().is_empty() {
            anyhow::bail!("gateway.host must not be empty");
        }
        if self.gateway.model_id.trim().is_empty() {
            anyhow::bail!("gateway.model_id must not be empty");
        }
        if self.gateway.request_timeout_secs == 0 {
            anyhow::bail!("gateway.request_timeout_secs must be greater than 0");
        }
        if self.gateway.max_body_bytes == 0 {
            anyhow::bail!("gateway.max_body_bytes must be greater than 0");
        }

        Ok(())
    }

    /// Apply environment variable overrides to config
    pub fn apply_env_overrides(&mut self) {
        // API Key: PDA_AGENT_API_KEY or API_KEY (generic)
        if let Ok(key) = std::env::var("PDA_AGENT_API_KEY").or_else(|_| std::env::var("API_KEY")) {
            if !key.is_empty() {
                self.api_key = Some(key);
            }
        }

        if let Ok(url) = std::env::var("PDA_AGENT_API_URL") {
            if !url.is_empty() {
                self.api_url = Some(url);
            }
        }

        if let Ok(provider) = std::env::var("PDA_AGENT_PROVIDER") {
            if !provider.is_empty() {
                self.default_provider = provider;
            }
        }

        if let Ok(model) = std::env::var("PDA_AGENT_MODEL") {
            if !model.is_empty() {
                self.default_model = model;
            }
        }

        if let Ok(port_str) = std::env::var("PDA_AGENT_GATEWAY_PORT") {
            if let Ok(port) = port_str.parse::<u16>() {
                self.gateway.port = port;
            }
        }

        if let Ok(host) = std::env::var("PDA_AGENT_GATEWAY_HOST") {
            if !host.is_empty() {
                self.gateway.host = host;
            }
        }
    }

    /// Atomically write the config back to `config_path`.
    pub async fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;

        let parent_dir = self
            .config_path
            .parent()
            .context("Config path must have a parent directory")?;

        fs::create_dir_all(parent_dir).await.with_context(|| {
            format!(
                "Failed to create config directory: {}",
                parent_dir.display()
            )
        })?;

        let file_name = self
            .config_path
            .file_name()
            .and_then(|v| v.to_str())
            .unwrap_or("config.toml");
        let temp_path = parent_dir.join(format!(".{file_name}.tmp-{}", uuid::Uuid::new_v4()));

        let mut temp_file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to create temporary config file: {}",
                    temp_path.display()
                )
            })?;
        temp_file
            .write_all(toml_str.as_bytes())
            .await
            .context("Failed to write temporary config contents")?;
        temp_file
            .sync_all()
            .await
            .context("Failed to fsync temporary config file")?;
        drop(temp_file);

        if let Err(e) = fs::rename(&temp_path, &self.config_path).await {
            let _ = fs::remove_file(&temp_path).await;
            anyhow::bail!("Failed to atomically replace config file: {e}");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::{Mutex, MutexGuard};
    use tokio::test;

    // ── Defaults ─────────────────────────────────────────────

    #[test]
    async fn config_defaults() {
        let c = Config::default();
        assert_eq!(c.default_provider, "ollama");
        assert_eq!(c.default_model, "mistral");
        assert!((c.default_temperature - 0.7).abs() < f64::EPSILON);
        assert_eq!(c.provider.timeout_secs, 120);
        assert_eq!(c.agent.max_history_messages, 50);
        assert_eq!(c.sessions.max_sessions, 1000);
        assert_eq!(c.gateway.host, "0.0.0.0");
        assert_eq!(c.gateway.port, 5000);
        assert_eq!(c.gateway.model_id, "pda-agent");
        assert!(c.ethics.enabled);
        assert!(c.config_path.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    async fn default_config_validates() {
        Config::default().validate().unwrap();
    }

    #[test]
    async fn empty_toml_uses_defaults() {
        let parsed: Config = toml::from_str("").unwrap();
        assert_eq!(parsed.default_provider, "ollama");
        assert_eq!(parsed.wellbeing.night_start, "23:00");
        assert_eq!(parsed.wellbeing.break_interval_minutes, 45);
        assert_eq!(parsed.gateway.max_body_bytes, 1_048_576);
    }

    #[test]
    async fn partial_sections_keep_other_defaults() {
        let raw = r#"
default_model = "llama3"

[wellbeing]
max_messages_per_session = 10
night_start = "22:30"

[[ethics.rules]]
category = "alcohol"
keywords = ["wodka", "bier"]
warning = "Drink met mate."
"#;
        let parsed: Config = toml::from_str(raw).unwrap();
        assert_eq!(parsed.default_model, "llama3");
        assert_eq!(parsed.wellbeing.max_messages_per_session, 10);
        assert_eq!(parsed.wellbeing.night_start, "22:30");
        assert_eq!(parsed.wellbeing.night_end, "07:00");
        assert_eq!(parsed.ethics.rules.len(), 1);
        assert_eq!(parsed.ethics.rules[0].keywords, vec!["wodka", "bier"]);
        parsed.validate().unwrap();
    }

    // ── Validation ───────────────────────────────────────────

    #[test]
    async fn validate_rejects_empty_host() {
        let mut c = Config::default();
        c.gateway.host = "  ".into();
        let err = c.validate().unwrap_err().to_string();
        assert!(err.contains("gateway.host"));
    }

    #[test]
    async fn validate_rejects_out_of_range_temperature() {
        let mut c = Config::default();
        c.default_temperature = 2.5;
        assert!(c.validate().is_err());
    }

    #[test]
    async fn validate_rejects_bad_clock_time() {
        let mut c = Config::default();
        c.wellbeing.dinner_time = "25:61".into();
        let err = c.validate().unwrap_err().to_string();
        assert!(err.contains("dinner_time"), "{err}");
    }

    #[test]
    async fn validate_rejects_zero_limits() {
        let mut c = Config::default();
        c.sessions.max_sessions = 0;
        assert!(c.validate().is_err());

        let mut c = Config::default();
        c.wellbeing.max_session_minutes = 0;
        assert!(c.validate().is_err());

        let mut c = Config::default();
        c.provider.timeout_secs = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    async fn validate_rejects_keywordless_ethics_rule() {
        let mut c = Config::default();
        c.ethics.rules.push(CustomEthicsRule {
            category: "leeg".into(),
            keywords: vec![" ".into()],
            warning: "x".into(),
        });
        assert!(c.validate().is_err());
    }

    // ── Load / save ──────────────────────────────────────────

    #[test]
    async fn load_or_init_writes_defaults_on_first_run() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let tmp = tempfile::tempdir().unwrap();

        let config = Config::load_or_init_from(tmp.path()).await.unwrap();
        assert_eq!(config.config_path, tmp.path().join("config.toml"));
        assert!(config.config_path.exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&config.config_path)
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    async fn save_then_load_preserves_changes() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let tmp = tempfile::tempdir().unwrap();

        let mut config = Config::load_or_init_from(tmp.path()).await.unwrap();
        config.default_model = "llama3".into();
        config.wellbeing.lunch_time = "13:00".into();
        config.save().await.unwrap();

        let reloaded = Config::load_or_init_from(tmp.path()).await.unwrap();
        assert_eq!(reloaded.default_model, "llama3");
        assert_eq!(reloaded.wellbeing.lunch_time, "13:00");
    }

    #[test]
    async fn load_rejects_malformed_toml() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("config.toml"), "default_model = [").unwrap();

        let err = Config::load_or_init_from(tmp.path()).await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    // ── Env override helpers ─────────────────────────────────

    async fn env_override_lock() -> MutexGuard<'static, ()> {
        static ENV_OVERRIDE_TEST_LOCK: Mutex<()> = Mutex::const_new(());
        ENV_OVERRIDE_TEST_LOCK.lock().await
    }

    fn clear_env_test_vars() {
        for key in [
            "PDA_AGENT_API_KEY",
            "API_KEY",
            "PDA_AGENT_API_URL",
            "PDA_AGENT_PROVIDER",
            "PDA_AGENT_MODEL",
            "PDA_AGENT_GATEWAY_PORT",
            "PDA_AGENT_GATEWAY_HOST",
            CONFIG_DIR_ENV,
        ] {
            std::env::remove_var(key);
        }
    }

    // ── Env override tests ───────────────────────────────────

    #[test]
    async fn env_override_api_key_falls_back_to_generic() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let mut config = Config::default();

        std::env::set_var("API_KEY", "generic-key");
        config.apply_env_overrides();
        assert_eq!(config.api_key.as_deref(), Some("generic-key"));

        std::env::set_var("PDA_AGENT_API_KEY", "specific-key");
        config.apply_env_overrides();
        assert_eq!(config.api_key.as_deref(), Some("specific-key"));

        clear_env_test_vars();
    }

    #[test]
    async fn env_override_provider_model_and_gateway() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let mut config = Config::default();

        std::env::set_var("PDA_AGENT_PROVIDER", "openai");
        std::env::set_var("PDA_AGENT_MODEL", "gpt-4o-mini");
        std::env::set_var("PDA_AGENT_GATEWAY_HOST", "127.0.0.1");
        std::env::set_var("PDA_AGENT_GATEWAY_PORT", "8088");
        config.apply_env_overrides();

        assert_eq!(config.default_provider, "openai");
        assert_eq!(config.default_model, "gpt-4o-mini");
        assert_eq!(config.gateway.host, "127.0.0.1");
        assert_eq!(config.gateway.port, 8088);

        clear_env_test_vars();
    }

    #[test]
    async fn env_override_invalid_port_ignored() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let mut config = Config::default();

        std::env::set_var("PDA_AGENT_GATEWAY_PORT", "not-a-port");
        config.apply_env_overrides();
        assert_eq!(config.gateway.port, 5000);

        clear_env_test_vars();
    }

    #[test]
    async fn config_dir_env_expands_tilde() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();

        std::env::set_var(CONFIG_DIR_ENV, "/tmp/pda-agent-test");
        assert_eq!(
            resolve_config_dir().unwrap(),
            PathBuf::from("/tmp/pda-agent-test")
        );

        std::env::set_var(CONFIG_DIR_ENV, "~/pda");
        let resolved = resolve_config_dir().unwrap();
        assert!(!resolved.to_string_lossy().starts_with('~'));
        assert!(resolved.ends_with("pda"));

        clear_env_test_vars();
    }
}

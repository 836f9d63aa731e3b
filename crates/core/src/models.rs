//! # Atlas Models
//!
//! Typed settings for the generative backend, the pipeline and the recipe
//! search collaborator. Settings are read once at startup and validated up
//! front; anything missing that a client needs is a configuration error
//! rather than a silent fallback.
//!
//! ## Example
//! ```rust,ignore
//! use atlas_core::models::{Credentials, Settings};
//!
//! let settings = Settings::load(&Settings::default_path())?;
//! settings.load_env_file();
//! let credentials = Credentials::from_env(&settings.env.available_keys);
//! let profile = settings.profile("diversifier")?;
//! ```

use crate::error::{ServiceError, ServiceResult};
use crate::state::io::get_data_path;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Key name used when the settings do not name one
pub const DEFAULT_KEY_NAME: &str = "AI_API_KEY";

/// Placeholder substituted with the resolved API key inside header values
pub const KEY_PLACEHOLDER: &str = "{AI_API_KEY}";

/// Agent profile used by the diversifier stage
pub const DIVERSIFIER_AGENT: &str = "diversifier";

/// Agent profile used by the enrichment stage
pub const RECIPES_AGENT: &str = "recipes";

/// Root settings document
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub agents: AgentSettings,
    #[serde(default)]
    pub env: EnvSettings,
    #[serde(default)]
    pub ai_api: AiApiSettings,
    #[serde(default)]
    pub pipeline: PipelineSettings,
    #[serde(default)]
    pub recipe_search: RecipeSearchSettings,
    /// Directory the settings were loaded from; relative paths resolve against it
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentSettings {
    /// Profiles that clients may be built for
    #[serde(default)]
    pub available_agents: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvSettings {
    /// Dotenv file, relative to the settings directory
    #[serde(default = "default_env_path")]
    pub path: PathBuf,
    /// Environment variable names that may hold API keys
    #[serde(default)]
    pub available_keys: Vec<String>,
}

impl Default for EnvSettings {
    fn default() -> Self {
        Self {
            path: default_env_path(),
            available_keys: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiApiSettings {
    #[serde(default)]
    pub urls: ApiUrls,
    /// Header templates; `{AI_API_KEY}` is replaced with the resolved key
    #[serde(default)]
    pub default_headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: BodySettings,
    /// Which entry of `env.available_keys` authenticates completion calls
    #[serde(default = "default_key_name")]
    pub key_name: String,
    /// Per-request timeout for completion calls
    #[serde(default = "default_completion_timeout")]
    pub timeout_secs: u64,
}

impl Default for AiApiSettings {
    fn default() -> Self {
        Self {
            urls: ApiUrls::default(),
            default_headers: BTreeMap::new(),
            body: BodySettings::default(),
            key_name: default_key_name(),
            timeout_secs: default_completion_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiUrls {
    #[serde(default)]
    pub base_api_url: String,
    #[serde(default = "default_completion_endpoint")]
    pub chat_completion_endpoint: String,
}

impl Default for ApiUrls {
    fn default() -> Self {
        Self {
            base_api_url: String::new(),
            chat_completion_endpoint: default_completion_endpoint(),
        }
    }
}

/// Request-shape configuration: one default body plus per-profile overlays
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BodySettings {
    #[serde(default)]
    pub default: Map<String, Value>,
    #[serde(default)]
    pub specific: HashMap<String, BodyProfile>,
}

/// Profile-specific request fields
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct BodyProfile {
    /// Top-level fields copied over the default body (model, temperature, ...)
    #[serde(default)]
    pub raw: Map<String, Value>,
    /// Conversational roles that must be present in `messages`
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Batch size and look-ahead cap for the enrichment stage
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineSettings {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_candidates: default_max_candidates(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeSearchSettings {
    #[serde(default = "default_search_url")]
    pub base_url: String,
    /// Environment variable names forming the key rotation pool
    #[serde(default)]
    pub key_names: Vec<String>,
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

impl Default for RecipeSearchSettings {
    fn default() -> Self {
        Self {
            base_url: default_search_url(),
            key_names: Vec::new(),
            timeout_secs: default_search_timeout(),
        }
    }
}

fn default_env_path() -> PathBuf {
    PathBuf::from(".env")
}

fn default_key_name() -> String {
    DEFAULT_KEY_NAME.to_string()
}

fn default_completion_timeout() -> u64 {
    180
}

fn default_completion_endpoint() -> String {
    "/chat/completions".to_string()
}

fn default_batch_size() -> usize {
    5
}

fn default_max_candidates() -> usize {
    10
}

fn default_search_url() -> String {
    "https://www.themealdb.com/api/json/v1".to_string()
}

fn default_search_timeout() -> u64 {
    15
}

impl Settings {
    /// Settings file location (`ATLAS_SETTINGS_PATH` overrides `<data>/settings.json`)
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var("ATLAS_SETTINGS_PATH") {
            return PathBuf::from(path);
        }
        get_data_path().join("settings.json")
    }

    /// Parse and validate a settings document
    pub fn from_json(content: &str) -> ServiceResult<Self> {
        let settings: Settings = serde_json::from_str(content)
            .map_err(|e| ServiceError::Configuration(format!("invalid settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read, parse and validate the settings file at `path`
    pub fn load(path: &Path) -> ServiceResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ServiceError::Configuration(format!("cannot read settings {:?}: {}", path, e))
        })?;
        let mut settings = Self::from_json(&content)?;
        settings.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(settings)
    }

    /// Check everything the clients rely on
    pub fn validate(&self) -> ServiceResult<()> {
        if self.ai_api.urls.base_api_url.trim().is_empty() {
            return Err(ServiceError::Configuration(
                "ai_api.urls.base_api_url is required".to_string(),
            ));
        }
        if self.pipeline.batch_size == 0 {
            return Err(ServiceError::Configuration(
                "pipeline.batch_size must be at least 1".to_string(),
            ));
        }
        for agent in &self.agents.available_agents {
            if !self.ai_api.body.specific.contains_key(agent) {
                tracing::warn!(agent = %agent, "Agent is available but has no body profile");
            }
        }
        Ok(())
    }

    /// Body profile for an agent; the agent must be listed as available
    pub fn profile(&self, agent: &str) -> ServiceResult<&BodyProfile> {
        if !self.agents.available_agents.iter().any(|a| a == agent) {
            return Err(ServiceError::Configuration(format!(
                "agent '{}' not found in available_agents",
                agent
            )));
        }
        self.ai_api.body.specific.get(agent).ok_or_else(|| {
            ServiceError::Configuration(format!("no body profile for agent '{}'", agent))
        })
    }

    /// Full completion endpoint URL
    pub fn completion_url(&self) -> String {
        let base = self.ai_api.urls.base_api_url.trim_end_matches('/');
        let endpoint = self.ai_api.urls.chat_completion_endpoint.trim_start_matches('/');
        format!("{}/{}", base, endpoint)
    }

    /// Dotenv file location
    pub fn env_file_path(&self) -> PathBuf {
        self.base_dir.join(&self.env.path)
    }

    /// Load the dotenv file into the process environment.
    /// A missing or unreadable file only produces a warning.
    pub fn load_env_file(&self) {
        let path = self.env_file_path();
        if let Err(e) = dotenvy::from_path(&path) {
            tracing::warn!(path = ?path, error = %e, "Failed to load env file; using process environment");
        }
    }
}

/// Snapshot of API keys taken from the environment
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    available: Vec<String>,
    values: HashMap<String, String>,
}

impl Credentials {
    /// Build from explicit values (used by tests and embedders)
    pub fn new(available: Vec<String>, values: HashMap<String, String>) -> Self {
        Self { available, values }
    }

    /// Read every available key from the process environment
    pub fn from_env(available_keys: &[String]) -> Self {
        let values = available_keys
            .iter()
            .filter_map(|name| std::env::var(name).ok().map(|v| (name.clone(), v)))
            .collect();
        Self {
            available: available_keys.to_vec(),
            values,
        }
    }

    /// Resolve a named key. An unknown name falls back to the first available
    /// key with a warning; no configured keys yields an empty key.
    pub fn resolve(&self, key_name: &str) -> String {
        let name = if self.available.iter().any(|k| k == key_name) {
            key_name
        } else {
            match self.available.first() {
                Some(first) => {
                    tracing::warn!(
                        requested = %key_name,
                        fallback = %first,
                        "Key not found in available_keys; using first available key"
                    );
                    first.as_str()
                }
                None => {
                    tracing::warn!(requested = %key_name, "No API keys configured; using empty key");
                    return String::new();
                }
            }
        };

        match self.values.get(name) {
            Some(value) => value.clone(),
            None => {
                tracing::warn!(key = %name, "API key not set in environment; using empty key");
                String::new()
            }
        }
    }

    /// Look up a key value without any fallback
    pub fn get(&self, key_name: &str) -> Option<&str> {
        self.values.get(key_name).map(String::as_str)
    }
}

/// Render header templates with the resolved key
pub fn render_headers(templates: &BTreeMap<String, String>, api_key: &str) -> Vec<(String, String)> {
    templates
        .iter()
        .map(|(name, value)| (name.clone(), value.replace(KEY_PLACEHOLDER, api_key)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETTINGS: &str = r#"{
        "agents": { "available_agents": ["diversifier", "recipes"] },
        "env": { "path": "env", "available_keys": ["AI_API_KEY", "BACKUP_KEY"] },
        "ai_api": {
            "urls": { "base_api_url": "https://llm.example.com/v1/", "chat_completion_endpoint": "/chat/completions" },
            "default_headers": { "Authorization": "Bearer {AI_API_KEY}", "Content-Type": "application/json" },
            "body": {
                "default": { "model": "base", "messages": [{ "role": "system", "content": "" }] },
                "specific": {
                    "diversifier": { "raw": { "model": "big", "temperature": 0.7 }, "roles": ["system", "user"] },
                    "recipes": { "raw": { "model": "fast" } }
                }
            }
        }
    }"#;

    #[test]
    fn test_parse_with_defaults() {
        let settings = Settings::from_json(SETTINGS).unwrap();
        assert_eq!(settings.pipeline, PipelineSettings::default());
        assert_eq!(settings.pipeline.batch_size, 5);
        assert_eq!(settings.pipeline.max_candidates, 10);
        assert_eq!(settings.ai_api.key_name, DEFAULT_KEY_NAME);
        assert!(settings.recipe_search.base_url.contains("themealdb"));
    }

    #[test]
    fn test_completion_url_joins_cleanly() {
        let settings = Settings::from_json(SETTINGS).unwrap();
        assert_eq!(
            settings.completion_url(),
            "https://llm.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_missing_base_url_is_configuration_error() {
        let err = Settings::from_json(r#"{ "ai_api": {} }"#).unwrap_err();
        assert!(matches!(err, ServiceError::Configuration(_)));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let json = r#"{
            "ai_api": { "urls": { "base_api_url": "http://x" } },
            "pipeline": { "batch_size": 0 }
        }"#;
        assert!(matches!(
            Settings::from_json(json),
            Err(ServiceError::Configuration(_))
        ));
    }

    #[test]
    fn test_unknown_agent_profile() {
        let settings = Settings::from_json(SETTINGS).unwrap();
        assert!(settings.profile("diversifier").is_ok());
        assert!(matches!(
            settings.profile("critic"),
            Err(ServiceError::Configuration(_))
        ));
    }

    #[test]
    fn test_credentials_fallback_to_first_key() {
        let mut values = HashMap::new();
        values.insert("AI_API_KEY".to_string(), "primary".to_string());
        values.insert("BACKUP_KEY".to_string(), "backup".to_string());
        let creds = Credentials::new(
            vec!["AI_API_KEY".to_string(), "BACKUP_KEY".to_string()],
            values,
        );

        assert_eq!(creds.resolve("BACKUP_KEY"), "backup");
        assert_eq!(creds.resolve("UNKNOWN_KEY"), "primary");
    }

    #[test]
    fn test_credentials_empty_pool() {
        let creds = Credentials::default();
        assert_eq!(creds.resolve("AI_API_KEY"), "");
    }

    #[test]
    fn test_render_headers_substitutes_key() {
        let settings = Settings::from_json(SETTINGS).unwrap();
        let headers = render_headers(&settings.ai_api.default_headers, "sk-123");
        assert!(headers.contains(&("Authorization".to_string(), "Bearer sk-123".to_string())));
        assert!(headers.contains(&("Content-Type".to_string(), "application/json".to_string())));
    }
}

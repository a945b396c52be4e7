//! Server configuration from TOML or environment

use anyhow::Context;
use krishisearch::{KnowledgeBase, SearchConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;

/// Default host address
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default port number
pub const DEFAULT_PORT: u16 = 5000;

/// Default CORS origins (localhost for development)
pub const DEFAULT_CORS_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://localhost:5173",
    "http://127.0.0.1:3000",
    "http://127.0.0.1:5173",
];

/// Maximum number of WebSocket connections
pub const MAX_WS_CONNECTIONS: usize = 100;

/// WebSocket heartbeat interval in seconds
pub const WS_HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Default IBM Cloud region
pub const DEFAULT_REGION: &str = "us-south";

/// Default Granite model
pub const DEFAULT_MODEL_ID: &str = "ibm/granite-3-8b-instruct";

/// IAM token endpoint
pub const DEFAULT_IAM_URL: &str = "https://iam.cloud.ibm.com/identity/token";

/// Generation request timeout in seconds
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 30;

/// Token request timeout in seconds
pub const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 10;

/// Lifetime of a cached answer in seconds
pub const DEFAULT_CACHE_TTL_SECS: u64 = 1800;

/// Maximum number of cached answers
pub const DEFAULT_CACHE_CAPACITY: u64 = 1000;

/// Server configuration loaded from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Allowed CORS origins
    pub cors_origins: Vec<String>,

    /// Knowledge base JSON file; the built-in one when unset
    pub knowledge_path: Option<String>,

    /// Kisan Call Centre Q&A JSON file; the built-in sample when unset
    pub corpus_path: Option<String>,

    /// Search configuration TOML file; the built-in one when unset
    pub search_config_path: Option<String>,

    /// Maximum WebSocket connections
    pub max_ws_connections: usize,

    /// WebSocket heartbeat interval in seconds
    pub ws_heartbeat_interval_secs: u64,

    /// Enable request logging
    pub enable_logging: bool,

    /// Log level for tracing
    pub log_level: String,

    /// Language model settings
    pub llm: LlmConfig,
}

/// IBM Watsonx settings
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// IBM Cloud API key
    pub api_key: String,

    /// Watsonx project id
    pub project_id: String,

    /// IBM Cloud region (e.g. `us-south`)
    pub region: String,

    /// Foundation model id
    pub model_id: String,

    /// IAM token endpoint
    pub iam_url: String,

    /// Overrides the region-derived Watsonx endpoint
    pub base_url: Option<String>,

    /// Generation request timeout in seconds
    pub timeout_secs: u64,

    /// Token request timeout in seconds
    pub auth_timeout_secs: u64,

    /// Cached answer lifetime in seconds
    pub cache_ttl_secs: u64,

    /// Maximum cached answers
    pub cache_capacity: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            cors_origins: DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect(),
            knowledge_path: None,
            corpus_path: None,
            search_config_path: None,
            max_ws_connections: MAX_WS_CONNECTIONS,
            ws_heartbeat_interval_secs: WS_HEARTBEAT_INTERVAL_SECS,
            enable_logging: true,
            log_level: "info".to_string(),
            llm: LlmConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            project_id: String::new(),
            region: DEFAULT_REGION.to_string(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            iam_url: DEFAULT_IAM_URL.to_string(),
            base_url: None,
            timeout_secs: DEFAULT_LLM_TIMEOUT_SECS,
            auth_timeout_secs: DEFAULT_AUTH_TIMEOUT_SECS,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

// Keep the API key out of logs
impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &if self.api_key.is_empty() { "" } else { "***" })
            .field("project_id", &self.project_id)
            .field("region", &self.region)
            .field("model_id", &self.model_id)
            .field("iam_url", &self.iam_url)
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("auth_timeout_secs", &self.auth_timeout_secs)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("cache_capacity", &self.cache_capacity)
            .finish()
    }
}

impl LlmConfig {
    /// Whether credentials are present
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.project_id.is_empty()
    }

    /// Watsonx endpoint, e.g. `https://us-south.ml.cloud.ibm.com`
    pub fn endpoint(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}.ml.cloud.ibm.com", self.region),
        }
    }
}

impl ServerConfig {
    /// Load a TOML file over the defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config {}: {}", path.display(), e))?;
        Self::from_toml_str(&content)
    }

    /// Parse TOML; missing keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("Invalid config: {}", e))
    }

    /// Load config from environment variables with fallback to defaults
    ///
    /// Environment variables:
    /// - `KRISHI_HOST` - Server host
    /// - `KRISHI_PORT` - Server port
    /// - `KRISHI_KNOWLEDGE_PATH` - Knowledge base JSON
    /// - `KRISHI_CORPUS_PATH` - Q&A corpus JSON
    /// - `KRISHI_SEARCH_CONFIG` - Search configuration TOML
    /// - `KRISHI_LOG_LEVEL` - Log level (trace, debug, info, warn, error)
    /// - `WATSONX_API_KEY`, `WATSONX_PROJECT_ID`, `WATSONX_REGION`,
    ///   `WATSONX_MODEL_ID`, `WATSONX_URL` - LLM settings
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields from the process environment
    pub fn apply_env(&mut self) {
        self.apply_vars(|name| std::env::var(name).ok());
    }

    /// Override fields from any variable lookup
    pub fn apply_vars<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("KRISHI_HOST") {
            self.host = host;
        }

        if let Some(port) = lookup("KRISHI_PORT").and_then(|p| p.parse::<u16>().ok()) {
            self.port = port;
        }

        if let Some(path) = lookup("KRISHI_KNOWLEDGE_PATH") {
            self.knowledge_path = Some(path);
        }

        if let Some(path) = lookup("KRISHI_CORPUS_PATH") {
            self.corpus_path = Some(path);
        }

        if let Some(path) = lookup("KRISHI_SEARCH_CONFIG") {
            self.search_config_path = Some(path);
        }

        if let Some(log_level) = lookup("KRISHI_LOG_LEVEL") {
            self.log_level = log_level;
        }

        if let Some(key) = lookup("WATSONX_API_KEY") {
            self.llm.api_key = key;
        }

        if let Some(project) = lookup("WATSONX_PROJECT_ID") {
            self.llm.project_id = project;
        }

        if let Some(region) = lookup("WATSONX_REGION") {
            self.llm.region = region;
        }

        if let Some(model) = lookup("WATSONX_MODEL_ID") {
            self.llm.model_id = model;
        }

        if let Some(url) = lookup("WATSONX_URL") {
            self.llm.base_url = Some(url);
        }
    }

    /// Knowledge base from `knowledge_path`, or the built-in one
    pub fn load_knowledge_base(&self) -> anyhow::Result<KnowledgeBase> {
        match &self.knowledge_path {
            Some(path) => KnowledgeBase::load(path)
                .with_context(|| format!("Failed to load knowledge base {}", path)),
            None => KnowledgeBase::builtin().context("Built-in knowledge base is invalid"),
        }
    }

    /// Search configuration from `search_config_path`, or the built-in one
    pub fn load_search_config(&self) -> anyhow::Result<SearchConfig> {
        match &self.search_config_path {
            Some(path) => SearchConfig::load(path)
                .with_context(|| format!("Failed to load search config {}", path)),
            None => SearchConfig::builtin().context("Built-in search config is invalid"),
        }
    }

    /// Get the socket address for the server
    ///
    /// # Returns
    ///
    /// `Result<SocketAddr, String>` - Parsed address or error message
    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| format!("Invalid address: {}", e))
    }

    /// Get the full server URL (e.g., "http://127.0.0.1:5000")
    #[must_use]
    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Get the WebSocket URL (e.g., "ws://127.0.0.1:5000/ws")
    #[must_use]
    pub fn websocket_url(&self) -> String {
        format!("ws://{}:{}/ws", self.host, self.port)
    }

    /// Validate configuration
    ///
    /// # Returns
    ///
    /// `Result<(), String>` - Ok if valid, error otherwise
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("Port cannot be zero".to_string());
        }

        if self.host.is_empty() {
            return Err("Host cannot be empty".to_string());
        }

        if self.max_ws_connections == 0 {
            return Err("Max WebSocket connections must be greater than zero".to_string());
        }

        if self.ws_heartbeat_interval_secs == 0 {
            return Err("Heartbeat interval must be greater than zero".to_string());
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.log_level
                ));
            }
        }

        if self.llm.timeout_secs == 0 || self.llm.auth_timeout_secs == 0 {
            return Err("LLM timeouts must be greater than zero".to_string());
        }

        if self.llm.region.is_empty() && self.llm.base_url.is_none() {
            return Err("LLM region cannot be empty".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(!config.cors_origins.is_empty());
        assert!(config.knowledge_path.is_none());
        assert_eq!(config.max_ws_connections, MAX_WS_CONNECTIONS);
        assert_eq!(config.ws_heartbeat_interval_secs, WS_HEARTBEAT_INTERVAL_SECS);
        assert!(config.enable_logging);
        assert_eq!(config.log_level, "info");
        assert!(!config.llm.is_configured());
        assert_eq!(config.llm.model_id, DEFAULT_MODEL_ID);
    }

    #[test]
    fn test_config_from_vars() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("KRISHI_HOST", "0.0.0.0"),
            ("KRISHI_PORT", "8080"),
            ("KRISHI_KNOWLEDGE_PATH", "/tmp/kb.json"),
            ("KRISHI_LOG_LEVEL", "debug"),
            ("WATSONX_API_KEY", "key"),
            ("WATSONX_PROJECT_ID", "project"),
            ("WATSONX_REGION", "eu-de"),
        ]);

        let mut config = ServerConfig::default();
        config.apply_vars(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.knowledge_path.as_deref(), Some("/tmp/kb.json"));
        assert_eq!(config.log_level, "debug");
        assert!(config.llm.is_configured());
        assert_eq!(config.llm.endpoint(), "https://eu-de.ml.cloud.ibm.com");
    }

    #[test]
    fn test_unparseable_port_ignored() {
        let mut config = ServerConfig::default();
        config.apply_vars(|name| (name == "KRISHI_PORT").then(|| "not-a-port".to_string()));
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn test_config_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            port = 9000
            knowledge_path = "kb.json"

            [llm]
            region = "jp-tok"
            cache_ttl_secs = 60
            "#
        )
        .unwrap();

        let config = ServerConfig::load(file.path()).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.knowledge_path.as_deref(), Some("kb.json"));
        assert_eq!(config.llm.region, "jp-tok");
        assert_eq!(config.llm.cache_ttl_secs, 60);
        assert_eq!(config.llm.timeout_secs, DEFAULT_LLM_TIMEOUT_SECS);
    }

    #[test]
    fn test_config_load_missing_file() {
        assert!(ServerConfig::load("/nonexistent/krishi.toml").is_err());
    }

    #[test]
    fn test_config_socket_addr() {
        let config = ServerConfig::default();
        let addr = config.socket_addr().expect("Default socket address should be valid");
        assert_eq!(addr.ip(), std::net::Ipv4Addr::new(127, 0, 0, 1));
        assert_eq!(addr.port(), 5000);
    }

    #[test]
    fn test_config_urls() {
        let config = ServerConfig {
            host: "localhost".to_string(),
            port: 3000,
            ..Default::default()
        };
        assert_eq!(config.server_url(), "http://localhost:3000");
        assert_eq!(config.websocket_url(), "ws://localhost:3000/ws");
    }

    #[test]
    fn test_endpoint_override() {
        let llm = LlmConfig {
            base_url: Some("http://127.0.0.1:9999/".to_string()),
            ..Default::default()
        };
        assert_eq!(llm.endpoint(), "http://127.0.0.1:9999");
    }

    #[test]
    fn test_debug_hides_api_key() {
        let llm = LlmConfig {
            api_key: "secret-key".to_string(),
            ..Default::default()
        };
        assert!(!format!("{:?}", llm).contains("secret-key"));
    }

    #[test]
    fn test_config_validate() {
        assert!(ServerConfig::default().validate().is_ok());

        let invalid = [
            ServerConfig { port: 0, ..Default::default() },
            ServerConfig { host: String::new(), ..Default::default() },
            ServerConfig { max_ws_connections: 0, ..Default::default() },
            ServerConfig { log_level: "invalid".to_string(), ..Default::default() },
        ];
        for config in invalid {
            assert!(config.validate().is_err());
        }
    }
}

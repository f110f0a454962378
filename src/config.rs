use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings for the OpenAI-compatible oracle
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OracleConfig {
    /// OpenAI API endpoint
    #[serde(default = "default_api_endpoint")]
    pub api_endpoint: String,
    /// Environment variable name containing the API key
    #[serde(default = "default_env_var_api_key")]
    pub env_var_api_key: String,
    /// Model used for extraction and labeling
    #[serde(default = "default_model")]
    pub model: String,
    /// Sampling temperature (0.0 to 1.0)
    #[serde(default)]
    pub temperature: f64,
    /// Maximum tokens per response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Rate limit for API requests per second, 0 disables throttling
    #[serde(default = "default_rate_limit")]
    pub rate_limit_rps: f64,
    /// Seconds before a single call is abandoned
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            api_endpoint: default_api_endpoint(),
            env_var_api_key: default_env_var_api_key(),
            model: default_model(),
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            rate_limit_rps: default_rate_limit(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// How labeling treats answers outside the discovered vocabularies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VocabularyPolicy {
    /// Keep the oracle's answer verbatim and log the mismatch
    #[default]
    Permissive,
    /// Drop unknown themes and degrade records with an unknown topic
    Strict,
}

fn default_api_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_env_var_api_key() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_rate_limit() -> f64 {
    10.0
}

fn default_timeout_secs() -> u64 {
    60
}

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// JSON-lines file with one conversation per line
    pub data_file: PathBuf,
    /// Directory where results are stored; nothing is written when unset
    #[serde(default)]
    pub out_dir: Option<PathBuf>,
    /// Previously stored result to report on instead of running the analysis
    #[serde(default)]
    pub analytics_file: Option<PathBuf>,
    #[serde(default)]
    pub vocabulary_policy: VocabularyPolicy,
    #[serde(default)]
    pub oracle: OracleConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_parsing() {
        let toml_content = r#"
data_file = "./data/dataset.jsonl"
out_dir = "./out"
vocabulary_policy = "strict"

[oracle]
api_endpoint = "http://localhost:8080/v1"
env_var_api_key = "LOCAL_KEY"
model = "gpt-4o"
temperature = 0.2
max_tokens = 200
rate_limit_rps = 5.0
timeout_secs = 15
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", toml_content).unwrap();

        let config = Config::from_file(temp_file.path()).unwrap();
        assert_eq!(config.data_file, PathBuf::from("./data/dataset.jsonl"));
        assert_eq!(config.out_dir, Some(PathBuf::from("./out")));
        assert_eq!(config.analytics_file, None);
        assert_eq!(config.vocabulary_policy, VocabularyPolicy::Strict);
        assert_eq!(config.oracle.api_endpoint, "http://localhost:8080/v1");
        assert_eq!(config.oracle.env_var_api_key, "LOCAL_KEY");
        assert_eq!(config.oracle.model, "gpt-4o");
        assert_eq!(config.oracle.temperature, 0.2);
        assert_eq!(config.oracle.max_tokens, 200);
        assert_eq!(config.oracle.rate_limit_rps, 5.0);
        assert_eq!(config.oracle.timeout_secs, 15);
    }

    #[test]
    fn test_config_defaults() {
        let toml_content = r#"
data_file = "conversations.jsonl"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", toml_content).unwrap();

        let config = Config::from_file(temp_file.path()).unwrap();
        assert_eq!(config.out_dir, None);
        assert_eq!(config.vocabulary_policy, VocabularyPolicy::Permissive);
        assert_eq!(config.oracle.api_endpoint, "https://api.openai.com/v1");
        assert_eq!(config.oracle.env_var_api_key, "OPENAI_API_KEY");
        assert_eq!(config.oracle.model, "gpt-4o-mini");
        assert_eq!(config.oracle.temperature, 0.0);
        assert_eq!(config.oracle.max_tokens, 1000);
        assert_eq!(config.oracle.rate_limit_rps, 10.0);
        assert_eq!(config.oracle.timeout_secs, 60);
    }

    #[test]
    fn test_config_partial_oracle_table() {
        let toml_content = r#"
data_file = "conversations.jsonl"
analytics_file = "out/result.json"

[oracle]
model = "gpt-4.1-mini"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", toml_content).unwrap();

        let config = Config::from_file(temp_file.path()).unwrap();
        assert_eq!(config.analytics_file, Some(PathBuf::from("out/result.json")));
        assert_eq!(config.oracle.model, "gpt-4.1-mini");
        assert_eq!(config.oracle.max_tokens, 1000);
    }

    #[test]
    fn test_config_missing_file() {
        let err = Config::from_file(Path::new("/nonexistent/insights.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_config_rejects_unknown_policy() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "data_file = \"a.jsonl\"\nvocabulary_policy = \"lenient\"\n").unwrap();

        let err = Config::from_file(temp_file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse TOML config"));
    }
}

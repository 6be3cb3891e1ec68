use crate::error::ConfigError;
use crate::heuristics::FilterRules;
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;
use std::{fs, path::Path};

/// File looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_PATH: &str = "billing-extract.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerSection,
    pub llm: LlmSection,
    pub filter: FilterSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: String,
    pub max_upload_bytes: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

impl ServerSection {
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .parse()
            .map_err(|_| ConfigError::InvalidBind(self.bind.clone()))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    pub timeout_secs: u64,
    /// Ask the endpoint for `response_format: json_object`.
    pub json_mode: bool,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.0,
            timeout_secs: 120,
            json_mode: true,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

impl LlmSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// A zero timeout would fail every model call.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }

    /// Read the API key from the process environment.
    pub fn api_key(&self) -> Result<String, ConfigError> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(ConfigError::MissingApiKey(self.api_key_env.clone())),
        }
    }
}

/// Marker tables for the row filter, as written in the config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilterSection {
    pub stop_markers: Vec<String>,
    pub header_keyword: String,
    pub member_id_keywords: Vec<String>,
    pub non_table_prefix: String,
}

impl Default for FilterSection {
    fn default() -> Self {
        let rules = FilterRules::default();
        Self {
            stop_markers: rules.stop_markers,
            header_keyword: rules.header_keyword,
            member_id_keywords: rules.member_id_keywords,
            non_table_prefix: rules.non_table_prefix,
        }
    }
}

impl FilterSection {
    pub fn rules(&self) -> FilterRules {
        FilterRules::new(
            self.stop_markers.iter().map(String::as_str),
            &self.header_keyword,
            self.member_id_keywords.iter().map(String::as_str),
            &self.non_table_prefix,
        )
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Load `path` if given, else the default file if present, else defaults.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::load(DEFAULT_CONFIG_PATH),
            None => Ok(Self::default()),
        }
    }

    fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        cfg.llm.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_sections_missing() {
        let cfg = Config::parse("", Path::new("inline.toml")).unwrap();
        assert_eq!(cfg.server.bind, "0.0.0.0:8000");
        assert_eq!(cfg.llm.model, "gpt-4o-mini");
        assert_eq!(cfg.llm.api_key_env, "OPENAI_API_KEY");
        assert!(cfg.llm.json_mode);
        assert!(cfg.filter.stop_markers.iter().any(|m| m == "SEPTEMBER"));
    }

    #[test]
    fn test_partial_sections_override() {
        let toml = r#"
            [llm]
            model = "qwen3:8b"
            base_url = "http://localhost:11434/v1"
            json_mode = false

            [filter]
            stop_markers = ["monthly digest"]
        "#;
        let cfg = Config::parse(toml, Path::new("inline.toml")).unwrap();
        assert_eq!(cfg.llm.model, "qwen3:8b");
        assert!(!cfg.llm.json_mode);
        assert_eq!(cfg.llm.timeout_secs, 120);
        assert_eq!(cfg.filter.header_keyword, "NAME");

        let rules = cfg.filter.rules();
        assert_eq!(rules.stop_markers, vec!["MONTHLY DIGEST".to_string()]);
    }

    #[test]
    fn test_bad_toml_reports_path() {
        let err = Config::parse("[llm\nmodel =", Path::new("broken.toml")).unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let err = Config::parse("[llm]\ntimeout_secs = 0\n", Path::new("inline.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTimeout));
        assert_eq!(err.to_string(), "llm.timeout_secs must be greater than 0");

        let cfg = Config::parse("[llm]\ntimeout_secs = 1\n", Path::new("inline.toml")).unwrap();
        assert_eq!(cfg.llm.timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let err = Config::resolve(Some(Path::new("/nonexistent/billing.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_bind_addr() {
        let section = ServerSection {
            bind: "127.0.0.1:9000".into(),
            ..Default::default()
        };
        assert_eq!(section.bind_addr().unwrap().port(), 9000);

        let section = ServerSection {
            bind: "not an address".into(),
            ..Default::default()
        };
        assert!(section.bind_addr().is_err());
    }

    #[test]
    fn test_api_key_from_env() {
        let llm = LlmSection {
            api_key_env: "BILLING_EXTRACT_TEST_KEY_UNSET".into(),
            ..Default::default()
        };
        assert!(matches!(llm.api_key(), Err(ConfigError::MissingApiKey(_))));
    }
}

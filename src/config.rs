use serde::Deserialize;
use std::{
    env,
    net::{AddrParseError, SocketAddr},
    path::{Path, PathBuf},
    time::Duration,
};

use crate::types::Modality;

const DEFAULT_CONFIG_NAME: &str = "phishsense";

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub environment: String,
    pub server: ServerConfig,
    pub models: ModelConfig,
    pub feedback_dir: PathBuf,
    pub fetch: FetchConfig,
    /// `*` allows any origin.
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub model_dir: PathBuf,
    pub url_model_path: Option<PathBuf>,
    pub text_model_path: Option<PathBuf>,
    pub html_model_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub max_body_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            server: ServerConfig::default(),
            models: ModelConfig::default(),
            feedback_dir: PathBuf::from("feedback"),
            fetch: FetchConfig::default(),
            cors_origins: vec!["*".to_string()],
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            url_model_path: None,
            text_model_path: None,
            html_model_path: None,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 5,
            max_body_bytes: 5 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Config file overridden by `PHISHSENSE_*` variables, with `__`
    /// separating nested keys (`PHISHSENSE_FETCH__TIMEOUT_SECS`).
    ///
    /// The file named by `PHISHSENSE_CONFIG` must exist. Without it,
    /// `phishsense.{toml,yaml,json}` in the working directory is optional.
    pub fn load() -> Result<Self, config::ConfigError> {
        match env::var_os("PHISHSENSE_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path)),
            None => Self::layered(config::File::with_name(DEFAULT_CONFIG_NAME).required(false)),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, config::ConfigError> {
        Self::layered(config::File::from(path))
    }

    fn layered<S>(file: S) -> Result<Self, config::ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("PHISHSENSE")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cors_origins")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.server.host, self.server.port).parse()
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ModelConfig {
    /// Explicit per-modality path, else `<model_dir>/<modality>_model.json`.
    pub fn artifact_path(&self, modality: Modality) -> PathBuf {
        let explicit = match modality {
            Modality::Url => &self.url_model_path,
            Modality::Text => &self.text_model_path,
            Modality::Html => &self.html_model_path,
        };
        explicit
            .clone()
            .unwrap_or_else(|| self.model_dir.join(format!("{}_model.json", modality.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_reference_deployment() {
        let config = Config::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.fetch.timeout(), Duration::from_secs(5));
        assert!(config.fetch.user_agent.starts_with("Mozilla/5.0"));
        assert_eq!(config.cors_origins, vec!["*"]);
        assert_eq!(config.feedback_dir, PathBuf::from("feedback"));
        assert!(!config.is_production());
        assert_eq!(config.socket_addr().unwrap(), "0.0.0.0:8000".parse().unwrap());
    }

    #[test]
    fn test_file_overrides_merge_with_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
environment = "production"
feedback_dir = "/var/lib/phishsense/feedback"
cors_origins = ["https://extension.example"]

[server]
port = 9100

[models]
model_dir = "/opt/models"
html_model_path = "/opt/custom/html.json"

[fetch]
timeout_secs = 2
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert!(config.is_production());
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.fetch.timeout_secs, 2);
        assert_eq!(config.fetch.max_body_bytes, 5 * 1024 * 1024);
        assert!(config.fetch.user_agent.starts_with("Mozilla/5.0"));
        assert_eq!(config.cors_origins, vec!["https://extension.example"]);
        assert_eq!(
            config.models.artifact_path(Modality::Url),
            PathBuf::from("/opt/models/url_model.json")
        );
        assert_eq!(
            config.models.artifact_path(Modality::Html),
            PathBuf::from("/opt/custom/html.json")
        );
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::from_file(&dir.path().join("absent.toml")).is_err());
    }

    #[test]
    fn test_invalid_host_rejected() {
        let config = Config {
            server: ServerConfig {
                host: "not a host".to_string(),
                port: 80,
            },
            ..Default::default()
        };
        assert!(config.socket_addr().is_err());
    }
}

//! Configuration file and resolution for saksham.
//!
//! Reads an optional TOML file at `~/.config/saksham/config.toml` and resolves
//! every setting through the chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use saksham_llm::{LLMConfig, ProviderKind, DEFAULT_GEMINI_MODEL, DEFAULT_OPENAI_MODEL};

pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub provider: ProviderSection,
    #[serde(default)]
    pub server: ServerSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ProviderSection {
    pub kind: Option<ProviderKind>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub temperature: Option<f32>,
    pub base_url: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ServerSection {
    pub bind: Option<String>,
    pub port: Option<u16>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// `$XDG_CONFIG_HOME/saksham` or `~/.config/saksham`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("saksham");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("saksham")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read
// -----------------------------------------------------------------------

pub fn load_config(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    parse_config(&contents)
}

fn parse_config(contents: &str) -> Result<ConfigFile> {
    toml::from_str(contents).context("failed to parse config file")
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Settings given on the command line.
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub provider: Option<ProviderKind>,
    pub model: Option<String>,
    pub config: Option<PathBuf>,
}

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct SakshamConfig {
    pub provider: ProviderKind,
    pub llm: LLMConfig,
    pub bind: String,
    pub port: u16,
}

impl SakshamConfig {
    /// Resolve against the process environment and the config file.
    ///
    /// An explicit `--config` path must exist; the default path is optional.
    pub fn resolve(cli: &CliOverrides) -> Result<Self> {
        let path = cli.config.clone().unwrap_or_else(config_path);
        let file = if cli.config.is_some() || path.exists() {
            load_config(&path)?
        } else {
            ConfigFile::default()
        };
        Self::resolve_with(cli, |key| std::env::var(key).ok(), file, &path)
    }

    /// - Provider: `--provider` > `SAKSHAM_PROVIDER` > `provider.kind` > gemini
    /// - Model: `--model` > `SAKSHAM_MODEL` > `provider.model` > the provider's default
    /// - API key: `GEMINI_API_KEY` / `OPENAI_API_KEY` > `provider.api_key` > error
    /// - Bind and port: `SAKSHAM_BIND` / `SAKSHAM_PORT` > `[server]` > 127.0.0.1:3000
    pub fn resolve_with(
        cli: &CliOverrides,
        env: impl Fn(&str) -> Option<String>,
        file: ConfigFile,
        file_path: &Path,
    ) -> Result<Self> {
        let provider = match (cli.provider, env("SAKSHAM_PROVIDER")) {
            (Some(kind), _) => kind,
            (None, Some(name)) => name
                .parse()
                .context("SAKSHAM_PROVIDER env var is not a known provider")?,
            (None, None) => file.provider.kind.unwrap_or(ProviderKind::Gemini),
        };

        let model = cli
            .model
            .clone()
            .or_else(|| env("SAKSHAM_MODEL"))
            .or(file.provider.model)
            .unwrap_or_else(|| default_model(provider).to_string());

        let key_var = match provider {
            ProviderKind::Gemini => Some("GEMINI_API_KEY"),
            ProviderKind::OpenAI => Some("OPENAI_API_KEY"),
            ProviderKind::Fake => None,
        };
        let api_key = match key_var {
            None => String::new(),
            Some(var) => match env(var).or(file.provider.api_key) {
                Some(key) if !key.trim().is_empty() => key,
                _ => bail!(
                    "no API key for the {} provider; set {} or provider.api_key in {}",
                    provider,
                    var,
                    file_path.display()
                ),
            },
        };

        let bind = env("SAKSHAM_BIND")
            .or(file.server.bind)
            .unwrap_or_else(|| DEFAULT_BIND.to_string());
        let port = match env("SAKSHAM_PORT") {
            Some(port) => port
                .parse()
                .with_context(|| format!("SAKSHAM_PORT is not a valid port: {port}"))?,
            None => file.server.port.unwrap_or(DEFAULT_PORT),
        };

        let defaults = LLMConfig::default();
        Ok(Self {
            provider,
            llm: LLMConfig {
                api_key,
                model,
                temperature: file.provider.temperature.unwrap_or(defaults.temperature),
                base_url: file.provider.base_url,
            },
            bind,
            port,
        })
    }
}

fn default_model(provider: ProviderKind) -> &'static str {
    match provider {
        ProviderKind::OpenAI => DEFAULT_OPENAI_MODEL,
        ProviderKind::Gemini | ProviderKind::Fake => DEFAULT_GEMINI_MODEL,
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_to_gemini_with_env_key() {
        let config = SakshamConfig::resolve_with(
            &CliOverrides::default(),
            env_of(&[("GEMINI_API_KEY", "g-key")]),
            ConfigFile::default(),
            Path::new("config.toml"),
        )
        .unwrap();
        assert_eq!(config.provider, ProviderKind::Gemini);
        assert_eq!(config.llm.model, DEFAULT_GEMINI_MODEL);
        assert_eq!(config.llm.api_key, "g-key");
        assert_eq!(config.bind, DEFAULT_BIND);
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let err = SakshamConfig::resolve_with(
            &CliOverrides::default(),
            env_of(&[]),
            ConfigFile::default(),
            Path::new("config.toml"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("GEMINI_API_KEY"), "got: {err}");
    }

    #[test]
    fn fake_provider_needs_no_key() {
        let cli = CliOverrides {
            provider: Some(ProviderKind::Fake),
            ..Default::default()
        };
        let config = SakshamConfig::resolve_with(
            &cli,
            env_of(&[]),
            ConfigFile::default(),
            Path::new("config.toml"),
        )
        .unwrap();
        assert_eq!(config.provider, ProviderKind::Fake);
        assert!(config.llm.api_key.is_empty());
    }

    #[test]
    fn file_values_apply_below_env_and_cli() {
        let file = parse_config(
            r#"
            [provider]
            kind = "openai"
            model = "gpt-4o"
            api_key = "file-key"
            temperature = 0.1

            [server]
            bind = "0.0.0.0"
            port = 8080
            "#,
        )
        .unwrap();
        let cli = CliOverrides {
            model: Some("gpt-4.1-mini".to_string()),
            ..Default::default()
        };
        let config = SakshamConfig::resolve_with(
            &cli,
            env_of(&[("SAKSHAM_PORT", "9090")]),
            file,
            Path::new("config.toml"),
        )
        .unwrap();

        assert_eq!(config.provider, ProviderKind::OpenAI);
        assert_eq!(config.llm.model, "gpt-4.1-mini");
        assert_eq!(config.llm.api_key, "file-key");
        assert!((config.llm.temperature - 0.1).abs() < f32::EPSILON);
        assert_eq!(config.bind, "0.0.0.0");
        assert_eq!(config.port, 9090);
    }

    #[test]
    fn env_provider_overrides_file() {
        let file = parse_config("[provider]\nkind = \"openai\"\n").unwrap();
        let config = SakshamConfig::resolve_with(
            &CliOverrides::default(),
            env_of(&[("SAKSHAM_PROVIDER", "fake")]),
            file,
            Path::new("config.toml"),
        )
        .unwrap();
        assert_eq!(config.provider, ProviderKind::Fake);
    }

    #[test]
    fn bad_port_is_reported() {
        let cli = CliOverrides {
            provider: Some(ProviderKind::Fake),
            ..Default::default()
        };
        let err = SakshamConfig::resolve_with(
            &cli,
            env_of(&[("SAKSHAM_PORT", "eighty")]),
            ConfigFile::default(),
            Path::new("config.toml"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("SAKSHAM_PORT"));
    }

    #[test]
    fn missing_key_names_the_config_file_in_use() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("farm.toml");
        std::fs::write(&path, "[provider]\nkind = \"openai\"\n").unwrap();
        let cli = CliOverrides {
            config: Some(path.clone()),
            ..Default::default()
        };
        let file = load_config(&path).unwrap();
        let err = SakshamConfig::resolve_with(&cli, env_of(&[]), file, &path).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("OPENAI_API_KEY"), "got: {message}");
        assert!(message.contains(&path.display().to_string()), "got: {message}");
    }

    #[test]
    fn explicit_config_path_must_exist() {
        let tmp = tempfile::TempDir::new().unwrap();
        let cli = CliOverrides {
            provider: Some(ProviderKind::Fake),
            config: Some(tmp.path().join("missing.toml")),
            ..Default::default()
        };
        assert!(SakshamConfig::resolve(&cli).is_err());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = 4000\n").unwrap();
        let file = load_config(&path).unwrap();
        assert_eq!(file.server.port, Some(4000));
        assert!(file.provider.kind.is_none());
    }
}

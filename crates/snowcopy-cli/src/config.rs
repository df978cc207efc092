//! `snowcopy.toml` loading and command-line overrides

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use serde::Deserialize;
use snowcopy_drivers::snowflake::{SnowflakeConfig, TokenType};
use snowcopy_sync::SyncConfig;

use crate::{SinkArgs, SourceArgs};

/// Looked up in the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "snowcopy.toml";

/// Contents of the config file
///
/// ```toml
/// tables = ["CUSTOMERS", "ORDERS"]
///
/// [sink]
/// flavor = "duckdb"
/// path = "local.duckdb"
///
/// [source]
/// account = "myorg-myaccount"
/// warehouse = "COMPUTE_WH"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    #[serde(flatten)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub source: Option<SnowflakeConfig>,
}

impl FileConfig {
    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        toml::from_str(contents).context("invalid config file")
    }

    /// Reads `path`, or `snowcopy.toml` if it exists, or falls back to defaults
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.exists() {
                    tracing::debug!("no {} found, using defaults", DEFAULT_CONFIG_FILE);
                    return Ok(Self::default());
                }
                default
            }
        };

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = Self::parse(&contents)
            .with_context(|| format!("failed to load {}", path.display()))?;
        tracing::info!(path = %path.display(), tables = config.sync.tables.len(), "Loaded configuration");
        Ok(config)
    }

    /// Applies `--sink`/`--path` on top of the `[sink]` section
    pub fn apply_sink(&mut self, args: &SinkArgs) {
        if let Some(flavor) = args.sink {
            self.sync.sink.flavor = flavor;
        }
        if let Some(path) = &args.path {
            self.sync.sink.path = path.clone();
        }
    }

    /// Builds the warehouse settings, with flags and environment taking
    /// precedence over `[source]`
    pub fn resolve_source(&self, args: &SourceArgs) -> anyhow::Result<SnowflakeConfig> {
        let mut config = self
            .source
            .clone()
            .unwrap_or_else(|| SnowflakeConfig::new("", ""));

        if let Some(account) = &args.account {
            config.account = account.clone();
        }
        if let Some(token) = &args.token {
            config.token = token.clone();
        }
        if let Some(token_type) = &args.token_type {
            config.token_type = parse_token_type(token_type)?;
        }
        if let Some(role) = &args.role {
            config.role = Some(role.clone());
        }
        if let Some(warehouse) = &args.warehouse {
            config.warehouse = Some(warehouse.clone());
        }
        if let Some(database) = &args.database {
            config.database = Some(database.clone());
        }
        if let Some(schema) = &args.schema {
            config.schema = Some(schema.clone());
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_token_type(value: &str) -> anyhow::Result<TokenType> {
    match value.to_ascii_lowercase().replace('-', "_").as_str() {
        "oauth" => Ok(TokenType::Oauth),
        "keypair_jwt" => Ok(TokenType::KeypairJwt),
        "programmatic_access_token" | "pat" => Ok(TokenType::ProgrammaticAccessToken),
        other => bail!(
            "unknown token type '{}', expected oauth, keypair_jwt or programmatic_access_token",
            other
        ),
    }
}

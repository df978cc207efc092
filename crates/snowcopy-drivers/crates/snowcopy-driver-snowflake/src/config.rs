//! Connection settings for the Snowflake SQL API

use std::time::Duration;

use serde::{Deserialize, Serialize};
use snowcopy_core::{Result, SnowcopyError};

/// How the bearer token in `SnowflakeConfig::token` was issued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    #[default]
    Oauth,
    KeypairJwt,
    ProgrammaticAccessToken,
}

impl TokenType {
    /// Value of the `X-Snowflake-Authorization-Token-Type` header
    pub fn header_value(&self) -> &'static str {
        match self {
            TokenType::Oauth => "OAUTH",
            TokenType::KeypairJwt => "KEYPAIR_JWT",
            TokenType::ProgrammaticAccessToken => "PROGRAMMATIC_ACCESS_TOKEN",
        }
    }
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_max_poll_attempts() -> u32 {
    240
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SnowflakeConfig {
    /// Account identifier, e.g. `myorg-myaccount`
    #[serde(default)]
    pub account: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warehouse: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing)]
    pub token: String,
    #[serde(default)]
    pub token_type: TokenType,
    /// Server-side statement timeout, also used for the HTTP client
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
    /// Overrides `https://<account>.snowflakecomputing.com`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl SnowflakeConfig {
    pub fn new(account: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            warehouse: None,
            database: None,
            schema: None,
            role: None,
            token: token.into(),
            token_type: TokenType::default(),
            timeout_secs: default_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_attempts: default_max_poll_attempts(),
            base_url: None,
        }
    }

    pub fn with_warehouse(mut self, warehouse: impl Into<String>) -> Self {
        self.warehouse = Some(warehouse.into());
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_token_type(mut self, token_type: TokenType) -> Self {
        self.token_type = token_type;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// API root without a trailing slash
    pub fn base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}.snowflakecomputing.com", self.account.trim()),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.account.trim().is_empty() && self.base_url.is_none() {
            return Err(SnowcopyError::Configuration(
                "snowflake account is required".to_string(),
            ));
        }
        if self.token.trim().is_empty() {
            return Err(SnowcopyError::Configuration(
                "snowflake token is required (set SNOW_TOKEN)".to_string(),
            ));
        }
        if self.max_poll_attempts == 0 {
            return Err(SnowcopyError::Configuration(
                "max_poll_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for SnowflakeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnowflakeConfig")
            .field("account", &self.account)
            .field("warehouse", &self.warehouse)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("role", &self.role)
            .field("token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("timeout_secs", &self.timeout_secs)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("max_poll_attempts", &self.max_poll_attempts)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_base_url_from_account() {
        let config = SnowflakeConfig::new("myorg-acct", "t");
        assert_eq!(config.base_url(), "https://myorg-acct.snowflakecomputing.com");

        let config = config.with_base_url("http://localhost:8080/");
        assert_eq!(config.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = SnowflakeConfig::new("acct", "super-secret");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_validate_requires_token() {
        assert!(SnowflakeConfig::new("acct", "").validate().is_err());
        assert!(SnowflakeConfig::new("", "t").validate().is_err());
        assert!(SnowflakeConfig::new("acct", "t").validate().is_ok());
    }

    #[test]
    fn test_deserialize_applies_defaults() {
        let config: SnowflakeConfig = serde_json::from_str(
            r#"{"account": "acct", "warehouse": "COMPUTE_WH", "token_type": "programmatic_access_token"}"#,
        )
        .unwrap();
        assert_eq!(config.warehouse.as_deref(), Some("COMPUTE_WH"));
        assert_eq!(config.token_type, TokenType::ProgrammaticAccessToken);
        assert_eq!(config.token, "");
        assert_eq!(config.timeout_secs, 120);
        assert_eq!(config.max_poll_attempts, 240);
    }

    #[test]
    fn test_token_type_header_values() {
        assert_eq!(TokenType::Oauth.header_value(), "OAUTH");
        assert_eq!(TokenType::KeypairJwt.header_value(), "KEYPAIR_JWT");
        assert_eq!(
            TokenType::ProgrammaticAccessToken.header_value(),
            "PROGRAMMATIC_ACCESS_TOKEN"
        );
    }
}

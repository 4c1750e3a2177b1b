//! Configuration types — gateway timing knobs and account credentials.
//!
//! Accounts come from a TOML file (`CHAT_GATEWAY_CONFIG`, default
//! `./gateway.toml`) or, for single-account setups, straight from
//! `CHAT_GATEWAY_*` environment variables.

use std::path::Path;
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;

use crate::error::ConfigError;

/// Server-side maximum hold time for a long-poll request, in seconds.
///
/// The client fetch timeout must exceed this so that an empty long-poll
/// window is distinguishable from a dead connection.
pub const SERVER_HOLD_SECS: u64 = 60;

/// Gateway timing and behavior knobs, shared by all accounts.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Client-side timeout for one long-poll fetch. Must be larger than
    /// the server's own hold window ([`SERVER_HOLD_SECS`]).
    pub poll_timeout: Duration,
    /// Fixed delay before retrying after a transport or server fault.
    pub error_backoff: Duration,
    /// Whether to attach a recent-history transcript to each message.
    pub backfill_enabled: bool,
    /// Maximum number of prior messages fetched for context.
    pub backfill_limit: usize,
    /// Client-side timeout for one history fetch.
    pub backfill_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_secs(SERVER_HOLD_SECS + 30),
            error_backoff: Duration::from_secs(5),
            backfill_enabled: true,
            backfill_limit: 12,
            backfill_timeout: Duration::from_secs(10),
        }
    }
}

/// Credentials and address for one account on the remote server.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    /// Account name, used as the log field and routing-key prefix.
    pub name: String,
    /// Base URL of the server, e.g. `https://chat.example.com`.
    pub server_url: String,
    /// Bot email address (basic-auth username and direct-message identity).
    pub email: String,
    /// API key (basic-auth password).
    pub api_key: SecretString,
}

// ── File loading ────────────────────────────────────────────────────

/// On-disk shape of the gateway config file.
#[derive(Debug, Deserialize)]
struct GatewayFile {
    #[serde(default)]
    poll_timeout_secs: Option<u64>,
    #[serde(default)]
    error_backoff_secs: Option<u64>,
    #[serde(default)]
    backfill_enabled: Option<bool>,
    #[serde(default)]
    backfill_limit: Option<usize>,
    #[serde(default)]
    backfill_timeout_secs: Option<u64>,
    #[serde(default)]
    accounts: Vec<AccountConfig>,
}

/// Load gateway settings and accounts from a TOML file.
pub fn load_file(path: &Path) -> Result<(GatewayConfig, Vec<AccountConfig>), ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    let file: GatewayFile = toml::from_str(&raw).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let mut config = GatewayConfig::default();
    if let Some(secs) = file.poll_timeout_secs {
        if secs <= SERVER_HOLD_SECS {
            return Err(ConfigError::InvalidValue {
                key: "poll_timeout_secs".into(),
                message: format!("must exceed the server hold window ({SERVER_HOLD_SECS}s)"),
            });
        }
        config.poll_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = file.error_backoff_secs {
        config.error_backoff = Duration::from_secs(secs);
    }
    if let Some(enabled) = file.backfill_enabled {
        config.backfill_enabled = enabled;
    }
    if let Some(limit) = file.backfill_limit {
        config.backfill_limit = limit;
    }
    if let Some(secs) = file.backfill_timeout_secs {
        config.backfill_timeout = Duration::from_secs(secs);
    }

    for account in &file.accounts {
        validate_account(account)?;
    }

    Ok((config, file.accounts))
}

/// Build a single account from `CHAT_GATEWAY_*` environment variables.
///
/// Returns `None` when `CHAT_GATEWAY_SERVER_URL` is unset (file-based
/// configuration is in effect instead).
pub fn account_from_env() -> Result<Option<AccountConfig>, ConfigError> {
    let Ok(server_url) = std::env::var("CHAT_GATEWAY_SERVER_URL") else {
        return Ok(None);
    };

    let email = std::env::var("CHAT_GATEWAY_EMAIL")
        .map_err(|_| ConfigError::MissingEnvVar("CHAT_GATEWAY_EMAIL".into()))?;
    let api_key = std::env::var("CHAT_GATEWAY_API_KEY")
        .map_err(|_| ConfigError::MissingEnvVar("CHAT_GATEWAY_API_KEY".into()))?;
    let name = std::env::var("CHAT_GATEWAY_ACCOUNT").unwrap_or_else(|_| "default".to_string());

    let account = AccountConfig {
        name,
        server_url,
        email,
        api_key: SecretString::from(api_key),
    };
    validate_account(&account)?;
    Ok(Some(account))
}

fn validate_account(account: &AccountConfig) -> Result<(), ConfigError> {
    if account.server_url.is_empty() {
        return Err(ConfigError::MissingRequired {
            key: format!("accounts.{}.server_url", account.name),
            hint: "Set the base URL of the chat server.".into(),
        });
    }
    if !account.email.contains('@') {
        return Err(ConfigError::InvalidValue {
            key: format!("accounts.{}.email", account.name),
            message: format!("'{}' is not an email address", account.email),
        });
    }
    Ok(())
}

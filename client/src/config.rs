//! Process configuration: network, contract address, signer.
//!
//! Loaded once at startup, from a YAML file or the environment. Missing
//! required values are reported before any network call is made.

use crate::{cache::DEFAULT_DECIMALS, Client, ConfirmationPolicy, LocalWallet, SessionConfig};
use lottery_types::{AccountAddress, TransactionHash};
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path, str::FromStr, time::Duration};
use thiserror::Error;

pub const ENV_NETWORK: &str = "LOTTERY_NETWORK";
pub const ENV_NODE_URL: &str = "LOTTERY_NODE_URL";
pub const ENV_MODULE_ADDRESS: &str = "LOTTERY_MODULE_ADDRESS";
pub const ENV_ACCOUNT_ADDRESS: &str = "LOTTERY_ACCOUNT_ADDRESS";
pub const ENV_PRIVATE_KEY: &str = "LOTTERY_PRIVATE_KEY_HEX";
pub const ENV_PRIVATE_KEY_FILE: &str = "LOTTERY_PRIVATE_KEY_FILE";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing {0}")]
    Missing(String),
    #[error("invalid {key}: {reason}")]
    Invalid { key: String, reason: String },
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Devnet,
    #[default]
    Testnet,
    Mainnet,
    Local,
}

impl Network {
    pub fn node_url(&self) -> &'static str {
        match self {
            Network::Devnet => "https://fullnode.devnet.aptoslabs.com/v1",
            Network::Testnet => "https://fullnode.testnet.aptoslabs.com/v1",
            Network::Mainnet => "https://fullnode.mainnet.aptoslabs.com/v1",
            Network::Local => "http://127.0.0.1:8080/v1",
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Network::Devnet => "devnet",
            Network::Testnet => "testnet",
            Network::Mainnet => "mainnet",
            Network::Local => "local",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "devnet" => Ok(Network::Devnet),
            "testnet" => Ok(Network::Testnet),
            "mainnet" => Ok(Network::Mainnet),
            "local" | "localnet" => Ok(Network::Local),
            other => Err(ConfigError::Invalid {
                key: ENV_NETWORK.to_string(),
                reason: format!("unknown network {other:?}"),
            }),
        }
    }
}

fn default_decimals() -> u8 {
    DEFAULT_DECIMALS
}

fn default_refresh_interval_secs() -> u64 {
    5
}

fn default_countdown_tick_ms() -> u64 {
    1_000
}

fn default_confirmation_timeout_secs() -> u64 {
    30
}

fn default_confirmation_poll_ms() -> u64 {
    500
}

fn default_max_gas_amount() -> u64 {
    20_000
}

fn default_expiration_secs() -> u64 {
    60
}

fn default_token_module() -> String {
    "ananta_token_project".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: Network,
    /// Overrides the network's default full node.
    #[serde(default)]
    pub node_url: Option<String>,
    pub module_address: AccountAddress,
    /// Signing account. Defaults to the account derived from the signing key.
    #[serde(default)]
    pub account_address: Option<AccountAddress>,
    /// Used when the payment asset's decimals cannot be read.
    #[serde(default = "default_decimals")]
    pub default_decimals: u8,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_countdown_tick_ms")]
    pub countdown_tick_ms: u64,
    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,
    #[serde(default = "default_confirmation_poll_ms")]
    pub confirmation_poll_ms: u64,
    #[serde(default = "default_max_gas_amount")]
    pub max_gas_amount: u64,
    #[serde(default = "default_expiration_secs")]
    pub expiration_secs: u64,
    /// Module of the payment token, used by `mint-to`.
    #[serde(default = "default_token_module")]
    pub token_module: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Config {
    pub fn new(network: Network, module_address: AccountAddress) -> Self {
        Self {
            network,
            node_url: None,
            module_address,
            account_address: None,
            default_decimals: default_decimals(),
            refresh_interval_secs: default_refresh_interval_secs(),
            countdown_tick_ms: default_countdown_tick_ms(),
            confirmation_timeout_secs: default_confirmation_timeout_secs(),
            confirmation_poll_ms: default_confirmation_poll_ms(),
            max_gas_amount: default_max_gas_amount(),
            expiration_secs: default_expiration_secs(),
            token_module: default_token_module(),
            log_level: default_log_level(),
        }
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Load from `path` when given, otherwise from the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_yaml_file(path),
            None => Self::from_env(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from a key lookup (the process environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let module_address = lookup(ENV_MODULE_ADDRESS)
            .ok_or_else(|| ConfigError::Missing(ENV_MODULE_ADDRESS.to_string()))
            .and_then(|value| parse_address(ENV_MODULE_ADDRESS, &value))?;
        let network = match lookup(ENV_NETWORK) {
            Some(value) => value.parse()?,
            None => Network::default(),
        };
        let mut config = Self::new(network, module_address);
        config.node_url = lookup(ENV_NODE_URL);
        config.account_address = lookup(ENV_ACCOUNT_ADDRESS)
            .map(|value| parse_address(ENV_ACCOUNT_ADDRESS, &value))
            .transpose()?;
        Ok(config)
    }

    pub fn node_url(&self) -> &str {
        self.node_url
            .as_deref()
            .unwrap_or_else(|| self.network.node_url())
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            module: self.module_address,
            default_decimals: self.default_decimals,
            refresh_interval: Duration::from_secs(self.refresh_interval_secs.max(1)),
            countdown_tick: Duration::from_millis(self.countdown_tick_ms.max(1)),
        }
    }

    pub fn confirmation_policy(&self) -> ConfirmationPolicy {
        ConfirmationPolicy {
            poll_interval: Duration::from_millis(self.confirmation_poll_ms.max(1)),
            timeout: Duration::from_secs(self.confirmation_timeout_secs),
        }
    }

    /// Log level, falling back to `INFO` for unrecognized values.
    pub fn log_level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::INFO)
    }

    pub fn client(&self) -> crate::Result<Client> {
        Ok(Client::new(self.node_url())?.with_confirmation_policy(self.confirmation_policy()))
    }

    /// Signer for `key_hex`, acting as `account_address` when set and as the
    /// key's own account otherwise.
    pub fn wallet(&self, client: Client, key_hex: &str) -> crate::Result<LocalWallet> {
        let wallet = match self.account_address {
            Some(address) => LocalWallet::from_hex(client, key_hex, address)?,
            None => LocalWallet::from_hex_derived(client, key_hex)?,
        };
        Ok(wallet
            .with_max_gas_amount(self.max_gas_amount)
            .with_expiration(Duration::from_secs(self.expiration_secs)))
    }

    pub fn explorer_url(&self, hash: &TransactionHash) -> String {
        format!(
            "https://explorer.aptoslabs.com/txn/{hash}?network={}",
            self.network
        )
    }
}

fn parse_address(key: &str, value: &str) -> Result<AccountAddress, ConfigError> {
    value.parse().map_err(|err| ConfigError::Invalid {
        key: key.to_string(),
        reason: format!("{err}"),
    })
}

fn read_secret_file(path: &str) -> Result<String, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_string(),
        source,
    })?;
    let trimmed = contents.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid {
            key: path.to_string(),
            reason: "secret file is empty".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

/// Resolve the signer's private key from a flag, a file flag, or the
/// environment, in that order.
pub fn require_private_key(
    value: Option<String>,
    file: Option<String>,
) -> Result<String, ConfigError> {
    if let Some(value) = value {
        return Ok(value);
    }
    if let Some(file_path) = file {
        return read_secret_file(&file_path);
    }
    if let Ok(value) = std::env::var(ENV_PRIVATE_KEY) {
        return Ok(value);
    }
    if let Ok(file_path) = std::env::var(ENV_PRIVATE_KEY_FILE) {
        return read_secret_file(&file_path);
    }
    Err(ConfigError::Missing(format!(
        "{ENV_PRIVATE_KEY} or {ENV_PRIVATE_KEY_FILE}"
    )))
}

use alloy::primitives::Address;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::Level;
use url::Url;

/// Settings deserialized from the TOML config file.
#[derive(Deserialize)]
struct Config {
    rpc_url: Url,
    artifacts_dir: PathBuf,
    log_level: Option<LogLevel>,
    required_confirmations: Option<u64>,
    #[serde(default)]
    networks: HashMap<String, NetworkConstants>,
}

/// Per-network addresses the deploy scripts need, keyed by chain id in
/// the `[networks.<chain id>]` tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct NetworkConstants {
    pub tap_address: Address,
    pub fee_to: Address,
    pub fee_ve_to: Address,
}

#[derive(Debug, Clone)]
pub struct Ctx {
    pub rpc_url: Url,
    pub artifacts_dir: PathBuf,
    pub log_level: LogLevel,
    pub required_confirmations: u64,
    networks: HashMap<u64, NetworkConstants>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(log_level: LogLevel) -> Self {
        match log_level {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    #[error("failed to parse TOML")]
    Toml(#[from] toml::de::Error),
    #[error("network key {0:?} is not a chain id")]
    InvalidChainId(String),
    #[error("no network constants configured for chain {0}")]
    UnknownNetwork(u64),
}

impl Ctx {
    pub fn load_file(config: &Path) -> Result<Self, ConfigError> {
        let config_str = std::fs::read_to_string(config)?;
        Self::from_toml(&config_str)
    }

    pub fn from_toml(config_toml: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(config_toml)?;

        let networks = config
            .networks
            .into_iter()
            .map(|(key, constants)| {
                key.parse::<u64>()
                    .map(|chain_id| (chain_id, constants))
                    .map_err(|_| ConfigError::InvalidChainId(key))
            })
            .collect::<Result<_, _>>()?;

        Ok(Self {
            rpc_url: config.rpc_url,
            artifacts_dir: config.artifacts_dir,
            log_level: config.log_level.unwrap_or(LogLevel::Info),
            required_confirmations: config.required_confirmations.unwrap_or(1),
            networks,
        })
    }

    pub fn network(&self, chain_id: u64) -> Result<&NetworkConstants, ConfigError> {
        self.networks
            .get(&chain_id)
            .ok_or(ConfigError::UnknownNetwork(chain_id))
    }
}

pub fn setup_tracing(log_level: LogLevel) {
    let level: Level = log_level.into();
    let default_filter = format!("tapioca_fixture={level},tapioca_ledger={level}");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use alloy::primitives::address;
    use std::io::Write;

    use super::*;

    fn minimal_toml() -> &'static str {
        r#"
        rpc_url = "http://localhost:8545"
        artifacts_dir = "artifacts"
        "#
    }

    fn toml_with_network(key: &str) -> String {
        format!(
            r#"
            rpc_url = "http://localhost:8545"
            artifacts_dir = "artifacts"
            log_level = "debug"
            required_confirmations = 3

            [networks.{key}]
            tap_address = "0x1111111111111111111111111111111111111111"
            fee_to = "0x2222222222222222222222222222222222222222"
            fee_ve_to = "0x3333333333333333333333333333333333333333"
            "#
        )
    }

    #[test]
    fn log_level_maps_to_tracing_level() {
        assert_eq!(Level::from(LogLevel::Trace), Level::TRACE);
        assert_eq!(Level::from(LogLevel::Debug), Level::DEBUG);
        assert_eq!(Level::from(LogLevel::Info), Level::INFO);
        assert_eq!(Level::from(LogLevel::Warn), Level::WARN);
        assert_eq!(Level::from(LogLevel::Error), Level::ERROR);
    }

    #[test]
    fn defaults_applied_when_optional_fields_omitted() {
        let ctx = Ctx::from_toml(minimal_toml()).unwrap();

        assert_eq!(ctx.rpc_url.as_str(), "http://localhost:8545/");
        assert_eq!(ctx.artifacts_dir, PathBuf::from("artifacts"));
        assert_eq!(ctx.log_level, LogLevel::Info);
        assert_eq!(ctx.required_confirmations, 1);
        assert!(matches!(ctx.network(1), Err(ConfigError::UnknownNetwork(1))));
    }

    #[test]
    fn network_constants_are_keyed_by_chain_id() {
        let ctx = Ctx::from_toml(&toml_with_network("31337")).unwrap();

        assert_eq!(ctx.log_level, LogLevel::Debug);
        assert_eq!(ctx.required_confirmations, 3);

        let constants = ctx.network(31337).unwrap();
        assert_eq!(
            constants.tap_address,
            address!("0x1111111111111111111111111111111111111111")
        );
        assert_eq!(
            constants.fee_ve_to,
            address!("0x3333333333333333333333333333333333333333")
        );
    }

    #[test]
    fn non_numeric_network_key_is_rejected() {
        let error = Ctx::from_toml(&toml_with_network("mainnet")).unwrap_err();

        assert!(matches!(error, ConfigError::InvalidChainId(key) if key == "mainnet"));
    }

    #[test]
    fn missing_rpc_url_fails_to_parse() {
        let error = Ctx::from_toml(r#"artifacts_dir = "artifacts""#).unwrap_err();

        assert!(matches!(error, ConfigError::Toml(_)));
    }

    #[test]
    fn load_file_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(minimal_toml().as_bytes()).unwrap();

        let ctx = Ctx::load_file(file.path()).unwrap();

        assert_eq!(ctx.artifacts_dir, PathBuf::from("artifacts"));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();

        let error = Ctx::load_file(&dir.path().join("absent.toml")).unwrap_err();

        assert!(matches!(error, ConfigError::Io(_)));
    }
}

//! Configuration loading
//!
//! Layered configuration: a TOML file plus `GRIDPULSE_`-prefixed environment
//! overrides (`GRIDPULSE_WALLET__PRIVATE_KEY`, `GRIDPULSE_SERVER__PORT`, ...).
//! Network profiles are explicit structs enumerated at startup; there is no
//! dynamically keyed network table.

use crate::error::{BotError, Result};
use ethers::types::{Address, U256};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub signals: SignalsConfig,
    #[serde(default)]
    pub trust: TrustConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub networks: Vec<NetworkProfile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WalletConfig {
    /// Private signing key, hex. Usually injected via environment.
    #[serde(default)]
    pub private_key: String,
    /// Executor contract address
    #[serde(default)]
    pub executor: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    /// Minimum balance reserve in smallest units, decimal string
    #[serde(default = "default_min_reserve")]
    pub min_reserve: String,
    /// Fallback asset when no source yields a signal (discovery mode)
    #[serde(default = "default_ticker")]
    pub default_ticker: String,
    /// Aggregate sentiment score a source must exceed to emit a signal
    #[serde(default = "default_sentiment_threshold")]
    pub sentiment_threshold: f64,
    /// Per-source fetch timeout
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
    /// Cycle interval for interval-triggered networks
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Background signal snapshot refresh for reactive networks
    #[serde(default = "default_signal_refresh_secs")]
    pub signal_refresh_secs: u64,
    /// Fixed delay before reconnecting a dropped stream
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignalsConfig {
    #[serde(default)]
    pub sources: Vec<SignalSourceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignalSourceConfig {
    /// Source identifier (trust ledger key)
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrustConfig {
    #[serde(default = "default_trust_path")]
    pub path: String,
    /// Seed weights for known sources; unknown sources start at 0.50
    #[serde(default)]
    pub seeds: HashMap<String, f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

/// How a network's worker is triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    /// Pending-transaction subscription over websocket
    Reactive,
    /// Fixed wall-clock interval
    Interval,
}

/// One monitored network. Immutable after load.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkProfile {
    pub name: String,
    pub chain_id: u64,
    /// Primary endpoint first; the second entry (if any) doubles as the
    /// redundant raw broadcast channel.
    pub rpc_urls: Vec<String>,
    #[serde(default)]
    pub ws_url: Option<String>,
    /// Priority-fee hint in gwei
    #[serde(default)]
    pub priority_fee_gwei: Option<u64>,
    /// Fixed overhead cushion ("moat") in smallest units, decimal string
    #[serde(default = "default_moat")]
    pub moat: String,
    /// Whether a private relay is usable on this network
    #[serde(default)]
    pub relay: bool,
    #[serde(default)]
    pub relay_url: Option<String>,
    #[serde(default = "default_trigger")]
    pub trigger: Trigger,
    /// Swap router / base asset for probe paths
    pub router: String,
    pub base_asset: String,
    /// Ticker -> token address, per network
    #[serde(default)]
    pub tokens: HashMap<String, String>,
}

impl NetworkProfile {
    pub fn moat(&self) -> Result<U256> {
        U256::from_dec_str(&self.moat)
            .map_err(|e| BotError::Config(format!("network {}: bad moat: {}", self.name, e)))
    }

    pub fn base_asset_address(&self) -> Result<Address> {
        parse_address(&self.base_asset)
            .map_err(|e| BotError::Config(format!("network {}: {}", self.name, e)))
    }

    pub fn token_address(&self, ticker: &str) -> Option<Address> {
        self.tokens.get(ticker).and_then(|s| parse_address(s).ok())
    }
}

impl Config {
    /// Load configuration from a TOML file with environment overrides.
    pub fn load(path: &str) -> Result<Self> {
        let expanded = shellexpand::tilde(path).to_string();
        let raw = config::Config::builder()
            .add_source(config::File::with_name(&expanded).required(false))
            .add_source(
                config::Environment::with_prefix("GRIDPULSE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| BotError::Config(e.to_string()))?;

        raw.try_deserialize()
            .map_err(|e| BotError::Config(e.to_string()))
    }

    /// Validate everything the run path depends on. Missing signing key or
    /// executor address is fatal at startup.
    pub fn validate(&self) -> Result<()> {
        if self.wallet.private_key.trim().is_empty() {
            return Err(BotError::Config(
                "wallet.private_key is required (GRIDPULSE_WALLET__PRIVATE_KEY)".into(),
            ));
        }
        if self.wallet.executor.trim().is_empty() {
            return Err(BotError::Config(
                "wallet.executor is required (GRIDPULSE_WALLET__EXECUTOR)".into(),
            ));
        }
        parse_address(&self.wallet.executor)?;
        if self.networks.is_empty() {
            return Err(BotError::Config("at least one [[networks]] entry is required".into()));
        }
        for net in &self.networks {
            if net.rpc_urls.is_empty() {
                return Err(BotError::Config(format!(
                    "network {}: at least one rpc url is required",
                    net.name
                )));
            }
            if net.trigger == Trigger::Reactive && net.ws_url.is_none() {
                return Err(BotError::Config(format!(
                    "network {}: reactive trigger requires ws_url",
                    net.name
                )));
            }
            net.moat()?;
            parse_address(&net.router)
                .map_err(|e| BotError::Config(format!("network {}: {}", net.name, e)))?;
            net.base_asset_address()?;
        }
        self.min_reserve()?;
        Ok(())
    }

    pub fn min_reserve(&self) -> Result<U256> {
        U256::from_dec_str(&self.strategy.min_reserve)
            .map_err(|e| BotError::Config(format!("strategy.min_reserve: {}", e)))
    }
}

pub fn parse_address(s: &str) -> Result<Address> {
    s.parse::<Address>()
        .map_err(|e| BotError::Config(format!("bad address {}: {}", s, e)))
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: default_port() }
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            min_reserve: default_min_reserve(),
            default_ticker: default_ticker(),
            sentiment_threshold: default_sentiment_threshold(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            interval_secs: default_interval_secs(),
            signal_refresh_secs: default_signal_refresh_secs(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
        }
    }
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            path: default_trust_path(),
            seeds: HashMap::new(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: default_db_path() }
    }
}

fn default_port() -> u16 {
    8080
}

fn default_min_reserve() -> String {
    "2000000".to_string()
}

fn default_ticker() -> String {
    "PEPE".to_string()
}

fn default_sentiment_threshold() -> f64 {
    0.1
}

fn default_fetch_timeout_ms() -> u64 {
    3500
}

fn default_interval_secs() -> u64 {
    60
}

fn default_signal_refresh_secs() -> u64 {
    30
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

fn default_trust_path() -> String {
    "trust.json".to_string()
}

fn default_db_path() -> String {
    "gridpulse.db".to_string()
}

fn default_moat() -> String {
    "0".to_string()
}

fn default_trigger() -> Trigger {
    Trigger::Interval
}

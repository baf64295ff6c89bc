//! Configuration for the UsageX ledger node.
//!
//! ```json
//! {
//!   "port": 8080,
//!   "chainId": 31337,
//!   "ledgerAddress": "0x5FbDB2315678afecb367f032d93F642f64180aa3",
//!   "token": {
//!     "address": "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512",
//!     "decimals": 6,
//!     "mints": { "0x90F79bf6EB2c4f870365E785982E1f101E93b906": "1000000" }
//!   },
//!   "owner": "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266",
//!   "treasury": "0x70997970C51812dc3A010C7d01b50e0d17dc79C8",
//!   "operator": "0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC",
//!   "operatorKey": "$OPERATOR_KEY"
//! }
//! ```
//!
//! Mint amounts are human amounts in whole tokens, scaled by `decimals`.

use alloy_primitives::U256;
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use usagex_types::address::ChecksummedAddress;
use usagex_types::config::{EvmPrivateKey, LiteralOrEnv};
use usagex_types::util::MoneyAmount;

/// CLI arguments for the UsageX ledger node.
#[derive(Parser, Debug)]
#[command(name = "usagex-server")]
#[command(about = "UsageX settlement ledger node")]
pub struct CliArgs {
    /// Path to the JSON configuration file
    #[arg(long, short, env = "CONFIG", default_value = "config.json", global = true)]
    pub config: PathBuf,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run the HTTP node (default)
    Serve,
    /// Sign a settlement attestation with the configured operator key
    SignSettlement(SettlementArgs),
    /// Print the message hash and personal-sign hash of a settlement
    Hashes(SettlementArgs),
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct SettlementArgs {
    /// Account being settled
    #[arg(long)]
    pub user: ChecksummedAddress,
    /// Amount consumed, in whole tokens (e.g. `30` or `1.5`)
    #[arg(long)]
    pub used: MoneyAmount,
    /// The account's current settlement nonce
    #[arg(long)]
    pub nonce: U256,
}

/// Ledger node configuration.
///
/// `host` and `port` fall back to the `HOST` and `PORT` environment
/// variables, then to hardcoded defaults. Address fields accept `$VAR`
/// references.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "config_defaults::default_port")]
    port: u16,
    #[serde(default = "config_defaults::default_host")]
    host: IpAddr,
    #[serde(default = "config_defaults::default_chain_id")]
    chain_id: u64,
    ledger_address: LiteralOrEnv<ChecksummedAddress>,
    token: TokenConfig,
    owner: LiteralOrEnv<ChecksummedAddress>,
    treasury: LiteralOrEnv<ChecksummedAddress>,
    operator: LiteralOrEnv<ChecksummedAddress>,
    #[serde(default)]
    operator_key: Option<LiteralOrEnv<EvmPrivateKey>>,
}

/// The value medium the ledger settles in.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenConfig {
    pub address: LiteralOrEnv<ChecksummedAddress>,
    #[serde(default = "config_defaults::default_token_decimals")]
    pub decimals: u8,
    /// Initial balances credited at startup.
    #[serde(default)]
    pub mints: HashMap<ChecksummedAddress, MoneyAmount>,
}

pub mod config_defaults {
    use std::env;
    use std::net::{IpAddr, Ipv4Addr};
    use usagex_types::util::DEFAULT_TOKEN_DECIMALS;

    pub const DEFAULT_PORT: u16 = 8080;
    pub const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
    /// Local development chain.
    pub const DEFAULT_CHAIN_ID: u64 = 31337;

    /// Returns the default port value with fallback: $PORT env var -> 8080
    pub fn default_port() -> u16 {
        env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PORT)
    }

    /// Returns the default host value with fallback: $HOST env var -> "0.0.0.0"
    pub fn default_host() -> IpAddr {
        env::var("HOST")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_HOST)
    }

    pub fn default_chain_id() -> u64 {
        DEFAULT_CHAIN_ID
    }

    pub fn default_token_decimals() -> u8 {
        DEFAULT_TOKEN_DECIMALS
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {0}: {1}")]
    FileRead(PathBuf, std::io::Error),
    #[error("Failed to parse config file: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl Config {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn host(&self) -> IpAddr {
        self.host
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn ledger_address(&self) -> ChecksummedAddress {
        *self.ledger_address
    }

    pub fn token(&self) -> &TokenConfig {
        &self.token
    }

    pub fn owner(&self) -> ChecksummedAddress {
        *self.owner
    }

    pub fn treasury(&self) -> ChecksummedAddress {
        *self.treasury
    }

    pub fn operator(&self) -> ChecksummedAddress {
        *self.operator
    }

    pub fn operator_key(&self) -> Option<&EvmPrivateKey> {
        self.operator_key.as_ref().map(|key| key.inner())
    }

    /// Reads and parses the config file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::FileRead(path.to_path_buf(), e))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }
}

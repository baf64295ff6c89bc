//! UsageX ledger node server.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | CLI arguments and the JSON configuration file |
//! | [`run`] | Ledger bootstrap, HTTP server and CLI subcommands |
//!
//! ```bash
//! cargo run --package usagex-server -- --config config.json
//! cargo run --package usagex-server -- hashes --user 0x90F7... --used 30 --nonce 0
//! ```

pub mod config;
pub mod run;

pub use run::run;

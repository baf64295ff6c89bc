#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Shared types for the UsageX pay-per-use settlement ledger.
//!
//! A user deposits a stablecoin balance into the settlement ledger, consumes a
//! service off-chain, and later settles with an operator-signed usage amount.
//! This crate holds the pieces every participant agrees on: how addresses and
//! 256-bit amounts travel over the wire, how human money strings turn into
//! token units, and how configuration values are resolved.
//!
//! # Modules
//!
//! - [`address`] - EIP-55 checksummed addresses and decimal `U256` serde helpers
//! - [`config`] - Environment variable resolution and private key parsing
//! - [`proto`] - JSON wire types exchanged with a ledger node
//! - [`timestamp`] - Unix timestamps for call expiry windows
//! - [`util`] - Human-readable money amounts

pub mod address;
pub mod config;
pub mod proto;
pub mod timestamp;
pub mod util;

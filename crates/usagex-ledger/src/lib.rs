#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Settlement ledger for pay-per-use billing.
//!
//! A user deposits a stablecoin balance, consumes a service off-chain, and
//! later settles: a trusted operator attests how much of the balance was used,
//! and the ledger pays that amount to the treasury and refunds the rest.
//!
//! # Protocol
//!
//! - [`SettlementLedger::deposit`] pulls approved funds from the caller.
//! - The operator signs an attestation of `(user, usedAmount, nonce, ledger,
//!   chainId)`; see [`attestation`] for the exact byte layout.
//! - [`SettlementLedger::settle`] verifies the operator signature and the
//!   account nonce, pays out in a single all-or-nothing batch, zeroes the
//!   balance and advances the nonce so the attestation cannot be replayed.
//!
//! # Modules
//!
//! - [`attestation`] - Message canonicalization and signer recovery
//! - [`ledger`] - Account state, deposit/settle, administration
//! - [`medium`] - The value-medium seam and an in-memory ERC-20
//! - [`events`] - Events emitted by successful operations
//! - [`attestor`] - Operator-side signing (feature `attestor`)
//!
//! # Feature Flags
//!
//! - `attestor` - Operator signing with a local private key
//! - `telemetry` - `tracing` instrumentation

pub mod attestation;
#[cfg(feature = "attestor")]
pub mod attestor;
pub mod error;
pub mod events;
pub mod ledger;
pub mod medium;

pub use attestation::{LedgerIdentity, SettlementAttestation, SettlementHashes};
pub use error::LedgerError;
pub use events::LedgerEvent;
pub use ledger::{Account, AdminConfig, SettlementLedger};
pub use medium::{MemoryToken, TokenError, Transfer, ValueMedium};

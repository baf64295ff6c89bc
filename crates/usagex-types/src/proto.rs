//! JSON wire types exchanged with a ledger node.
//!
//! All 256-bit integers travel as decimal strings, all addresses in EIP-55
//! checksummed form, hashes and signatures as `0x`-prefixed hex.

use alloy_primitives::{B256, Bytes, U256};
use serde::{Deserialize, Serialize};

use crate::address::{ChecksummedAddress, decimal_u256};

/// Identity and administrative addresses of a ledger instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LedgerInfoResponse {
    pub chain_id: u64,
    pub ledger: ChecksummedAddress,
    pub token: ChecksummedAddress,
    pub token_decimals: u8,
    pub treasury: ChecksummedAddress,
    pub operator: ChecksummedAddress,
    pub owner: ChecksummedAddress,
}

/// Balance and nonce of a single ledger account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub user: ChecksummedAddress,
    #[serde(with = "decimal_u256")]
    pub balance: U256,
    #[serde(with = "decimal_u256")]
    pub nonce: U256,
}

/// Query for the two intermediate settlement hashes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SettlementHashesQuery {
    pub user: ChecksummedAddress,
    #[serde(with = "decimal_u256")]
    pub used_amount: U256,
    #[serde(with = "decimal_u256")]
    pub nonce: U256,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SettlementHashesResponse {
    /// Keccak-256 of the packed attestation fields.
    pub message_hash: B256,
    /// The personal-sign hash the operator actually signs.
    pub prefixed_signed_hash: B256,
}

/// A settlement relayed on behalf of `user`.
///
/// Anyone holding the operator's attestation may submit it; funds only ever
/// move to the treasury and back to `user`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SettleRequest {
    pub user: ChecksummedAddress,
    #[serde(with = "decimal_u256")]
    pub used_amount: U256,
    #[serde(with = "decimal_u256")]
    pub nonce: U256,
    pub signature: Bytes,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SettleResponse {
    pub user: ChecksummedAddress,
    #[serde(with = "decimal_u256")]
    pub used_amount: U256,
    #[serde(with = "decimal_u256")]
    pub refund_amount: U256,
    /// The account nonce after settlement.
    #[serde(with = "decimal_u256")]
    pub nonce: U256,
}

/// Attestation signed by the node's operator key at the user's current nonce.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttestResponse {
    pub user: ChecksummedAddress,
    #[serde(with = "decimal_u256")]
    pub used_amount: U256,
    #[serde(with = "decimal_u256")]
    pub nonce: U256,
    pub signature: Bytes,
}

/// Value-medium position of a holder relative to the ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TokenHoldingResponse {
    pub holder: ChecksummedAddress,
    #[serde(with = "decimal_u256")]
    pub balance: U256,
    /// Allowance granted by `holder` to the ledger.
    #[serde(with = "decimal_u256")]
    pub allowance: U256,
}

/// Error body returned by every failing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    /// Stable machine-readable reason, e.g. `invalid_signature`.
    pub reason: String,
    pub error: String,
}

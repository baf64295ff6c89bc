//! Settlement attestation canonicalization and signer recovery.
//!
//! The operator certifies usage by signing a deterministic message. Ledger and
//! signer must build it bit-for-bit identically, otherwise the signature simply
//! fails to verify:
//!
//! 1. Pack `(user, usedAmount, nonce, ledger, chainId)` with Solidity packed
//!    encoding: address as 20 bytes, each integer as a 32-byte big-endian word.
//!    The packed message is always 136 bytes.
//! 2. `messageHash = keccak256(packed)`.
//! 3. `prefixedSignedHash = keccak256("\x19Ethereum Signed Message:\n32" ‖ messageHash)`,
//!    the EIP-191 `personal_sign` wrapping a wallet applies when asked to sign
//!    the 32 bytes of `messageHash`.
//!
//! The operator signs `prefixedSignedHash`; the ledger recovers the signer from
//! it. The two-stage shape exists so standard wallet tooling (`signMessage`)
//! can produce attestations and must not be collapsed into a single hash.

use alloy_primitives::{Address, B256, Signature, U256, eip191_hash_message, keccak256, uint};
use alloy_sol_types::SolValue;
use serde::{Deserialize, Serialize};

/// Length of the packed attestation: 20 + 32 + 32 + 20 + 32.
pub const PACKED_ATTESTATION_LEN: usize = 136;

/// Half the secp256k1 group order. Signatures with a larger `s` are the
/// malleable twin of a canonical signature and are refused.
const SECP256K1N_HALF: U256 =
    uint!(0x7FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF5D576E7357A4501DDFE92F46681B20A0_U256);

/// Where a ledger lives: its own address and the chain it is bound to.
///
/// Both are part of every attestation, so a signature for one ledger instance
/// (or one chain) is worthless on any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerIdentity {
    pub address: Address,
    pub chain_id: u64,
}

impl LedgerIdentity {
    pub fn new(address: Address, chain_id: u64) -> Self {
        Self { address, chain_id }
    }

    /// Builds the attestation for `user` settling `used_amount` at `nonce` on this ledger.
    pub fn attestation(&self, user: Address, used_amount: U256, nonce: U256) -> SettlementAttestation {
        SettlementAttestation {
            user,
            used_amount,
            nonce,
            ledger: self.address,
            chain_id: U256::from(self.chain_id),
        }
    }
}

/// The tuple the operator certifies. Never persisted; the ledger's only trace
/// of a consumed attestation is the account nonce moving past it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementAttestation {
    pub user: Address,
    pub used_amount: U256,
    pub nonce: U256,
    pub ledger: Address,
    pub chain_id: U256,
}

/// The two intermediate hashes of an attestation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementHashes {
    pub message_hash: B256,
    pub prefixed_signed_hash: B256,
}

impl SettlementAttestation {
    /// Solidity packed encoding of the attestation fields.
    pub fn packed(&self) -> Vec<u8> {
        (
            self.user,
            self.used_amount,
            self.nonce,
            self.ledger,
            self.chain_id,
        )
            .abi_encode_packed()
    }

    pub fn message_hash(&self) -> B256 {
        keccak256(self.packed())
    }

    pub fn prefixed_signed_hash(&self) -> B256 {
        eip191_hash_message(self.message_hash())
    }

    pub fn hashes(&self) -> SettlementHashes {
        let message_hash = self.message_hash();
        SettlementHashes {
            message_hash,
            prefixed_signed_hash: eip191_hash_message(message_hash),
        }
    }
}

/// Why a signature could not be turned into a signer address.
///
/// Only ever logged; callers of the ledger see a plain `InvalidSignature`.
#[derive(Debug, thiserror::Error)]
pub enum SignatureCheckError {
    #[error("signature must be 65 bytes, got {0}")]
    Length(usize),
    #[error("unsupported recovery byte {0}")]
    RecoveryByte(u8),
    #[error("signature s value is not in the lower half order")]
    Malleable,
    #[error(transparent)]
    Recovery(#[from] alloy_primitives::SignatureError),
}

/// Recovers the address that produced `signature` over `prefixed_hash`.
///
/// Accepts 65-byte `r ‖ s ‖ v` signatures with `v` in `{27, 28}` (wallet
/// convention) or `{0, 1}`. High-`s` signatures are rejected.
pub fn recover_signer(prefixed_hash: &B256, signature: &[u8]) -> Result<Address, SignatureCheckError> {
    if signature.len() != 65 {
        return Err(SignatureCheckError::Length(signature.len()));
    }
    let v = signature[64];
    if !matches!(v, 0 | 1 | 27 | 28) {
        return Err(SignatureCheckError::RecoveryByte(v));
    }
    let signature = Signature::try_from(signature)?;
    if signature.s() > SECP256K1N_HALF {
        return Err(SignatureCheckError::Malleable);
    }
    let signer = signature.recover_address_from_prehash(prefixed_hash)?;
    Ok(signer)
}

//! Caller authentication for state-changing HTTP calls.
//!
//! On a chain, the transaction signature tells the ledger who `msg.sender` is.
//! Over HTTP the caller signs the call instead. A [`SignedCall`] is an
//! authorization in the spirit of ERC-3009: it names the caller, carries a
//! deadline and a random 32-byte nonce, and is signed as an EIP-191 personal
//! message over
//!
//! ```text
//! keccak256("usagex.call" ‖ ledger ‖ chainId ‖ caller ‖ kind ‖ argument ‖ validBefore ‖ nonce)
//! ```
//!
//! with addresses as 20 bytes, integers as 32-byte big-endian words, `kind` as
//! one byte and `argument` an amount (32 bytes), an address (20 bytes) or, for
//! attestation requests, a user address followed by an amount. Every
//! `(caller, nonce)` pair is accepted at most once, and `validBefore` may lie at
//! most [`MAX_CALL_WINDOW_SECS`] ahead of the node's clock.

use alloy_primitives::{Address, B256, Bytes, U256, keccak256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rand::{Rng, rng};
use serde::{Deserialize, Serialize};
use usagex_ledger::LedgerIdentity;
use usagex_ledger::attestation::recover_signer;
use usagex_types::address::{ChecksummedAddress, decimal_u256};
use usagex_types::timestamp::UnixTimestamp;

const CALL_DOMAIN: &[u8] = b"usagex.call";

/// Furthest a call deadline may lie in the future. Consumed nonces are kept
/// until their deadline passes, so this also bounds how long they are tracked.
pub const MAX_CALL_WINDOW_SECS: u64 = 600;

/// A state-changing operation a caller may ask the node to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Call {
    /// Allow the ledger to pull `amount` of the value medium from the caller.
    Approve {
        #[serde(with = "decimal_u256")]
        amount: U256,
    },
    Deposit {
        #[serde(with = "decimal_u256")]
        amount: U256,
    },
    SetTreasury { address: ChecksummedAddress },
    SetOperator { address: ChecksummedAddress },
    TransferOwnership { address: ChecksummedAddress },
    /// Ask the node's operator key to attest `used_amount` for `user`. Only the
    /// ledger's current operator may make this call.
    Attest {
        user: ChecksummedAddress,
        #[serde(rename = "usedAmount", with = "decimal_u256")]
        used_amount: U256,
    },
}

impl Call {
    fn kind_byte(&self) -> u8 {
        match self {
            Call::Approve { .. } => 1,
            Call::Deposit { .. } => 2,
            Call::SetTreasury { .. } => 3,
            Call::SetOperator { .. } => 4,
            Call::TransferOwnership { .. } => 5,
            Call::Attest { .. } => 6,
        }
    }

    fn write_argument(&self, buf: &mut Vec<u8>) {
        match self {
            Call::Approve { amount } | Call::Deposit { amount } => {
                buf.extend_from_slice(&amount.to_be_bytes::<32>())
            }
            Call::SetTreasury { address }
            | Call::SetOperator { address }
            | Call::TransferOwnership { address } => buf.extend_from_slice(address.0.as_slice()),
            Call::Attest { user, used_amount } => {
                buf.extend_from_slice(user.0.as_slice());
                buf.extend_from_slice(&used_amount.to_be_bytes::<32>());
            }
        }
    }
}

/// A [`Call`] authorized by its caller's signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedCall {
    pub caller: ChecksummedAddress,
    pub call: Call,
    pub valid_before: UnixTimestamp,
    pub nonce: B256,
    pub signature: Bytes,
}

impl SignedCall {
    /// Keccak-256 of the packed call; the caller signs this as a personal message.
    pub fn message_hash(&self, identity: &LedgerIdentity) -> B256 {
        let mut buf = Vec::with_capacity(CALL_DOMAIN.len() + 20 + 32 + 20 + 1 + 52 + 32 + 32);
        buf.extend_from_slice(CALL_DOMAIN);
        buf.extend_from_slice(identity.address.as_slice());
        buf.extend_from_slice(&U256::from(identity.chain_id).to_be_bytes::<32>());
        buf.extend_from_slice(self.caller.0.as_slice());
        buf.push(self.call.kind_byte());
        self.call.write_argument(&mut buf);
        buf.extend_from_slice(&U256::from(self.valid_before.as_secs()).to_be_bytes::<32>());
        buf.extend_from_slice(self.nonce.as_slice());
        keccak256(buf)
    }

    /// Builds and signs a call with a fresh random nonce.
    pub fn sign(
        signer: &PrivateKeySigner,
        identity: &LedgerIdentity,
        call: Call,
        valid_before: UnixTimestamp,
    ) -> Result<Self, alloy_signer::Error> {
        let nonce: [u8; 32] = rng().random();
        let mut signed = SignedCall {
            caller: signer.address().into(),
            call,
            valid_before,
            nonce: B256::from(nonce),
            signature: Bytes::new(),
        };
        let signature = signer.sign_message_sync(signed.message_hash(identity).as_slice())?;
        signed.signature = Bytes::from(signature.as_bytes().to_vec());
        Ok(signed)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CallAuthError {
    #[error("Call expired at {0}")]
    Expired(UnixTimestamp),
    #[error("Call deadline {0} is more than {MAX_CALL_WINDOW_SECS}s ahead")]
    WindowTooLong(UnixTimestamp),
    #[error("Call is not signed by its caller")]
    BadSignature,
    #[error("Call nonce already used")]
    Replayed,
}

impl CallAuthError {
    pub fn reason(&self) -> &'static str {
        match self {
            CallAuthError::Expired(_) => "call_expired",
            CallAuthError::WindowTooLong(_) => "call_window_too_long",
            CallAuthError::BadSignature => "call_bad_signature",
            CallAuthError::Replayed => "call_replayed",
        }
    }
}

/// Tracks consumed call nonces until their calls expire.
#[derive(Debug, Default)]
pub struct CallGuard {
    used: DashMap<(Address, B256), UnixTimestamp>,
}

impl CallGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks deadline and signature, then consumes the call nonce.
    ///
    /// The deadline must be after `now` and no more than
    /// [`MAX_CALL_WINDOW_SECS`] beyond it.
    ///
    /// The nonce is consumed even if the ledger later rejects the call; the
    /// caller signs a new call to retry.
    pub fn authorize(
        &self,
        identity: &LedgerIdentity,
        call: &SignedCall,
        now: UnixTimestamp,
    ) -> Result<Address, CallAuthError> {
        if call.valid_before <= now {
            return Err(CallAuthError::Expired(call.valid_before));
        }
        if call.valid_before > now + MAX_CALL_WINDOW_SECS {
            return Err(CallAuthError::WindowTooLong(call.valid_before));
        }
        let hash = alloy_primitives::eip191_hash_message(call.message_hash(identity));
        let signer =
            recover_signer(&hash, &call.signature).map_err(|_| CallAuthError::BadSignature)?;
        if signer != call.caller.0 {
            return Err(CallAuthError::BadSignature);
        }

        // Expired entries can go: their calls fail the deadline check anyway.
        self.used.retain(|_, valid_before| *valid_before > now);
        match self.used.entry((signer, call.nonce)) {
            Entry::Occupied(_) => Err(CallAuthError::Replayed),
            Entry::Vacant(entry) => {
                entry.insert(call.valid_before);
                Ok(signer)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}

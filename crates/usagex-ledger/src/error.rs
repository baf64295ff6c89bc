use crate::medium::TokenError;

/// Every way a ledger operation can fail.
///
/// Failures are synchronous and final for the attempted operation: nothing is
/// persisted, and the caller must correct the input (re-sign, re-approve, use
/// the right caller) and resubmit.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Deposit of zero.
    #[error("Amount must be greater than zero")]
    ZeroAmount,
    /// A constructor argument or administrative target is the zero address.
    #[error("Address must not be zero")]
    ZeroAddress,
    /// The settlement attestation is not signed by the operator, or it encodes
    /// a nonce other than the account's current one.
    ///
    /// Both causes surface as this single variant on purpose: the ledger never
    /// tells a submitter which part of verification failed.
    #[error("Invalid settlement signature")]
    InvalidSignature,
    /// Settlement attempted against an empty account.
    #[error("Nothing to settle")]
    InsufficientBalance,
    /// The attested usage exceeds the deposited balance.
    #[error("Used amount exceeds balance")]
    UsedExceedsBalance,
    /// Administrative call from an address other than the owner.
    #[error("Caller is not the owner")]
    NotOwner,
    /// The value medium refused to move funds.
    #[error(transparent)]
    Transfer(#[from] TokenError),
}

impl LedgerError {
    /// Stable snake-case identifier, suitable for wire responses.
    pub fn reason(&self) -> &'static str {
        match self {
            LedgerError::ZeroAmount => "zero_amount",
            LedgerError::ZeroAddress => "zero_address",
            LedgerError::InvalidSignature => "invalid_signature",
            LedgerError::InsufficientBalance => "insufficient_balance",
            LedgerError::UsedExceedsBalance => "used_exceeds_balance",
            LedgerError::NotOwner => "not_owner",
            LedgerError::Transfer(e) => e.reason(),
        }
    }
}

//! Operator-side signing of settlement attestations.
//!
//! The operator never talks to the ledger directly. It computes a usage figure,
//! signs the attestation for the account's current nonce, and hands the
//! signature to the user or a relayer, who submits it with `settle`.
//!
//! ```ignore
//! use usagex_ledger::attestor::OperatorAttestor;
//! use usagex_ledger::LedgerIdentity;
//!
//! let attestor = OperatorAttestor::from_private_key(&key)?;
//! let signature = attestor.sign_settlement(&identity, user, used_amount, nonce)?;
//! ```

use alloy_primitives::{Address, B256, Bytes, U256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;

use crate::attestation::{LedgerIdentity, SettlementAttestation};

#[derive(Debug, thiserror::Error)]
pub enum AttestorError {
    #[error("Invalid operator key: {0}")]
    InvalidKey(String),
    #[error("Signing failed: {0}")]
    Signing(#[from] alloy_signer::Error),
}

/// Signs settlement attestations with the operator key.
#[derive(Debug, Clone)]
pub struct OperatorAttestor {
    signer: PrivateKeySigner,
}

impl OperatorAttestor {
    pub fn new(signer: PrivateKeySigner) -> Self {
        Self { signer }
    }

    pub fn from_private_key(key: &B256) -> Result<Self, AttestorError> {
        let signer =
            PrivateKeySigner::from_bytes(key).map_err(|e| AttestorError::InvalidKey(e.to_string()))?;
        Ok(Self::new(signer))
    }

    /// The address the ledger must have configured as operator.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Signs the 32 bytes of the attestation's `messageHash` as a personal
    /// message, exactly as a wallet's `signMessage` would. Returns the
    /// 65-byte `r ‖ s ‖ v` signature with `v` in `{27, 28}`.
    pub fn sign(&self, attestation: &SettlementAttestation) -> Result<Bytes, AttestorError> {
        let signature = self
            .signer
            .sign_message_sync(attestation.message_hash().as_slice())?;
        Ok(Bytes::from(signature.as_bytes().to_vec()))
    }

    pub fn sign_settlement(
        &self,
        identity: &LedgerIdentity,
        user: Address,
        used_amount: U256,
        nonce: U256,
    ) -> Result<Bytes, AttestorError> {
        self.sign(&identity.attestation(user, used_amount, nonce))
    }
}

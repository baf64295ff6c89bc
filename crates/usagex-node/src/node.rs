//! The ledger node: one [`SettlementLedger`] plus everything needed to drive
//! it over HTTP.
//!
//! [`LedgerNode`] owns the ledger, the in-memory value medium it settles in,
//! the guard against replayed [`SignedCall`]s and, optionally, an
//! [`OperatorAttestor`] that signs attestations for the ledger's operator.

use alloy_primitives::{Address, U256};
use serde::Serialize;
use usagex_ledger::attestor::OperatorAttestor;
use usagex_ledger::{LedgerEvent, MemoryToken, SettlementLedger, ValueMedium};
use usagex_types::address::ChecksummedAddress;
use usagex_types::proto;
use usagex_types::timestamp::UnixTimestamp;

use crate::call_auth::{Call, CallGuard, SignedCall};
use crate::error::NodeError;

/// Result of an executed [`SignedCall`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallResponse {
    pub caller: ChecksummedAddress,
    /// The ledger event the call produced. Approvals only touch the value
    /// medium and produce none.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<LedgerEvent>,
}

pub struct LedgerNode {
    ledger: SettlementLedger<MemoryToken>,
    calls: CallGuard,
    attestor: Option<OperatorAttestor>,
}

impl LedgerNode {
    pub fn new(ledger: SettlementLedger<MemoryToken>) -> Self {
        Self {
            ledger,
            calls: CallGuard::new(),
            attestor: None,
        }
    }

    /// Serves `POST /attest` with this attestor. Requests must be signed calls
    /// from the ledger's current operator.
    pub fn with_attestor(mut self, attestor: OperatorAttestor) -> Self {
        self.attestor = Some(attestor);
        self
    }

    pub fn ledger(&self) -> &SettlementLedger<MemoryToken> {
        &self.ledger
    }

    pub fn attestor(&self) -> Option<&OperatorAttestor> {
        self.attestor.as_ref()
    }

    pub async fn info(&self) -> proto::LedgerInfoResponse {
        let identity = self.ledger.identity();
        let admin = self.ledger.admin().await;
        proto::LedgerInfoResponse {
            chain_id: identity.chain_id,
            ledger: identity.address.into(),
            token: self.ledger.token().into(),
            token_decimals: self.ledger.medium().decimals(),
            treasury: admin.treasury.into(),
            operator: admin.operator.into(),
            owner: admin.owner.into(),
        }
    }

    pub async fn account(&self, user: Address) -> proto::AccountResponse {
        let account = self.ledger.account(user).await;
        proto::AccountResponse {
            user: user.into(),
            balance: account.balance,
            nonce: account.nonce,
        }
    }

    pub fn settlement_hashes(
        &self,
        query: &proto::SettlementHashesQuery,
    ) -> proto::SettlementHashesResponse {
        let hashes = self
            .ledger
            .settlement_hashes(query.user.0, query.used_amount, query.nonce);
        proto::SettlementHashesResponse {
            message_hash: hashes.message_hash,
            prefixed_signed_hash: hashes.prefixed_signed_hash,
        }
    }

    pub async fn token_holding(
        &self,
        holder: Address,
    ) -> Result<proto::TokenHoldingResponse, NodeError> {
        let medium = self.ledger.medium();
        let balance = medium.balance_of(holder).await?;
        let allowance = medium
            .allowance(holder, self.ledger.identity().address)
            .await?;
        Ok(proto::TokenHoldingResponse {
            holder: holder.into(),
            balance,
            allowance,
        })
    }

    /// Relays a settlement on behalf of `request.user`.
    pub async fn settle(
        &self,
        request: &proto::SettleRequest,
    ) -> Result<proto::SettleResponse, NodeError> {
        let settled = self
            .ledger
            .settle(
                request.user.0,
                request.used_amount,
                request.nonce,
                &request.signature,
            )
            .await?;
        Ok(proto::SettleResponse {
            user: settled.user.into(),
            used_amount: settled.used_amount,
            refund_amount: settled.refund_amount,
            nonce: self.ledger.nonce_of(settled.user).await,
        })
    }

    /// Authenticates a signed call and performs it as its caller.
    pub async fn execute(
        &self,
        signed: &SignedCall,
        now: UnixTimestamp,
    ) -> Result<CallResponse, NodeError> {
        if matches!(signed.call, Call::Attest { .. }) {
            return Err(NodeError::UnexpectedCall("attest"));
        }
        let caller = self.calls.authorize(&self.ledger.identity(), signed, now)?;
        tracing::debug!(%caller, call = ?signed.call, "Executing call");

        let event: Option<LedgerEvent> = match signed.call {
            Call::Approve { amount } => {
                self.ledger
                    .medium()
                    .approve(caller, self.ledger.identity().address, amount)
                    .await?;
                None
            }
            Call::Deposit { amount } => Some(self.ledger.deposit(caller, amount).await?.into()),
            Call::SetTreasury { address } => Some(LedgerEvent::TreasuryUpdated(
                self.ledger.set_treasury(caller, address.0).await?,
            )),
            Call::SetOperator { address } => Some(LedgerEvent::OperatorUpdated(
                self.ledger.set_operator(caller, address.0).await?,
            )),
            Call::TransferOwnership { address } => Some(LedgerEvent::OwnershipTransferred(
                self.ledger.transfer_ownership(caller, address.0).await?,
            )),
            Call::Attest { .. } => return Err(NodeError::UnexpectedCall("attest")),
        };
        Ok(CallResponse {
            caller: caller.into(),
            event,
        })
    }

    /// Signs an attestation of `used_amount` at the user's current nonce.
    ///
    /// `signed` must be a [`Call::Attest`] from the ledger's current operator;
    /// anyone else is refused with [`NodeError::NotOperator`].
    pub async fn attest(
        &self,
        signed: &SignedCall,
        now: UnixTimestamp,
    ) -> Result<proto::AttestResponse, NodeError> {
        let attestor = self.attestor.as_ref().ok_or(NodeError::AttestorDisabled)?;
        let Call::Attest { user, used_amount } = signed.call else {
            return Err(NodeError::UnexpectedCall("non-attest"));
        };
        let caller = self.calls.authorize(&self.ledger.identity(), signed, now)?;
        if caller != self.ledger.operator().await {
            return Err(NodeError::NotOperator);
        }
        let nonce = self.ledger.nonce_of(user.0).await;
        let signature =
            attestor.sign_settlement(&self.ledger.identity(), user.0, used_amount, nonce)?;
        tracing::info!(%user, %used_amount, %nonce, "Attested settlement");
        Ok(proto::AttestResponse {
            user,
            used_amount,
            nonce,
            signature,
        })
    }

    /// Credits `amount` of the value medium to `to`, for bootstrapping.
    pub async fn mint(&self, to: Address, amount: U256) -> Result<(), NodeError> {
        self.ledger.medium().mint(to, amount).await?;
        Ok(())
    }
}

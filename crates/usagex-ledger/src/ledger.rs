//! The settlement ledger state machine.
//!
//! Each account moves between two states: *active* (non-zero balance) and
//! *settled* (zero balance). `deposit` moves it to active, `settle` back to
//! settled and advances the account nonce. Accounts are never removed.
//!
//! Mutations of one account are serialized through a per-account lock, and the
//! lock is held across the value-medium call. Settlement pays the treasury and
//! refunds the user in one all-or-nothing batch before any account state is
//! touched, so a failed transfer leaves the ledger exactly as it was.

use alloy_primitives::{Address, B256, U256};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock, broadcast};

#[cfg(feature = "telemetry")]
use tracing::instrument;

use crate::attestation::{LedgerIdentity, SettlementHashes, recover_signer};
use crate::error::LedgerError;
use crate::events::{AddressUpdated, Deposit, LedgerEvent, Settled};
use crate::medium::{TokenError, Transfer, ValueMedium};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Per-user ledger record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Account {
    pub balance: U256,
    pub nonce: U256,
}

/// Owner-managed addresses of a ledger instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminConfig {
    pub treasury: Address,
    pub operator: Address,
    pub owner: Address,
}

/// Holds deposited balances and executes operator-attested settlements.
///
/// Generic over the value medium so the same state machine runs against the
/// in-memory token in tests and any other ERC-20 backend.
#[derive(Debug)]
pub struct SettlementLedger<M> {
    identity: LedgerIdentity,
    token: Address,
    medium: M,
    admin: RwLock<AdminConfig>,
    accounts: DashMap<Address, Arc<Mutex<Account>>>,
    events: broadcast::Sender<LedgerEvent>,
}

impl<M> SettlementLedger<M> {
    /// Creates a ledger. `deployer` becomes the owner.
    ///
    /// Fails with [`LedgerError::ZeroAddress`] if `token`, `treasury`,
    /// `operator` or `deployer` is zero.
    pub fn new(
        identity: LedgerIdentity,
        medium: M,
        token: Address,
        treasury: Address,
        operator: Address,
        deployer: Address,
    ) -> Result<Self, LedgerError> {
        if token.is_zero() || treasury.is_zero() || operator.is_zero() || deployer.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            identity,
            token,
            medium,
            admin: RwLock::new(AdminConfig {
                treasury,
                operator,
                owner: deployer,
            }),
            accounts: DashMap::new(),
            events,
        })
    }

    pub fn identity(&self) -> LedgerIdentity {
        self.identity
    }

    /// The ledger's own address, which holds all deposits in custody.
    pub fn address(&self) -> Address {
        self.identity.address
    }

    pub fn chain_id(&self) -> u64 {
        self.identity.chain_id
    }

    pub fn token(&self) -> Address {
        self.token
    }

    pub fn medium(&self) -> &M {
        &self.medium
    }

    pub async fn admin(&self) -> AdminConfig {
        *self.admin.read().await
    }

    pub async fn treasury(&self) -> Address {
        self.admin.read().await.treasury
    }

    pub async fn operator(&self) -> Address {
        self.admin.read().await.operator
    }

    pub async fn owner(&self) -> Address {
        self.admin.read().await.owner
    }

    /// Receives every event emitted after the call.
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    /// Deposited balance of `user`; zero for unknown accounts.
    pub async fn balance_of(&self, user: Address) -> U256 {
        self.account(user).await.balance
    }

    /// Current settlement nonce of `user`; zero for unknown accounts.
    pub async fn nonce_of(&self, user: Address) -> U256 {
        self.account(user).await.nonce
    }

    /// Snapshot of an account. Waits for any in-flight mutation of it to finish.
    pub async fn account(&self, user: Address) -> Account {
        let slot = self.accounts.get(&user).map(|slot| slot.value().clone());
        match slot {
            Some(slot) => *slot.lock().await,
            None => Account::default(),
        }
    }

    /// The `messageHash` and `prefixedSignedHash` the operator must produce a
    /// signature over for `user` settling `used_amount` at `nonce`.
    ///
    /// Off-ledger signing code compares these against its own construction
    /// before asking the operator to sign.
    pub fn settlement_hashes(&self, user: Address, used_amount: U256, nonce: U256) -> SettlementHashes {
        self.identity.attestation(user, used_amount, nonce).hashes()
    }

    /// Recovers the signer of `signature` over a prefixed settlement hash.
    pub fn recover_settlement_signer(
        &self,
        prefixed_signed_hash: &B256,
        signature: &[u8],
    ) -> Result<Address, LedgerError> {
        recover_signer(prefixed_signed_hash, signature).map_err(|_| LedgerError::InvalidSignature)
    }

    fn slot(&self, user: Address) -> Arc<Mutex<Account>> {
        self.accounts.entry(user).or_default().value().clone()
    }

    fn emit(&self, event: LedgerEvent) {
        #[cfg(feature = "telemetry")]
        tracing::info!(?event, ledger = %self.identity.address, "Ledger event");
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

impl<M: ValueMedium> SettlementLedger<M> {
    /// Pulls `amount` from `caller` into the ledger and credits their account.
    ///
    /// The caller must have approved the ledger for at least `amount` on the
    /// value medium. Medium failures surface as [`LedgerError::Transfer`].
    #[cfg_attr(feature = "telemetry", instrument(skip(self), err))]
    pub async fn deposit(&self, caller: Address, amount: U256) -> Result<Deposit, LedgerError> {
        if amount.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }
        let slot = self.slot(caller);
        let mut account = slot.lock().await;
        // Checked before any funds move.
        let credited = account
            .balance
            .checked_add(amount)
            .ok_or(LedgerError::Transfer(TokenError::SupplyOverflow))?;
        let custody = self.identity.address;
        self.medium
            .transfer_from(custody, caller, custody, amount)
            .await?;
        account.balance = credited;
        drop(account);

        let event = Deposit {
            user: caller,
            amount,
        };
        self.emit(event.into());
        Ok(event)
    }

    /// Settles the caller's entire balance against an operator attestation.
    ///
    /// Pays `used_amount` to the treasury and refunds the remainder to the
    /// caller, then zeroes the balance and advances the nonce.
    ///
    /// Checks, in order:
    /// 1. An empty account fails with [`LedgerError::InsufficientBalance`],
    ///    whatever the signature.
    /// 2. The signature must recover to the operator over the attestation for
    ///    `(caller, used_amount, nonce)` and `nonce` must be the account's
    ///    current nonce. A forged signature and a stale or future nonce both
    ///    fail with the same [`LedgerError::InvalidSignature`], so a submitter
    ///    cannot learn which one was wrong.
    /// 3. `used_amount` above the balance fails with
    ///    [`LedgerError::UsedExceedsBalance`].
    #[cfg_attr(
        feature = "telemetry",
        instrument(skip(self, signature), fields(signature_len = signature.len()), err)
    )]
    pub async fn settle(
        &self,
        caller: Address,
        used_amount: U256,
        nonce: U256,
        signature: &[u8],
    ) -> Result<Settled, LedgerError> {
        // Held for the whole settlement so treasury and operator cannot change mid-flight.
        let admin = self.admin.read().await;
        let slot = self.slot(caller);
        let mut account = slot.lock().await;

        if account.balance.is_zero() {
            return Err(LedgerError::InsufficientBalance);
        }

        let prefixed_hash = self
            .identity
            .attestation(caller, used_amount, nonce)
            .prefixed_signed_hash();
        let signer = recover_signer(&prefixed_hash, signature);
        #[cfg(feature = "telemetry")]
        if let Err(error) = &signer {
            tracing::debug!(%error, "Settlement signature unrecoverable");
        }
        let authorized = matches!(signer, Ok(signer) if signer == admin.operator);
        if !authorized || nonce != account.nonce {
            return Err(LedgerError::InvalidSignature);
        }

        if used_amount > account.balance {
            return Err(LedgerError::UsedExceedsBalance);
        }

        let refund_amount = account.balance - used_amount;
        let payouts = [
            Transfer {
                to: admin.treasury,
                amount: used_amount,
            },
            Transfer {
                to: caller,
                amount: refund_amount,
            },
        ];
        self.medium
            .transfer_batch(self.identity.address, &payouts)
            .await?;

        account.balance = U256::ZERO;
        account.nonce += U256::from(1u8);
        drop(account);
        drop(admin);

        let event = Settled {
            user: caller,
            used_amount,
            refund_amount,
        };
        self.emit(event.into());
        Ok(event)
    }

    #[cfg_attr(feature = "telemetry", instrument(skip(self), err))]
    pub async fn set_treasury(
        &self,
        caller: Address,
        treasury: Address,
    ) -> Result<AddressUpdated, LedgerError> {
        let event = self
            .update_admin(caller, treasury, |admin| &mut admin.treasury)
            .await?;
        self.emit(LedgerEvent::TreasuryUpdated(event));
        Ok(event)
    }

    #[cfg_attr(feature = "telemetry", instrument(skip(self), err))]
    pub async fn set_operator(
        &self,
        caller: Address,
        operator: Address,
    ) -> Result<AddressUpdated, LedgerError> {
        let event = self
            .update_admin(caller, operator, |admin| &mut admin.operator)
            .await?;
        self.emit(LedgerEvent::OperatorUpdated(event));
        Ok(event)
    }

    #[cfg_attr(feature = "telemetry", instrument(skip(self), err))]
    pub async fn transfer_ownership(
        &self,
        caller: Address,
        owner: Address,
    ) -> Result<AddressUpdated, LedgerError> {
        let event = self
            .update_admin(caller, owner, |admin| &mut admin.owner)
            .await?;
        self.emit(LedgerEvent::OwnershipTransferred(event));
        Ok(event)
    }

    async fn update_admin<F>(
        &self,
        caller: Address,
        value: Address,
        field: F,
    ) -> Result<AddressUpdated, LedgerError>
    where
        F: FnOnce(&mut AdminConfig) -> &mut Address,
    {
        let mut admin = self.admin.write().await;
        if caller != admin.owner {
            return Err(LedgerError::NotOwner);
        }
        if value.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }
        let slot = field(&mut admin);
        let previous = std::mem::replace(slot, value);
        Ok(AddressUpdated {
            previous,
            current: value,
        })
    }
}

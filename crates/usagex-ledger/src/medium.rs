//! The value transfer medium: a fungible token with ERC-20 transfer and
//! allowance semantics.
//!
//! The ledger only ever talks to the medium through [`ValueMedium`]. Deposits
//! pull funds with `transfer_from` (which needs the depositor's prior
//! `approve`), settlements push the treasury payment and the refund with a
//! single all-or-nothing [`ValueMedium::transfer_batch`].
//!
//! [`MemoryToken`] is the in-process implementation, the equivalent of a
//! mintable mock ERC-20.

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[cfg(feature = "telemetry")]
use tracing::instrument;

/// A single outgoing transfer within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    pub to: Address,
    pub amount: U256,
}

/// Failures reported by the value medium.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Insufficient token balance of {holder}: has {balance}, needs {needed}")]
    InsufficientBalance {
        holder: Address,
        balance: U256,
        needed: U256,
    },
    #[error("Insufficient allowance from {owner} to {spender}: has {allowance}, needs {needed}")]
    InsufficientAllowance {
        owner: Address,
        spender: Address,
        allowance: U256,
        needed: U256,
    },
    #[error("Token transfer to the zero address")]
    ZeroRecipient,
    #[error("Token supply overflow")]
    SupplyOverflow,
    #[error("Value medium unavailable: {0}")]
    Unavailable(String),
}

impl TokenError {
    pub fn reason(&self) -> &'static str {
        match self {
            TokenError::InsufficientBalance { .. } => "token_insufficient_balance",
            TokenError::InsufficientAllowance { .. } => "token_insufficient_allowance",
            TokenError::ZeroRecipient => "token_zero_recipient",
            TokenError::SupplyOverflow => "token_supply_overflow",
            TokenError::Unavailable(_) => "token_unavailable",
        }
    }
}

/// Operations the ledger needs from a fungible token.
#[async_trait]
pub trait ValueMedium: Send + Sync {
    async fn balance_of(&self, holder: Address) -> Result<U256, TokenError>;

    async fn allowance(&self, owner: Address, spender: Address) -> Result<U256, TokenError>;

    /// Sets (not adds to) the amount `spender` may pull from `owner`.
    async fn approve(&self, owner: Address, spender: Address, amount: U256)
    -> Result<(), TokenError>;

    async fn transfer(&self, from: Address, to: Address, amount: U256) -> Result<(), TokenError>;

    /// Moves `amount` from `from` to `to` on behalf of `spender`, consuming allowance.
    async fn transfer_from(
        &self,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), TokenError>;

    /// Executes every transfer from `from`, or none of them.
    async fn transfer_batch(&self, from: Address, transfers: &[Transfer])
    -> Result<(), TokenError>;
}

#[derive(Debug, Default)]
struct TokenState {
    balances: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
    total_supply: U256,
}

impl TokenState {
    fn balance(&self, holder: &Address) -> U256 {
        self.balances.get(holder).copied().unwrap_or_default()
    }

    fn move_funds(&mut self, from: Address, to: Address, amount: U256) -> Result<(), TokenError> {
        if to.is_zero() {
            return Err(TokenError::ZeroRecipient);
        }
        let balance = self.balance(&from);
        if balance < amount {
            return Err(TokenError::InsufficientBalance {
                holder: from,
                balance,
                needed: amount,
            });
        }
        self.balances.insert(from, balance - amount);
        // Cannot overflow: the sum of all balances is the total supply.
        let credited = self.balance(&to) + amount;
        self.balances.insert(to, credited);
        Ok(())
    }
}

/// An in-memory, mintable ERC-20.
#[derive(Debug)]
pub struct MemoryToken {
    address: Address,
    decimals: u8,
    state: Mutex<TokenState>,
}

impl MemoryToken {
    pub fn new(address: Address, decimals: u8) -> Self {
        Self {
            address,
            decimals,
            state: Mutex::new(TokenState::default()),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    #[cfg_attr(feature = "telemetry", instrument(skip(self), err))]
    pub async fn mint(&self, to: Address, amount: U256) -> Result<(), TokenError> {
        if to.is_zero() {
            return Err(TokenError::ZeroRecipient);
        }
        let mut state = self.state.lock().await;
        let total_supply = state
            .total_supply
            .checked_add(amount)
            .ok_or(TokenError::SupplyOverflow)?;
        state.total_supply = total_supply;
        let credited = state.balance(&to) + amount;
        state.balances.insert(to, credited);
        Ok(())
    }

    pub async fn total_supply(&self) -> U256 {
        self.state.lock().await.total_supply
    }
}

#[async_trait]
impl ValueMedium for MemoryToken {
    async fn balance_of(&self, holder: Address) -> Result<U256, TokenError> {
        Ok(self.state.lock().await.balance(&holder))
    }

    async fn allowance(&self, owner: Address, spender: Address) -> Result<U256, TokenError> {
        let state = self.state.lock().await;
        Ok(state
            .allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default())
    }

    async fn approve(
        &self,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<(), TokenError> {
        if spender.is_zero() {
            return Err(TokenError::ZeroRecipient);
        }
        let mut state = self.state.lock().await;
        state.allowances.insert((owner, spender), amount);
        Ok(())
    }

    async fn transfer(&self, from: Address, to: Address, amount: U256) -> Result<(), TokenError> {
        self.state.lock().await.move_funds(from, to, amount)
    }

    async fn transfer_from(
        &self,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), TokenError> {
        let mut state = self.state.lock().await;
        let allowance = state
            .allowances
            .get(&(from, spender))
            .copied()
            .unwrap_or_default();
        if allowance < amount {
            return Err(TokenError::InsufficientAllowance {
                owner: from,
                spender,
                allowance,
                needed: amount,
            });
        }
        state.move_funds(from, to, amount)?;
        // Unlimited approvals are not decremented, as with common ERC-20s.
        if allowance != U256::MAX {
            state.allowances.insert((from, spender), allowance - amount);
        }
        Ok(())
    }

    async fn transfer_batch(
        &self,
        from: Address,
        transfers: &[Transfer],
    ) -> Result<(), TokenError> {
        let mut state = self.state.lock().await;
        let mut needed = U256::ZERO;
        for transfer in transfers {
            if transfer.to.is_zero() {
                return Err(TokenError::ZeroRecipient);
            }
            needed = needed
                .checked_add(transfer.amount)
                .ok_or(TokenError::SupplyOverflow)?;
        }
        let balance = state.balance(&from);
        if balance < needed {
            return Err(TokenError::InsufficientBalance {
                holder: from,
                balance,
                needed,
            });
        }
        for transfer in transfers {
            state.move_funds(from, transfer.to, transfer.amount)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    const TOKEN: Address = address!("0x0000000000000000000000000000000000000A11");
    const ALICE: Address = address!("0x00000000000000000000000000000000000A1Ce0");
    const BOB: Address = address!("0x0000000000000000000000000000000000000B0b");
    const SPENDER: Address = address!("0x0000000000000000000000000000000000005e17");

    async fn funded() -> MemoryToken {
        let token = MemoryToken::new(TOKEN, 6);
        token.mint(ALICE, U256::from(1_000u64)).await.unwrap();
        token
    }

    #[tokio::test]
    async fn test_mint_tracks_supply() {
        let token = funded().await;
        token.mint(BOB, U256::from(5u64)).await.unwrap();
        assert_eq!(token.total_supply().await, U256::from(1_005u64));
        assert_eq!(token.balance_of(BOB).await.unwrap(), U256::from(5u64));
        assert_eq!(
            token.mint(Address::ZERO, U256::from(1u64)).await,
            Err(TokenError::ZeroRecipient)
        );
    }

    #[tokio::test]
    async fn test_transfer_moves_funds() {
        let token = funded().await;
        token.transfer(ALICE, BOB, U256::from(400u64)).await.unwrap();
        assert_eq!(token.balance_of(ALICE).await.unwrap(), U256::from(600u64));
        assert_eq!(token.balance_of(BOB).await.unwrap(), U256::from(400u64));
    }

    #[tokio::test]
    async fn test_transfer_insufficient_balance() {
        let token = funded().await;
        let err = token
            .transfer(ALICE, BOB, U256::from(1_001u64))
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::InsufficientBalance { .. }));
        assert_eq!(token.balance_of(ALICE).await.unwrap(), U256::from(1_000u64));
    }

    #[tokio::test]
    async fn test_transfer_from_requires_allowance() {
        let token = funded().await;
        let err = token
            .transfer_from(SPENDER, ALICE, SPENDER, U256::from(1u64))
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::InsufficientAllowance { .. }));

        token
            .approve(ALICE, SPENDER, U256::from(300u64))
            .await
            .unwrap();
        token
            .transfer_from(SPENDER, ALICE, SPENDER, U256::from(100u64))
            .await
            .unwrap();
        assert_eq!(
            token.allowance(ALICE, SPENDER).await.unwrap(),
            U256::from(200u64)
        );
        assert_eq!(token.balance_of(SPENDER).await.unwrap(), U256::from(100u64));
    }

    #[tokio::test]
    async fn test_unlimited_allowance_not_decremented() {
        let token = funded().await;
        token.approve(ALICE, SPENDER, U256::MAX).await.unwrap();
        token
            .transfer_from(SPENDER, ALICE, BOB, U256::from(10u64))
            .await
            .unwrap();
        assert_eq!(token.allowance(ALICE, SPENDER).await.unwrap(), U256::MAX);
    }

    #[tokio::test]
    async fn test_batch_is_all_or_nothing() {
        let token = funded().await;
        let transfers = [
            Transfer {
                to: BOB,
                amount: U256::from(600u64),
            },
            Transfer {
                to: SPENDER,
                amount: U256::from(500u64),
            },
        ];
        let err = token.transfer_batch(ALICE, &transfers).await.unwrap_err();
        assert!(matches!(err, TokenError::InsufficientBalance { .. }));
        assert_eq!(token.balance_of(ALICE).await.unwrap(), U256::from(1_000u64));
        assert_eq!(token.balance_of(BOB).await.unwrap(), U256::ZERO);

        let transfers = [
            Transfer {
                to: BOB,
                amount: U256::from(600u64),
            },
            Transfer {
                to: Address::ZERO,
                amount: U256::ZERO,
            },
        ];
        assert_eq!(
            token.transfer_batch(ALICE, &transfers).await,
            Err(TokenError::ZeroRecipient)
        );
        assert_eq!(token.balance_of(BOB).await.unwrap(), U256::ZERO);
    }

    #[tokio::test]
    async fn test_batch_with_zero_amounts() {
        let token = funded().await;
        let transfers = [
            Transfer {
                to: BOB,
                amount: U256::ZERO,
            },
            Transfer {
                to: SPENDER,
                amount: U256::from(1_000u64),
            },
        ];
        token.transfer_batch(ALICE, &transfers).await.unwrap();
        assert_eq!(token.balance_of(ALICE).await.unwrap(), U256::ZERO);
        assert_eq!(token.balance_of(BOB).await.unwrap(), U256::ZERO);
        assert_eq!(
            token.balance_of(SPENDER).await.unwrap(),
            U256::from(1_000u64)
        );
    }
}

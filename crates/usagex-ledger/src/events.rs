//! Events emitted by successful ledger operations.

use alloy_primitives::{Address, U256};
use serde::Serialize;
use usagex_types::address::decimal_u256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Deposit {
    pub user: Address,
    #[serde(with = "decimal_u256")]
    pub amount: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settled {
    pub user: Address,
    #[serde(with = "decimal_u256")]
    pub used_amount: U256,
    #[serde(with = "decimal_u256")]
    pub refund_amount: U256,
}

/// A change of one of the administrative addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressUpdated {
    pub previous: Address,
    pub current: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event")]
pub enum LedgerEvent {
    Deposit(Deposit),
    Settled(Settled),
    TreasuryUpdated(AddressUpdated),
    OperatorUpdated(AddressUpdated),
    OwnershipTransferred(AddressUpdated),
}

impl From<Deposit> for LedgerEvent {
    fn from(value: Deposit) -> Self {
        LedgerEvent::Deposit(value)
    }
}

impl From<Settled> for LedgerEvent {
    fn from(value: Settled) -> Self {
        LedgerEvent::Settled(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn test_event_wire_shape() {
        let event = LedgerEvent::Settled(Settled {
            user: address!("0x70997970C51812dc3A010C7d01b50e0d17dc79C8"),
            used_amount: U256::from(30u8),
            refund_amount: U256::from(70u8),
        });
        let value = serde_json::to_value(event).unwrap();
        assert_eq!(value["event"], "Settled");
        assert_eq!(value["usedAmount"], "30");
        assert_eq!(value["refundAmount"], "70");
    }
}

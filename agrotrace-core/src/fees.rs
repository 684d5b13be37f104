//! Fee vault.
//!
//! Pay-to-create accounting for batch creation: a configurable fee collected
//! before the batch is allocated, accumulated globally and per payer, and
//! withdrawable by the registry owner. The default fee is zero, which makes
//! the vault a no-op.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{TraceError, TraceResult};
use crate::types::Address;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FeeVault {
    fee_create_batch: u128,
    total_collected: u128,
    balance: u128,
    user_fees: HashMap<Address, u128>,
}

impl FeeVault {
    pub fn new(fee_create_batch: u128) -> Self {
        Self {
            fee_create_batch,
            ..Self::default()
        }
    }

    pub fn fee_create_batch(&self) -> u128 {
        self.fee_create_batch
    }

    pub fn set_fee(&mut self, fee: u128) {
        self.fee_create_batch = fee;
    }

    /// Checks the payment covers the fee and credits it in full.
    /// Overpayment is accepted.
    pub fn collect(&mut self, payer: Address, amount: u128) -> TraceResult<()> {
        if amount < self.fee_create_batch {
            return Err(TraceError::InsufficientFee {
                required: self.fee_create_batch,
                paid: amount,
            });
        }
        self.total_collected += amount;
        self.balance += amount;
        *self.user_fees.entry(payer).or_default() += amount;
        Ok(())
    }

    pub fn withdraw(&mut self, amount: u128) -> TraceResult<()> {
        if amount > self.balance {
            return Err(TraceError::InsufficientBalance {
                available: self.balance,
                requested: amount,
            });
        }
        self.balance -= amount;
        Ok(())
    }

    pub fn total_collected(&self) -> u128 {
        self.total_collected
    }

    pub fn balance(&self) -> u128 {
        self.balance
    }

    pub fn user_fees(&self, payer: Address) -> u128 {
        self.user_fees.get(&payer).copied().unwrap_or(0)
    }
}

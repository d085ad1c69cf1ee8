//! The narrow interfaces through which the core reads voting power and moves balances.
//!
//! The staking and bank modules own that truth. The core is handed one implementation of each when it is constructed
//! and only ever calls the few methods below.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    error::{PeggyError, Result},
    types::{AccountId, Coin},
};

pub trait PowerSource {
    /// All bonded validators and their power, in the staking module's order.
    fn bonded_validators(&self) -> Vec<(AccountId, u64)>;

    /// The power a validator had at the end of the last block. Zero for accounts that are not bonded.
    fn last_power(&self, validator: &AccountId) -> u64;

    fn total_power(&self) -> u64 {
        self.bonded_validators()
            .iter()
            .fold(0u64, |total, (_, power)| total.saturating_add(*power))
    }
}

pub trait BalanceSource {
    /// Takes `amount` out of `account`. On [PeggyError::InsufficientFunds] nothing is taken.
    fn debit(&mut self, account: &AccountId, amount: &Coin) -> Result<()>;
}

impl<T: PowerSource + ?Sized> PowerSource for &T {
    fn bonded_validators(&self) -> Vec<(AccountId, u64)> {
        (**self).bonded_validators()
    }

    fn last_power(&self, validator: &AccountId) -> u64 {
        (**self).last_power(validator)
    }
}

impl<T: BalanceSource + ?Sized> BalanceSource for &mut T {
    fn debit(&mut self, account: &AccountId, amount: &Coin) -> Result<()> {
        (**self).debit(account, amount)
    }
}

/// A fixed validator table. Used by the replay tool and by tests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StakingTable {
    validators: Vec<(AccountId, u64)>,
}

impl StakingTable {
    pub fn new(validators: impl IntoIterator<Item = (AccountId, u64)>) -> Self {
        StakingTable {
            validators: validators.into_iter().collect(),
        }
    }

    /// Sets a validator's power, adding it if it is new. Zero power unbonds the validator.
    pub fn set_power(&mut self, validator: AccountId, power: u64) {
        self.validators.retain(|(v, _)| *v != validator);
        if power > 0 {
            self.validators.push((validator, power));
        }
    }
}

impl PowerSource for StakingTable {
    fn bonded_validators(&self) -> Vec<(AccountId, u64)> {
        self.validators.clone()
    }

    fn last_power(&self, validator: &AccountId) -> u64 {
        self.validators
            .iter()
            .find(|(v, _)| v == validator)
            .map(|(_, power)| *power)
            .unwrap_or(0)
    }
}

/// In-memory balances, by account and denomination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    balances: BTreeMap<(AccountId, String), u128>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn credit(&mut self, account: &AccountId, amount: &Coin) -> Result<()> {
        let balance = self
            .balances
            .entry((account.clone(), amount.denom.clone()))
            .or_default();
        *balance = balance
            .checked_add(amount.amount)
            .ok_or(PeggyError::Overflow("balance"))?;
        Ok(())
    }

    pub fn balance(&self, account: &AccountId, denom: &str) -> u128 {
        self.balances
            .get(&(account.clone(), denom.to_owned()))
            .copied()
            .unwrap_or(0)
    }
}

impl BalanceSource for Ledger {
    fn debit(&mut self, account: &AccountId, amount: &Coin) -> Result<()> {
        let key = (account.clone(), amount.denom.clone());
        let insufficient = || PeggyError::InsufficientFunds {
            account: account.clone(),
            required: amount.clone(),
        };
        let balance = self.balances.get_mut(&key).ok_or_else(insufficient)?;
        *balance = balance.checked_sub(amount.amount).ok_or_else(insufficient)?;
        Ok(())
    }
}

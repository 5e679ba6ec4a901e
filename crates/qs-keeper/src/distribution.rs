//! Payouts from the module account.

use std::collections::BTreeMap;

use qs_rewards::UserAllocation;
use qs_store::KvStore;
use qs_types::address::address_from_bech32;
use qs_types::{Coin, MathError};

use crate::{Host, Keeper, KeeperError, Result};

/// Sum of the allocated amounts.
///
/// # Errors
///
/// Returns [`MathError::Overflow`] wrapped in [`KeeperError::Math`].
pub fn total_allocated(allocations: &[UserAllocation]) -> Result<u128> {
    allocations.iter().try_fold(0u128, |acc, ua| {
        acc.checked_add(ua.amount.amount).ok_or(KeeperError::Math(MathError::Overflow))
    })
}

impl<S: KvStore> Keeper<S> {
    /// Check the module account can cover every allocation before any is
    /// paid, returning the total.
    ///
    /// # Errors
    ///
    /// Returns [`KeeperError::InsufficientModuleBalance`], or
    /// [`KeeperError::Types`] for an allocation to a malformed address.
    pub fn check_distribution(&self, host: &Host<'_>, allocations: &[UserAllocation]) -> Result<u128> {
        for ua in allocations {
            address_from_bech32(&ua.address, None)?;
        }
        let needed = total_allocated(allocations)?;
        let available = self.module_balance(host);
        if needed > available {
            return Err(KeeperError::InsufficientModuleBalance { needed, available });
        }
        Ok(needed)
    }

    /// Send each non-zero allocation from the module account to its user.
    ///
    /// Callers are expected to have run [`Keeper::check_distribution`];
    /// a transfer that still fails is returned.
    ///
    /// # Errors
    ///
    /// Returns [`KeeperError::External`] from the bank module.
    pub fn distribute_to_users(&self, host: &mut Host<'_>, allocations: &[UserAllocation]) -> Result<u128> {
        let mut paid = 0u128;
        for ua in allocations.iter().filter(|ua| !ua.amount.is_zero()) {
            host.bank.send_coins_from_module_to_account(
                &self.config.module_name,
                &ua.address,
                std::slice::from_ref(&ua.amount),
            )?;
            paid = paid.saturating_add(ua.amount.amount);
            tracing::debug!(
                address = %ua.address,
                amount = ua.amount.amount,
                denom = %ua.amount.denom,
                "distribute to user"
            );
        }
        tracing::info!(paid, users = allocations.len(), remaining = self.module_balance(host), "distributed to users");
        Ok(paid)
    }

    /// Check `from` holds enough of every denom allocated out of it.
    ///
    /// # Errors
    ///
    /// Returns [`KeeperError::InsufficientBalance`] naming the short denom,
    /// or [`KeeperError::Types`] for an allocation to a malformed address.
    pub fn check_distribution_from_address(
        &self,
        host: &Host<'_>,
        from: &str,
        allocations: &[UserAllocation],
    ) -> Result<()> {
        let mut needed: BTreeMap<&str, u128> = BTreeMap::new();
        for ua in allocations {
            address_from_bech32(&ua.address, None)?;
            let entry = needed.entry(ua.amount.denom.as_str()).or_default();
            *entry = entry.checked_add(ua.amount.amount).ok_or(MathError::Overflow)?;
        }
        for (denom, needed) in needed {
            let available = host.bank.get_balance(from, denom).amount;
            if needed > available {
                return Err(KeeperError::InsufficientBalance {
                    address: from.to_string(),
                    denom: denom.to_string(),
                    needed,
                    available,
                });
            }
        }
        Ok(())
    }

    /// Send each non-zero allocation from the account `from` to its user.
    ///
    /// # Errors
    ///
    /// Returns [`KeeperError::External`] from the bank module.
    pub fn distribute_to_users_from_address(
        &self,
        host: &mut Host<'_>,
        from: &str,
        allocations: &[UserAllocation],
    ) -> Result<()> {
        for ua in allocations.iter().filter(|ua| !ua.amount.is_zero()) {
            host.bank.send_coins(from, &ua.address, std::slice::from_ref(&ua.amount))?;
            tracing::debug!(
                from,
                address = %ua.address,
                amount = ua.amount.amount,
                denom = %ua.amount.denom,
                "distribute to user from account"
            );
        }
        tracing::info!(from, allocations = allocations.len(), "distributed to users from account");
        Ok(())
    }

    /// Move `amount` of the bond denom from the module account to the fee
    /// collector.
    ///
    /// # Errors
    ///
    /// Returns [`KeeperError::External`] from the bank module.
    pub fn send_to_fee_collector(&self, host: &mut Host<'_>, amount: u128) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        let coin = Coin::new(host.staking.bond_denom(), amount);
        host.bank.send_coins_from_module_to_module(
            &self.config.module_name,
            &self.config.fee_collector_name,
            std::slice::from_ref(&coin),
        )?;
        tracing::info!(amount, "lockup allocation sent to fee collector");
        Ok(())
    }
}

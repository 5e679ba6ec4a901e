//! Epoch and zone-creation hooks.
//!
//! `after_epoch_end` runs once per epoch boundary in a fixed order:
//!
//! 1. request the latest block height of every remote connection
//! 2. record the local chain's own connection data
//! 3. below `epochs_deferred`, snapshot intents and stop
//! 4. split the module balance into buckets
//! 5. share the validator-selection and holdings buckets between zones by TVL
//! 6. per zone, pay holdings and withdrawal account rewards from live claims
//!    and archive them
//! 7. send the lockup bucket to the fee collector
//! 8. request performance account rewards for validator selection
//! 9. run every claim submodule's refresh hook
//!
//! A failure in one zone's holdings payout is logged and leaves that zone's
//! claims live; other zones are unaffected.

use std::collections::BTreeMap;

use prost::Message as _;

use qs_claims::icq::{ONE_SHOT, QUERY_DELEGATION_TOTAL_REWARDS, QUERY_LATEST_BLOCK};
use qs_claims::{ClaimSubmodule, HookContext, Submodule};
use qs_protocoldata::claims::{archive_and_garbage_collect, claims_for_chain, ClaimNamespace};
use qs_protocoldata::records::{
    ConnectionProtocolData, LiquidAllowedDenomProtocolData, OsmosisParamsProtocolData, UmeeParamsProtocolData,
    OSMOSIS_PARAMS_KEY, UMEE_PARAMS_KEY,
};
use qs_protocoldata::store;
use qs_rewards::allocation::{get_rewards_allocations, zone_allocations, ZoneStake};
use qs_rewards::holdings::{calc_user_holdings_allocations, HoldingsInput};
use qs_rewards::token_values::calc_token_values;
use qs_rewards::RewardsAllocation;
use qs_store::{CacheStore, KvStore};
use qs_types::address::{address_from_bech32, convert_prefix};
use qs_types::keepers::IcqRequest;
use qs_types::keys::derive_ibc_denom;
use qs_types::proto::QueryDelegationTotalRewardsRequest;
use qs_types::{Zone, SELF_CONNECTION};

use crate::callbacks::Callback;
use crate::{Host, Keeper, KeeperError, Result};

/// IBC port of fungible token transfers.
pub const TRANSFER_PORT: &str = "transfer";

/// What one `after_epoch_end` call did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EpochOutcome {
    /// The epoch only snapshotted intents.
    pub deferred: bool,
    pub allocation: Option<RewardsAllocation>,
    /// Holdings paid per zone that completed its payout.
    pub holdings_paid: BTreeMap<String, u128>,
    /// Zones whose holdings payout failed.
    pub failed_zones: Vec<String>,
    pub lockup_paid: u128,
    /// Interchain queries issued.
    pub queries: usize,
}

impl<S: KvStore> Keeper<S> {
    /// Epoch boundary hook.
    ///
    /// # Errors
    ///
    /// Only fails when protocol data cannot be read or the self connection
    /// record cannot be written. Allocation, payout and query failures are
    /// logged and reported in the returned [`EpochOutcome`].
    pub fn after_epoch_end(
        &mut self,
        host: &mut Host<'_>,
        identifier: &str,
        epoch_number: i64,
    ) -> Result<EpochOutcome> {
        let mut outcome = EpochOutcome::default();
        if identifier != self.config.epoch_identifier {
            tracing::debug!(identifier, "ignoring epoch");
            return Ok(outcome);
        }
        tracing::info!(identifier, epoch = epoch_number, height = host.block.height, "participation rewards epoch end");

        outcome.queries += self.request_epoch_blocks(host)?;
        self.update_self_connection_data(host)?;

        if epoch_number < self.config.epochs_deferred {
            tracing::info!(
                epoch = epoch_number,
                deferred = self.config.epochs_deferred,
                "deferring rewards, snapshotting intents"
            );
            snapshot_intents(host);
            outcome.deferred = true;
            return Ok(outcome);
        }

        let params = self.params()?;
        let allocation = match get_rewards_allocations(self.module_balance(host), &params.distribution_proportions) {
            Ok(allocation) => Some(allocation),
            Err(e) => {
                tracing::info!(error = %e, "unable to compute rewards allocation");
                None
            }
        };

        if let Some(allocation) = &allocation {
            if let Err(e) = self.allocate_zone_budgets(host, allocation) {
                tracing::error!(error = %e, "unable to allocate zone budgets");
            }
        }

        for zone in host.ics.zones() {
            match self.distribute_holdings(host, &zone) {
                Ok(paid) => {
                    outcome.holdings_paid.insert(zone.chain_id.clone(), paid);
                }
                Err(e) => {
                    tracing::error!(zone = %zone.chain_id, error = %e, "holdings distribution failed");
                    outcome.failed_zones.push(zone.chain_id);
                }
            }
        }

        if let Some(allocation) = &allocation {
            match self.send_to_fee_collector(host, allocation.lockup) {
                Ok(()) => outcome.lockup_paid = allocation.lockup,
                Err(e) => tracing::error!(error = %e, "lockup distribution failed"),
            }
        }
        outcome.allocation = allocation;

        outcome.queries += self.request_validator_selection_rewards(host);
        outcome.queries += self.run_submodule_hooks(host);
        tracing::info!(
            queries = outcome.queries,
            failed_zones = outcome.failed_zones.len(),
            "participation rewards epoch complete"
        );
        Ok(outcome)
    }

    fn request_epoch_blocks(&self, host: &mut Host<'_>) -> Result<usize> {
        let mut issued = 0;
        for (_, connection) in store::records::<ConnectionProtocolData>(&self.store)? {
            if connection.chain_id == self.config.chain_id {
                continue;
            }
            let request = IcqRequest {
                connection_id: connection.connection_id,
                chain_id: connection.chain_id,
                query_type: QUERY_LATEST_BLOCK.to_string(),
                request: Vec::new(),
                period: ONE_SHOT,
                module: self.config.module_name.clone(),
                callback_id: Callback::EpochBlock.id().to_string(),
                ttl: self.config.icq_ttl,
            };
            let chain_id = request.chain_id.clone();
            match host.icq.make_request(request) {
                Ok(()) => issued += 1,
                Err(e) => tracing::error!(chain_id = %chain_id, error = %e, "unable to request epoch block"),
            }
        }
        Ok(issued)
    }

    /// Write the local chain's connection record so claims against it are
    /// checked at the previous block.
    fn update_self_connection_data(&mut self, host: &Host<'_>) -> Result<()> {
        let record = ConnectionProtocolData {
            connection_id: SELF_CONNECTION.to_string(),
            chain_id: self.config.chain_id.clone(),
            last_epoch: host.block.height - 1,
            prefix: self.config.bech32_prefix.clone(),
            transfer_channel: String::new(),
        };
        store::set_record(&mut self.store, &record)?;
        tracing::debug!(chain_id = %record.chain_id, last_epoch = record.last_epoch, "self connection data updated");
        Ok(())
    }

    /// Set every zone's TVL and its validator-selection and holdings budgets.
    fn allocate_zone_budgets(&self, host: &mut Host<'_>, allocation: &RewardsAllocation) -> Result<()> {
        let token_values = calc_token_values(&self.store)?;
        let zones = host.ics.zones();
        let stakes: Vec<ZoneStake> = zones
            .iter()
            .map(|zone| ZoneStake {
                chain_id: zone.chain_id.clone(),
                base_denom: zone.base_denom.clone(),
                staked: host
                    .ics
                    .delegated_amount(&zone.chain_id)
                    .saturating_add(host.ics.delegations_in_process(&zone.chain_id)),
            })
            .collect();
        let allocations = zone_allocations(&stakes, &token_values, allocation)?;
        for (mut zone, za) in zones.into_iter().zip(allocations) {
            zone.tvl = za.tvl;
            zone.validator_selection_allocation = za.validator_selection;
            zone.holdings_allocation = za.holdings;
            tracing::info!(
                zone = %zone.chain_id,
                tvl = %zone.tvl,
                validator_selection = zone.validator_selection_allocation,
                holdings = zone.holdings_allocation,
                "zone allocation"
            );
            host.ics.set_zone(zone);
        }
        Ok(())
    }

    /// Pay the zone's holdings budget over its live claims, then archive
    /// them. Rewards sitting in the zone's withdrawal account are shared over
    /// the same claims. Claims are only archived once both payouts are known
    /// to fit their source balances.
    fn distribute_holdings(&mut self, host: &mut Host<'_>, zone: &Zone) -> Result<u128> {
        let claims = claims_for_chain(&self.store, ClaimNamespace::Live, &zone.chain_id)?;
        let supply = host.bank.get_supply(&zone.local_denom).amount;
        let bond_denom = host.staking.bond_denom();
        let withdrawal = self.local_withdrawal_address(zone)?;
        let ics_rewards = withdrawal
            .as_deref()
            .map(|address| host.bank.get_all_balances(address))
            .unwrap_or_default();
        let input = HoldingsInput {
            chain_id: &zone.chain_id,
            allocation: zone.holdings_allocation,
            supply,
            cap: self.config.holdings_cap()?,
            bond_denom: &bond_denom,
            ics_rewards: &ics_rewards,
        };
        let outcome = calc_user_holdings_allocations(&input, &claims)?;
        self.check_distribution(host, &outcome.allocations)?;
        if let Some(withdrawal) = &withdrawal {
            self.check_distribution_from_address(host, withdrawal, &outcome.ics_allocations)?;
        }

        let mut cache = CacheStore::new(&mut self.store);
        let archived = archive_and_garbage_collect(&mut cache, &zone.chain_id)?;
        cache.commit()?;

        let paid = self.distribute_to_users(host, &outcome.allocations)?;
        if let Some(withdrawal) = &withdrawal {
            self.distribute_to_users_from_address(host, withdrawal, &outcome.ics_allocations)?;
        }
        let mut zone = zone.clone();
        zone.holdings_allocation = 0;
        tracing::info!(
            zone = %zone.chain_id,
            claims = claims.len(),
            archived,
            paid,
            ics_rewards = outcome.ics_allocations.len(),
            remaining = outcome.remaining,
            "holdings distributed"
        );
        host.ics.set_zone(zone);
        Ok(paid)
    }

    /// The zone's withdrawal account under the local prefix, if it has one.
    fn local_withdrawal_address(&self, zone: &Zone) -> Result<Option<String>> {
        let Some(address) = zone.withdrawal_address.as_deref() else {
            return Ok(None);
        };
        address_from_bech32(address, Some(&zone.account_prefix))?;
        Ok(Some(convert_prefix(address, &self.config.bech32_prefix)?))
    }

    fn request_validator_selection_rewards(&self, host: &mut Host<'_>) -> usize {
        let mut issued = 0;
        for zone in host.ics.zones() {
            let Some(performance) = zone.performance_address else {
                tracing::debug!(zone = %zone.chain_id, "zone has no performance address");
                continue;
            };
            let request = IcqRequest {
                connection_id: zone.connection_id,
                chain_id: zone.chain_id.clone(),
                query_type: QUERY_DELEGATION_TOTAL_REWARDS.to_string(),
                request: QueryDelegationTotalRewardsRequest {
                    delegator_address: performance,
                }
                .encode_to_vec(),
                period: ONE_SHOT,
                module: self.config.module_name.clone(),
                callback_id: Callback::ValidatorSelectionRewards.id().to_string(),
                ttl: self.config.icq_ttl,
            };
            match host.icq.make_request(request) {
                Ok(()) => issued += 1,
                Err(e) => tracing::error!(zone = %zone.chain_id, error = %e, "unable to request performance rewards"),
            }
        }
        issued
    }

    fn run_submodule_hooks(&self, host: &mut Host<'_>) -> usize {
        let mut ctx = HookContext {
            store: &self.store,
            icq: &mut *host.icq,
            ttl: self.config.icq_ttl,
        };
        let mut issued = 0;
        for submodule in Submodule::ALL {
            match submodule.hooks(&mut ctx) {
                Ok(n) => issued += n,
                Err(e) => tracing::error!(claim_type = %submodule.claim_type(), error = %e, "submodule hook failed"),
            }
        }
        issued
    }

    /// Zone registration hook: records the zone's connection and registers
    /// its qAsset as a liquid token locally, on the host zone, and on
    /// Osmosis and Umee when those are configured.
    ///
    /// # Errors
    ///
    /// - [`KeeperError::ChannelNotFound`] when a transfer channel has no
    ///   counterparty
    /// - [`KeeperError::ConnectionNotFound`] when Osmosis or Umee params
    ///   exist without connection data for their chain
    pub fn after_zone_created(&mut self, host: &Host<'_>, zone: &Zone) -> Result<()> {
        store::set_record(
            &mut self.store,
            &ConnectionProtocolData {
                connection_id: zone.connection_id.clone(),
                chain_id: zone.chain_id.clone(),
                last_epoch: 0,
                prefix: zone.account_prefix.clone(),
                transfer_channel: zone.transfer_channel.clone(),
            },
        )?;

        let local_chain = self.config.chain_id.clone();
        self.allow_liquid_token(&local_chain, zone, zone.local_denom.clone())?;

        let host_channel = counterparty(host, &zone.transfer_channel)?;
        self.allow_liquid_token(&zone.chain_id, zone, derive_ibc_denom(&host_channel, &zone.local_denom))?;

        let osmosis =
            store::get_record::<OsmosisParamsProtocolData>(&self.store, OSMOSIS_PARAMS_KEY)?.map(|p| p.chain_id);
        let umee = store::get_record::<UmeeParamsProtocolData>(&self.store, UMEE_PARAMS_KEY)?.map(|p| p.chain_id);
        for chain_id in [osmosis, umee].into_iter().flatten() {
            let connection = store::get_record::<ConnectionProtocolData>(&self.store, &chain_id)?
                .ok_or_else(|| KeeperError::ConnectionNotFound(chain_id.clone()))?;
            let channel = counterparty(host, &connection.transfer_channel)?;
            self.allow_liquid_token(&chain_id, zone, derive_ibc_denom(&channel, &zone.local_denom))?;
        }
        tracing::info!(zone = %zone.chain_id, "zone protocol data registered");
        Ok(())
    }

    fn allow_liquid_token(&mut self, chain_id: &str, zone: &Zone, ibc_denom: String) -> Result<()> {
        let record = LiquidAllowedDenomProtocolData {
            chain_id: chain_id.to_string(),
            registered_zone_chain_id: zone.chain_id.clone(),
            ibc_denom,
            qasset_denom: zone.local_denom.clone(),
        };
        store::set_record(&mut self.store, &record)?;
        tracing::debug!(chain_id, ibc_denom = %record.ibc_denom, qasset = %record.qasset_denom, "liquid token allowed");
        Ok(())
    }
}

fn counterparty(host: &Host<'_>, channel: &str) -> Result<String> {
    host.channels
        .counterparty_channel(TRANSFER_PORT, channel)
        .ok_or_else(|| KeeperError::ChannelNotFound(format!("{TRANSFER_PORT}/{channel}")))
}

/// Copy every zone's current intents over its snapshot.
fn snapshot_intents(host: &mut Host<'_>) {
    for zone in host.ics.zones() {
        let intents = host.ics.delegator_intents(&zone.chain_id, false);
        let count = intents.len();
        for intent in intents {
            host.ics.set_delegator_intent(&zone.chain_id, intent, true);
        }
        tracing::debug!(zone = %zone.chain_id, intents = count, "intents snapshotted");
    }
}

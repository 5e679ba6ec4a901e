//! Simulation scenarios and the epoch driver.
//!
//! A [`Scenario`] seeds the in-memory collaborators: zones with their
//! validators and qAsset float, remote connections, qAsset holders and
//! validator intents. [`Simulation`] then plays epochs against a keeper,
//! submitting each holder's claim with a freshly built balance proof and
//! answering the interchain queries the keeper issues.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context as _};
use prost::Message as _;
use serde::{Deserialize, Serialize};
use serde_json::json;

use qs_keeper::callbacks::Callback;
use qs_keeper::hooks::TRANSFER_PORT;
use qs_keeper::sim::{module_account_address, SimChain};
use qs_keeper::{AddProtocolDataProposal, BlockInfo, EpochOutcome, Keeper};
use qs_protocoldata::records::ConnectionProtocolData;
use qs_protocoldata::store;
use qs_store::KvStore;
use qs_types::address::address_from_bech32;
use qs_types::keepers::InterchainStakingKeeper;
use qs_types::keys::derive_ibc_denom;
use qs_types::proto::{
    Block, DelegationDelegatorReward, DelegationTotalRewardsResponse, GetLatestBlockResponse, Header, ProtoDecCoin,
};
use qs_types::{ClaimType, Coin, DelegatorIntent, Dec, MsgSubmitClaim, Validator, ValidatorIntent, Zone};

/// Scenario used when no scenario file is configured.
pub const DEFAULT_SCENARIO: &str = include_str!("../scenario.example.toml");

/// Genesis used when no genesis file is configured.
pub const DEFAULT_GENESIS: &str = include_str!("../genesis.example.json");

/// Blocks between two epoch boundaries.
pub const BLOCKS_PER_EPOCH: i64 = 100;

const EPOCH_SECONDS: i64 = 6 * 60 * 60;
const GENESIS_TIME: i64 = 1_700_000_000;

/// Module account standing in for tokens escrowed by IBC transfers.
const ESCROW_MODULE: &str = "transfer";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorSpec {
    pub valoper_address: String,
    pub voting_power: u64,
    /// Whole units of the zone's base denom earned by the performance
    /// account through this validator each epoch.
    #[serde(default)]
    pub reward: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneSpec {
    pub chain_id: String,
    pub connection_id: String,
    pub client_id: String,
    pub account_prefix: String,
    pub local_denom: String,
    pub base_denom: String,
    pub transfer_channel: String,
    pub counterparty_channel: String,
    #[serde(default)]
    pub performance_address: Option<String>,
    #[serde(default)]
    pub delegated: u64,
    #[serde(default)]
    pub in_process: u64,
    /// qAsset minted locally besides what the holders claim.
    #[serde(default)]
    pub qasset_supply: u64,
    #[serde(default)]
    pub validators: Vec<ValidatorSpec>,
}

/// A remote chain reachable over IBC that is not itself a zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionSpec {
    pub chain_id: String,
    pub connection_id: String,
    pub client_id: String,
    pub prefix: String,
    pub transfer_channel: String,
    pub counterparty_channel: String,
}

/// qAsset held by a local account on `src_zone`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolderSpec {
    pub address: String,
    pub zone: String,
    pub src_zone: String,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentSpec {
    pub delegator: String,
    pub zone: String,
    pub valoper_address: String,
    pub weight: Dec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub bond_denom: String,
    /// Bond denom minted into the module account at every epoch.
    #[serde(default)]
    pub inflow_per_epoch: u64,
    #[serde(default)]
    pub zones: Vec<ZoneSpec>,
    #[serde(default)]
    pub connections: Vec<ConnectionSpec>,
    #[serde(default)]
    pub holders: Vec<HolderSpec>,
    #[serde(default)]
    pub intents: Vec<IntentSpec>,
}

/// Where proofs from a chain are verified and how qAssets arrive there.
#[derive(Debug, Clone, Copy)]
struct Remote<'a> {
    chain_id: &'a str,
    connection_id: &'a str,
    client_id: &'a str,
    transfer_channel: &'a str,
    counterparty_channel: &'a str,
}

impl Scenario {
    /// Parse and check a TOML scenario.
    ///
    /// # Errors
    ///
    /// Fails on malformed TOML or a scenario referring to unknown chains.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let scenario: Scenario = toml::from_str(content)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Load from `path`, or the built-in scenario when `path` is empty.
    ///
    /// # Errors
    ///
    /// See [`Scenario::from_toml`]; I/O errors.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        if path.is_empty() {
            return Self::from_toml(DEFAULT_SCENARIO);
        }
        let content =
            std::fs::read_to_string(Path::new(path)).with_context(|| format!("reading scenario {path}"))?;
        Self::from_toml(&content)
    }

    /// # Errors
    ///
    /// Fails for duplicated chains, or holders and intents naming an
    /// unknown zone or source chain.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bond_denom.is_empty() {
            bail!("scenario bond_denom is empty");
        }
        let mut chains = BTreeMap::new();
        for remote in self.remotes() {
            if chains.insert(remote.chain_id, remote).is_some() {
                bail!("chain {} is declared twice", remote.chain_id);
            }
        }
        for holder in &self.holders {
            if self.zone(&holder.zone).is_none() {
                bail!("holder {} names unknown zone {}", holder.address, holder.zone);
            }
            if !chains.contains_key(holder.src_zone.as_str()) {
                bail!("holder {} names unknown source chain {}", holder.address, holder.src_zone);
            }
        }
        for intent in &self.intents {
            if self.zone(&intent.zone).is_none() {
                bail!("intent of {} names unknown zone {}", intent.delegator, intent.zone);
            }
        }
        Ok(())
    }

    pub fn zone(&self, chain_id: &str) -> Option<&ZoneSpec> {
        self.zones.iter().find(|z| z.chain_id == chain_id)
    }

    fn remotes(&self) -> impl Iterator<Item = Remote<'_>> {
        let zones = self.zones.iter().map(|z| Remote {
            chain_id: &z.chain_id,
            connection_id: &z.connection_id,
            client_id: &z.client_id,
            transfer_channel: &z.transfer_channel,
            counterparty_channel: &z.counterparty_channel,
        });
        let connections = self.connections.iter().map(|c| Remote {
            chain_id: &c.chain_id,
            connection_id: &c.connection_id,
            client_id: &c.client_id,
            transfer_channel: &c.transfer_channel,
            counterparty_channel: &c.counterparty_channel,
        });
        zones.chain(connections)
    }

    fn remote(&self, chain_id: &str) -> Option<Remote<'_>> {
        self.remotes().find(|r| r.chain_id == chain_id)
    }

    /// Intents grouped per `(zone, delegator)`.
    fn delegator_intents(&self) -> BTreeMap<(&str, &str), Vec<ValidatorIntent>> {
        let mut grouped: BTreeMap<(&str, &str), Vec<ValidatorIntent>> = BTreeMap::new();
        for intent in &self.intents {
            grouped
                .entry((intent.zone.as_str(), intent.delegator.as_str()))
                .or_default()
                .push(ValidatorIntent {
                    valoper_address: intent.valoper_address.clone(),
                    weight: intent.weight,
                });
        }
        grouped
    }
}

/// A keeper and its simulated chain, advanced one epoch at a time.
pub struct Simulation<S> {
    keeper: Keeper<S>,
    chain: SimChain,
    scenario: Scenario,
    epoch: i64,
    block: BlockInfo,
}

impl<S: KvStore> Simulation<S> {
    /// Seed the collaborators from `scenario` and register every zone with
    /// the keeper. Genesis should already have been imported.
    ///
    /// # Errors
    ///
    /// Fails if a connection proposal is rejected, a zone cannot be
    /// registered, or an address in the scenario is malformed.
    pub fn new(keeper: Keeper<S>, scenario: Scenario) -> anyhow::Result<Self> {
        let prefix = keeper.config().bech32_prefix.clone();
        let chain = SimChain::new(&prefix, &scenario.bond_denom)?;
        let mut sim = Self {
            keeper,
            chain,
            scenario,
            epoch: 0,
            block: BlockInfo {
                height: 1,
                time: GENESIS_TIME,
            },
        };
        sim.setup()?;
        Ok(sim)
    }

    fn setup(&mut self) -> anyhow::Result<()> {
        // 1. Light clients and transfer channels
        for remote in self.scenario.remotes() {
            self.chain.client.add_connection(remote.connection_id, remote.client_id);
            self.chain
                .channels
                .connect(TRANSFER_PORT, remote.transfer_channel, remote.counterparty_channel);
        }

        // 2. Non-zone connections arrive by governance
        for conn in &self.scenario.connections {
            let proposal = AddProtocolDataProposal {
                title: format!("Add {} connection", conn.chain_id),
                description: format!("Connection data for {}", conn.chain_id),
                data_type: "Connection".to_string(),
                key: conn.chain_id.clone(),
                data: json!({
                    "ConnectionID": conn.connection_id,
                    "ChainID": conn.chain_id,
                    "LastEpoch": 0,
                    "Prefix": conn.prefix,
                    "TransferChannel": conn.transfer_channel,
                }),
            };
            self.keeper.add_protocol_data(&proposal)?;
        }

        // 3. Zones, their validators, intents and qAsset float
        let escrow = module_account_address(&self.keeper.config().bech32_prefix, ESCROW_MODULE)?;
        for spec in &self.scenario.zones {
            let mut zone = Zone::new(
                &spec.chain_id,
                &spec.connection_id,
                &spec.account_prefix,
                &spec.local_denom,
                &spec.base_denom,
            );
            zone.transfer_channel = spec.transfer_channel.clone();
            zone.performance_address = spec.performance_address.clone();
            self.chain.ics.set_zone(zone.clone());
            self.chain
                .ics
                .set_delegated(&spec.chain_id, spec.delegated.into(), spec.in_process.into());
            for v in &spec.validators {
                self.chain
                    .ics
                    .add_validator(&spec.chain_id, Validator::new(&v.valoper_address, v.voting_power.into()));
            }
            self.chain
                .bank
                .mint(&escrow, &Coin::new(&spec.local_denom, spec.qasset_supply.into()));

            let host = self.chain.host(self.block);
            self.keeper
                .after_zone_created(&host, &zone)
                .with_context(|| format!("registering zone {}", spec.chain_id))?;
        }
        for ((zone, delegator), intents) in self.scenario.delegator_intents() {
            address_from_bech32(delegator, None)?;
            self.chain.ics.set_delegator_intent(
                zone,
                DelegatorIntent {
                    delegator: delegator.to_string(),
                    intents,
                },
                false,
            );
        }

        // 4. Holdings leave the local chain through the escrow
        for holder in &self.scenario.holders {
            if let Some(zone) = self.scenario.zone(&holder.zone) {
                self.chain
                    .bank
                    .mint(&escrow, &Coin::new(&zone.local_denom, holder.amount.into()));
            }
        }

        tracing::info!(
            zones = self.scenario.zones.len(),
            connections = self.scenario.connections.len(),
            holders = self.scenario.holders.len(),
            "simulation seeded"
        );
        Ok(())
    }

    pub fn keeper(&self) -> &Keeper<S> {
        &self.keeper
    }

    pub fn chain(&self) -> &SimChain {
        &self.chain
    }

    pub fn epoch(&self) -> i64 {
        self.epoch
    }

    /// Advance to the next epoch boundary: fund the module, submit every
    /// holder's claim, end the epoch and answer the queries it issued.
    ///
    /// # Errors
    ///
    /// Fails if the epoch hook itself fails. Rejected claims and failed
    /// callbacks are logged.
    pub fn run_epoch(&mut self) -> anyhow::Result<EpochOutcome> {
        self.epoch += 1;
        self.block.height += BLOCKS_PER_EPOCH;
        self.block.time += EPOCH_SECONDS;

        if self.scenario.inflow_per_epoch > 0 {
            let inflow = Coin::new(&self.scenario.bond_denom, self.scenario.inflow_per_epoch.into());
            let module = self.keeper.config().module_name.clone();
            self.chain.bank.mint_to_module(&module, &inflow)?;
        }

        let claimed = self.submit_claims()?;
        let identifier = self.keeper.config().epoch_identifier.clone();
        let outcome = {
            let mut host = self.chain.host(self.block);
            self.keeper.after_epoch_end(&mut host, &identifier, self.epoch)?
        };
        let answered = self.answer_queries();

        tracing::info!(
            epoch = self.epoch,
            height = self.block.height,
            claimed,
            answered,
            deferred = outcome.deferred,
            "epoch simulated"
        );
        Ok(outcome)
    }

    /// Claims are only submitted once the source chain's epoch block is
    /// known.
    fn submit_claims(&mut self) -> anyhow::Result<usize> {
        let mut submitted = 0;
        for holder in &self.scenario.holders {
            let (Some(zone), Some(remote)) = (self.scenario.zone(&holder.zone), self.scenario.remote(&holder.src_zone))
            else {
                continue;
            };
            let Some(connection) = store::get_record::<ConnectionProtocolData>(self.keeper.store(), &holder.src_zone)?
            else {
                tracing::warn!(src_zone = %holder.src_zone, "no connection data, claim skipped");
                continue;
            };
            if connection.last_epoch == 0 {
                tracing::debug!(src_zone = %holder.src_zone, "epoch block not yet known, claim skipped");
                continue;
            }

            let user = address_from_bech32(&holder.address, None)?;
            let denom = derive_ibc_denom(remote.counterparty_channel, &zone.local_denom);
            let proof = self.chain.bank_balance_proof(
                remote.client_id,
                remote.chain_id,
                &user,
                &denom,
                holder.amount.into(),
                connection.last_epoch,
            )?;
            let msg = MsgSubmitClaim {
                user_address: holder.address.clone(),
                zone: holder.zone.clone(),
                src_zone: holder.src_zone.clone(),
                claim_type: ClaimType::LiquidToken,
                proofs: vec![proof],
            };
            let host = self.chain.host(self.block);
            match self.keeper.submit_claim(&host, &msg) {
                Ok(_) => submitted += 1,
                Err(e) => tracing::warn!(user = %holder.address, zone = %holder.zone, error = %e, "claim rejected"),
            }
        }
        Ok(submitted)
    }

    fn answer_queries(&mut self) -> usize {
        let mut answered = 0;
        for request in self.chain.icq.take_requests() {
            let Some(response) = self.respond(&request.callback_id, &request.chain_id) else {
                tracing::debug!(callback = %request.callback_id, chain_id = %request.chain_id, "no simulated response");
                continue;
            };
            let mut host = self.chain.host(self.block);
            if self
                .keeper
                .dispatch_callback(&mut host, &request.callback_id, &response, &request)
            {
                answered += 1;
            }
        }
        answered
    }

    fn respond(&self, callback_id: &str, chain_id: &str) -> Option<Vec<u8>> {
        match Callback::from_id(callback_id)? {
            Callback::EpochBlock => {
                let block = Block {
                    header: Some(Header {
                        chain_id: chain_id.to_string(),
                        height: self.block.height,
                    }),
                };
                Some(
                    GetLatestBlockResponse {
                        block: None,
                        sdk_block: Some(block),
                    }
                    .encode_to_vec(),
                )
            }
            Callback::ValidatorSelectionRewards => {
                let zone = self.scenario.zone(chain_id)?;
                Some(rewards_response(zone).encode_to_vec())
            }
            _ => None,
        }
    }

    /// Every non-zero balance on the simulated chain, module accounts
    /// labelled by name.
    pub fn balances(&self) -> Vec<(String, Coin)> {
        let labels: BTreeMap<&String, &String> = self
            .chain
            .accounts
            .modules()
            .iter()
            .map(|(name, address)| (address, name))
            .collect();
        self.chain
            .bank
            .all_balances()
            .into_iter()
            .map(|(address, coin)| match labels.get(&address) {
                Some(name) => (format!("{address} ({name})"), coin),
                None => (address, coin),
            })
            .collect()
    }
}

fn legacy_amount(whole: u64) -> String {
    format!("{whole}000000000000000000")
}

/// Rewards earned by the zone's performance account, per validator.
fn rewards_response(zone: &ZoneSpec) -> DelegationTotalRewardsResponse {
    let coin = |whole| ProtoDecCoin {
        denom: zone.base_denom.clone(),
        amount: legacy_amount(whole),
    };
    let total = zone.validators.iter().map(|v| v.reward).sum();
    DelegationTotalRewardsResponse {
        rewards: zone
            .validators
            .iter()
            .map(|v| DelegationDelegatorReward {
                validator_address: v.valoper_address.clone(),
                reward: vec![coin(v.reward)],
            })
            .collect(),
        total: vec![coin(total)],
    }
}

//! Interchain query callbacks.
//!
//! Each callback receives the raw response and the query that produced
//! it. Handlers return their errors; [`Keeper::dispatch_callback`] is the
//! single place that logs a failed callback and moves on.

use std::fmt;

use qs_claims::icq::{
    CALLBACK_CRESCENT_POOL_COIN_SUPPLY_UPDATE, CALLBACK_CRESCENT_POOL_UPDATE, CALLBACK_CRESCENT_RESERVE_BALANCE_UPDATE,
    CALLBACK_EPOCH_BLOCK, CALLBACK_OSMOSIS_CL_POOL_UPDATE, CALLBACK_OSMOSIS_POOL_UPDATE,
    CALLBACK_UMEE_INTEREST_SCALAR_UPDATE, CALLBACK_UMEE_LEVERAGE_MODULE_BALANCE_UPDATE, CALLBACK_UMEE_RESERVES_UPDATE,
    CALLBACK_UMEE_TOTAL_BORROWS_UPDATE, CALLBACK_UMEE_UTOKEN_SUPPLY_UPDATE, CALLBACK_VALIDATOR_SELECTION_REWARDS,
};
use qs_claims::crescent::POOL_KEY_PREFIX as CRESCENT_POOL_PREFIX;
use qs_claims::osmosis::POOLS_PREFIX;
use qs_claims::osmosis_cl::CL_POOLS_PREFIX;
use qs_claims::umee::{
    KEY_PREFIX_ADJUSTED_TOTAL_BORROW, KEY_PREFIX_INTEREST_SCALAR, KEY_PREFIX_RESERVE_AMOUNT, KEY_PREFIX_UTOKEN_SUPPLY,
};
use qs_protocoldata::crescent::{
    CrescentPoolCoinSupplyProtocolData, CrescentPoolProtocolData, CrescentReserveAddressBalanceProtocolData,
};
use qs_protocoldata::osmosis::{OsmosisClPoolProtocolData, OsmosisPoolProtocolData};
use qs_protocoldata::pools::{ClPool, CrescentPool, OsmosisPool};
use qs_protocoldata::records::ConnectionProtocolData;
use qs_protocoldata::store;
use qs_protocoldata::umee::{
    UmeeInterestScalarProtocolData, UmeeLeverageModuleBalanceProtocolData, UmeeReservesProtocolData,
    UmeeTotalBorrowsProtocolData, UmeeUTokenSupplyProtocolData,
};
use qs_rewards::validator_selection::{
    calc_distribution_scores, calc_performance_scores, calc_user_validator_selection_allocations,
};
use qs_store::KvStore;
use qs_types::address::encode_bech32;
use qs_types::coin::unmarshal_balance_compat;
use qs_types::keepers::{IcqRequest, TxMsg};
use qs_types::keys::{address_and_denom_from_store, u64_from_be, BALANCES_PREFIX, SUPPLY_PREFIX};
use qs_types::math::parse_legacy_dec;
use qs_types::proto::{self, DelegationTotalRewardsResponse, GetLatestBlockResponse, MsgWithdrawDelegatorReward};
use qs_types::Dec;

use crate::{Host, Keeper, KeeperError, Result};

/// Memo on transactions resetting the performance account.
pub const PERFORMANCE_RESET_MEMO: &str = "validator performance reset";

/// Every callback the module registers with the query module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Callback {
    EpochBlock,
    ValidatorSelectionRewards,
    OsmosisPoolUpdate,
    OsmosisClPoolUpdate,
    CrescentPoolUpdate,
    CrescentReserveBalanceUpdate,
    CrescentPoolCoinSupplyUpdate,
    UmeeReservesUpdate,
    UmeeInterestScalarUpdate,
    UmeeTotalBorrowsUpdate,
    UmeeUTokenSupplyUpdate,
    UmeeLeverageModuleBalanceUpdate,
}

impl Callback {
    pub const ALL: [Callback; 12] = [
        Callback::EpochBlock,
        Callback::ValidatorSelectionRewards,
        Callback::OsmosisPoolUpdate,
        Callback::OsmosisClPoolUpdate,
        Callback::CrescentPoolUpdate,
        Callback::CrescentReserveBalanceUpdate,
        Callback::CrescentPoolCoinSupplyUpdate,
        Callback::UmeeReservesUpdate,
        Callback::UmeeInterestScalarUpdate,
        Callback::UmeeTotalBorrowsUpdate,
        Callback::UmeeUTokenSupplyUpdate,
        Callback::UmeeLeverageModuleBalanceUpdate,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Callback::EpochBlock => CALLBACK_EPOCH_BLOCK,
            Callback::ValidatorSelectionRewards => CALLBACK_VALIDATOR_SELECTION_REWARDS,
            Callback::OsmosisPoolUpdate => CALLBACK_OSMOSIS_POOL_UPDATE,
            Callback::OsmosisClPoolUpdate => CALLBACK_OSMOSIS_CL_POOL_UPDATE,
            Callback::CrescentPoolUpdate => CALLBACK_CRESCENT_POOL_UPDATE,
            Callback::CrescentReserveBalanceUpdate => CALLBACK_CRESCENT_RESERVE_BALANCE_UPDATE,
            Callback::CrescentPoolCoinSupplyUpdate => CALLBACK_CRESCENT_POOL_COIN_SUPPLY_UPDATE,
            Callback::UmeeReservesUpdate => CALLBACK_UMEE_RESERVES_UPDATE,
            Callback::UmeeInterestScalarUpdate => CALLBACK_UMEE_INTEREST_SCALAR_UPDATE,
            Callback::UmeeTotalBorrowsUpdate => CALLBACK_UMEE_TOTAL_BORROWS_UPDATE,
            Callback::UmeeUTokenSupplyUpdate => CALLBACK_UMEE_UTOKEN_SUPPLY_UPDATE,
            Callback::UmeeLeverageModuleBalanceUpdate => CALLBACK_UMEE_LEVERAGE_MODULE_BALANCE_UPDATE,
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.id() == id)
    }
}

impl fmt::Display for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Pool ID of a `prefix | u64be(id)` store request.
fn pool_id_from_request(request: &[u8], prefix: u8) -> Result<u64> {
    if request.len() < 9 {
        return Err(KeeperError::InvalidRequest("query request not sufficient length".to_string()));
    }
    if request[0] != prefix {
        return Err(KeeperError::InvalidRequest(format!(
            "query request has unexpected prefix {:#04x}",
            request[0]
        )));
    }
    Ok(u64_from_be(&request[1..9])?)
}

/// Denom of a `prefix | denom | 0x00` leverage store request.
fn leverage_denom(request: &[u8], prefix: u8) -> Result<String> {
    match request {
        [first, denom @ .., 0x00] if *first == prefix && !denom.is_empty() => String::from_utf8(denom.to_vec())
            .map_err(|_| KeeperError::InvalidRequest("denom is not valid utf-8".to_string())),
        _ => Err(KeeperError::InvalidRequest(format!(
            "expected leverage key with prefix {prefix:#04x}"
        ))),
    }
}

/// Denom of a `0x02 | len | address | denom` bank balance request.
fn balance_request(request: &[u8]) -> Result<(Vec<u8>, String)> {
    match request.split_first() {
        Some((&BALANCES_PREFIX, rest)) => Ok(address_and_denom_from_store(rest)?),
        _ => Err(KeeperError::InvalidRequest("expected bank balance key".to_string())),
    }
}

fn legacy_dec(args: &[u8]) -> Result<Dec> {
    let text = std::str::from_utf8(args).map_err(|_| KeeperError::InvalidRequest("decimal is not utf-8".to_string()))?;
    Ok(parse_legacy_dec(text)?)
}

fn pool_document(args: &[u8]) -> Result<serde_json::Value> {
    if args.is_empty() {
        return Err(KeeperError::InvalidRequest("empty pool document".to_string()));
    }
    Ok(serde_json::from_slice(args)?)
}

fn check_pool_id(requested: u64, returned: u64) -> Result<()> {
    if requested != returned {
        return Err(KeeperError::InvalidRequest(format!(
            "pool document id {returned} does not match requested pool {requested}"
        )));
    }
    Ok(())
}

fn missing(kind: &str, key: impl fmt::Display) -> KeeperError {
    KeeperError::InvalidRequest(format!("unable to find protocol data for {kind}/{key}"))
}

impl<S: KvStore> Keeper<S> {
    /// Run the callback `callback_id` for a query response.
    ///
    /// # Errors
    ///
    /// Returns [`KeeperError::UnknownCallback`], or the handler's error.
    pub fn handle_callback(
        &mut self,
        host: &mut Host<'_>,
        callback_id: &str,
        args: &[u8],
        query: &IcqRequest,
    ) -> Result<()> {
        let callback =
            Callback::from_id(callback_id).ok_or_else(|| KeeperError::UnknownCallback(callback_id.to_string()))?;
        let time = host.block.time;
        match callback {
            Callback::EpochBlock => self.set_epoch_block(args, query),
            Callback::ValidatorSelectionRewards => self.validator_selection_rewards(host, args, query),
            Callback::OsmosisPoolUpdate => self.osmosis_pool_update(time, args, query),
            Callback::OsmosisClPoolUpdate => self.osmosis_cl_pool_update(time, args, query),
            Callback::CrescentPoolUpdate => self.crescent_pool_update(time, args, query),
            Callback::CrescentReserveBalanceUpdate => self.crescent_reserve_balance_update(args, query),
            Callback::CrescentPoolCoinSupplyUpdate => self.crescent_pool_coin_supply_update(args, query),
            Callback::UmeeReservesUpdate => {
                let denom = leverage_denom(&query.request, KEY_PREFIX_RESERVE_AMOUNT)?;
                let data = unmarshal_balance_compat(args, &denom)?.amount;
                self.put(&UmeeReservesProtocolData {
                    denom,
                    last_updated: time,
                    data,
                })
            }
            Callback::UmeeInterestScalarUpdate => {
                let denom = leverage_denom(&query.request, KEY_PREFIX_INTEREST_SCALAR)?;
                self.put(&UmeeInterestScalarProtocolData {
                    denom,
                    last_updated: time,
                    data: legacy_dec(args)?,
                })
            }
            Callback::UmeeTotalBorrowsUpdate => {
                let denom = leverage_denom(&query.request, KEY_PREFIX_ADJUSTED_TOTAL_BORROW)?;
                self.put(&UmeeTotalBorrowsProtocolData {
                    denom,
                    last_updated: time,
                    data: legacy_dec(args)?,
                })
            }
            Callback::UmeeUTokenSupplyUpdate => {
                let denom = leverage_denom(&query.request, KEY_PREFIX_UTOKEN_SUPPLY)?;
                let data = unmarshal_balance_compat(args, &denom)?.amount;
                self.put(&UmeeUTokenSupplyProtocolData {
                    denom,
                    last_updated: time,
                    data,
                })
            }
            Callback::UmeeLeverageModuleBalanceUpdate => {
                let (_, denom) = balance_request(&query.request)?;
                let data = unmarshal_balance_compat(args, &denom)?.amount;
                self.put(&UmeeLeverageModuleBalanceProtocolData {
                    denom,
                    last_updated: time,
                    data,
                })
            }
        }
    }

    /// Run a callback, logging instead of returning its error. Returns
    /// whether it succeeded.
    pub fn dispatch_callback(
        &mut self,
        host: &mut Host<'_>,
        callback_id: &str,
        args: &[u8],
        query: &IcqRequest,
    ) -> bool {
        match self.handle_callback(host, callback_id, args, query) {
            Ok(()) => {
                tracing::debug!(callback = callback_id, chain_id = %query.chain_id, "callback handled");
                true
            }
            Err(e) => {
                tracing::error!(callback = callback_id, chain_id = %query.chain_id, error = %e, "callback failed");
                false
            }
        }
    }

    fn put<T: qs_protocoldata::ProtocolDataRecord>(&mut self, record: &T) -> Result<()> {
        store::set_record(&mut self.store, record)?;
        let data_type = T::DATA_TYPE;
        tracing::debug!(%data_type, key = %record.generate_key(), "protocol data updated");
        Ok(())
    }

    /// Record the remote chain's height at the epoch boundary.
    fn set_epoch_block(&mut self, args: &[u8], query: &IcqRequest) -> Result<()> {
        let mut connection = store::get_record::<ConnectionProtocolData>(&self.store, &query.chain_id)?
            .ok_or_else(|| missing("connection", &query.chain_id))?;
        if args.is_empty() {
            return Err(KeeperError::InvalidRequest(
                "attempted to unmarshal zero length byte slice".to_string(),
            ));
        }
        let block: GetLatestBlockResponse = proto::decode("GetLatestBlockResponse", args)?;
        let height = block
            .height()
            .ok_or_else(|| KeeperError::InvalidRequest("block response has no header".to_string()))?;
        connection.last_epoch = height;
        self.put(&connection)?;
        tracing::info!(chain_id = %query.chain_id, height, "epoch block set");
        Ok(())
    }

    fn osmosis_pool_update(&mut self, time: i64, args: &[u8], query: &IcqRequest) -> Result<()> {
        let pool_id = pool_id_from_request(&query.request, POOLS_PREFIX)?;
        let mut record = store::get_record::<OsmosisPoolProtocolData>(&self.store, &pool_id.to_string())?
            .ok_or_else(|| missing("osmosispools", pool_id))?;
        let document = pool_document(args)?;
        let pool = OsmosisPool::decode(&record.pool_type, &document)?;
        check_pool_id(pool_id, pool.id())?;
        record.pool_data = document;
        record.last_updated = time;
        self.put(&record)
    }

    fn osmosis_cl_pool_update(&mut self, time: i64, args: &[u8], query: &IcqRequest) -> Result<()> {
        let pool_id = pool_id_from_request(&query.request, CL_POOLS_PREFIX)?;
        let mut record = store::get_record::<OsmosisClPoolProtocolData>(&self.store, &pool_id.to_string())?
            .ok_or_else(|| missing("osmosisclpools", pool_id))?;
        let document = pool_document(args)?;
        let pool: ClPool = serde_json::from_value(document.clone())?;
        check_pool_id(pool_id, pool.id)?;
        record.pool_data = document;
        record.last_updated = time;
        self.put(&record)
    }

    fn crescent_pool_update(&mut self, time: i64, args: &[u8], query: &IcqRequest) -> Result<()> {
        let pool_id = pool_id_from_request(&query.request, CRESCENT_POOL_PREFIX)?;
        let mut record = store::get_record::<CrescentPoolProtocolData>(&self.store, &pool_id.to_string())?
            .ok_or_else(|| missing("crescentpools", pool_id))?;
        let document = pool_document(args)?;
        let pool: CrescentPool = serde_json::from_value(document.clone())?;
        check_pool_id(pool_id, pool.id)?;
        record.pool_data = document;
        record.last_updated = time;
        self.put(&record)
    }

    fn crescent_reserve_balance_update(&mut self, args: &[u8], query: &IcqRequest) -> Result<()> {
        let (address, denom) = balance_request(&query.request)?;
        let connection = store::get_record::<ConnectionProtocolData>(&self.store, &query.chain_id)?
            .ok_or_else(|| missing("connection", &query.chain_id))?;
        let balance = unmarshal_balance_compat(args, &denom)?.amount;
        self.put(&CrescentReserveAddressBalanceProtocolData {
            reserve_address: encode_bech32(&connection.prefix, &address)?,
            denom,
            balance,
        })
    }

    fn crescent_pool_coin_supply_update(&mut self, args: &[u8], query: &IcqRequest) -> Result<()> {
        let pool_coin_denom = match query.request.split_first() {
            Some((&SUPPLY_PREFIX, denom)) if !denom.is_empty() => String::from_utf8(denom.to_vec())
                .map_err(|_| KeeperError::InvalidRequest("denom is not valid utf-8".to_string()))?,
            _ => return Err(KeeperError::InvalidRequest("expected bank supply key".to_string())),
        };
        let supply = unmarshal_balance_compat(args, &pool_coin_denom)?.amount;
        self.put(&CrescentPoolCoinSupplyProtocolData {
            pool_coin_denom,
            supply,
        })
    }

    /// Score the zone's validators from its performance account rewards and
    /// pay the zone's validator-selection budget to delegators by the
    /// intents snapshotted at the previous epoch.
    ///
    /// Everything is computed and the payout checked against the module
    /// balance before any state changes.
    fn validator_selection_rewards(&mut self, host: &mut Host<'_>, args: &[u8], query: &IcqRequest) -> Result<()> {
        let rewards: DelegationTotalRewardsResponse = proto::decode("QueryDelegationTotalRewardsResponse", args)?;
        let mut zone = host
            .ics
            .get_zone(&query.chain_id)
            .ok_or_else(|| KeeperError::ZoneNotFound(query.chain_id.clone()))?;

        let validators = host.ics.validators(&zone.chain_id);
        let mut zs = calc_distribution_scores(&zone.chain_id, &validators)?;
        let scored = calc_performance_scores(&mut zs, &rewards, &zone.base_denom)?;
        tracing::info!(
            zone = %zs.zone_id,
            total_voting_power = zs.total_voting_power,
            scored = scored.len(),
            "callback zone score"
        );

        let mut updated = Vec::with_capacity(validators.len());
        for mut validator in validators {
            if let Some(vs) = zs.validator_scores.get(&validator.valoper_address) {
                validator.score = vs.total_score()?;
                updated.push(validator);
            }
        }

        let bond_denom = host.staking.bond_denom();
        let snapshot = host.ics.delegator_intents(&zone.chain_id, true);
        let allocations = calc_user_validator_selection_allocations(
            &zs,
            zone.validator_selection_allocation,
            &snapshot,
            &bond_denom,
        )?;
        self.check_distribution(host, &allocations)?;

        if let Some(performance) = zone.performance_address.as_deref() {
            let msgs: Vec<TxMsg> = scored
                .iter()
                .map(|valoper| {
                    TxMsg::WithdrawDelegatorReward(MsgWithdrawDelegatorReward {
                        delegator_address: performance.to_string(),
                        validator_address: valoper.clone(),
                    })
                })
                .collect();
            if !msgs.is_empty() {
                host.ics
                    .submit_tx(&zone.chain_id, msgs, performance, PERFORMANCE_RESET_MEMO, zone.messages_per_tx)?;
            }
        }
        for validator in updated {
            host.ics.set_validator(&zone.chain_id, validator)?;
        }

        self.distribute_to_users(host, &allocations)?;

        for intent in host.ics.delegator_intents(&zone.chain_id, false) {
            host.ics.set_delegator_intent(&zone.chain_id, intent, true);
        }
        zone.validator_selection_allocation = 0;
        tracing::info!(zone = %zone.chain_id, users = allocations.len(), "validator selection rewards distributed");
        host.ics.set_zone(zone);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use prost::Message as _;
    use serde_json::json;

    use qs_protocoldata::osmosis::DenomWithZone;
    use qs_store::MemStore;
    use qs_types::keepers::InterchainStakingKeeper;
    use qs_types::keys::{balance_key, supply_key, u64_to_be};
    use qs_types::proto::{Block, DelegationDelegatorReward, Header, ProtoDecCoin};
    use qs_types::{Coin, DelegatorIntent, Validator, ValidatorIntent, Zone, MODULE_NAME};

    use super::*;
    use crate::sim::SimChain;
    use crate::{BlockInfo, ModuleConfig};

    const ALICE: &str = "quick1jc24kwznud9m3mwqmcz3xw33ndjuufngu5m0y6";
    const BOB: &str = "quick16qqhmsqcs4j6mfa92flnz4n8tj2s53jwdhy7an";
    const BLOCK: BlockInfo = BlockInfo {
        height: 500,
        time: 1_700_000_000,
    };

    fn keeper() -> Keeper<MemStore> {
        Keeper::new(MemStore::new(), ModuleConfig::default())
    }

    fn query(chain_id: &str, request: Vec<u8>) -> IcqRequest {
        IcqRequest {
            connection_id: "connection-2".into(),
            chain_id: chain_id.into(),
            query_type: String::new(),
            request,
            period: -1,
            module: MODULE_NAME.into(),
            callback_id: String::new(),
            ttl: 0,
        }
    }

    fn connection(keeper: &mut Keeper<MemStore>, chain_id: &str, prefix: &str) {
        store::set_record(
            keeper.store_mut(),
            &ConnectionProtocolData {
                connection_id: "connection-2".into(),
                chain_id: chain_id.into(),
                last_epoch: 0,
                prefix: prefix.into(),
                transfer_channel: "channel-2".into(),
            },
        )
        .expect("connection");
    }

    fn pool_key(prefix: u8, id: u64) -> Vec<u8> {
        let mut key = vec![prefix];
        key.extend_from_slice(&u64_to_be(id));
        key
    }

    fn osmosis_pool(keeper: &mut Keeper<MemStore>, id: u64) {
        let mut denoms = std::collections::BTreeMap::new();
        denoms.insert(
            "ibc/QATOM".to_string(),
            DenomWithZone {
                denom: "uqatom".into(),
                chain_id: "cosmoshub-4".into(),
            },
        );
        store::set_record(
            keeper.store_mut(),
            &OsmosisPoolProtocolData {
                pool_id: id,
                pool_name: "qatom/atom".into(),
                pool_type: "balancer".into(),
                denoms,
                ..OsmosisPoolProtocolData::default()
            },
        )
        .expect("pool");
    }

    fn balancer_doc(id: u64) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": id.to_string(),
            "pool_assets": [
                {"token": {"denom": "ibc/QATOM", "amount": "1000"}, "weight": "1"},
                {"token": {"denom": "uosmo", "amount": "2000"}, "weight": "1"}
            ],
            "total_shares": {"denom": format!("gamm/pool/{id}"), "amount": "100"}
        }))
        .expect("doc")
    }

    fn run(
        keeper: &mut Keeper<MemStore>,
        chain: &mut SimChain,
        callback: Callback,
        args: &[u8],
        q: &IcqRequest,
    ) -> Result<()> {
        let mut host = chain.host(BLOCK);
        keeper.handle_callback(&mut host, callback.id(), args, q)
    }

    #[test]
    fn test_callback_ids_round_trip() {
        for callback in Callback::ALL {
            assert_eq!(Callback::from_id(callback.id()), Some(callback));
        }
        assert_eq!(Callback::from_id("nope"), None);
        assert_eq!(Callback::EpochBlock.to_string(), "epochblock");
    }

    #[test]
    fn test_unknown_callback() {
        let mut k = keeper();
        let mut chain = SimChain::new("quick", "uqck").expect("chain");
        let mut host = chain.host(BLOCK);
        let err = k
            .handle_callback(&mut host, "nope", b"", &query("osmosis-1", vec![]))
            .expect_err("unknown");
        assert!(matches!(err, KeeperError::UnknownCallback(_)));
        assert!(!k.dispatch_callback(&mut host, "nope", b"", &query("osmosis-1", vec![])));
    }

    #[test]
    fn test_epoch_block_sets_last_epoch() {
        let mut k = keeper();
        let mut chain = SimChain::new("quick", "uqck").expect("chain");
        connection(&mut k, "osmosis-1", "osmo");
        let header = |height| Block {
            header: Some(Header {
                chain_id: "osmosis-1".into(),
                height,
            }),
        };
        let response = GetLatestBlockResponse {
            block: Some(header(90)),
            sdk_block: Some(header(100)),
        }
        .encode_to_vec();
        let q = query("osmosis-1", vec![]);
        run(&mut k, &mut chain, Callback::EpochBlock, &response, &q).expect("callback");
        let conn = store::get_record::<ConnectionProtocolData>(k.store(), "osmosis-1")
            .expect("get")
            .expect("present");
        assert_eq!(conn.last_epoch, 100);

        let legacy = GetLatestBlockResponse {
            block: Some(header(120)),
            sdk_block: None,
        }
        .encode_to_vec();
        run(&mut k, &mut chain, Callback::EpochBlock, &legacy, &q).expect("callback");
        let conn = store::get_record::<ConnectionProtocolData>(k.store(), "osmosis-1")
            .expect("get")
            .expect("present");
        assert_eq!(conn.last_epoch, 120);
    }

    #[test]
    fn test_epoch_block_rejects_empty_and_unknown() {
        let mut k = keeper();
        let mut chain = SimChain::new("quick", "uqck").expect("chain");
        connection(&mut k, "osmosis-1", "osmo");
        assert!(matches!(
            run(&mut k, &mut chain, Callback::EpochBlock, b"", &query("osmosis-1", vec![])),
            Err(KeeperError::InvalidRequest(_))
        ));
        assert!(run(&mut k, &mut chain, Callback::EpochBlock, b"\x12\x00", &query("juno-1", vec![])).is_err());
    }

    #[test]
    fn test_osmosis_pool_update() {
        let mut k = keeper();
        let mut chain = SimChain::new("quick", "uqck").expect("chain");
        osmosis_pool(&mut k, 1);
        let q = query("osmosis-1", pool_key(POOLS_PREFIX, 1));
        run(&mut k, &mut chain, Callback::OsmosisPoolUpdate, &balancer_doc(1), &q).expect("update");

        let record = store::get_record::<OsmosisPoolProtocolData>(k.store(), "1")
            .expect("get")
            .expect("present");
        assert_eq!(record.last_updated, BLOCK.time);
        let pool = record.pool().expect("decode").expect("pool data");
        assert_eq!(pool.liquidity_of("uosmo"), 2000);
    }

    #[test]
    fn test_osmosis_pool_update_rejects_bad_requests() {
        let mut k = keeper();
        let mut chain = SimChain::new("quick", "uqck").expect("chain");
        osmosis_pool(&mut k, 1);

        let short = query("osmosis-1", vec![POOLS_PREFIX, 0, 1]);
        assert!(run(&mut k, &mut chain, Callback::OsmosisPoolUpdate, &balancer_doc(1), &short).is_err());

        let wrong_prefix = query("osmosis-1", pool_key(0x03, 1));
        assert!(run(&mut k, &mut chain, Callback::OsmosisPoolUpdate, &balancer_doc(1), &wrong_prefix).is_err());

        let unknown = query("osmosis-1", pool_key(POOLS_PREFIX, 7));
        assert!(run(&mut k, &mut chain, Callback::OsmosisPoolUpdate, &balancer_doc(7), &unknown).is_err());

        let mismatched = query("osmosis-1", pool_key(POOLS_PREFIX, 1));
        let err = run(&mut k, &mut chain, Callback::OsmosisPoolUpdate, &balancer_doc(2), &mismatched)
            .expect_err("mismatch");
        assert!(err.to_string().contains("does not match"));

        let record = store::get_record::<OsmosisPoolProtocolData>(k.store(), "1")
            .expect("get")
            .expect("present");
        assert!(record.pool_data.is_null());
    }

    #[test]
    fn test_cl_and_crescent_pool_updates() {
        let mut k = keeper();
        let mut chain = SimChain::new("quick", "uqck").expect("chain");
        let mut denoms = std::collections::BTreeMap::new();
        denoms.insert(
            "ibc/QATOM".to_string(),
            DenomWithZone {
                denom: "uqatom".into(),
                chain_id: "cosmoshub-4".into(),
            },
        );
        store::set_record(
            k.store_mut(),
            &OsmosisClPoolProtocolData {
                pool_id: 1089,
                denoms: denoms.clone(),
                ..OsmosisClPoolProtocolData::default()
            },
        )
        .expect("cl pool");
        store::set_record(
            k.store_mut(),
            &CrescentPoolProtocolData {
                pool_id: 5,
                denoms,
                pool_data: serde_json::Value::Null,
                last_updated: 0,
            },
        )
        .expect("crescent pool");

        let cl_doc = serde_json::to_vec(&json!({
            "id": "1089",
            "token0": "ibc/QATOM",
            "token1": "uosmo",
            "current_sqrt_price": "1.5",
            "current_tick": 1250000
        }))
        .expect("doc");
        let q = query("osmosis-1", pool_key(CL_POOLS_PREFIX, 1089));
        run(&mut k, &mut chain, Callback::OsmosisClPoolUpdate, &cl_doc, &q).expect("cl update");
        let cl = store::get_record::<OsmosisClPoolProtocolData>(k.store(), "1089")
            .expect("get")
            .expect("present");
        assert_eq!(cl.pool().expect("decode").expect("pool").token1, "uosmo");

        let crescent_doc = serde_json::to_vec(&json!({
            "id": 5,
            "pair_id": 2,
            "reserve_address": "cre1reserve",
            "pool_coin_denom": "pool5"
        }))
        .expect("doc");
        let q = query("mooncat-1-1", pool_key(CRESCENT_POOL_PREFIX, 5));
        run(&mut k, &mut chain, Callback::CrescentPoolUpdate, &crescent_doc, &q).expect("crescent update");
        let crescent = store::get_record::<CrescentPoolProtocolData>(k.store(), "5")
            .expect("get")
            .expect("present");
        assert_eq!(crescent.pool().expect("decode").expect("pool").pool_coin_denom, "pool5");
        assert_eq!(crescent.last_updated, BLOCK.time);
    }

    #[test]
    fn test_crescent_balance_and_supply_updates() {
        let mut k = keeper();
        let mut chain = SimChain::new("quick", "uqck").expect("chain");
        connection(&mut k, "mooncat-1-1", "cre");
        let reserve = [7u8; 32];
        let q = query("mooncat-1-1", balance_key(&reserve, "ibc/QATOM").expect("key"));
        run(&mut k, &mut chain, Callback::CrescentReserveBalanceUpdate, b"2500", &q).expect("balance");

        let address = encode_bech32("cre", &reserve).expect("address");
        let key = CrescentReserveAddressBalanceProtocolData::key_for(&address, "ibc/QATOM");
        let balance = store::get_record::<CrescentReserveAddressBalanceProtocolData>(k.store(), &key)
            .expect("get")
            .expect("present");
        assert_eq!(balance.balance, 2500);

        let q = query("mooncat-1-1", supply_key("pool5"));
        run(&mut k, &mut chain, Callback::CrescentPoolCoinSupplyUpdate, b"10000", &q).expect("supply");
        let supply = store::get_record::<CrescentPoolCoinSupplyProtocolData>(k.store(), "pool5")
            .expect("get")
            .expect("present");
        assert_eq!(supply.supply, 10_000);
    }

    #[test]
    fn test_umee_updates() {
        let mut k = keeper();
        let mut chain = SimChain::new("quick", "uqck").expect("chain");
        let leverage = |prefix: u8, denom: &str| qs_claims::umee::leverage_key(prefix, denom);

        let q = query("umee-1", leverage(KEY_PREFIX_RESERVE_AMOUNT, "ibc/QATOM"));
        run(&mut k, &mut chain, Callback::UmeeReservesUpdate, b"150", &q).expect("reserves");
        let q = query("umee-1", leverage(KEY_PREFIX_INTEREST_SCALAR, "ibc/QATOM"));
        run(&mut k, &mut chain, Callback::UmeeInterestScalarUpdate, b"1011799284893187069", &q).expect("scalar");
        let q = query("umee-1", leverage(KEY_PREFIX_ADJUSTED_TOTAL_BORROW, "ibc/QATOM"));
        run(&mut k, &mut chain, Callback::UmeeTotalBorrowsUpdate, b"500000000000000000000", &q).expect("borrows");
        let q = query("umee-1", leverage(KEY_PREFIX_UTOKEN_SUPPLY, "u/ibc/QATOM"));
        run(&mut k, &mut chain, Callback::UmeeUTokenSupplyUpdate, b"900", &q).expect("utokens");
        let module = qs_claims::umee::module_address(qs_claims::umee::LEVERAGE_MODULE_NAME);
        let q = query("umee-1", balance_key(&module, "ibc/QATOM").expect("key"));
        run(&mut k, &mut chain, Callback::UmeeLeverageModuleBalanceUpdate, b"1200", &q).expect("balance");

        let reserves = store::get_record::<UmeeReservesProtocolData>(k.store(), "ibc/QATOM")
            .expect("get")
            .expect("present");
        assert_eq!(reserves.data, 150);
        assert_eq!(reserves.last_updated, BLOCK.time);
        let scalar = store::get_record::<UmeeInterestScalarProtocolData>(k.store(), "ibc/QATOM")
            .expect("get")
            .expect("present");
        assert_eq!(scalar.data.to_string(), "1.011799284893187069");
        let borrows = store::get_record::<UmeeTotalBorrowsProtocolData>(k.store(), "ibc/QATOM")
            .expect("get")
            .expect("present");
        assert_eq!(borrows.data, Dec::from(500));
        let supply = store::get_record::<UmeeUTokenSupplyProtocolData>(k.store(), "u/ibc/QATOM")
            .expect("get")
            .expect("present");
        assert_eq!(supply.data, 900);
        let balance = store::get_record::<UmeeLeverageModuleBalanceProtocolData>(k.store(), "ibc/QATOM")
            .expect("get")
            .expect("present");
        assert_eq!(balance.data, 1200);
    }

    #[test]
    fn test_umee_rejects_wrong_prefix() {
        let mut k = keeper();
        let mut chain = SimChain::new("quick", "uqck").expect("chain");
        let q = query(
            "umee-1",
            qs_claims::umee::leverage_key(KEY_PREFIX_INTEREST_SCALAR, "ibc/QATOM"),
        );
        assert!(matches!(
            run(&mut k, &mut chain, Callback::UmeeReservesUpdate, b"150", &q),
            Err(KeeperError::InvalidRequest(_))
        ));
    }

    fn dec_coin(whole: u64) -> ProtoDecCoin {
        ProtoDecCoin {
            denom: "uatom".into(),
            amount: format!("{whole}000000000000000000"),
        }
    }

    fn selection_chain(allocation: u128) -> SimChain {
        let mut chain = SimChain::new("quick", "uqck").expect("chain");
        let mut zone = Zone::new("cosmoshub-4", "connection-0", "cosmos", "uqatom", "uatom");
        zone.performance_address = Some("cosmos1performance".into());
        zone.validator_selection_allocation = allocation;
        chain.ics.zones.insert(zone.chain_id.clone(), zone);
        chain.ics.add_validator("cosmoshub-4", Validator::new("cosmosvaloper1a", 100));
        chain.ics.add_validator("cosmoshub-4", Validator::new("cosmosvaloper1b", 100));
        for (user, valoper, snapshot) in [
            (ALICE, "cosmosvaloper1a", true),
            (BOB, "cosmosvaloper1b", true),
            (ALICE, "cosmosvaloper1b", false),
        ] {
            chain.ics.set_delegator_intent(
                "cosmoshub-4",
                DelegatorIntent {
                    delegator: user.into(),
                    intents: vec![ValidatorIntent {
                        valoper_address: valoper.into(),
                        weight: Dec::ONE,
                    }],
                },
                snapshot,
            );
        }
        chain
            .bank
            .mint_to_module(MODULE_NAME, &Coin::new("uqck", 10_000))
            .expect("mint");
        chain
    }

    fn rewards_response() -> Vec<u8> {
        DelegationTotalRewardsResponse {
            rewards: vec![
                DelegationDelegatorReward {
                    validator_address: "cosmosvaloper1a".into(),
                    reward: vec![dec_coin(10)],
                },
                DelegationDelegatorReward {
                    validator_address: "cosmosvaloper1b".into(),
                    reward: vec![dec_coin(10)],
                },
            ],
            total: vec![dec_coin(20)],
        }
        .encode_to_vec()
    }

    #[test]
    fn test_validator_selection_rewards() {
        let mut k = keeper();
        let mut chain = selection_chain(1000);
        let q = query("cosmoshub-4", vec![]);
        run(&mut k, &mut chain, Callback::ValidatorSelectionRewards, &rewards_response(), &q).expect("callback");

        assert_eq!(chain.bank.balance(ALICE, "uqck"), 500);
        assert_eq!(chain.bank.balance(BOB, "uqck"), 500);

        let zone = chain.ics.get_zone("cosmoshub-4").expect("zone");
        assert_eq!(zone.validator_selection_allocation, 0);
        for v in chain.ics.validators("cosmoshub-4") {
            assert_eq!(v.score, Dec::ONE);
        }

        assert_eq!(chain.ics.txs.len(), 1);
        assert_eq!(chain.ics.txs[0].account, "cosmos1performance");
        assert_eq!(
            chain.ics.txs[0].msgs,
            vec![
                TxMsg::WithdrawDelegatorReward(MsgWithdrawDelegatorReward {
                    delegator_address: "cosmos1performance".into(),
                    validator_address: "cosmosvaloper1a".into(),
                }),
                TxMsg::WithdrawDelegatorReward(MsgWithdrawDelegatorReward {
                    delegator_address: "cosmos1performance".into(),
                    validator_address: "cosmosvaloper1b".into(),
                }),
            ]
        );

        let snapshot = chain.ics.delegator_intents("cosmoshub-4", true);
        let alice = snapshot.iter().find(|i| i.delegator == ALICE).expect("alice");
        assert_eq!(alice.intents[0].valoper_address, "cosmosvaloper1b");
    }

    #[test]
    fn test_validator_selection_overdraw_changes_nothing() {
        let mut k = keeper();
        let mut chain = selection_chain(50_000);
        let q = query("cosmoshub-4", vec![]);
        let err = run(&mut k, &mut chain, Callback::ValidatorSelectionRewards, &rewards_response(), &q)
            .expect_err("overdraw");
        assert!(matches!(err, KeeperError::InsufficientModuleBalance { .. }));

        assert_eq!(chain.bank.balance(ALICE, "uqck"), 0);
        assert!(chain.ics.txs.is_empty());
        assert_eq!(
            chain.ics.get_zone("cosmoshub-4").expect("zone").validator_selection_allocation,
            50_000
        );
    }

    #[test]
    fn test_validator_selection_zero_power_fails_zone() {
        let mut k = keeper();
        let mut chain = selection_chain(1000);
        chain.ics.validators.insert(
            "cosmoshub-4".into(),
            vec![Validator::new("cosmosvaloper1a", 0)],
        );
        let q = query("cosmoshub-4", vec![]);
        assert!(matches!(
            run(&mut k, &mut chain, Callback::ValidatorSelectionRewards, &rewards_response(), &q),
            Err(KeeperError::Rewards(qs_rewards::RewardsError::ZeroVotingPower(_)))
        ));
    }
}

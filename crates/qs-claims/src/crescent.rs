//! Crescent liquidity pools.
//!
//! Pool coins (`pool{id}`) are proven as a bank balance or as an lpfarm
//! position. The claim is the position's share of the qAsset held by the
//! pool's reserve account.

use qs_protocoldata::crescent::{
    CrescentPoolCoinSupplyProtocolData, CrescentPoolProtocolData, CrescentReserveAddressBalanceProtocolData,
};
use qs_protocoldata::records::{CrescentParamsProtocolData, CRESCENT_PARAMS_KEY};
use qs_protocoldata::store;
use qs_store::KvStore;
use qs_types::address::address_from_bech32;
use qs_types::claims::PROOF_TYPE_BANK;
use qs_types::coin::unmarshal_balance_compat;
use qs_types::keys::{balance_key, supply_key, u64_to_be};
use qs_types::math::{dec_from_amount, mul, parse_amount, quo, truncate};
use qs_types::proto::{self, FarmPosition};
use qs_types::{ClaimType, Coin, MsgSubmitClaim, Zone};

use crate::common::{denom_for_user, resolve_bech32_owner, sum_unique_proofs, user_bytes, zone, zone_qasset_denom};
use crate::icq::{
    connection_for, request, CALLBACK_CRESCENT_POOL_COIN_SUPPLY_UPDATE, CALLBACK_CRESCENT_POOL_UPDATE,
    CALLBACK_CRESCENT_RESERVE_BALANCE_UPDATE, QUERY_BANK_STORE, QUERY_LIQUIDITY_STORE,
};
use crate::{ClaimContext, ClaimError, ClaimSubmodule, HookContext, Result};

/// liquidity store prefix for pools.
pub const POOL_KEY_PREFIX: u8 = 0xab;

pub fn pool_key(pool_id: u64) -> Vec<u8> {
    let mut key = vec![POOL_KEY_PREFIX];
    key.extend_from_slice(&u64_to_be(pool_id));
    key
}

fn pool_id_from_denom(denom: &str) -> Result<u64> {
    denom
        .strip_prefix("pool")
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| ClaimError::InvalidPosition(format!("{denom} is not a pool coin denom")))
}

/// Amount of the zone's qAsset backing `pool_coins`.
///
/// # Errors
///
/// - [`ClaimError::MissingProtocolData`] when the pool, its reserve
///   balance or its coin supply is unknown
/// - [`ClaimError::PoolDisabled`] for a disabled pool
/// - [`ClaimError::EmptyPool`] for a pool with no coins issued
pub fn applicable_tokens_in_pool(store: &dyn KvStore, zone: &Zone, src_zone: &str, pool_coins: &Coin) -> Result<u128> {
    let pool_id = pool_id_from_denom(&pool_coins.denom)?;
    let pd = store::get_record::<CrescentPoolProtocolData>(store, &pool_id.to_string())?
        .ok_or_else(|| ClaimError::MissingProtocolData(format!("poolID={pool_id}")))?;
    let pool_denom = zone_qasset_denom(store, zone, src_zone, pd.denoms.keys())?
        .ok_or_else(|| ClaimError::PoolZoneMismatch(zone.chain_id.clone()))?;

    let pool = pd.pool()?.ok_or(ClaimError::PoolDataPending(pool_id))?;
    if pool.disabled {
        return Err(ClaimError::PoolDisabled(pool_id));
    }

    let reserve_key = CrescentReserveAddressBalanceProtocolData::key_for(&pool.reserve_address, pool_denom);
    let reserve = store::get_record::<CrescentReserveAddressBalanceProtocolData>(store, &reserve_key)?
        .ok_or_else(|| ClaimError::MissingProtocolData(format!("reserve balance {reserve_key}")))?;
    let supply = store::get_record::<CrescentPoolCoinSupplyProtocolData>(store, &pool.pool_coin_denom)?
        .ok_or_else(|| ClaimError::MissingProtocolData(format!("pool coin supply {}", pool.pool_coin_denom)))?;
    if supply.supply == 0 {
        return Err(ClaimError::EmptyPool(pool.pool_coin_denom));
    }

    let ratio = quo(dec_from_amount(pool_coins.amount)?, dec_from_amount(supply.supply)?)?;
    let amount = truncate(mul(ratio, dec_from_amount(reserve.balance)?)?)?;
    tracing::debug!(pool_id, %ratio, reserve = reserve.balance, amount, "applicable tokens in crescent pool");
    Ok(amount)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CrescentModule;

impl ClaimSubmodule for CrescentModule {
    fn claim_type(&self) -> ClaimType {
        ClaimType::CrescentPool
    }

    fn hooks(&self, ctx: &mut HookContext<'_>) -> Result<usize> {
        let params = store::get_record::<CrescentParamsProtocolData>(ctx.store, CRESCENT_PARAMS_KEY)?
            .ok_or_else(|| ClaimError::MissingProtocolData(CRESCENT_PARAMS_KEY.to_string()))?;
        let connection = connection_for(ctx.store, &params.chain_id)?;
        let mut issued = 0usize;

        for (_, balance) in store::records::<CrescentReserveAddressBalanceProtocolData>(ctx.store)? {
            let address = address_from_bech32(&balance.reserve_address, None)?;
            let key = balance_key(&address, &balance.denom)?;
            request(ctx, &connection, QUERY_BANK_STORE, key, CALLBACK_CRESCENT_RESERVE_BALANCE_UPDATE)?;
            issued += 1;
        }

        for (_, pool) in store::records::<CrescentPoolProtocolData>(ctx.store)? {
            request(
                ctx,
                &connection,
                QUERY_LIQUIDITY_STORE,
                pool_key(pool.pool_id),
                CALLBACK_CRESCENT_POOL_UPDATE,
            )?;
            issued += 1;
        }

        for (_, supply) in store::records::<CrescentPoolCoinSupplyProtocolData>(ctx.store)? {
            request(
                ctx,
                &connection,
                QUERY_BANK_STORE,
                supply_key(&supply.pool_coin_denom),
                CALLBACK_CRESCENT_POOL_COIN_SUPPLY_UPDATE,
            )?;
            issued += 1;
        }

        tracing::info!(chain_id = %connection.chain_id, issued, "crescent updates requested");
        Ok(issued)
    }

    fn validate_claim(&self, ctx: &ClaimContext<'_>, msg: &MsgSubmitClaim) -> Result<u128> {
        let zone = zone(ctx, &msg.zone)?;
        let user = user_bytes(&msg.user_address)?;

        sum_unique_proofs(&msg.proofs, |proof| {
            let pool_coins = if proof.proof_type == PROOF_TYPE_BANK {
                let denom = denom_for_user(ctx, &proof.key, &user, &msg.src_zone)?;
                unmarshal_balance_compat(&proof.data, &denom)?
            } else {
                let position: FarmPosition = proto::decode("Position", &proof.data)?;
                resolve_bech32_owner(ctx, &user, &msg.src_zone, &position.farmer)?;
                Coin::new(position.denom, parse_amount(&position.farming_amount)?)
            };
            applicable_tokens_in_pool(ctx.store, &zone, &msg.src_zone, &pool_coins)
        })
    }
}

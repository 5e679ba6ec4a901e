//! Osmosis AMM pools.
//!
//! A user's pool shares are proven either as a bank balance of the share
//! denom (`gamm/pool/{id}`) or as a lockup holding those shares. The claim
//! is the user's pro-rata slice of the pool's reserve of the zone's qAsset.

use qs_protocoldata::osmosis::OsmosisPoolProtocolData;
use qs_protocoldata::records::{OsmosisParamsProtocolData, OSMOSIS_PARAMS_KEY};
use qs_protocoldata::store;
use qs_store::KvStore;
use qs_types::claims::PROOF_TYPE_BANK;
use qs_types::coin::unmarshal_balance_compat;
use qs_types::keys::u64_to_be;
use qs_types::math::{dec_from_amount, mul, quo, truncate};
use qs_types::proto::{self, PeriodLock};
use qs_types::{ClaimType, Coin, MsgSubmitClaim, Zone};

use crate::common::{denom_for_user, resolve_bech32_owner, sum_unique_proofs, user_bytes, zone, zone_qasset_denom};
use crate::icq::{connection_for, request, CALLBACK_OSMOSIS_POOL_UPDATE, QUERY_GAMM_STORE};
use crate::{ClaimContext, ClaimError, ClaimSubmodule, HookContext, Result};

/// gamm store prefix for pools.
pub const POOLS_PREFIX: u8 = 0x02;

/// `0x02 | u64be(pool id)`.
pub fn pool_key(pool_id: u64) -> Vec<u8> {
    let mut key = vec![POOLS_PREFIX];
    key.extend_from_slice(&u64_to_be(pool_id));
    key
}

/// Osmosis params, required by every Osmosis-side hook and claim.
///
/// # Errors
///
/// Returns [`ClaimError::MissingProtocolData`] when unset.
pub fn osmosis_params(store: &dyn KvStore) -> Result<OsmosisParamsProtocolData> {
    store::get_record::<OsmosisParamsProtocolData>(store, OSMOSIS_PARAMS_KEY)?
        .ok_or_else(|| ClaimError::MissingProtocolData(OSMOSIS_PARAMS_KEY.to_string()))
}

fn pool_id_from_denom(denom: &str) -> Result<u64> {
    let id = denom.rsplit('/').next().unwrap_or_default();
    id.parse()
        .map_err(|_| ClaimError::InvalidPosition(format!("{denom} is not a pool share denom")))
}

/// Amount of the zone's qAsset backing `shares` of an Osmosis pool.
///
/// # Errors
///
/// - [`ClaimError::MissingProtocolData`] for an unknown pool
/// - [`ClaimError::PoolZoneMismatch`] when the pool holds no qAsset of the zone
/// - [`ClaimError::EmptyPool`] for a pool without shares
pub fn applicable_tokens_in_pool(store: &dyn KvStore, zone: &Zone, src_zone: &str, shares: &Coin) -> Result<u128> {
    let pool_id = pool_id_from_denom(&shares.denom)?;
    let pd = store::get_record::<OsmosisPoolProtocolData>(store, &pool_id.to_string())?
        .ok_or_else(|| ClaimError::MissingProtocolData(format!("poolID={pool_id}")))?;

    let zone_denom = zone_qasset_denom(store, zone, src_zone, pd.denoms.keys())?
        .ok_or_else(|| ClaimError::PoolZoneMismatch(zone.chain_id.clone()))?;

    let pool = pd.pool()?.ok_or(ClaimError::PoolDataPending(pool_id))?;
    let total_shares = pool.total_shares();
    if total_shares == 0 {
        return Err(ClaimError::EmptyPool(pool_id.to_string()));
    }

    let ratio = quo(dec_from_amount(shares.amount)?, dec_from_amount(total_shares)?)?;
    let reserve = pool.liquidity_of(zone_denom);
    let amount = truncate(mul(ratio, dec_from_amount(reserve)?)?)?;
    tracing::debug!(pool_id, %ratio, reserve, amount, "applicable tokens in pool");
    Ok(amount)
}

fn single_coin(lock: &PeriodLock) -> Result<Coin> {
    match lock.coins.as_slice() {
        [coin] => Ok(coin.to_coin()?),
        coins => Err(ClaimError::InvalidPosition(format!(
            "lock {} has {} coins, expected one",
            lock.id,
            coins.len()
        ))),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct OsmosisModule;

impl ClaimSubmodule for OsmosisModule {
    fn claim_type(&self) -> ClaimType {
        ClaimType::OsmosisPool
    }

    fn hooks(&self, ctx: &mut HookContext<'_>) -> Result<usize> {
        let params = osmosis_params(ctx.store)?;
        let connection = connection_for(ctx.store, &params.chain_id)?;

        let pools = store::records::<OsmosisPoolProtocolData>(ctx.store)?;
        for (_, pool) in &pools {
            request(
                ctx,
                &connection,
                QUERY_GAMM_STORE,
                pool_key(pool.pool_id),
                CALLBACK_OSMOSIS_POOL_UPDATE,
            )?;
        }
        tracing::info!(chain_id = %connection.chain_id, pools = pools.len(), "osmosis pool updates requested");
        Ok(pools.len())
    }

    fn validate_claim(&self, ctx: &ClaimContext<'_>, msg: &MsgSubmitClaim) -> Result<u128> {
        let zone = zone(ctx, &msg.zone)?;
        let user = user_bytes(&msg.user_address)?;

        sum_unique_proofs(&msg.proofs, |proof| {
            let shares = if proof.proof_type == PROOF_TYPE_BANK {
                let denom = denom_for_user(ctx, &proof.key, &user, &msg.src_zone)?;
                unmarshal_balance_compat(&proof.data, &denom)?
            } else {
                let lock: PeriodLock = proto::decode("PeriodLock", &proof.data)?;
                resolve_bech32_owner(ctx, &user, &msg.src_zone, &lock.owner)?;
                single_coin(&lock)?
            };
            applicable_tokens_in_pool(ctx.store, &zone, &msg.src_zone, &shares)
        })
    }
}

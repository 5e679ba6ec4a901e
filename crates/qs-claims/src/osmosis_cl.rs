//! Osmosis concentrated-liquidity positions.

use qs_protocoldata::osmosis::OsmosisClPoolProtocolData;
use qs_protocoldata::store;
use qs_types::keys::u64_to_be;
use qs_types::proto::{self, ClPosition};
use qs_types::{ClaimType, MsgSubmitClaim};

use crate::common::{resolve_bech32_owner, sum_unique_proofs, user_bytes, zone, zone_qasset_denom};
use crate::icq::{connection_for, request, CALLBACK_OSMOSIS_CL_POOL_UPDATE, QUERY_CONCENTRATED_LIQUIDITY_STORE};
use crate::osmosis::osmosis_params;
use crate::{ClaimContext, ClaimError, ClaimSubmodule, HookContext, Result};

/// concentratedliquidity store prefix for pools.
pub const CL_POOLS_PREFIX: u8 = 0x03;

pub fn cl_pool_key(pool_id: u64) -> Vec<u8> {
    let mut key = vec![CL_POOLS_PREFIX];
    key.extend_from_slice(&u64_to_be(pool_id));
    key
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct OsmosisClModule;

impl OsmosisClModule {
    fn position_amount(ctx: &ClaimContext<'_>, msg: &MsgSubmitClaim, position: &ClPosition) -> Result<u128> {
        let zone = zone(ctx, &msg.zone)?;
        let pd = store::get_record::<OsmosisClPoolProtocolData>(ctx.store, &position.pool_id.to_string())?
            .ok_or_else(|| ClaimError::MissingProtocolData(format!("clPoolID={}", position.pool_id)))?;
        let pool_denom = zone_qasset_denom(ctx.store, &zone, &msg.src_zone, pd.denoms.keys())?
            .ok_or_else(|| ClaimError::PoolZoneMismatch(zone.chain_id.clone()))?;

        let pool = pd.pool()?.ok_or(ClaimError::PoolDataPending(position.pool_id))?;
        let (coin0, coin1) =
            pool.underlying_assets(position.lower_tick, position.upper_tick, position.liquidity_dec()?)?;
        if coin0.denom == pool_denom {
            Ok(coin0.amount)
        } else if coin1.denom == pool_denom {
            Ok(coin1.amount)
        } else {
            Err(ClaimError::PositionMismatch(format!(
                "position {} in pool {} holds neither leg as {pool_denom}",
                position.position_id, position.pool_id
            )))
        }
    }
}

impl ClaimSubmodule for OsmosisClModule {
    fn claim_type(&self) -> ClaimType {
        ClaimType::OsmosisClPool
    }

    fn hooks(&self, ctx: &mut HookContext<'_>) -> Result<usize> {
        let params = osmosis_params(ctx.store)?;
        let connection = connection_for(ctx.store, &params.chain_id)?;

        let pools = store::records::<OsmosisClPoolProtocolData>(ctx.store)?;
        for (_, pool) in &pools {
            request(
                ctx,
                &connection,
                QUERY_CONCENTRATED_LIQUIDITY_STORE,
                cl_pool_key(pool.pool_id),
                CALLBACK_OSMOSIS_CL_POOL_UPDATE,
            )?;
        }
        tracing::info!(chain_id = %connection.chain_id, pools = pools.len(), "osmosis cl pool updates requested");
        Ok(pools.len())
    }

    fn validate_claim(&self, ctx: &ClaimContext<'_>, msg: &MsgSubmitClaim) -> Result<u128> {
        let user = user_bytes(&msg.user_address)?;

        sum_unique_proofs(&msg.proofs, |proof| {
            let position: ClPosition = proto::decode("Position", &proof.data)?;
            resolve_bech32_owner(ctx, &user, &msg.src_zone, &position.address)?;
            let held = Self::position_amount(ctx, msg, &position)?;
            tracing::debug!(position_id = position.position_id, pool_id = position.pool_id, held, "cl position");
            Ok(held)
        })
    }
}

//! Interchain queries issued by submodule hooks.

use qs_protocoldata::records::ConnectionProtocolData;
use qs_protocoldata::store;
use qs_store::KvStore;
use qs_types::keepers::IcqRequest;
use qs_types::MODULE_NAME;

use crate::{ClaimError, HookContext, Result};

pub const QUERY_GAMM_STORE: &str = "store/gamm/key";
pub const QUERY_CONCENTRATED_LIQUIDITY_STORE: &str = "store/concentratedliquidity/key";
pub const QUERY_LIQUIDITY_STORE: &str = "store/liquidity/key";
pub const QUERY_LEVERAGE_STORE: &str = "store/leverage/key";
pub const QUERY_BANK_STORE: &str = "store/bank/key";
pub const QUERY_LATEST_BLOCK: &str = "cosmos.base.tendermint.v1beta1.Service/GetLatestBlock";
pub const QUERY_DELEGATION_TOTAL_REWARDS: &str = "cosmos.distribution.v1beta1.Query/DelegationTotalRewards";

pub const CALLBACK_EPOCH_BLOCK: &str = "epochblock";
pub const CALLBACK_VALIDATOR_SELECTION_REWARDS: &str = "validatorselectionrewards";
pub const CALLBACK_OSMOSIS_POOL_UPDATE: &str = "osmosispoolupdate";
pub const CALLBACK_OSMOSIS_CL_POOL_UPDATE: &str = "osmosisclpoolupdate";
pub const CALLBACK_CRESCENT_POOL_UPDATE: &str = "crescentpoolupdate";
pub const CALLBACK_CRESCENT_RESERVE_BALANCE_UPDATE: &str = "crescentreservebalanceupdate";
pub const CALLBACK_CRESCENT_POOL_COIN_SUPPLY_UPDATE: &str = "crescentpoolcoinsupplyupdate";
pub const CALLBACK_UMEE_RESERVES_UPDATE: &str = "umeereservesupdate";
pub const CALLBACK_UMEE_INTEREST_SCALAR_UPDATE: &str = "umeeinterestscalarupdate";
pub const CALLBACK_UMEE_TOTAL_BORROWS_UPDATE: &str = "umeetotalborrowsupdate";
pub const CALLBACK_UMEE_UTOKEN_SUPPLY_UPDATE: &str = "umeeutokensupplyupdate";
pub const CALLBACK_UMEE_LEVERAGE_MODULE_BALANCE_UPDATE: &str = "umeeleveragemodulebalanceupdate";

/// One-shot queries are not repeated by the query module.
pub const ONE_SHOT: i64 = -1;

/// Connection data for `chain_id`.
///
/// # Errors
///
/// Returns [`ClaimError::MissingProtocolData`] when the chain has none.
pub fn connection_for(store: &dyn KvStore, chain_id: &str) -> Result<ConnectionProtocolData> {
    store::get_record::<ConnectionProtocolData>(store, chain_id)?
        .ok_or_else(|| ClaimError::MissingProtocolData(format!("connection/{chain_id}")))
}

/// Schedule a one-shot query on `connection`.
///
/// # Errors
///
/// Returns [`ClaimError::Query`] when the query module refuses it.
pub fn request(
    ctx: &mut HookContext<'_>,
    connection: &ConnectionProtocolData,
    query_type: &str,
    request: Vec<u8>,
    callback_id: &str,
) -> Result<()> {
    tracing::debug!(
        chain_id = %connection.chain_id,
        query_type,
        callback_id,
        request = %hex::encode(&request),
        "issuing interchain query"
    );
    ctx.icq.make_request(IcqRequest {
        connection_id: connection.connection_id.clone(),
        chain_id: connection.chain_id.clone(),
        query_type: query_type.to_string(),
        request,
        period: ONE_SHOT,
        module: MODULE_NAME.to_string(),
        callback_id: callback_id.to_string(),
        ttl: ctx.ttl,
    })?;
    Ok(())
}

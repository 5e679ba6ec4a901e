//! Umee leverage module supply positions.
//!
//! Users prove uTokens, either held in a bank account or posted as
//! collateral, and are credited with the tokens those uTokens redeem to.

use sha2::{Digest, Sha256};

use qs_protocoldata::records::{UmeeParamsProtocolData, UMEE_PARAMS_KEY};
use qs_protocoldata::store;
use qs_protocoldata::umee::{
    to_token_denom, to_utoken_denom, UmeeInterestScalarProtocolData, UmeeLeverageModuleBalanceProtocolData,
    UmeeReservesProtocolData, UmeeTotalBorrowsProtocolData, UmeeUTokenSupplyProtocolData,
};
use qs_protocoldata::ProtocolDataRecord;
use qs_store::KvStore;
use qs_types::claims::PROOF_TYPE_LEVERAGE;
use qs_types::coin::unmarshal_balance_compat;
use qs_types::keys::balance_key;
use qs_types::math::{add, dec_from_amount, mul, mul_truncate, quo};
use qs_types::{ClaimType, Dec, MathError, MsgSubmitClaim, Proof};

use crate::common::{denom_for_user, is_zone_qasset, sum_unique_proofs, user_bytes, zone};
use crate::icq::{
    connection_for, request, CALLBACK_UMEE_INTEREST_SCALAR_UPDATE, CALLBACK_UMEE_LEVERAGE_MODULE_BALANCE_UPDATE,
    CALLBACK_UMEE_RESERVES_UPDATE, CALLBACK_UMEE_TOTAL_BORROWS_UPDATE, CALLBACK_UMEE_UTOKEN_SUPPLY_UPDATE,
    QUERY_BANK_STORE, QUERY_LEVERAGE_STORE,
};
use crate::{ClaimContext, ClaimError, ClaimSubmodule, HookContext, Result};

pub const LEVERAGE_MODULE_NAME: &str = "leverage";

pub const KEY_PREFIX_ADJUSTED_TOTAL_BORROW: u8 = 0x07;
pub const KEY_PREFIX_INTEREST_SCALAR: u8 = 0x08;
pub const KEY_PREFIX_RESERVE_AMOUNT: u8 = 0x0c;
pub const KEY_PREFIX_UTOKEN_SUPPLY: u8 = 0x0d;

/// `prefix | denom | 0x00`.
pub fn leverage_key(prefix: u8, denom: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(denom.len() + 2);
    key.push(prefix);
    key.extend_from_slice(denom.as_bytes());
    key.push(0x00);
    key
}

/// Module account address: the first 20 bytes of `sha256(name)`.
pub fn module_address(name: &str) -> Vec<u8> {
    Sha256::digest(name.as_bytes())[..20].to_vec()
}

fn required<T: ProtocolDataRecord>(store: &dyn KvStore, key: &str, denom: &str) -> Result<T> {
    store::get_record::<T>(store, key)?.ok_or_else(|| ClaimError::MissingProtocolData(format!("denom={denom}")))
}

/// Tokens redeemed per uToken of `denom`.
///
/// `(module balance + borrows × interest scalar − reserves) / uToken supply`,
/// or one while no uTokens exist.
///
/// # Errors
///
/// Returns [`ClaimError::MissingProtocolData`] when any input record is
/// absent, or a math error.
pub fn exchange_rate(store: &dyn KvStore, denom: &str) -> Result<Dec> {
    let reserves: UmeeReservesProtocolData = required(store, denom, denom)?;
    let balance: UmeeLeverageModuleBalanceProtocolData = required(store, denom, denom)?;
    let interest: UmeeInterestScalarProtocolData = required(store, denom, denom)?;
    let borrows: UmeeTotalBorrowsProtocolData = required(store, denom, denom)?;
    let supply: UmeeUTokenSupplyProtocolData = required(store, &to_utoken_denom(denom), denom)?;

    let borrowed = mul(borrows.data, interest.data)?;
    let token_supply = add(dec_from_amount(balance.data)?, borrowed)?
        .checked_sub(dec_from_amount(reserves.data)?)
        .ok_or(MathError::Overflow)?;
    if supply.data == 0 {
        return Ok(Dec::ONE);
    }
    Ok(quo(token_supply, dec_from_amount(supply.data)?)?)
}

/// uToken denom of a balance or collateral proof.
fn utoken_denom(ctx: &ClaimContext<'_>, proof: &Proof, user: &[u8], src_zone: &str) -> Result<String> {
    let mut denom = denom_for_user(ctx, &proof.key, user, src_zone)?;
    if proof.proof_type == PROOF_TYPE_LEVERAGE {
        // collateral keys carry a trailing terminator
        denom.pop();
    }
    Ok(denom)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct UmeeModule;

impl ClaimSubmodule for UmeeModule {
    fn claim_type(&self) -> ClaimType {
        ClaimType::UmeeToken
    }

    fn hooks(&self, ctx: &mut HookContext<'_>) -> Result<usize> {
        let params = store::get_record::<UmeeParamsProtocolData>(ctx.store, UMEE_PARAMS_KEY)?
            .ok_or_else(|| ClaimError::MissingProtocolData(UMEE_PARAMS_KEY.to_string()))?;
        let connection = connection_for(ctx.store, &params.chain_id)?;

        let mut leverage_queries: Vec<(Vec<u8>, &str)> = Vec::new();
        for (_, r) in store::records::<UmeeReservesProtocolData>(ctx.store)? {
            leverage_queries.push((
                leverage_key(KEY_PREFIX_RESERVE_AMOUNT, &r.denom),
                CALLBACK_UMEE_RESERVES_UPDATE,
            ));
        }
        for (_, r) in store::records::<UmeeInterestScalarProtocolData>(ctx.store)? {
            leverage_queries.push((
                leverage_key(KEY_PREFIX_INTEREST_SCALAR, &r.denom),
                CALLBACK_UMEE_INTEREST_SCALAR_UPDATE,
            ));
        }
        for (_, r) in store::records::<UmeeUTokenSupplyProtocolData>(ctx.store)? {
            leverage_queries.push((
                leverage_key(KEY_PREFIX_UTOKEN_SUPPLY, &r.denom),
                CALLBACK_UMEE_UTOKEN_SUPPLY_UPDATE,
            ));
        }
        for (_, r) in store::records::<UmeeTotalBorrowsProtocolData>(ctx.store)? {
            leverage_queries.push((
                leverage_key(KEY_PREFIX_ADJUSTED_TOTAL_BORROW, &r.denom),
                CALLBACK_UMEE_TOTAL_BORROWS_UPDATE,
            ));
        }

        let mut issued = 0usize;
        for (key, callback) in leverage_queries {
            request(ctx, &connection, QUERY_LEVERAGE_STORE, key, callback)?;
            issued += 1;
        }

        let module = module_address(LEVERAGE_MODULE_NAME);
        for (_, r) in store::records::<UmeeLeverageModuleBalanceProtocolData>(ctx.store)? {
            request(
                ctx,
                &connection,
                QUERY_BANK_STORE,
                balance_key(&module, &r.denom)?,
                CALLBACK_UMEE_LEVERAGE_MODULE_BALANCE_UPDATE,
            )?;
            issued += 1;
        }

        tracing::info!(chain_id = %connection.chain_id, issued, "umee updates requested");
        Ok(issued)
    }

    fn validate_claim(&self, ctx: &ClaimContext<'_>, msg: &MsgSubmitClaim) -> Result<u128> {
        let zone = zone(ctx, &msg.zone)?;
        let user = user_bytes(&msg.user_address)?;

        sum_unique_proofs(&msg.proofs, |proof| {
            if proof.data.is_empty() {
                return Ok(0);
            }
            let udenom = utoken_denom(ctx, proof, &user, &msg.src_zone)?;
            let denom = to_token_denom(&udenom);
            if !is_zone_qasset(ctx.store, &zone, &msg.src_zone, denom)? {
                return Ok(0);
            }
            let utokens = unmarshal_balance_compat(&proof.data, &udenom)?;
            let rate = exchange_rate(ctx.store, denom)?;
            let tokens = mul_truncate(utokens.amount, rate)?;
            tracing::debug!(%udenom, utokens = utokens.amount, %rate, tokens, "umee supply position");
            Ok(tokens)
        })
    }
}

//! qAssets held directly in a bank account, locally or on another chain.

use qs_types::coin::unmarshal_balance_compat;
use qs_types::{ClaimType, MsgSubmitClaim};

use crate::common::{denom_for_user, is_zone_qasset, sum_unique_proofs, user_bytes, zone};
use crate::{ClaimContext, ClaimSubmodule, HookContext, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct LiquidTokenModule;

impl ClaimSubmodule for LiquidTokenModule {
    fn claim_type(&self) -> ClaimType {
        ClaimType::LiquidToken
    }

    /// Bank balances are proven directly; there is nothing to refresh.
    fn hooks(&self, _ctx: &mut HookContext<'_>) -> Result<usize> {
        Ok(0)
    }

    fn validate_claim(&self, ctx: &ClaimContext<'_>, msg: &MsgSubmitClaim) -> Result<u128> {
        let zone = zone(ctx, &msg.zone)?;
        let user = user_bytes(&msg.user_address)?;

        sum_unique_proofs(&msg.proofs, |proof| {
            let denom = denom_for_user(ctx, &proof.key, &user, &msg.src_zone)?;
            if !is_zone_qasset(ctx.store, &zone, &msg.src_zone, &denom)? {
                return Ok(0);
            }
            let coin = unmarshal_balance_compat(&proof.data, &denom)?;
            tracing::debug!(user = %msg.user_address, %denom, amount = coin.amount, "liquid token balance");
            Ok(coin.amount)
        })
    }
}

//! Steps shared by every submodule's claim validation.

use std::collections::HashSet;

use qs_protocoldata::records::LiquidAllowedDenomProtocolData;
use qs_protocoldata::store;
use qs_store::KvStore;
use qs_types::address::address_from_bech32;
use qs_types::keys::denom_from_request_key;
use qs_types::{Proof, Zone};

use crate::{ClaimContext, ClaimError, Result};

/// Proofs with a key not seen earlier in the message, in submission order,
/// paired with their position in the message.
pub fn unique_proofs(proofs: &[Proof]) -> impl Iterator<Item = (usize, &Proof)> {
    let mut seen: HashSet<&[u8]> = HashSet::new();
    proofs.iter().enumerate().filter(move |(_, p)| {
        let fresh = seen.insert(p.key.as_slice());
        if !fresh {
            tracing::debug!(key = %hex::encode(&p.key), "skipping duplicate proof");
        }
        fresh
    })
}

/// Sum `amount_of` over the unique proofs of a claim.
///
/// # Errors
///
/// Returns [`ClaimError::AtProof`] wrapping the first proof's failure.
pub fn sum_unique_proofs<F>(proofs: &[Proof], mut amount_of: F) -> Result<u128>
where
    F: FnMut(&Proof) -> Result<u128>,
{
    let mut amount = 0u128;
    for (index, proof) in unique_proofs(proofs) {
        let proven = amount_of(proof).map_err(|source| ClaimError::AtProof {
            index,
            source: Box::new(source),
        })?;
        amount = amount.saturating_add(proven);
    }
    Ok(amount)
}

/// Raw bytes of the submitting account.
///
/// # Errors
///
/// Returns [`ClaimError::Types`] for a malformed address.
pub fn user_bytes(user_address: &str) -> Result<Vec<u8>> {
    Ok(address_from_bech32(user_address, None)?)
}

/// The zone a claim counts towards.
///
/// # Errors
///
/// Returns [`ClaimError::ZoneNotFound`].
pub fn zone(ctx: &ClaimContext<'_>, chain_id: &str) -> Result<Zone> {
    ctx.ics
        .get_zone(chain_id)
        .ok_or_else(|| ClaimError::ZoneNotFound(chain_id.to_string()))
}

/// Check that `owner` is the user, or the account the user mapped itself
/// to on `src_zone`.
///
/// # Errors
///
/// Returns [`ClaimError::NotUserProof`] when no mapping exists, or
/// [`ClaimError::NotUserOrMappedProof`] when the mapping does not match.
pub fn resolve_owner(ctx: &ClaimContext<'_>, user: &[u8], src_zone: &str, owner: &[u8]) -> Result<()> {
    if owner == user {
        return Ok(());
    }
    match ctx.ics.local_address_map(user, src_zone) {
        Some(mapped) if mapped == owner => Ok(()),
        Some(_) => Err(ClaimError::NotUserOrMappedProof),
        None => Err(ClaimError::NotUserProof),
    }
}

/// Like [`resolve_owner`] for an owner given as a bech32 string.
///
/// # Errors
///
/// See [`resolve_owner`]; malformed owners fail with [`ClaimError::Types`].
pub fn resolve_bech32_owner(ctx: &ClaimContext<'_>, user: &[u8], src_zone: &str, owner: &str) -> Result<()> {
    let owner = address_from_bech32(owner, None)?;
    resolve_owner(ctx, user, src_zone, &owner)
}

/// Denom of a balance-layout key owned by the user or their mapped account.
///
/// # Errors
///
/// See [`resolve_owner`].
pub fn denom_for_user(ctx: &ClaimContext<'_>, key: &[u8], user: &[u8], src_zone: &str) -> Result<String> {
    match denom_from_request_key(key, user) {
        Ok(denom) => Ok(denom),
        Err(_) => {
            let mapped = ctx
                .ics
                .local_address_map(user, src_zone)
                .ok_or(ClaimError::NotUserProof)?;
            denom_from_request_key(key, &mapped).map_err(|_| ClaimError::NotUserOrMappedProof)
        }
    }
}

/// Whether `denom` held on `src_zone` is the zone's qAsset according to the
/// liquid-token allow-list. Denoms without an entry are not eligible.
///
/// # Errors
///
/// Returns a decode error for a malformed allow-list entry.
pub fn is_zone_qasset(store: &dyn KvStore, zone: &Zone, src_zone: &str, denom: &str) -> Result<bool> {
    let key = LiquidAllowedDenomProtocolData::key_for(src_zone, denom);
    let Some(entry) = store::get_record::<LiquidAllowedDenomProtocolData>(store, &key)? else {
        tracing::debug!(%key, "denom not on allow-list, skipping");
        return Ok(false);
    };
    Ok(entry.qasset_denom == zone.local_denom && entry.ibc_denom == denom)
}

/// The first of a pool's `denoms` that is the zone's qAsset on `src_zone`.
///
/// # Errors
///
/// See [`is_zone_qasset`].
pub fn zone_qasset_denom<'a, I>(store: &dyn KvStore, zone: &Zone, src_zone: &str, denoms: I) -> Result<Option<&'a str>>
where
    I: IntoIterator<Item = &'a String>,
{
    for denom in denoms {
        if is_zone_qasset(store, zone, src_zone, denom)? {
            return Ok(Some(denom.as_str()));
        }
    }
    Ok(None)
}

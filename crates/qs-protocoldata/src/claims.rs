//! Claim persistence.
//!
//! Live claims are keyed so that one `(chain, user, claim type, source
//! chain)` tuple maps to exactly one record: resubmitting overwrites.
//!
//! ```text
//! 0x01 | len(chain_id) | chain_id | len(user) | user | claim type tag | source_chain_id
//! ```
//!
//! At each epoch boundary the live namespace of a chain replaces its
//! archived (`0x02`) namespace and is then cleared.

use qs_store::KvStore;
use qs_types::{Claim, ClaimType};

use crate::{ProtocolDataError, Result, CLAIM_PREFIX, LAST_EPOCH_CLAIM_PREFIX};

/// Which claim namespace to address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimNamespace {
    Live,
    LastEpoch,
}

impl ClaimNamespace {
    fn prefix(self) -> u8 {
        match self {
            ClaimNamespace::Live => CLAIM_PREFIX,
            ClaimNamespace::LastEpoch => LAST_EPOCH_CLAIM_PREFIX,
        }
    }
}

fn push_length_prefixed(key: &mut Vec<u8>, part: &str) -> Result<()> {
    let len = u8::try_from(part.len())
        .map_err(|_| ProtocolDataError::InvalidKey(format!("key component longer than 255 bytes: {part}")))?;
    key.push(len);
    key.extend_from_slice(part.as_bytes());
    Ok(())
}

/// `prefix | len(chain_id) | chain_id`.
///
/// # Errors
///
/// Returns [`ProtocolDataError::InvalidKey`] for over-long chain IDs.
pub fn chain_prefix(ns: ClaimNamespace, chain_id: &str) -> Result<Vec<u8>> {
    let mut key = vec![ns.prefix()];
    push_length_prefixed(&mut key, chain_id)?;
    Ok(key)
}

/// `prefix | len(chain_id) | chain_id | len(user) | user`.
///
/// # Errors
///
/// Returns [`ProtocolDataError::InvalidKey`] for over-long components.
pub fn user_prefix(ns: ClaimNamespace, chain_id: &str, user: &str) -> Result<Vec<u8>> {
    let mut key = chain_prefix(ns, chain_id)?;
    push_length_prefixed(&mut key, user)?;
    Ok(key)
}

/// Full key of one claim.
///
/// # Errors
///
/// Returns [`ProtocolDataError::InvalidKey`] for over-long components.
pub fn claim_key(
    ns: ClaimNamespace,
    chain_id: &str,
    user: &str,
    claim_type: ClaimType,
    source_chain_id: &str,
) -> Result<Vec<u8>> {
    let mut key = user_prefix(ns, chain_id, user)?;
    key.push(claim_type.tag());
    key.extend_from_slice(source_chain_id.as_bytes());
    Ok(key)
}

fn key_of(ns: ClaimNamespace, claim: &Claim) -> Result<Vec<u8>> {
    claim_key(
        ns,
        &claim.chain_id,
        &claim.user_address,
        claim.module,
        &claim.source_chain_id,
    )
}

/// Store a claim, replacing any earlier claim for the same tuple.
///
/// # Errors
///
/// Returns key, JSON or store errors.
pub fn set_claim(store: &mut dyn KvStore, ns: ClaimNamespace, claim: &Claim) -> Result<()> {
    let bytes = serde_json::to_vec(claim)?;
    store.set(&key_of(ns, claim)?, &bytes)?;
    Ok(())
}

/// # Errors
///
/// Returns key, JSON or store errors.
pub fn get_claim(
    store: &dyn KvStore,
    ns: ClaimNamespace,
    chain_id: &str,
    user: &str,
    claim_type: ClaimType,
    source_chain_id: &str,
) -> Result<Option<Claim>> {
    let key = claim_key(ns, chain_id, user, claim_type, source_chain_id)?;
    match store.get(&key)? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// # Errors
///
/// Returns key or store errors.
pub fn delete_claim(store: &mut dyn KvStore, ns: ClaimNamespace, claim: &Claim) -> Result<()> {
    store.delete(&key_of(ns, claim)?)?;
    Ok(())
}

fn scan(store: &dyn KvStore, prefix: &[u8]) -> Result<Vec<Claim>> {
    store
        .iter_prefix(prefix)?
        .into_iter()
        .map(|(_, bytes)| serde_json::from_slice(&bytes).map_err(ProtocolDataError::from))
        .collect()
}

/// Claims against `chain_id`, in key order (by user, then type, then source).
///
/// # Errors
///
/// Returns key, JSON or store errors.
pub fn claims_for_chain(store: &dyn KvStore, ns: ClaimNamespace, chain_id: &str) -> Result<Vec<Claim>> {
    scan(store, &chain_prefix(ns, chain_id)?)
}

/// Claims of one user against `chain_id`.
///
/// # Errors
///
/// Returns key, JSON or store errors.
pub fn claims_for_user(store: &dyn KvStore, ns: ClaimNamespace, chain_id: &str, user: &str) -> Result<Vec<Claim>> {
    scan(store, &user_prefix(ns, chain_id, user)?)
}

/// Every claim in a namespace.
///
/// # Errors
///
/// Returns JSON or store errors.
pub fn all_claims(store: &dyn KvStore, ns: ClaimNamespace) -> Result<Vec<Claim>> {
    scan(store, &[ns.prefix()])
}

/// Delete every claim against `chain_id` in a namespace.
///
/// # Errors
///
/// Returns key or store errors.
pub fn clear_claims(store: &mut dyn KvStore, ns: ClaimNamespace, chain_id: &str) -> Result<()> {
    for (key, _) in store.iter_prefix(&chain_prefix(ns, chain_id)?)? {
        store.delete(&key)?;
    }
    Ok(())
}

/// Replace the archived claims of `chain_id` with its live claims, then
/// clear the live ones. Returns the number of claims archived.
///
/// # Errors
///
/// Returns key, JSON or store errors.
pub fn archive_and_garbage_collect(store: &mut dyn KvStore, chain_id: &str) -> Result<usize> {
    clear_claims(store, ClaimNamespace::LastEpoch, chain_id)?;
    let live = claims_for_chain(store, ClaimNamespace::Live, chain_id)?;
    for claim in &live {
        set_claim(store, ClaimNamespace::LastEpoch, claim)?;
        delete_claim(store, ClaimNamespace::Live, claim)?;
    }
    tracing::debug!(chain_id, archived = live.len(), "claims archived");
    Ok(live.len())
}

#[cfg(test)]
mod tests {
    use qs_store::MemStore;

    use super::*;

    fn claim(user: &str, chain: &str, module: ClaimType, src: &str, amount: u128) -> Claim {
        Claim {
            user_address: user.into(),
            chain_id: chain.into(),
            module,
            source_chain_id: src.into(),
            amount,
        }
    }

    #[test]
    fn test_key_layout() {
        let key = claim_key(ClaimNamespace::Live, "c-1", "ab", ClaimType::OsmosisPool, "osmosis-1").expect("key");
        let mut expected = vec![0x01, 3];
        expected.extend_from_slice(b"c-1");
        expected.push(2);
        expected.extend_from_slice(b"ab");
        expected.push(2);
        expected.extend_from_slice(b"osmosis-1");
        assert_eq!(key, expected);
        assert!(chain_prefix(ClaimNamespace::Live, &"x".repeat(256)).is_err());
    }

    #[test]
    fn test_resubmission_overwrites() {
        let mut store = MemStore::new();
        let first = claim("quick1a", "cosmoshub-4", ClaimType::LiquidToken, "osmosis-1", 100);
        let second = claim("quick1a", "cosmoshub-4", ClaimType::LiquidToken, "osmosis-1", 40);
        set_claim(&mut store, ClaimNamespace::Live, &first).expect("set");
        set_claim(&mut store, ClaimNamespace::Live, &second).expect("set");
        let claims = claims_for_chain(&store, ClaimNamespace::Live, "cosmoshub-4").expect("claims");
        assert_eq!(claims, vec![second]);
    }

    #[test]
    fn test_scoped_by_chain_and_user() {
        let mut store = MemStore::new();
        for c in [
            claim("quick1a", "cosmoshub-4", ClaimType::LiquidToken, "quicksilver-2", 1),
            claim("quick1a", "cosmoshub-4", ClaimType::OsmosisPool, "osmosis-1", 2),
            claim("quick1b", "cosmoshub-4", ClaimType::LiquidToken, "quicksilver-2", 3),
            claim("quick1a", "cosmoshub-40", ClaimType::LiquidToken, "quicksilver-2", 4),
        ] {
            set_claim(&mut store, ClaimNamespace::Live, &c).expect("set");
        }

        assert_eq!(claims_for_chain(&store, ClaimNamespace::Live, "cosmoshub-4").expect("chain").len(), 3);
        let user = claims_for_user(&store, ClaimNamespace::Live, "cosmoshub-4", "quick1a").expect("user");
        assert_eq!(user.iter().map(|c| c.amount).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(all_claims(&store, ClaimNamespace::Live).expect("all").len(), 4);
        let found = get_claim(
            &store,
            ClaimNamespace::Live,
            "cosmoshub-4",
            "quick1b",
            ClaimType::LiquidToken,
            "quicksilver-2",
        )
        .expect("get");
        assert!(found.is_some());
    }

    #[test]
    fn test_archive_and_garbage_collect() {
        let mut store = MemStore::new();
        let stale = claim("quick1old", "cosmoshub-4", ClaimType::LiquidToken, "quicksilver-2", 9);
        set_claim(&mut store, ClaimNamespace::LastEpoch, &stale).expect("set");
        let live = claim("quick1a", "cosmoshub-4", ClaimType::LiquidToken, "quicksilver-2", 5);
        let other_zone = claim("quick1a", "osmosis-1", ClaimType::LiquidToken, "quicksilver-2", 6);
        set_claim(&mut store, ClaimNamespace::Live, &live).expect("set");
        set_claim(&mut store, ClaimNamespace::Live, &other_zone).expect("set");

        assert_eq!(archive_and_garbage_collect(&mut store, "cosmoshub-4").expect("archive"), 1);

        assert!(claims_for_chain(&store, ClaimNamespace::Live, "cosmoshub-4").expect("live").is_empty());
        assert_eq!(
            claims_for_chain(&store, ClaimNamespace::LastEpoch, "cosmoshub-4").expect("archived"),
            vec![live]
        );
        assert_eq!(claims_for_chain(&store, ClaimNamespace::Live, "osmosis-1").expect("untouched"), vec![other_zone]);
    }
}

//! Crescent liquidity pools.
//!
//! Only the pool's identity and reserve account are tracked; reserve
//! balances and pool coin supply are separate records fetched from the
//! bank store.

use serde::{Deserialize, Serialize};

use qs_types::encoding::u64_lenient;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrescentPool {
    #[serde(with = "u64_lenient")]
    pub id: u64,
    #[serde(default, with = "u64_lenient")]
    pub pair_id: u64,
    #[serde(default)]
    pub reserve_address: String,
    /// Denom of the LP coin, `pool{id}`.
    #[serde(default)]
    pub pool_coin_denom: String,
    #[serde(default)]
    pub disabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_pool_document() {
        let pool: CrescentPool = serde_json::from_str(
            r#"{"id":"5","pair_id":"3","reserve_address":"cre1reserve","pool_coin_denom":"pool5","disabled":false}"#,
        )
        .expect("decode");
        assert_eq!(pool.id, 5);
        assert_eq!(pool.pair_id, 3);
        assert_eq!(pool.pool_coin_denom, "pool5");
        assert!(!pool.disabled);
    }
}

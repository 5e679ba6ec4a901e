//! Coins and bank balance decoding.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::encoding::amount_string;
use crate::proto::{self, ProtoCoin};
use crate::{Result, TypesError};

/// A denominated integer amount.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    #[serde(with = "amount_string")]
    pub amount: u128,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: u128) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }

    pub fn zero(denom: impl Into<String>) -> Self {
        Self::new(denom, 0)
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// Decode a bank balance value in either storage format.
///
/// Current chains store only the integer amount as text; older chains store
/// a full protobuf `Coin`. An empty value is a zero balance of `denom`.
///
/// # Errors
///
/// Returns [`TypesError::BalanceDecode`] if neither format applies.
pub fn unmarshal_balance_compat(bytes: &[u8], denom: &str) -> Result<Coin> {
    if bytes.is_empty() {
        return Ok(Coin::zero(denom));
    }
    if bytes.iter().all(u8::is_ascii_digit) {
        let text = std::str::from_utf8(bytes).map_err(|e| TypesError::BalanceDecode(e.to_string()))?;
        let amount = text
            .parse::<u128>()
            .map_err(|e| TypesError::BalanceDecode(e.to_string()))?;
        return Ok(Coin::new(denom, amount));
    }
    let legacy: ProtoCoin =
        proto::decode("Coin", bytes).map_err(|e| TypesError::BalanceDecode(e.to_string()))?;
    legacy
        .to_coin()
        .map_err(|e| TypesError::BalanceDecode(e.to_string()))
}

/// Check a denom against the bank module's format:
/// `[a-zA-Z][a-zA-Z0-9/:._-]{2,127}`.
///
/// # Errors
///
/// Returns [`TypesError::InvalidDenom`].
pub fn validate_denom(denom: &str) -> Result<()> {
    let bytes = denom.as_bytes();
    let valid = (3..=128).contains(&bytes.len())
        && bytes[0].is_ascii_alphabetic()
        && bytes[1..]
            .iter()
            .all(|&b| b.is_ascii_alphanumeric() || matches!(b, b'/' | b':' | b'.' | b'_' | b'-'));
    if valid {
        Ok(())
    } else {
        Err(TypesError::InvalidDenom(denom.to_string()))
    }
}

/// Sum of a coin list for one denom.
pub fn amount_of(coins: &[Coin], denom: &str) -> u128 {
    coins
        .iter()
        .filter(|c| c.denom == denom)
        .fold(0u128, |acc, c| acc.saturating_add(c.amount))
}

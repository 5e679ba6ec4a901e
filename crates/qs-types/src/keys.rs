//! Remote store key layouts.
//!
//! Claims prove raw key/value pairs from a remote chain's stores, so the key
//! bytes must be parsed back into the account and denom they describe.

use sha2::{Digest as _, Sha256};

use crate::address::{encode_bech32, length_prefix};
use crate::{Result, TypesError};

/// Bank store prefix for per-account balances.
pub const BALANCES_PREFIX: u8 = 0x02;

/// Bank store prefix for total supply.
pub const SUPPLY_PREFIX: u8 = 0x00;

/// Wasm store prefix for contract state.
pub const CONTRACT_STORE_PREFIX: u8 = 0x03;

/// Length of a wasm contract address.
pub const CONTRACT_ADDRESS_LEN: usize = 32;

/// Name of the bank module store, used as the first proof path segment.
pub const BANK_STORE_KEY: &str = "bank";

/// `0x02 | len(addr) | addr`.
///
/// # Errors
///
/// Returns [`TypesError::AddressLength`] for addresses over 255 bytes.
pub fn account_balances_prefix(address: &[u8]) -> Result<Vec<u8>> {
    let mut key = vec![BALANCES_PREFIX];
    key.extend(length_prefix(address)?);
    Ok(key)
}

/// `0x02 | len(addr) | addr | denom`.
///
/// # Errors
///
/// Returns [`TypesError::AddressLength`] for addresses over 255 bytes.
pub fn balance_key(address: &[u8], denom: &str) -> Result<Vec<u8>> {
    let mut key = account_balances_prefix(address)?;
    key.extend_from_slice(denom.as_bytes());
    Ok(key)
}

/// `0x00 | denom`.
pub fn supply_key(denom: &str) -> Vec<u8> {
    let mut key = vec![SUPPLY_PREFIX];
    key.extend_from_slice(denom.as_bytes());
    key
}

/// Split a length-prefixed-address store key (prefix byte already removed)
/// into its address and denom.
///
/// # Errors
///
/// Returns [`TypesError::InvalidKey`] for truncated keys.
pub fn address_and_denom_from_store(key: &[u8]) -> Result<(Vec<u8>, String)> {
    let (&len, rest) = key
        .split_first()
        .ok_or_else(|| TypesError::InvalidKey("empty key".to_string()))?;
    let len = usize::from(len);
    if len == 0 || rest.len() < len {
        return Err(TypesError::InvalidKey(format!(
            "address length {len} exceeds key remainder {}",
            rest.len()
        )));
    }
    let (address, denom) = rest.split_at(len);
    let denom = String::from_utf8(denom.to_vec())
        .map_err(|_| TypesError::InvalidKey("denom is not valid utf-8".to_string()))?;
    Ok((address.to_vec(), denom))
}

/// Extract the denom from a balance-layout request key, checking that it
/// belongs to `address`.
///
/// The first byte (the store prefix) is skipped without inspection so the
/// same parser serves bank balances and leverage collateral keys.
///
/// # Errors
///
/// Returns [`TypesError::InvalidKey`] for malformed keys, or
/// [`TypesError::AccountMismatch`] when the key embeds another account.
pub fn denom_from_request_key(key: &[u8], address: &[u8]) -> Result<String> {
    let body = key
        .get(1..)
        .ok_or_else(|| TypesError::InvalidKey("empty key".to_string()))?;
    let (embedded, denom) = address_and_denom_from_store(body)?;
    if embedded != address {
        return Err(TypesError::AccountMismatch {
            expected: hex::encode(address),
            got: hex::encode(embedded),
        });
    }
    if denom.is_empty() {
        return Err(TypesError::InvalidKey("key contained no denom".to_string()));
    }
    Ok(denom)
}

/// A decoded wasm contract-store key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CwNamespacedKey {
    pub contract: Vec<u8>,
    /// Length-prefixed namespaces in order, followed by the trailing key.
    pub parts: Vec<Vec<u8>>,
}

impl CwNamespacedKey {
    /// Contract address rendered with `prefix`.
    ///
    /// # Errors
    ///
    /// Propagates bech32 encoding failures.
    pub fn contract_address(&self, prefix: &str) -> Result<String> {
        encode_bech32(prefix, &self.contract)
    }
}

/// Decode `0x03 | contract(32) | (u16be len | namespace)* | trailing key`
/// into `parts` segments: `parts - 1` namespaces and the trailing key.
///
/// # Errors
///
/// Returns [`TypesError::InvalidKey`] for a wrong prefix or truncated
/// segments.
pub fn decode_cw_namespaced_key(key: &[u8], parts: usize) -> Result<CwNamespacedKey> {
    match key.first() {
        Some(&CONTRACT_STORE_PREFIX) => {}
        Some(other) => {
            return Err(TypesError::InvalidKey(format!(
                "unexpected contract store prefix 0x{other:02x}"
            )))
        }
        None => return Err(TypesError::InvalidKey("empty key".to_string())),
    }
    if parts == 0 {
        return Err(TypesError::InvalidKey("at least one key part required".to_string()));
    }
    let rest = &key[1..];
    if rest.len() < CONTRACT_ADDRESS_LEN {
        return Err(TypesError::InvalidKey("key shorter than contract address".to_string()));
    }
    let (contract, mut rest) = rest.split_at(CONTRACT_ADDRESS_LEN);

    let mut decoded = Vec::with_capacity(parts);
    for _ in 1..parts {
        if rest.len() < 2 {
            return Err(TypesError::InvalidKey("truncated namespace length".to_string()));
        }
        let len = usize::from(u16::from_be_bytes([rest[0], rest[1]]));
        let body = &rest[2..];
        if body.len() < len {
            return Err(TypesError::InvalidKey(format!(
                "namespace length {len} exceeds key remainder {}",
                body.len()
            )));
        }
        let (namespace, tail) = body.split_at(len);
        decoded.push(namespace.to_vec());
        rest = tail;
    }
    if rest.is_empty() {
        return Err(TypesError::InvalidKey("missing trailing key".to_string()));
    }
    decoded.push(rest.to_vec());

    Ok(CwNamespacedKey {
        contract: contract.to_vec(),
        parts: decoded,
    })
}

/// Big-endian `u64`, as used for pool IDs in store keys.
pub fn u64_to_be(value: u64) -> [u8; 8] {
    value.to_be_bytes()
}

/// Read a big-endian `u64` from exactly eight bytes.
///
/// # Errors
///
/// Returns [`TypesError::InvalidKey`] when `bytes` is not eight long.
pub fn u64_from_be(bytes: &[u8]) -> Result<u64> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| TypesError::InvalidKey(format!("expected 8 bytes, got {}", bytes.len())))?;
    Ok(u64::from_be_bytes(arr))
}

/// IBC voucher denom for `denom` received over `channel` on port `transfer`:
/// `ibc/` + uppercase hex SHA-256 of `transfer/{channel}/{denom}`.
pub fn derive_ibc_denom(channel: &str, denom: &str) -> String {
    let digest = Sha256::digest(format!("transfer/{channel}/{denom}").as_bytes());
    format!("ibc/{}", hex::encode_upper(digest))
}

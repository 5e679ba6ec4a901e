//! Bech32 account addresses.

use bech32::{FromBase32, ToBase32, Variant};

use crate::{Result, TypesError};

/// Longest address accepted by the chain's address codec.
pub const MAX_ADDRESS_LEN: usize = 255;

/// Decode a bech32 address into raw bytes.
///
/// When `expected_prefix` is given the human-readable part must match it.
///
/// # Errors
///
/// Returns [`TypesError::EmptyAddress`], [`TypesError::InvalidAddress`],
/// [`TypesError::UnexpectedPrefix`] or [`TypesError::AddressLength`].
pub fn address_from_bech32(address: &str, expected_prefix: Option<&str>) -> Result<Vec<u8>> {
    if address.trim().is_empty() {
        return Err(TypesError::EmptyAddress);
    }
    let (hrp, data, _variant) = bech32::decode(address).map_err(|e| TypesError::InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })?;
    if let Some(expected) = expected_prefix {
        if hrp != expected {
            return Err(TypesError::UnexpectedPrefix {
                got: hrp,
                expected: expected.to_string(),
            });
        }
    }
    let bytes = Vec::<u8>::from_base32(&data).map_err(|e| TypesError::InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })?;
    verify_address_format(&bytes)?;
    Ok(bytes)
}

/// Encode raw address bytes with the given human-readable part.
///
/// # Errors
///
/// Returns [`TypesError::InvalidAddress`] if the prefix is not a valid
/// bech32 human-readable part.
pub fn encode_bech32(prefix: &str, bytes: &[u8]) -> Result<String> {
    bech32::encode(prefix, bytes.to_base32(), Variant::Bech32).map_err(|e| TypesError::InvalidAddress {
        address: hex::encode(bytes),
        reason: e.to_string(),
    })
}

/// Re-encode an address under another prefix, keeping its bytes.
///
/// # Errors
///
/// Propagates decoding and encoding failures.
pub fn convert_prefix(address: &str, prefix: &str) -> Result<String> {
    let bytes = address_from_bech32(address, None)?;
    encode_bech32(prefix, &bytes)
}

/// Reject empty or over-long address bytes.
///
/// # Errors
///
/// Returns [`TypesError::AddressLength`].
pub fn verify_address_format(bytes: &[u8]) -> Result<()> {
    if bytes.is_empty() || bytes.len() > MAX_ADDRESS_LEN {
        return Err(TypesError::AddressLength {
            len: bytes.len(),
            max: MAX_ADDRESS_LEN,
        });
    }
    Ok(())
}

/// Prefix `bytes` with its single-byte length, as the store key codecs do.
///
/// # Errors
///
/// Returns [`TypesError::AddressLength`] when `bytes` is longer than 255.
pub fn length_prefix(bytes: &[u8]) -> Result<Vec<u8>> {
    let len = u8::try_from(bytes.len()).map_err(|_| TypesError::AddressLength {
        len: bytes.len(),
        max: MAX_ADDRESS_LEN,
    })?;
    let mut out = Vec::with_capacity(bytes.len() + 1);
    out.push(len);
    out.extend_from_slice(bytes);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUICK_USER: &str = "quick16qqhmsqcs4j6mfa92flnz4n8tj2s53jwdhy7an";
    const OSMO_USER: &str = "osmo16qqhmsqcs4j6mfa92flnz4n8tj2s53jwwg8ujn";

    #[test]
    fn test_same_account_across_prefixes() {
        let quick = address_from_bech32(QUICK_USER, Some("quick")).expect("quick");
        let osmo = address_from_bech32(OSMO_USER, Some("osmo")).expect("osmo");
        assert_eq!(quick, osmo);
        assert_eq!(quick.len(), 20);
        assert_eq!(encode_bech32("osmo", &quick).expect("encode"), OSMO_USER);
        assert_eq!(convert_prefix(OSMO_USER, "quick").expect("convert"), QUICK_USER);
    }

    #[test]
    fn test_wrong_prefix() {
        let err = address_from_bech32(OSMO_USER, Some("quick")).expect_err("prefix");
        assert!(matches!(err, TypesError::UnexpectedPrefix { .. }));
    }

    #[test]
    fn test_empty_and_garbage() {
        assert!(matches!(address_from_bech32("  ", None), Err(TypesError::EmptyAddress)));
        assert!(matches!(
            address_from_bech32("quick1notvalid", None),
            Err(TypesError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn test_length_prefix() {
        assert_eq!(length_prefix(&[1, 2, 3]).expect("prefix"), vec![3, 1, 2, 3]);
        assert!(length_prefix(&[0u8; 256]).is_err());
    }
}

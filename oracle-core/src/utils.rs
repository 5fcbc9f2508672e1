use bech32::{Bech32, Hrp};
use ethers_core::types::{H160, H256};
use sha3::{Digest, Keccak256};

use crate::OracleProtocolError;

/// Length of an EVM address in bytes.
pub const ADDRESS_LENGTH: usize = 20;

/// Keccak-256 of the input.
pub fn keccak256(data: impl AsRef<[u8]>) -> H256 {
    H256::from_slice(Keccak256::new().chain_update(data.as_ref()).finalize().as_slice())
}

/// Lower-case hex with a `0x` prefix.
pub fn hex_from_bytes(bytes: impl AsRef<[u8]>) -> String {
    format!("0x{}", hex::encode(bytes.as_ref()))
}

/// Lower-case `0x`-prefixed rendering of an address. `H160`'s `Display`
/// abbreviates, so every persisted or compared address goes through here.
pub fn fmt_address(address: &H160) -> String {
    hex_from_bytes(address.as_bytes())
}

/// Lower-case `0x`-prefixed rendering of a 32-byte hash.
pub fn fmt_h256(hash: &H256) -> String {
    hex_from_bytes(hash.as_bytes())
}

/// Decode a hex string, with or without `0x` prefix, in any case.
pub fn bytes_from_hex(s: &str) -> Result<Vec<u8>, OracleProtocolError> {
    let trimmed = s.trim();
    let stripped = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    Ok(hex::decode(stripped)?)
}

/// Parse a 20-byte address from hex. Anything that is not exactly 20 bytes
/// is rejected rather than padded or truncated.
pub fn address_from_hex(s: &str) -> Result<H160, OracleProtocolError> {
    address_from_bytes(&bytes_from_hex(s)?)
}

/// Build an address from exactly 20 bytes.
pub fn address_from_bytes(bytes: &[u8]) -> Result<H160, OracleProtocolError> {
    if bytes.len() != ADDRESS_LENGTH {
        return Err(OracleProtocolError::InvalidAddressLength(bytes.len()));
    }
    Ok(H160::from_slice(bytes))
}

/// Parse a 32-byte hash from hex.
pub fn h256_from_hex(s: &str) -> Result<H256, OracleProtocolError> {
    let bytes = bytes_from_hex(s)?;
    if bytes.len() != 32 {
        return Err(OracleProtocolError::InvalidLength {
            expected: 32,
            actual: bytes.len(),
        });
    }
    Ok(H256::from_slice(&bytes))
}

/// Decode a bech32 account address, requiring the given human readable part.
pub fn address_bytes_from_bech32(prefix: &str, address: &str) -> Result<Vec<u8>, OracleProtocolError> {
    let (hrp, data) = bech32::decode(address)
        .map_err(|e| OracleProtocolError::InvalidBech32(format!("{address}: {e}")))?;
    if hrp.as_str() != prefix {
        return Err(OracleProtocolError::InvalidBech32(format!(
            "{address}: expected prefix {prefix}, got {hrp}"
        )));
    }
    Ok(data)
}

/// Encode account bytes as a bech32 address with the given prefix.
pub fn bech32_from_bytes(prefix: &str, bytes: &[u8]) -> Result<String, OracleProtocolError> {
    let hrp = Hrp::parse(prefix).map_err(|e| OracleProtocolError::InvalidBech32(e.to_string()))?;
    bech32::encode::<Bech32>(hrp, bytes).map_err(|e| OracleProtocolError::InvalidBech32(e.to_string()))
}

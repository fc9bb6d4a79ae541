//! Hex wire encoding for keys, ciphertext and nonces

/// Encode bytes as lowercase hex
pub fn to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Decode hex text of either case
///
/// Rejects odd-length input and any non-hex character, including whitespace.
pub fn from_hex(text: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(text)
}

/// Decode hex text into an array of exactly `N` bytes
pub fn from_hex_array<const N: usize>(text: &str) -> Result<[u8; N], hex::FromHexError> {
    let mut out = [0u8; N];
    hex::decode_to_slice(text, &mut out)?;
    Ok(out)
}

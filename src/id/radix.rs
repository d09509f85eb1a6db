//! Base-65 numeral encoding
//!
//! Alphabet: `0-9`, `A-Z`, `a-z`, then `-`, `_`, `~`. Every character is
//! URL-safe, so ids never need escaping.

/// Encoding alphabet, digit value = position
pub const ALPHABET: &[u8; 65] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz-_~";

/// Radix of the encoding
pub const RADIX: u128 = 65;

/// Encodes `value` most significant digit first. Zero encodes as `"0"`.
pub fn encode_base65(mut value: u128) -> String {
    if value == 0 {
        return "0".to_string();
    }

    let mut digits = Vec::with_capacity(24);
    while value > 0 {
        digits.push(ALPHABET[(value % RADIX) as usize]);
        value /= RADIX;
    }
    digits.reverse();

    // Alphabet is ASCII
    digits.into_iter().map(char::from).collect()
}

/// Decodes a base-65 numeral. `None` on foreign characters or overflow.
pub fn decode_base65(encoded: &str) -> Option<u128> {
    if encoded.is_empty() {
        return None;
    }

    let mut value: u128 = 0;
    for byte in encoded.bytes() {
        let digit = ALPHABET.iter().position(|&c| c == byte)? as u128;
        value = value.checked_mul(RADIX)?.checked_add(digit)?;
    }
    Some(value)
}

//! Bech32 primitives: hrp expansion, the checksum polymod, 8↔5 bit
//! regrouping, and the string codec built on top of them.
//!
//! Decoding is case-insensitive (mixed case normalizes the same way as pure
//! lowercase) and splits at the first `1`, so a `1` inside the data part is
//! reported as an invalid character.

use crate::error::CodecError;

/// The 32-character bech32 alphabet, indexed by 5-bit value.
pub const CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";

/// Separator between the human-readable part and the data part.
pub const SEPARATOR: char = '1';

/// Number of 5-bit checksum groups appended to the data part.
pub const CHECKSUM_LEN: usize = 6;

const GENERATOR: [u32; 5] = [0x3b6a57b2, 0x26508e6d, 0x1ea119fa, 0x3d4233dd, 0x2a1462b3];

/// Expand a human-readable part for checksum computation.
///
/// Produces the high 3 bits of every character, a single `0`, then the low
/// 5 bits of every character: `2n + 1` values for an `n`-character hrp.
pub fn expand_hrp(hrp: &str) -> Vec<u8> {
    let bytes = hrp.as_bytes();
    let mut out = Vec::with_capacity(bytes.len() * 2 + 1);
    out.extend(bytes.iter().map(|b| b >> 5));
    out.push(0);
    out.extend(bytes.iter().map(|b| b & 0x1f));
    out
}

/// The bech32 generator-polynomial checksum over 5-bit values.
///
/// Seeded with `1`, so the empty sequence returns `1`.
pub fn polymod(values: &[u8]) -> u32 {
    let mut chk: u32 = 1;
    for &v in values {
        let top = chk >> 25;
        chk = ((chk & 0x01ff_ffff) << 5) ^ u32::from(v);
        for (i, g) in GENERATOR.iter().enumerate() {
            if (top >> i) & 1 == 1 {
                chk ^= g;
            }
        }
    }
    chk
}

/// Compute the six 5-bit checksum groups for `hrp` and `data`.
pub fn checksum(hrp: &str, data: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut values = expand_hrp(hrp);
    values.extend_from_slice(data);
    values.extend_from_slice(&[0; CHECKSUM_LEN]);
    let m = polymod(&values) ^ 1;

    let mut out = [0u8; CHECKSUM_LEN];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = ((m >> (5 * (CHECKSUM_LEN - 1 - i))) & 0x1f) as u8;
    }
    out
}

/// Check that `data` (with its trailing checksum groups) is valid for `hrp`.
pub fn verify_checksum(hrp: &str, data: &[u8]) -> bool {
    let mut values = expand_hrp(hrp);
    values.extend_from_slice(data);
    polymod(&values) == 1
}

/// Regroup a sequence of `from`-bit values into `to`-bit values.
///
/// With `pad` set, a trailing partial group is zero-filled. Without it, the
/// leftover bits must be fewer than `from` and all zero.
pub fn convert_bits(data: &[u8], from: u32, to: u32, pad: bool) -> Result<Vec<u8>, CodecError> {
    let maxv: u32 = (1 << to) - 1;
    let max_acc: u32 = (1 << (from + to - 1)) - 1;
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let mut out = Vec::with_capacity(data.len() * from as usize / to as usize + 1);

    for &value in data {
        let v = u32::from(value);
        if v >> from != 0 {
            return Err(CodecError::InvalidFormat(format!(
                "value {v} does not fit in {from} bits"
            )));
        }
        acc = ((acc << from) | v) & max_acc;
        bits += from;
        while bits >= to {
            bits -= to;
            out.push(((acc >> bits) & maxv) as u8);
        }
    }

    if pad {
        if bits > 0 {
            out.push(((acc << (to - bits)) & maxv) as u8);
        }
    } else if bits >= from || ((acc << (to - bits)) & maxv) != 0 {
        return Err(CodecError::InvalidFormat("non-zero padding".into()));
    }

    Ok(out)
}

/// Encode `hrp` and 5-bit `data` into a bech32 string (lowercase).
pub fn encode(hrp: &str, data: &[u8]) -> Result<String, CodecError> {
    let mut out = String::with_capacity(hrp.len() + 1 + data.len() + CHECKSUM_LEN);
    out.push_str(hrp);
    out.push(SEPARATOR);
    for &v in data {
        let ch = CHARSET.get(usize::from(v)).ok_or_else(|| {
            CodecError::InvalidFormat(format!("value {v} is not a 5-bit group"))
        })?;
        out.push(char::from(*ch));
    }
    for v in checksum(hrp, data) {
        out.push(char::from(CHARSET[usize::from(v)]));
    }
    Ok(out)
}

/// Split a bech32 string into its lowercased hrp and 5-bit data groups
/// without verifying the checksum. The returned data still ends with the
/// six checksum groups.
///
/// Non-ASCII input is rejected before case folding, so look-alike
/// characters never fold into the alphabet.
pub fn split(s: &str) -> Result<(String, Vec<u8>), CodecError> {
    if let Some((position, ch)) = s.chars().enumerate().find(|(_, c)| !c.is_ascii()) {
        return Err(CodecError::InvalidCharacter { ch, position });
    }
    let lower = s.to_ascii_lowercase();
    let sep = lower
        .find(SEPARATOR)
        .ok_or_else(|| CodecError::InvalidFormat("missing separator '1'".into()))?;
    let (hrp, rest) = (&lower[..sep], &lower[sep + 1..]);

    for (position, ch) in hrp.chars().enumerate() {
        if !('!'..='~').contains(&ch) {
            return Err(CodecError::InvalidCharacter { ch, position });
        }
    }

    let mut data = Vec::with_capacity(rest.len());
    for (i, ch) in rest.chars().enumerate() {
        let value = CHARSET
            .iter()
            .position(|&c| char::from(c) == ch)
            .ok_or(CodecError::InvalidCharacter {
                ch,
                position: sep + 1 + i,
            })?;
        data.push(value as u8);
    }
    Ok((hrp.to_string(), data))
}

/// Verify and remove the trailing checksum from the output of [`split`].
pub fn strip_checksum(hrp: &str, mut data: Vec<u8>) -> Result<Vec<u8>, CodecError> {
    if data.len() < CHECKSUM_LEN {
        return Err(CodecError::InvalidFormat(format!(
            "data part has {} characters, shorter than the checksum",
            data.len()
        )));
    }
    if !verify_checksum(hrp, &data) {
        return Err(CodecError::InvalidChecksum);
    }
    data.truncate(data.len() - CHECKSUM_LEN);
    Ok(data)
}

/// Decode a bech32 string into its lowercased hrp and 5-bit data groups
/// (checksum stripped).
pub fn decode(s: &str) -> Result<(String, Vec<u8>), CodecError> {
    let (hrp, data) = split(s)?;
    let data = strip_checksum(&hrp, data)?;
    Ok((hrp, data))
}

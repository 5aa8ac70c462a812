//! Chunked mapping between a hex payload and P2WSH-shaped data addresses.
//!
//! Every 32-byte chunk becomes one witness-version-0 address. Chunk order is
//! address order; no indices are embedded, so callers must keep the list in
//! the order it was produced.

use crate::bech32;
use crate::encoding::decode_hex;
use crate::error::CodecError;
use crate::network::CodecNetwork;

/// Bytes carried by one data address.
pub const CHUNK_BYTES: usize = 32;

/// Hex characters carried by one data address.
pub const CHUNK_HEX_LEN: usize = CHUNK_BYTES * 2;

/// Length of a P2WPKH-shaped address with a two-character hrp.
pub const P2WPKH_ADDRESS_LEN: usize = 42;

/// Length of a P2WSH-shaped address with a two-character hrp.
pub const P2WSH_ADDRESS_LEN: usize = 62;

const WITNESS_VERSION: u8 = 0;

/// Number of addresses a payload of `hex_len` hex characters encodes to.
pub fn chunk_count(hex_len: usize) -> usize {
    hex_len.div_ceil(CHUNK_HEX_LEN)
}

/// Encode exactly one 64-hex-character chunk as a data address.
///
/// Any other length is rejected with [`CodecError::InvalidLength`]; this
/// path never pads.
pub fn chunk_to_address(chunk_hex: &str, network: CodecNetwork) -> Result<String, CodecError> {
    if chunk_hex.len() != CHUNK_HEX_LEN {
        return Err(CodecError::InvalidLength {
            expected: "64 hex chars",
            actual: chunk_hex.len(),
        });
    }
    let bytes = decode_hex(chunk_hex)?;

    let mut data = Vec::with_capacity(1 + 52);
    data.push(WITNESS_VERSION);
    data.extend(bech32::convert_bits(&bytes, 8, 5, true)?);

    bech32::encode(network.hrp(), &data)
}

/// Encode a hex payload into an ordered list of data addresses.
///
/// The payload is split into 64-character chunks and the final chunk is
/// right-padded with `0` digits. An empty payload yields no addresses.
pub fn encode(payload_hex: &str, network: CodecNetwork) -> Result<Vec<String>, CodecError> {
    if let Some(position) = payload_hex.bytes().position(|b| !b.is_ascii_hexdigit()) {
        return Err(CodecError::InvalidFormat(format!(
            "payload is not hex (offending byte at {position})"
        )));
    }

    payload_hex
        .as_bytes()
        .chunks(CHUNK_HEX_LEN)
        .map(|chunk| {
            let chunk = std::str::from_utf8(chunk)
                .map_err(|e| CodecError::InvalidFormat(format!("payload is not hex: {e}")))?;
            chunk_to_address(&format!("{chunk:0<64}"), network)
        })
        .collect()
}

/// Decode one P2WPKH- or P2WSH-shaped address back to its program as hex.
///
/// A 42-character address yields 40 hex characters and a 62-character
/// address yields 64; every other length is rejected. Characters are
/// checked first, then the length, then the checksum.
pub fn address_to_hex(address: &str) -> Result<String, CodecError> {
    let (hrp, data) = bech32::split(address)?;

    let len = address.chars().count();
    let expected_bytes = match len {
        P2WPKH_ADDRESS_LEN => 20,
        P2WSH_ADDRESS_LEN => CHUNK_BYTES,
        _ => {
            return Err(CodecError::InvalidLength {
                expected: "42 or 62 chars",
                actual: len,
            })
        }
    };
    let data = bech32::strip_checksum(&hrp, data)?;

    match data.first() {
        Some(&WITNESS_VERSION) => {}
        Some(v) => {
            return Err(CodecError::InvalidFormat(format!(
                "unsupported witness version {v}"
            )))
        }
        None => return Err(CodecError::InvalidFormat("empty data part".into())),
    }

    let program = bech32::convert_bits(&data[1..], 5, 8, false)?;
    if program.len() != expected_bytes {
        return Err(CodecError::InvalidFormat(format!(
            "program is {} bytes, expected {expected_bytes}",
            program.len()
        )));
    }
    Ok(hex::encode(program))
}

/// Decode an ordered list of data addresses back to a hex payload.
///
/// The result keeps the zero padding of the final chunk: for a payload whose
/// length is not a multiple of 32 bytes the output only *starts with* the
/// original hex. Callers that need the exact length must track it themselves.
pub fn decode<S: AsRef<str>>(addresses: &[S]) -> Result<String, CodecError> {
    let mut out = String::with_capacity(addresses.len() * CHUNK_HEX_LEN);
    for address in addresses {
        out.push_str(&address_to_hex(address.as_ref())?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::hashes::Hash;
    use bitcoin::{Address, Network, ScriptBuf, WScriptHash};
    use proptest::prelude::*;

    const P2WPKH_VECTOR: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";
    const P2WSH_VECTOR: &str = "bc1qrp33g0q5c5txsp9arysrx4k6zdkfs4nce4xj0gdcccefvpysxf3qccfmv3";
    const P2WSH_PROGRAM: &str = "1863143c14c5166804bd19203356da136c985678cd4d27a1b8c6329604903262";

    fn reference_p2wsh(program_hex: &str, network: Network) -> String {
        let program: [u8; 32] = hex::decode(program_hex).unwrap().try_into().unwrap();
        let script = ScriptBuf::new_p2wsh(&WScriptHash::from_byte_array(program));
        Address::from_script(&script, network).unwrap().to_string()
    }

    #[test]
    fn chunk_encodes_known_p2wsh_vector() {
        let address = chunk_to_address(P2WSH_PROGRAM, CodecNetwork::Bitcoin).unwrap();
        assert_eq!(address, P2WSH_VECTOR);
    }

    #[test]
    fn chunk_matches_bitcoin_crate_encoding() {
        let chunk = "ff".repeat(32);
        assert_eq!(
            chunk_to_address(&chunk, CodecNetwork::Bitcoin).unwrap(),
            reference_p2wsh(&chunk, Network::Bitcoin)
        );
        assert_eq!(
            chunk_to_address(&chunk, CodecNetwork::Testnet).unwrap(),
            reference_p2wsh(&chunk, Network::Testnet)
        );
    }

    #[test]
    fn chunk_address_shape() {
        let chunk = "ff".repeat(32);
        let main = chunk_to_address(&chunk, CodecNetwork::Bitcoin).unwrap();
        assert!(main.starts_with("bc1"));
        assert_eq!(main.len(), 62);

        let test = chunk_to_address(&chunk, CodecNetwork::Testnet).unwrap();
        assert!(test.starts_with("tb1"));
        assert_eq!(test.len(), 62);

        let other = chunk_to_address(&chunk, CodecNetwork::from_name("litecoin")).unwrap();
        assert!(other.starts_with('1'));
    }

    #[test]
    fn chunk_rejects_wrong_lengths() {
        for (input, len) in [("f".repeat(63), 63), ("f".repeat(65), 65), (String::new(), 0)] {
            let err = chunk_to_address(&input, CodecNetwork::Bitcoin).unwrap_err();
            assert_eq!(
                err,
                CodecError::InvalidLength {
                    expected: "64 hex chars",
                    actual: len
                }
            );
            assert!(err.to_string().contains("64 hex chars"));
        }
    }

    #[test]
    fn chunk_rejects_non_hex() {
        let chunk = "zz".repeat(32);
        assert!(matches!(
            chunk_to_address(&chunk, CodecNetwork::Bitcoin),
            Err(CodecError::InvalidFormat(_))
        ));
    }

    #[test]
    fn encode_empty_payload_yields_no_addresses() {
        assert!(encode("", CodecNetwork::Bitcoin).unwrap().is_empty());
    }

    #[test]
    fn encode_short_payload_pads_single_chunk() {
        let addresses = encode("48656c6c6f", CodecNetwork::Bitcoin).unwrap();
        assert_eq!(addresses.len(), 1);
        let expected_chunk = format!("48656c6c6f{}", "0".repeat(54));
        assert_eq!(
            addresses[0],
            chunk_to_address(&expected_chunk, CodecNetwork::Bitcoin).unwrap()
        );
    }

    #[test]
    fn encode_testnet_prefix() {
        let addresses = encode("48656c6c6f", CodecNetwork::Testnet).unwrap();
        assert!(addresses.iter().all(|a| a.starts_with("tb1")));
    }

    #[test]
    fn encode_splits_into_ordered_chunks() {
        let payload = "48656c6c6f".repeat(20);
        let addresses = encode(&payload, CodecNetwork::Bitcoin).unwrap();
        assert_eq!(addresses.len(), 4);
        assert_eq!(addresses.len(), chunk_count(payload.len()));
        assert_eq!(
            addresses[1],
            chunk_to_address(&payload[64..128], CodecNetwork::Bitcoin).unwrap()
        );
    }

    #[test]
    fn encode_large_payload() {
        let payload = "ff".repeat(1000);
        let addresses = encode(&payload, CodecNetwork::Bitcoin).unwrap();
        assert_eq!(addresses.len(), 32);
        assert!(addresses.iter().all(|a| a.len() == 62));
    }

    #[test]
    fn encode_rejects_non_hex_payload() {
        assert!(matches!(
            encode("48656c6c6g", CodecNetwork::Bitcoin),
            Err(CodecError::InvalidFormat(_))
        ));
    }

    #[test]
    fn address_to_hex_p2wpkh() {
        let hex_str = address_to_hex(P2WPKH_VECTOR).unwrap();
        assert_eq!(hex_str, "751e76e8199196d454941c45d1b3a323f1433bd6");
    }

    #[test]
    fn address_to_hex_p2wsh() {
        assert_eq!(address_to_hex(P2WSH_VECTOR).unwrap(), P2WSH_PROGRAM);
    }

    #[test]
    fn address_to_hex_is_case_insensitive() {
        let lower = address_to_hex(P2WPKH_VECTOR).unwrap();
        let upper = address_to_hex(&P2WPKH_VECTOR.to_uppercase()).unwrap();
        let mixed = address_to_hex("Bc1Qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4").unwrap();
        assert_eq!(lower, upper);
        assert_eq!(lower, mixed);
    }

    #[test]
    fn address_to_hex_rejects_invalid_characters() {
        for address in [
            "bc1qinvalidcharacterb",
            "bc1qinvalidcharacteri",
            "bc1qinvalidcharactero",
        ] {
            assert!(matches!(
                address_to_hex(address),
                Err(CodecError::InvalidCharacter { .. })
            ));
        }
    }

    #[test]
    fn address_to_hex_rejects_other_lengths() {
        assert_eq!(
            address_to_hex("a12uel5l").unwrap_err(),
            CodecError::InvalidLength {
                expected: "42 or 62 chars",
                actual: 8
            }
        );
    }

    #[test]
    fn address_to_hex_checks_length_before_checksum() {
        // 60 valid charset characters whose checksum is wrong.
        let truncated = &P2WSH_VECTOR[..60];
        assert_eq!(
            address_to_hex(truncated).unwrap_err(),
            CodecError::InvalidLength {
                expected: "42 or 62 chars",
                actual: 60
            }
        );
        // The right length with a corrupted checksum is still a checksum error.
        let corrupted = format!("{}q", &P2WSH_VECTOR[..61]);
        assert_eq!(address_to_hex(&corrupted).unwrap_err(), CodecError::InvalidChecksum);
    }

    #[test]
    fn address_to_hex_short_input_fails_cleanly() {
        assert!(address_to_hex("bc1q").is_err());
        assert!(address_to_hex("").is_err());
    }

    #[test]
    fn unrecognized_network_addresses_do_not_decode() {
        let addresses = encode("deadbeef", CodecNetwork::Unrecognized).unwrap();
        assert_eq!(addresses[0].len(), 60);
        assert!(matches!(
            decode(&addresses),
            Err(CodecError::InvalidLength { actual: 60, .. })
        ));
    }

    #[test]
    fn decode_empty_list() {
        assert_eq!(decode::<&str>(&[]).unwrap(), "");
    }

    #[test]
    fn decode_concatenates_in_order() {
        let hex_str = decode(&[P2WSH_VECTOR, P2WPKH_VECTOR]).unwrap();
        assert_eq!(
            hex_str,
            format!("{P2WSH_PROGRAM}751e76e8199196d454941c45d1b3a323f1433bd6")
        );
    }

    #[test]
    fn roundtrip_keeps_padding_tail() {
        for payload in ["48656c6c6f", "deadbeef", "89504e47"] {
            let addresses = encode(payload, CodecNetwork::Bitcoin).unwrap();
            let back = decode(&addresses).unwrap();
            assert_eq!(back.len(), 64);
            assert!(back.starts_with(payload));
        }
    }

    #[test]
    fn roundtrip_exact_for_whole_chunks() {
        let payload =
            "89504e470d0a1a0a0000000d494844520000000100000001080600000000367ef924";
        let payload = &payload[..64];
        let addresses = encode(payload, CodecNetwork::Bitcoin).unwrap();
        assert_eq!(decode(&addresses).unwrap(), payload);
    }

    proptest! {
        #[test]
        fn decode_of_encode_starts_with_payload(
            bytes in proptest::collection::vec(any::<u8>(), 0..200),
        ) {
            let payload = hex::encode(&bytes);
            let addresses = encode(&payload, CodecNetwork::Bitcoin).unwrap();
            prop_assert_eq!(addresses.len(), chunk_count(payload.len()));

            let back = decode(&addresses).unwrap();
            prop_assert!(back.starts_with(&payload));
            prop_assert_eq!(back.len(), addresses.len() * CHUNK_HEX_LEN);
            if bytes.len() % CHUNK_BYTES == 0 {
                prop_assert_eq!(back, payload);
            }
        }
    }
}

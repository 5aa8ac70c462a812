use serde::{Deserialize, Serialize};

/// Human-readable part for Bitcoin mainnet data addresses.
pub const MAINNET_HRP: &str = "bc";

/// Human-readable part for Bitcoin testnet data addresses.
pub const TESTNET_HRP: &str = "tb";

/// Network selector for data-address encoding.
///
/// Built from a network name. Names other than `"bitcoin"` and `"testnet"`
/// are accepted and map to [`CodecNetwork::Unrecognized`], which encodes
/// with an empty hrp (the resulting addresses start with `1`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CodecNetwork {
    #[default]
    Bitcoin,
    Testnet,
    Unrecognized,
}

impl CodecNetwork {
    /// Parse a network name. Never fails.
    pub fn from_name(name: &str) -> Self {
        match name {
            "bitcoin" => CodecNetwork::Bitcoin,
            "testnet" => CodecNetwork::Testnet,
            _ => CodecNetwork::Unrecognized,
        }
    }

    /// The bech32 human-readable part used for this network.
    pub fn hrp(self) -> &'static str {
        match self {
            CodecNetwork::Bitcoin => MAINNET_HRP,
            CodecNetwork::Testnet => TESTNET_HRP,
            CodecNetwork::Unrecognized => "",
        }
    }
}

impl From<&str> for CodecNetwork {
    fn from(name: &str) -> Self {
        CodecNetwork::from_name(name)
    }
}

impl From<String> for CodecNetwork {
    fn from(name: String) -> Self {
        CodecNetwork::from_name(&name)
    }
}

impl From<CodecNetwork> for String {
    fn from(network: CodecNetwork) -> Self {
        network.to_string()
    }
}

impl std::fmt::Display for CodecNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecNetwork::Bitcoin => write!(f, "bitcoin"),
            CodecNetwork::Testnet => write!(f, "testnet"),
            CodecNetwork::Unrecognized => write!(f, "unrecognized"),
        }
    }
}

use bitcoin::Network;
use serde::{Deserialize, Serialize};

/// Supported Bitcoin networks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BtcNetwork {
    #[default]
    Mainnet,
    Testnet,
    Signet,
    Regtest,
}

impl BtcNetwork {
    /// Convert to the `bitcoin` crate's `Network` type.
    pub fn to_bitcoin_network(self) -> Network {
        match self {
            BtcNetwork::Mainnet => Network::Bitcoin,
            BtcNetwork::Testnet => Network::Testnet,
            BtcNetwork::Signet => Network::Signet,
            BtcNetwork::Regtest => Network::Regtest,
        }
    }

    pub fn is_mainnet(self) -> bool {
        self == BtcNetwork::Mainnet
    }
}

impl std::fmt::Display for BtcNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BtcNetwork::Mainnet => write!(f, "mainnet"),
            BtcNetwork::Testnet => write!(f, "testnet"),
            BtcNetwork::Signet => write!(f, "signet"),
            BtcNetwork::Regtest => write!(f, "regtest"),
        }
    }
}

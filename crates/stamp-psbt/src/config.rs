use bitcoin::Sequence;
use serde::{Deserialize, Serialize};

use crate::error::PsbtError;
use crate::network::BtcNetwork;

/// Fixed overhead per transaction (version, locktime, counts), in vbytes.
pub const TX_OVERHEAD_VBYTES: u64 = 10;

/// Estimated size of one input, in vbytes.
pub const INPUT_VBYTES: u64 = 148;

/// Estimated size of one output, in vbytes.
pub const OUTPUT_VBYTES: u64 = 34;

/// Per-part vbyte estimates used for fee calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizeHeuristic {
    pub overhead_vbytes: u64,
    pub input_vbytes: u64,
    pub output_vbytes: u64,
}

impl Default for SizeHeuristic {
    fn default() -> Self {
        Self {
            overhead_vbytes: TX_OVERHEAD_VBYTES,
            input_vbytes: INPUT_VBYTES,
            output_vbytes: OUTPUT_VBYTES,
        }
    }
}

/// Settings for sale-PSBT construction.
///
/// Every field has a default, so a partial JSON document such as
/// `{"network": "testnet"}` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Network every destination, change and owner address must belong to.
    pub network: BtcNetwork,
    pub size: SizeHeuristic,
    /// nSequence for the spent input. Defaults to `0xfffffffd` (RBF).
    pub sequence: u32,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            network: BtcNetwork::Mainnet,
            size: SizeHeuristic::default(),
            sequence: Sequence::ENABLE_RBF_NO_LOCKTIME.0,
        }
    }
}

impl BuilderConfig {
    pub fn for_network(network: BtcNetwork) -> Self {
        Self {
            network,
            ..Self::default()
        }
    }

    /// Load a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, PsbtError> {
        serde_json::from_str(json)
            .map_err(|e| PsbtError::InvalidFormat(format!("invalid builder config: {e}")))
    }

    pub fn to_json(&self) -> Result<String, PsbtError> {
        serde_json::to_string(self)
            .map_err(|e| PsbtError::InvalidFormat(format!("failed to serialize config: {e}")))
    }

    pub fn input_sequence(&self) -> Sequence {
        Sequence(self.sequence)
    }
}

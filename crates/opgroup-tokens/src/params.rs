//! Token-group parameters.
//!
//! Loaded from a TOML file; every section and field falls back to its
//! default when absent.

use std::path::Path;

use opgroup_script::{Address, Network};
use serde::{Deserialize, Serialize};

use crate::fees::FeeSchedule;
use crate::TokenError;

/// Default native value carried by every grouped output.
const DEFAULT_GROUPED_DUST: u64 = 10_000;

/// Default bound on identifier-derivation attempts.
const DEFAULT_MAX_DERIVATION_ITERATIONS: u64 = 1 << 20;

/// Parameters for validation, registry and construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenParams {
    /// Network addresses in this file belong to.
    pub network: Network,

    /// Coins created below this height are treated as ungrouped.
    pub activation_height: u32,

    /// Native value placed in each grouped output.
    pub grouped_dust: u64,

    /// Upper bound on nonce attempts when deriving a group id.
    pub max_derivation_iterations: u64,

    /// Report registry conflicts as errors instead of first-writer-wins.
    pub strict_registry: bool,

    pub management: ManagementParams,

    pub fees: FeeSchedule,

    pub native: NativeAssetParams,
}

impl Default for TokenParams {
    fn default() -> Self {
        TokenParams {
            network: Network::Mainnet,
            activation_height: 0,
            grouped_dust: DEFAULT_GROUPED_DUST,
            max_derivation_iterations: DEFAULT_MAX_DERIVATION_ITERATIONS,
            strict_registry: false,
            management: ManagementParams::default(),
            fees: FeeSchedule::default(),
            native: NativeAssetParams::default(),
        }
    }
}

/// Management key and the reserved tickers of the management groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagementParams {
    /// Address that may create management groups before the bootstrap
    /// group exists, and that receives management fees.
    pub address: Option<Address>,
    pub bootstrap_ticker: String,
    pub fee_ticker: String,
    pub governance_ticker: String,
}

impl Default for ManagementParams {
    fn default() -> Self {
        ManagementParams {
            address: None,
            bootstrap_ticker: "MGT".to_string(),
            fee_ticker: "FEE".to_string(),
            governance_ticker: "GOV".to_string(),
        }
    }
}

/// Description of the synthetic native-asset registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NativeAssetParams {
    pub ticker: String,
    pub name: String,
    pub decimal_pos: u8,
    pub document_url: String,
}

impl Default for NativeAssetParams {
    fn default() -> Self {
        NativeAssetParams {
            ticker: "NATIVE".to_string(),
            name: "Native".to_string(),
            decimal_pos: 8,
            document_url: String::new(),
        }
    }
}

impl TokenParams {
    /// Parse parameters from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, TokenError> {
        toml::from_str(text).map_err(|e| TokenError::Config(e.to_string()))
    }

    /// Read and parse a TOML parameter file.
    ///
    /// # Arguments
    /// * `path` - Path to the file.
    ///
    /// # Returns
    /// The parameters, or `Config` when the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TokenError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| TokenError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, TokenError> {
        toml::to_string(self).map_err(|e| TokenError::Config(e.to_string()))
    }
}

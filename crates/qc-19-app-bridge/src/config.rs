//! # Bridge Configuration
//!
//! Defaults, optional deserialization from a config document, and `QC_*`
//! environment overrides.
//!
//! | Variable | Field |
//! |----------|-------|
//! | `QC_CHAIN_ID` | `chain_id` |
//! | `QC_APP_VERSION` | `app_version` |
//! | `QC_FOUNDATION_ADDRESS` | `params.foundation_address` |
//! | `QC_GAS_PRICE` | `params.gas_price` |

use std::collections::HashSet;

use qc_18_staking::GenesisValidator;
use serde::Deserialize;
use shared_types::encoding::decode_fixed;
use shared_types::{Params, ZERO_ADDRESS};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub chain_id: String,
    /// Running program version, matched against retirement proposals.
    pub app_version: String,
    /// Heights whose native-store hash uses the legacy digest.
    pub legacy_digest_heights: Vec<u64>,
    /// Used by InitChain when the request lists no validators.
    pub genesis_validators: Vec<GenesisValidator>,
    /// Params used until a persisted copy exists.
    pub params: Params,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            chain_id: "local".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            legacy_digest_heights: Vec::new(),
            genesis_validators: Vec::new(),
            params: Params::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("chain_id must not be empty")]
    EmptyChainId,

    #[error("app_version must not be empty")]
    EmptyAppVersion,

    #[error("foundation_address must not be the zero address")]
    ZeroFoundationAddress,

    #[error("genesis validator {0} listed twice")]
    DuplicateGenesisValidator(String),
}

impl BridgeConfig {
    /// Defaults with process environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `QC_*` overrides read through `lookup`. Malformed values are
    /// logged and ignored.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(chain_id) = lookup("QC_CHAIN_ID") {
            self.chain_id = chain_id;
        }
        if let Some(version) = lookup("QC_APP_VERSION") {
            self.app_version = version;
        }
        if let Some(address) = lookup("QC_FOUNDATION_ADDRESS") {
            match decode_fixed(&address) {
                Ok(parsed) => {
                    self.params.foundation_address = parsed;
                    info!("Loaded foundation address from environment");
                }
                Err(e) => warn!(error = %e, "QC_FOUNDATION_ADDRESS must be a 20-byte hex address"),
            }
        }
        if let Some(price) = lookup("QC_GAS_PRICE") {
            match price.parse() {
                Ok(parsed) => self.params.gas_price = parsed,
                Err(_) => warn!(value = %price, "QC_GAS_PRICE must be an unsigned integer"),
            }
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain_id.is_empty() {
            return Err(ConfigError::EmptyChainId);
        }
        if self.app_version.is_empty() {
            return Err(ConfigError::EmptyAppVersion);
        }
        if self.params.foundation_address == ZERO_ADDRESS {
            return Err(ConfigError::ZeroFoundationAddress);
        }
        let mut seen = HashSet::new();
        for validator in &self.genesis_validators {
            if !seen.insert(validator.pub_key) {
                return Err(ConfigError::DuplicateGenesisValidator(hex::encode(
                    validator.pub_key,
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_is_valid() {
        assert!(BridgeConfig::default().validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = BridgeConfig::default().with_overrides(lookup(&[
            ("QC_CHAIN_ID", "devnet"),
            ("QC_APP_VERSION", "2.0.0"),
            ("QC_FOUNDATION_ADDRESS", "0x0101010101010101010101010101010101010101"),
            ("QC_GAS_PRICE", "5"),
        ]));
        assert_eq!(config.chain_id, "devnet");
        assert_eq!(config.app_version, "2.0.0");
        assert_eq!(config.params.foundation_address, [1; 20]);
        assert_eq!(config.params.gas_price, 5);
    }

    #[test]
    fn test_malformed_overrides_are_ignored() {
        let config = BridgeConfig::default()
            .with_overrides(lookup(&[("QC_GAS_PRICE", "-1"), ("QC_FOUNDATION_ADDRESS", "0x12")]));
        assert_eq!(config.params, Params::default());
    }

    #[test]
    fn test_validate_rejects_duplicates_and_zero_foundation() {
        let validator = GenesisValidator {
            pub_key: [3; 32],
            address: [3; 20],
            power: 10,
            description: Default::default(),
        };
        let mut config = BridgeConfig {
            genesis_validators: vec![validator.clone(), validator],
            ..BridgeConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateGenesisValidator(_))
        ));

        config.genesis_validators.clear();
        config.params.foundation_address = ZERO_ADDRESS;
        assert_eq!(config.validate(), Err(ConfigError::ZeroFoundationAddress));
    }

    #[test]
    fn test_deserialize_partial_document() {
        let config: BridgeConfig =
            serde_json::from_str(r#"{"chain_id":"testnet","legacy_digest_heights":[42]}"#)
                .unwrap();
        assert_eq!(config.chain_id, "testnet");
        assert_eq!(config.legacy_digest_heights, vec![42]);
        assert_eq!(config.params, Params::default());
    }
}

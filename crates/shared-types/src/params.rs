//! # Global Parameters
//!
//! Chain-wide tunables (gas costs, gas price, proposal expiry, foundation
//! address). The value is owned by whoever drives the block lifecycle and is
//! passed explicitly; there is no process-global copy.
//!
//! Governance mutates parameters by name through [`PARAM_TABLE`], a static
//! table of `name -> {kind, apply}` entries.

use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};

use crate::encoding::decode_fixed;
use crate::entities::{Address, U256};
use crate::errors::ParamError;

/// Native-store key under which the serialized [`Params`] live.
pub const PARAM_KEY: &[u8] = &[0x01];

/// Target seconds between commits, used to express periods in blocks.
pub const COMMIT_SECONDS: u64 = 10;

/// Default foundation address, the only account allowed to verify candidates.
pub const DEFAULT_FOUNDATION_ADDRESS: Address = [
    0x7e, 0xff, 0x12, 0x2b, 0x94, 0x89, 0x7e, 0xa5, 0xb0, 0xe2, 0xa9, 0xab, 0xf4, 0x7b, 0x86, 0x33,
    0x7f, 0xaf, 0xeb, 0xdc,
];

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    pub proposal_expire_period: u64,
    pub declare_candidacy_gas: u64,
    pub update_candidacy_gas: u64,
    pub update_candidate_account_gas: u64,
    pub accept_candidate_account_update_request_gas: u64,
    pub transfer_fund_proposal_gas: u64,
    pub change_params_proposal_gas: u64,
    pub deploy_libeni_proposal_gas: u64,
    pub retire_program_proposal_gas: u64,
    pub upgrade_program_proposal_gas: u64,
    pub gas_price: u64,
    pub low_price_tx_gas_limit: u64,
    pub low_price_tx_slots_cap: i64,
    #[serde_as(as = "Hex")]
    pub foundation_address: Address,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            proposal_expire_period: 7 * 24 * 3600 / COMMIT_SECONDS,
            declare_candidacy_gas: 1_000_000,
            update_candidacy_gas: 1_000_000,
            update_candidate_account_gas: 1_000_000,
            accept_candidate_account_update_request_gas: 1_000_000,
            transfer_fund_proposal_gas: 2_000_000,
            change_params_proposal_gas: 2_000_000,
            deploy_libeni_proposal_gas: 2_000_000,
            retire_program_proposal_gas: 2_000_000,
            upgrade_program_proposal_gas: 2_000_000,
            gas_price: 0,
            low_price_tx_gas_limit: i64::MAX as u64,
            low_price_tx_slots_cap: i32::MAX as i64,
            foundation_address: DEFAULT_FOUNDATION_ADDRESS,
        }
    }
}

impl Params {
    /// Fee charged for `gas` units at the current gas price.
    pub fn gas_fee(&self, gas: u64) -> U256 {
        U256::from(gas) * U256::from(self.gas_price)
    }
}

/// Value type of a parameter, used for type checks before applying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Uint,
    Int,
    Address,
}

impl ParamKind {
    fn as_str(self) -> &'static str {
        match self {
            ParamKind::Uint => "uint",
            ParamKind::Int => "int",
            ParamKind::Address => "address",
        }
    }
}

/// A settable parameter: its name, its type, and how to apply a raw value.
pub struct ParamField {
    pub name: &'static str,
    pub kind: ParamKind,
    pub apply: fn(&mut Params, &str) -> Result<(), ParamError>,
}

fn parse_uint(name: &'static str, value: &str) -> Result<u64, ParamError> {
    value.trim().parse().map_err(|_| invalid(name, ParamKind::Uint, value))
}

fn parse_int(name: &'static str, value: &str) -> Result<i64, ParamError> {
    value.trim().parse().map_err(|_| invalid(name, ParamKind::Int, value))
}

fn parse_address(name: &'static str, value: &str) -> Result<Address, ParamError> {
    decode_fixed(value.trim()).map_err(|_| invalid(name, ParamKind::Address, value))
}

fn invalid(name: &'static str, kind: ParamKind, value: &str) -> ParamError {
    ParamError::InvalidValue {
        name,
        expected: kind.as_str(),
        value: value.to_string(),
    }
}

macro_rules! param {
    ($name:literal, $field:ident, Uint) => {
        ParamField {
            name: $name,
            kind: ParamKind::Uint,
            apply: |p, v| {
                p.$field = parse_uint($name, v)?;
                Ok(())
            },
        }
    };
    ($name:literal, $field:ident, Int) => {
        ParamField {
            name: $name,
            kind: ParamKind::Int,
            apply: |p, v| {
                p.$field = parse_int($name, v)?;
                Ok(())
            },
        }
    };
    ($name:literal, $field:ident, Address) => {
        ParamField {
            name: $name,
            kind: ParamKind::Address,
            apply: |p, v| {
                p.$field = parse_address($name, v)?;
                Ok(())
            },
        }
    };
}

/// Every parameter governance may change, keyed by its serialized name.
pub static PARAM_TABLE: &[ParamField] = &[
    param!("proposal_expire_period", proposal_expire_period, Uint),
    param!("declare_candidacy_gas", declare_candidacy_gas, Uint),
    param!("update_candidacy_gas", update_candidacy_gas, Uint),
    param!("update_candidate_account_gas", update_candidate_account_gas, Uint),
    param!(
        "accept_candidate_account_update_request_gas",
        accept_candidate_account_update_request_gas,
        Uint
    ),
    param!("transfer_fund_proposal_gas", transfer_fund_proposal_gas, Uint),
    param!("change_params_proposal_gas", change_params_proposal_gas, Uint),
    param!("deploy_libeni_proposal_gas", deploy_libeni_proposal_gas, Uint),
    param!("retire_program_proposal_gas", retire_program_proposal_gas, Uint),
    param!("upgrade_program_proposal_gas", upgrade_program_proposal_gas, Uint),
    param!("gas_price", gas_price, Uint),
    param!("low_price_tx_gas_limit", low_price_tx_gas_limit, Uint),
    param!("low_price_tx_slots_cap", low_price_tx_slots_cap, Int),
    param!("foundation_address", foundation_address, Address),
];

fn lookup(name: &str) -> Result<&'static ParamField, ParamError> {
    PARAM_TABLE
        .iter()
        .find(|f| f.name == name)
        .ok_or_else(|| ParamError::UnknownParam(name.to_string()))
}

/// Params plus the dirty flag that decides whether they are flushed at commit.
#[derive(Debug, Clone, Default)]
pub struct ParamsStore {
    params: Params,
    dirty: bool,
}

impl ParamsStore {
    pub fn new(params: Params) -> Self {
        Self {
            params,
            dirty: false,
        }
    }

    /// Load persisted params. Fields absent from `bytes` keep `base` values.
    pub fn load(base: Params, bytes: &[u8]) -> Result<Self, ParamError> {
        let mut value =
            serde_json::to_value(&base).map_err(|e| ParamError::Serialization(e.to_string()))?;
        let stored: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|e| ParamError::Serialization(e.to_string()))?;
        if let (Some(target), serde_json::Value::Object(fields)) = (value.as_object_mut(), stored)
        {
            target.extend(fields);
        }
        let params =
            serde_json::from_value(value).map_err(|e| ParamError::Serialization(e.to_string()))?;
        Ok(Self::new(params))
    }

    pub fn get(&self) -> &Params {
        &self.params
    }

    /// Set a parameter by name. Marks the store dirty on success.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), ParamError> {
        let field = lookup(name)?;
        (field.apply)(&mut self.params, value)?;
        self.dirty = true;
        Ok(())
    }

    /// Validate `value` for `name` without applying it.
    pub fn check_type(name: &str, value: &str) -> Result<ParamKind, ParamError> {
        let field = lookup(name)?;
        let mut scratch = Params::default();
        (field.apply)(&mut scratch, value)?;
        Ok(field.kind)
    }

    /// Replace every parameter at once (genesis, governance batch changes).
    pub fn replace(&mut self, params: Params) {
        self.params = params;
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clear the dirty flag, returning its previous value.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ParamError> {
        serde_json::to_vec(&self.params).map_err(|e| ParamError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let p = Params::default();
        assert_eq!(p.proposal_expire_period, 60_480);
        assert_eq!(p.declare_candidacy_gas, 1_000_000);
        assert_eq!(p.retire_program_proposal_gas, 2_000_000);
        assert_eq!(p.low_price_tx_slots_cap, 2_147_483_647);
        assert_eq!(p.gas_fee(1_000_000), U256::zero());
    }

    #[test]
    fn test_set_marks_dirty() {
        let mut store = ParamsStore::default();
        assert!(!store.is_dirty());
        store.set("gas_price", "2000000000").unwrap();
        assert_eq!(store.get().gas_price, 2_000_000_000);
        assert!(store.take_dirty());
        assert!(!store.take_dirty());
    }

    #[test]
    fn test_set_rejects_unknown_and_malformed() {
        let mut store = ParamsStore::default();
        assert_eq!(
            store.set("no_such_param", "1"),
            Err(ParamError::UnknownParam("no_such_param".into()))
        );
        assert!(matches!(
            store.set("gas_price", "-1"),
            Err(ParamError::InvalidValue { name: "gas_price", .. })
        ));
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_set_address_and_int() {
        let mut store = ParamsStore::default();
        store
            .set("foundation_address", "0x0000000000000000000000000000000000000001")
            .unwrap();
        store.set("low_price_tx_slots_cap", "-5").unwrap();
        assert_eq!(store.get().foundation_address[19], 1);
        assert_eq!(store.get().low_price_tx_slots_cap, -5);
    }

    #[test]
    fn test_check_type_does_not_apply() {
        assert_eq!(
            ParamsStore::check_type("declare_candidacy_gas", "5"),
            Ok(ParamKind::Uint)
        );
        assert!(ParamsStore::check_type("foundation_address", "0x12").is_err());
    }

    #[test]
    fn test_load_merges_over_base() {
        let mut store = ParamsStore::default();
        store.set("gas_price", "7").unwrap();
        let bytes = store.to_bytes().unwrap();

        let loaded = ParamsStore::load(Params::default(), &bytes).unwrap();
        assert_eq!(loaded.get().gas_price, 7);
        assert!(!loaded.is_dirty());

        let partial = ParamsStore::load(Params::default(), br#"{"gas_price":9}"#).unwrap();
        assert_eq!(partial.get().gas_price, 9);
        assert_eq!(partial.get().declare_candidacy_gas, 1_000_000);
    }

    #[test]
    fn test_table_covers_every_field() {
        let value = serde_json::to_value(Params::default()).unwrap();
        let fields = value.as_object().unwrap();
        assert_eq!(fields.len(), PARAM_TABLE.len());
        for field in PARAM_TABLE {
            assert!(fields.contains_key(field.name), "{}", field.name);
        }
    }
}

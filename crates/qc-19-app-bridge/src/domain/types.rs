//! Request/response shapes of the six-message lifecycle protocol.

use qc_18_staking::GenesisValidator;
use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};
use shared_types::{Address, Params, ValidatorUpdate, U256};

use crate::error::TxError;

/// Header fields the bridge consumes at BeginBlock.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub chain_id: String,
    pub height: u64,
    /// Unix seconds.
    pub time: i64,
    #[serde_as(as = "Hex")]
    pub proposer: Address,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestInitChain {
    pub chain_id: String,
    pub time: i64,
    /// Empty means "use the configured genesis validators".
    pub validators: Vec<GenesisValidator>,
    pub params: Option<Params>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseInitChain {
    pub validators: Vec<ValidatorUpdate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseInfo {
    pub last_block_height: u64,
    pub last_block_app_hash: Vec<u8>,
    pub version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestEndBlock {
    pub height: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseEndBlock {
    pub validator_updates: Vec<ValidatorUpdate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseCommit {
    /// The composite app hash.
    pub data: Vec<u8>,
}

/// Outcome of CheckTx or DeliverTx. `code == 0` is success.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxResponse {
    pub code: u32,
    /// Machine-readable failure code, empty on success.
    pub error_code: String,
    pub log: String,
    pub gas_used: u64,
    pub gas_fee: U256,
    pub data: Vec<u8>,
}

pub type ResponseCheckTx = TxResponse;
pub type ResponseDeliverTx = TxResponse;

impl TxResponse {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

impl From<&TxError> for TxResponse {
    fn from(err: &TxError) -> Self {
        Self {
            code: err.abci_code(),
            error_code: err.code().to_string(),
            log: err.to_string(),
            ..Self::default()
        }
    }
}

impl From<TxError> for TxResponse {
    fn from(err: TxError) -> Self {
        Self::from(&err)
    }
}

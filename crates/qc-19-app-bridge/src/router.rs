//! Native transaction routing.
//!
//! A native payload is a JSON object whose `type` field names its kind, e.g.
//! `stake/declareCandidacy`. The segment before the first `/` picks the module.

use qc_18_staking::StakeTx;
use serde::Deserialize;
use thiserror::Error;

use crate::error::TxError;

pub const MODULE_SEPARATOR: char = '/';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Module {
    Stake,
    Governance,
}

impl Module {
    pub fn name(self) -> &'static str {
        match self {
            Module::Stake => "stake",
            Module::Governance => "governance",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    #[error("Unknown transaction kind: {0}")]
    UnknownTxKind(String),
}

impl From<RouterError> for TxError {
    fn from(err: RouterError) -> Self {
        match err {
            RouterError::UnknownTxKind(kind) => TxError::UnknownTxKind(kind),
        }
    }
}

pub fn classify(kind: &str) -> Result<Module, RouterError> {
    let prefix = kind.split(MODULE_SEPARATOR).next().unwrap_or_default();
    match prefix {
        "stake" => Ok(Module::Stake),
        "governance" => Ok(Module::Governance),
        _ => Err(RouterError::UnknownTxKind(kind.to_string())),
    }
}

/// A native transaction after routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutedTx {
    Stake(StakeTx),
    /// Governance payloads stay opaque to the bridge.
    Governance { kind: String },
}

impl RoutedTx {
    pub fn kind(&self) -> &str {
        match self {
            RoutedTx::Stake(tx) => tx.kind(),
            RoutedTx::Governance { kind } => kind,
        }
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
}

/// Classify `payload` and decode it for its module.
pub fn route(payload: &[u8]) -> Result<RoutedTx, TxError> {
    let envelope: Envelope =
        serde_json::from_slice(payload).map_err(|e| TxError::Decode(e.to_string()))?;
    match classify(&envelope.kind)? {
        Module::Stake => StakeTx::decode(payload)
            .map(RoutedTx::Stake)
            .map_err(|e| TxError::Decode(format!("{}: {e}", envelope.kind))),
        Module::Governance => Ok(RoutedTx::Governance {
            kind: envelope.kind,
        }),
    }
}

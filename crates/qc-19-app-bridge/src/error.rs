//! Error types for the application bridge.
//!
//! `TxError` is per-transaction and always ends up in a response code.
//! `BridgeFault` means local storage can no longer be trusted and is handed to
//! the supervisor.

use qc_18_staking::{StakeError, StoreError};
use shared_types::{ParamError, U256};
use thiserror::Error;

use crate::domain::Phase;
use crate::ports::Rejection;

/// Per-transaction failures. Never abort the block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxError {
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    /// Business-rule violation with the module's stable code.
    #[error("{message}")]
    Domain { code: String, message: String },

    #[error("Unknown transaction kind: {0}")]
    UnknownTxKind(String),

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: U256, available: U256 },
}

impl TxError {
    /// Numeric response code. OK is 0.
    pub fn abci_code(&self) -> u32 {
        match self {
            TxError::Decode(_) => 2,
            TxError::Unauthorized(_) => 3,
            TxError::Validation(_) => 4,
            TxError::Domain { .. } => 5,
            TxError::UnknownTxKind(_) => 6,
            TxError::InsufficientFunds { .. } => 10,
        }
    }

    /// Machine-readable code.
    pub fn code(&self) -> &str {
        match self {
            TxError::Decode(_) => "decode_error",
            TxError::Unauthorized(_) => "unauthorized",
            TxError::Validation(_) => "validation_error",
            TxError::Domain { code, .. } => code,
            TxError::UnknownTxKind(_) => "unknown_tx_kind",
            TxError::InsufficientFunds { .. } => "insufficient_funds",
        }
    }

    /// Split a staking failure into a tx error, or the store fault behind it.
    pub fn from_stake(err: StakeError) -> Result<TxError, StoreError> {
        let message = err.to_string();
        Ok(match err {
            StakeError::Store(store) => return Err(store),
            StakeError::MissingSignature => TxError::Validation(message),
            StakeError::VerificationDisallowed | StakeError::NotRequestRecipient => {
                TxError::Unauthorized(message)
            }
            StakeError::InsufficientFunds {
                required,
                available,
            } => TxError::InsufficientFunds {
                required,
                available,
            },
            other => TxError::Domain {
                code: other.code().to_string(),
                message,
            },
        })
    }
}

impl From<Rejection> for TxError {
    fn from(rejection: Rejection) -> Self {
        TxError::Domain {
            code: rejection.code,
            message: rejection.log,
        }
    }
}

/// Unrecoverable failures. The supervisor terminates the process on these.
#[derive(Debug, Error)]
pub enum BridgeFault {
    #[error("{call} is not allowed in phase {phase:?}")]
    Phase { call: &'static str, phase: Phase },

    #[error("Store fault: {0}")]
    Store(#[from] StoreError),

    #[error("Params fault: {0}")]
    Params(#[from] ParamError),

    #[error("Staking fault: {0}")]
    Stake(StakeError),
}

impl From<StakeError> for BridgeFault {
    fn from(err: StakeError) -> Self {
        match err {
            StakeError::Store(store) => BridgeFault::Store(store),
            other => BridgeFault::Stake(other),
        }
    }
}

pub type BridgeResult<T> = Result<T, BridgeFault>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stake_errors_map_to_stable_codes() {
        let err = TxError::from_stake(StakeError::PubKeyAlreadyDeclared).unwrap();
        assert_eq!(err.abci_code(), 5);
        assert_eq!(err.code(), "pub_key_already_declared");
        assert_eq!(err.to_string(), "public key already declared");

        let err = TxError::from_stake(StakeError::VerificationDisallowed).unwrap();
        assert_eq!(err.code(), "unauthorized");

        let err = TxError::from_stake(StakeError::InsufficientFunds {
            required: U256::from(10),
            available: U256::from(1),
        })
        .unwrap();
        assert_eq!(err.abci_code(), 10);
    }

    #[test]
    fn test_store_failures_are_not_tx_errors() {
        let result = TxError::from_stake(StakeError::Store(StoreError::Conflict));
        assert_eq!(result, Err(StoreError::Conflict));
    }
}

use shared_types::U256;
use thiserror::Error;

/// Failures of the relational or native store. Always fatal to the block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Row not found: {table} #{id}")]
    RowNotFound { table: &'static str, id: u64 },

    #[error("No relational transaction is bound to the current block")]
    NoBlockTransaction,

    #[error("A relational transaction is already bound to block {0}")]
    TransactionAlreadyOpen(u64),

    #[error("Concurrent commit detected; committed state moved since begin")]
    Conflict,

    #[error("Corrupted stored value: {0}")]
    Corrupted(String),
}

/// Business-rule violations of staking transactions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StakeError {
    #[error("Missing signature")]
    MissingSignature,

    #[error("Candidate does not exist for that address")]
    CandidateNotFound,

    #[error("Address has been declared")]
    AddressAlreadyDeclared,

    #[error("public key already declared")]
    PubKeyAlreadyDeclared,

    #[error("Candidate has been activated")]
    CandidateAlreadyActivated,

    #[error("Candidate has been deactivated")]
    CandidateAlreadyDeactivated,

    #[error("Verification disallowed")]
    VerificationDisallowed,

    #[error("Invalid genesis validator address")]
    InvalidGenesisAddress,

    #[error("Address is owned by another candidate")]
    AddressInUse,

    #[error("A pending account update request already targets that address")]
    PendingRequestExists,

    #[error("New candidate account must be non-zero and differ from the owner")]
    InvalidNewAddress,

    #[error("Account update request not found")]
    RequestNotFound,

    #[error("Sender is not the recipient of the request")]
    NotRequestRecipient,

    #[error("Account update request is not pending")]
    RequestNotPending,

    #[error("Candidate is no longer owned by the request's sender")]
    StaleRequest,

    #[error("A key rotation is already queued for this candidate")]
    RotationAlreadyQueued,

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: U256, available: U256 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl StakeError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            StakeError::MissingSignature => "missing_signature",
            StakeError::CandidateNotFound => "candidate_not_found",
            StakeError::AddressAlreadyDeclared => "address_already_declared",
            StakeError::PubKeyAlreadyDeclared => "pub_key_already_declared",
            StakeError::CandidateAlreadyActivated => "candidate_already_activated",
            StakeError::CandidateAlreadyDeactivated => "candidate_already_deactivated",
            StakeError::VerificationDisallowed => "verification_disallowed",
            StakeError::InvalidGenesisAddress => "invalid_genesis_address",
            StakeError::AddressInUse => "address_in_use",
            StakeError::PendingRequestExists => "pending_request_exists",
            StakeError::InvalidNewAddress => "invalid_new_address",
            StakeError::RequestNotFound => "request_not_found",
            StakeError::NotRequestRecipient => "not_request_recipient",
            StakeError::RequestNotPending => "request_not_pending",
            StakeError::StaleRequest => "stale_request",
            StakeError::RotationAlreadyQueued => "rotation_already_queued",
            StakeError::InsufficientFunds { .. } => "insufficient_funds",
            StakeError::Store(_) => "store_failure",
        }
    }

    /// Storage failures must stop the node; everything else only fails the tx.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StakeError::Store(_))
    }
}

pub type StakeResult<T> = Result<T, StakeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_store_errors_are_fatal() {
        assert!(StakeError::Store(StoreError::Conflict).is_fatal());
        assert!(!StakeError::PubKeyAlreadyDeclared.is_fatal());
        assert_eq!(
            StakeError::PubKeyAlreadyDeclared.to_string(),
            "public key already declared"
        );
    }
}

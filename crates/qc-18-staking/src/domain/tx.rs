//! Staking transaction payloads and the per-transaction execution context.

use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};
use shared_types::{Address, Params, PublicKey};

use super::entities::Description;
use super::errors::{StakeError, StakeResult};

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclareCandidacy {
    #[serde_as(as = "Hex")]
    pub pub_key: PublicKey,
    #[serde(default)]
    pub description: Description,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCandidacy {
    /// New consensus key, if rotating.
    #[serde(default)]
    #[serde_as(as = "Option<Hex>")]
    pub pub_key: Option<PublicKey>,
    #[serde(default)]
    pub description: Description,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyCandidacy {
    #[serde_as(as = "Hex")]
    pub candidate_address: Address,
    pub verified: bool,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCandidacyAccount {
    #[serde_as(as = "Hex")]
    pub new_candidate_account: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptCandidacyAccountUpdate {
    pub account_update_request_id: u64,
}

/// Every staking transaction kind, tagged by its `stake/...` kind string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum StakeTx {
    #[serde(rename = "stake/declareCandidacy")]
    DeclareCandidacy(DeclareCandidacy),
    #[serde(rename = "stake/updateCandidacy")]
    UpdateCandidacy(UpdateCandidacy),
    #[serde(rename = "stake/withdrawCandidacy")]
    WithdrawCandidacy,
    #[serde(rename = "stake/verifyCandidacy")]
    VerifyCandidacy(VerifyCandidacy),
    #[serde(rename = "stake/activateCandidacy")]
    ActivateCandidacy,
    #[serde(rename = "stake/deactivateCandidacy")]
    DeactivateCandidacy,
    #[serde(rename = "stake/updateCandidacyAccount")]
    UpdateCandidacyAccount(UpdateCandidacyAccount),
    #[serde(rename = "stake/acceptCandidacyAccountUpdate")]
    AcceptCandidacyAccountUpdate(AcceptCandidacyAccountUpdate),
}

impl StakeTx {
    /// All kind strings this module accepts.
    pub const KINDS: [&'static str; 8] = [
        "stake/declareCandidacy",
        "stake/updateCandidacy",
        "stake/withdrawCandidacy",
        "stake/verifyCandidacy",
        "stake/activateCandidacy",
        "stake/deactivateCandidacy",
        "stake/updateCandidacyAccount",
        "stake/acceptCandidacyAccountUpdate",
    ];

    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StakeTx::DeclareCandidacy(_) => Self::KINDS[0],
            StakeTx::UpdateCandidacy(_) => Self::KINDS[1],
            StakeTx::WithdrawCandidacy => Self::KINDS[2],
            StakeTx::VerifyCandidacy(_) => Self::KINDS[3],
            StakeTx::ActivateCandidacy => Self::KINDS[4],
            StakeTx::DeactivateCandidacy => Self::KINDS[5],
            StakeTx::UpdateCandidacyAccount(_) => Self::KINDS[6],
            StakeTx::AcceptCandidacyAccountUpdate(_) => Self::KINDS[7],
        }
    }

    /// Gas charged on successful delivery. Kinds without a gas parameter are free.
    pub fn gas_limit(&self, params: &Params) -> u64 {
        match self {
            StakeTx::DeclareCandidacy(_) => params.declare_candidacy_gas,
            StakeTx::UpdateCandidacy(_) => params.update_candidacy_gas,
            StakeTx::UpdateCandidacyAccount(_) => params.update_candidate_account_gas,
            StakeTx::AcceptCandidacyAccountUpdate(_) => {
                params.accept_candidate_account_update_request_gas
            }
            StakeTx::WithdrawCandidacy
            | StakeTx::VerifyCandidacy(_)
            | StakeTx::ActivateCandidacy
            | StakeTx::DeactivateCandidacy => 0,
        }
    }
}

/// Block and signer information a staking transaction executes under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    pub chain_id: String,
    pub height: u64,
    pub block_time: i64,
    pub signers: Vec<Address>,
    pub nonce: u64,
}

impl ExecutionContext {
    pub fn new(chain_id: impl Into<String>, height: u64, block_time: i64) -> Self {
        Self {
            chain_id: chain_id.into(),
            height,
            block_time,
            signers: Vec::new(),
            nonce: 0,
        }
    }

    pub fn with_signer(mut self, signer: Address, nonce: u64) -> Self {
        self.signers = vec![signer];
        self.nonce = nonce;
        self
    }

    /// The single signer of the transaction.
    pub fn sender(&self) -> StakeResult<Address> {
        match self.signers.as_slice() {
            [sender] => Ok(*sender),
            _ => Err(StakeError::MissingSignature),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_wire_tag() {
        let tx = StakeTx::ActivateCandidacy;
        let json: serde_json::Value = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["type"], tx.kind());

        let tx = StakeTx::AcceptCandidacyAccountUpdate(AcceptCandidacyAccountUpdate {
            account_update_request_id: 4,
        });
        let json: serde_json::Value = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["type"], tx.kind());
        assert_eq!(json["data"]["account_update_request_id"], 4);
    }

    #[test]
    fn test_decode_update_without_pub_key() {
        let raw = br#"{"type":"stake/updateCandidacy","data":{"description":{"name":"n"}}}"#;
        match StakeTx::decode(raw).unwrap() {
            StakeTx::UpdateCandidacy(u) => {
                assert!(u.pub_key.is_none());
                assert_eq!(u.description.name, "n");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_decode_rejects_unknown_kind() {
        assert!(StakeTx::decode(br#"{"type":"stake/bond","data":{}}"#).is_err());
    }

    #[test]
    fn test_gas_limits() {
        let params = Params::default();
        assert_eq!(StakeTx::WithdrawCandidacy.gas_limit(&params), 0);
        let declare = StakeTx::DeclareCandidacy(DeclareCandidacy {
            pub_key: [1; 32],
            description: Description::default(),
        });
        assert_eq!(declare.gas_limit(&params), params.declare_candidacy_gas);
    }

    #[test]
    fn test_sender_requires_exactly_one_signer() {
        let ctx = ExecutionContext::new("test", 1, 0);
        assert_eq!(ctx.sender(), Err(StakeError::MissingSignature));
        let ctx = ctx.with_signer([3; 20], 0);
        assert_eq!(ctx.sender(), Ok([3; 20]));
    }
}

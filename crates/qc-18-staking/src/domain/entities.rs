//! Staking entities: candidates, account-transfer requests and queued key
//! rotations.

use ripemd::{Digest, Ripemd160};
use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};
use shared_types::{pubkey_address, Address, PublicKey, ValidatorUpdate};

/// Native-store key for the queued [`PubKeyUpdate`] list.
pub const PUBKEY_UPDATES_KEY: &[u8] = &[0x04];

/// Protocol account that receives account-transfer fees.
pub const HOLD_ACCOUNT: Address = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x10, 0x01,
];

/// Voting power assigned to every active candidate under the fixed policy.
pub const DEFAULT_VOTING_POWER: u64 = 1000;

/// 20-byte digest identifying the content of a persisted row.
pub type RowHash = [u8; 20];

fn row_hash<T: Serialize>(row: &T) -> RowHash {
    // Plain structs with string keys always serialize
    let bytes = serde_json::to_vec(row).unwrap_or_default();
    Ripemd160::digest(bytes).into()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidateState {
    Candidate,
    Validator,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Description {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub profile: String,
}

impl Description {
    /// Overwrite fields with the non-empty fields of `update`.
    ///
    /// Returns true when at least one field changed value.
    pub fn merge(&mut self, update: &Description) -> bool {
        let mut changed = false;
        for (field, new) in [
            (&mut self.name, &update.name),
            (&mut self.website, &update.website),
            (&mut self.location, &update.location),
            (&mut self.email, &update.email),
            (&mut self.profile, &update.profile),
        ] {
            if !new.is_empty() && *field != *new {
                *field = new.clone();
                changed = true;
            }
        }
        changed
    }
}

/// An account that has declared intent to become a validator.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: u64,
    #[serde_as(as = "Hex")]
    pub pub_key: PublicKey,
    #[serde_as(as = "Hex")]
    pub owner_address: Address,
    pub voting_power: u64,
    pub description: Description,
    pub verified: bool,
    pub active: bool,
    /// Block time of the declaring block.
    pub created_at: i64,
    pub block_height: u64,
    pub state: CandidateState,
}

impl Candidate {
    /// Consensus-side address derived from the public key.
    pub fn address(&self) -> Address {
        pubkey_address(&self.pub_key)
    }

    pub fn row_hash(&self) -> RowHash {
        row_hash(self)
    }

    pub fn to_validator(&self) -> Validator {
        Validator {
            candidate_id: self.id,
            pub_key: self.pub_key,
            owner_address: self.owner_address,
            voting_power: self.voting_power,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestState {
    Pending,
    Completed,
    /// The candidate changed owner before this request was accepted.
    Cancelled,
}

/// A request to move a candidacy to a new owner account.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountUpdateRequest {
    pub id: u64,
    pub candidate_id: u64,
    #[serde_as(as = "Hex")]
    pub from_address: Address,
    #[serde_as(as = "Hex")]
    pub to_address: Address,
    pub created_block_height: u64,
    pub accepted_block_height: u64,
    pub state: RequestState,
}

impl AccountUpdateRequest {
    pub fn is_pending(&self) -> bool {
        self.state == RequestState::Pending
    }

    pub fn row_hash(&self) -> RowHash {
        row_hash(self)
    }
}

/// A key rotation waiting for the next validator-set reconciliation.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PubKeyUpdate {
    #[serde_as(as = "Hex")]
    pub old_pub_key: PublicKey,
    #[serde_as(as = "Hex")]
    pub new_pub_key: PublicKey,
    pub voting_power: u64,
}

/// First queued rotation away from `pub_key`, if any.
pub fn find_rotation<'a>(updates: &'a [PubKeyUpdate], pub_key: &PublicKey) -> Option<&'a PubKeyUpdate> {
    updates.iter().find(|u| &u.old_pub_key == pub_key)
}

/// A candidate currently holding nonzero voting power. Derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validator {
    pub candidate_id: u64,
    pub pub_key: PublicKey,
    pub owner_address: Address,
    pub voting_power: u64,
}

impl Validator {
    pub fn address(&self) -> Address {
        pubkey_address(&self.pub_key)
    }

    pub fn to_update(&self) -> ValidatorUpdate {
        ValidatorUpdate::new(self.pub_key, self.voting_power)
    }
}

/// A validator listed in the genesis document.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisValidator {
    #[serde_as(as = "Hex")]
    pub pub_key: PublicKey,
    #[serde_as(as = "Hex")]
    pub address: Address,
    pub power: u64,
    #[serde(default, flatten)]
    pub description: Description,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate() -> Candidate {
        Candidate {
            id: 1,
            pub_key: [1; 32],
            owner_address: [2; 20],
            voting_power: 0,
            description: Description {
                name: "alice".into(),
                ..Default::default()
            },
            verified: true,
            active: true,
            created_at: 100,
            block_height: 5,
            state: CandidateState::Candidate,
        }
    }

    #[test]
    fn test_merge_ignores_empty_and_identical_fields() {
        let mut d = candidate().description;
        assert!(!d.merge(&Description::default()));
        assert!(!d.merge(&Description {
            name: "alice".into(),
            ..Default::default()
        }));
        assert!(d.merge(&Description {
            email: "a@b.c".into(),
            ..Default::default()
        }));
        assert_eq!(d.name, "alice");
        assert_eq!(d.email, "a@b.c");
    }

    #[test]
    fn test_row_hash_tracks_content() {
        let a = candidate();
        let mut b = candidate();
        assert_eq!(a.row_hash(), b.row_hash());
        b.active = false;
        assert_ne!(a.row_hash(), b.row_hash());
    }

    #[test]
    fn test_request_state_wire_names() {
        let json = serde_json::to_string(&RequestState::Pending).unwrap();
        assert_eq!(json, "\"PENDING\"");
    }

    #[test]
    fn test_find_rotation() {
        let updates = [PubKeyUpdate {
            old_pub_key: [1; 32],
            new_pub_key: [9; 32],
            voting_power: 1000,
        }];
        assert_eq!(find_rotation(&updates, &[1; 32]).map(|u| u.new_pub_key), Some([9; 32]));
        assert!(find_rotation(&updates, &[2; 32]).is_none());
    }
}

//! Block entity and content-hash cache
//!
//! A block is a node in the hash-linked chain: every block above genesis
//! references exactly one predecessor by `previous_hash`, so the chain is a
//! singly linked, acyclic, append-only sequence traversed backward from any
//! block. Rows are immutable once accepted, except for the lazily computed
//! content hash.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha1::{Digest, Sha1};

use crate::error::{LedgerError, Result};
use crate::raw;

/// Marker derived from a block's joiners/leavers/excluded for one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipEvent {
    Joined,
    Left,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Block {
    pub version: u32,
    pub currency: String,
    pub nonce: u64,
    /// Strictly increasing along the chain; 0 is the genesis block.
    pub number: u64,
    pub timestamp: u64,
    /// Absent only on the genesis block.
    pub previous_hash: Option<String>,
    pub previous_issuer: Option<String>,
    pub members_count: u64,
    pub dividend: Option<u64>,
    pub fees: Option<u64>,
    pub issuer: String,
    pub signature: String,
    pub identities: Vec<String>,
    pub joiners: Vec<String>,
    pub leavers: Vec<String>,
    pub excluded: Vec<String>,
    pub certifications: Vec<String>,
    /// Opaque payload for this core; persisted and exposed, never interpreted.
    pub transactions: Vec<Value>,
    /// Memoized content hash. Purely a performance cache: once set it is
    /// returned unchanged and never re-validated against the fields, so
    /// callers must treat a block as content-immutable before hashing it.
    #[serde(skip)]
    hash: OnceCell<String>,
}

/// Entries in the membership sequences are either a bare public key or an
/// inline document whose first `:`-separated field is the key.
fn member_key(entry: &str) -> &str {
    entry.split(':').next().unwrap_or(entry)
}

impl Block {
    /// Uppercase hex SHA-1 of the unsigned raw form, memoized on first use.
    pub fn hash(&self) -> &str {
        self.hash
            .get_or_init(|| {
                let digest = Sha1::digest(raw::to_raw_unsigned(self).as_bytes());
                hex::encode_upper(digest)
            })
            .as_str()
    }

    /// Hash already memoized on this entity, if any. Does not compute.
    pub fn cached_hash(&self) -> Option<&str> {
        self.hash.get().map(|h| h.as_str())
    }

    /// Seeds the memoized hash, e.g. when rehydrating a stored block.
    pub fn with_stored_hash(mut self, hash: String) -> Self {
        self.hash = OnceCell::with_value(hash);
        self
    }

    /// The hash and signature preimage.
    pub fn raw_unsigned(&self) -> String {
        raw::to_raw_unsigned(self)
    }

    pub fn raw_signed(&self) -> String {
        raw::to_raw_signed(self)
    }

    /// Membership marker this block carries for `member`, if any.
    ///
    /// A block may not carry both a join and a leave marker for the same
    /// identity; that would break backward presence resolution, so it is
    /// reported as an inconsistency instead of being resolved by ordering.
    pub fn membership_event(&self, member: &str) -> Result<Option<MembershipEvent>> {
        let joined = self.joiners.iter().any(|entry| member_key(entry) == member);
        let left = self
            .leavers
            .iter()
            .chain(self.excluded.iter())
            .any(|entry| member_key(entry) == member);
        match (joined, left) {
            (true, true) => Err(LedgerError::Inconsistent(format!(
                "Block #{} carries both a join and a leave marker for {}",
                self.number, member
            ))),
            (true, false) => Ok(Some(MembershipEvent::Joined)),
            (false, true) => Ok(Some(MembershipEvent::Left)),
            (false, false) => Ok(None),
        }
    }

    /// "+key" / "-key" markers for every membership-affecting entry.
    pub fn members_changes(&self) -> Vec<String> {
        let mut changes = Vec::new();
        for entry in &self.joiners {
            changes.push(format!("+{}", member_key(entry)));
        }
        for entry in self.leavers.iter().chain(self.excluded.iter()) {
            changes.push(format!("-{}", member_key(entry)));
        }
        changes
    }

    pub fn quick_description(&self) -> String {
        format!(
            "#{} ({} newcomers, {} certifications)",
            self.number,
            self.identities.len(),
            self.certifications.len()
        )
    }

    /// JSON projection for external exposure: numeric fields as integers,
    /// missing linkage and monetary fields as null, and internal-only
    /// sub-fields (`raw`, `certifiers`, `hash`) stripped from transactions.
    pub fn to_view(&self) -> Value {
        let transactions: Vec<Value> = self
            .transactions
            .iter()
            .map(|tx| match tx {
                Value::Object(map) => {
                    let stripped: Map<String, Value> = map
                        .iter()
                        .filter(|(key, _)| !matches!(key.as_str(), "raw" | "certifiers" | "hash"))
                        .map(|(key, value)| (key.clone(), value.clone()))
                        .collect();
                    Value::Object(stripped)
                }
                other => other.clone(),
            })
            .collect();

        json!({
            "version": self.version,
            "nonce": self.nonce,
            "number": self.number,
            "timestamp": self.timestamp,
            "membersCount": self.members_count,
            "currency": self.currency,
            "issuer": self.issuer,
            "signature": self.signature,
            "hash": self.cached_hash().unwrap_or(""),
            "previousHash": self.previous_hash,
            "previousIssuer": self.previous_issuer,
            "dividend": self.dividend,
            "fees": self.fees,
            "membersChanges": self.members_changes(),
            "identities": self.identities,
            "joiners": self.joiners,
            "leavers": self.leavers,
            "excluded": self.excluded,
            "certifications": self.certifications,
            "transactions": transactions,
        })
    }
}

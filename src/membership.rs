//! Membership claim types and boundary validation
//!
//! A claim is a signed assertion by an identity to join or leave the member
//! set. Its primary key is `(issuer, signature)`: who made it and the exact
//! bytes they signed. Re-submitting the same signed bytes is an upsert, never
//! a duplicate row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LedgerError;

/// Direction of a membership claim: joining or leaving the member set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MembershipType {
    In,
    Out,
}

impl MembershipType {
    /// Canonical wire/storage form, always uppercase.
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipType::In => "IN",
            MembershipType::Out => "OUT",
        }
    }
}

impl fmt::Display for MembershipType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MembershipType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "IN" => Ok(MembershipType::In),
            "OUT" => Ok(MembershipType::Out),
            other => Err(LedgerError::ValidationFailure(format!(
                "Unrecognized membership type: {}",
                other
            ))),
        }
    }
}

/// Lifecycle state of a claim with respect to the canonical chain.
///
/// `Pending` covers both "announced, not yet included" and "reverted by a
/// reorganization". Rows are never deleted, only flipped between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimState {
    Pending,
    Confirmed,
}

impl ClaimState {
    /// Storage form: the `written` boolean column.
    pub fn is_written(&self) -> bool {
        matches!(self, ClaimState::Confirmed)
    }

    pub fn from_written(written: bool) -> Self {
        if written {
            ClaimState::Confirmed
        } else {
            ClaimState::Pending
        }
    }
}

/// A single membership assertion, as stored in the `membership` table.
///
/// Field names follow the storage schema: `number` is the per-issuer sequence
/// counter, `block_number`/`block_hash` the chain tip the claim was built
/// against, `block` the block where the underlying identity was created,
/// `fpr` the identity fingerprint and `idty_hash` the identity hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipClaim {
    pub membership: MembershipType,
    pub issuer: String,
    pub number: u64,
    pub block_number: Option<u64>,
    pub block_hash: String,
    pub userid: String,
    pub certts: DateTime<Utc>,
    pub block: Option<u64>,
    pub fpr: Option<String>,
    pub idty_hash: Option<String>,
    pub state: ClaimState,
    pub signature: String,
}

impl MembershipClaim {
    /// Primary key of the claim.
    pub fn key(&self) -> (&str, &str) {
        (&self.issuer, &self.signature)
    }

    /// Boundary validation, performed before any persistence.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.issuer.is_empty() {
            return Err(LedgerError::ValidationFailure(
                "Membership claim without issuer".to_string(),
            ));
        }
        if self.signature.is_empty() {
            return Err(LedgerError::ValidationFailure(
                "Membership claim without signature".to_string(),
            ));
        }
        if self.userid.is_empty() {
            return Err(LedgerError::ValidationFailure(
                "Membership claim without userid".to_string(),
            ));
        }
        Ok(())
    }
}

//! Backward presence resolution
//!
//! Membership status is reconstructed by replaying immutable chain history
//! backward rather than maintained in a separate materialized index: an O(1)
//! lookup is traded for an O(distance to last event) walk per query.
//! Correctness depends on chain immutability and the single-predecessor
//! invariant enforced by the chain query surface; callers wanting a
//! consistent snapshot across several calls must pin a `(number, hash)`
//! starting point instead of re-reading the current tip.

use log::debug;

use crate::block::MembershipEvent;
use crate::chain::ChainQuery;
use crate::error::{LedgerError, Result};

/// Kind of the last membership event recorded for an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LastStatus {
    /// The last event was a join.
    Joined,
    /// The last event was a leave or exclusion.
    Left,
    /// The identity was never observed.
    NeverSeen,
}

/// Outcome of a bounded presence walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceStatus {
    Member,
    NotMember,
    /// The walk hit its floor before finding any event.
    Unknown,
}

/// Searches blocks `up_to_number..=0` for the most recent membership event
/// concerning `member`. A limit above the stored tip is clamped to it, and
/// an empty chain means the identity was never observed; neither is an
/// error.
pub fn last_status_of_member(
    chain: &dyn ChainQuery,
    member: &str,
    up_to_number: u64,
) -> Result<LastStatus> {
    let tip = match chain.current() {
        Ok(block) => block.number,
        Err(LedgerError::NotFound(_)) => return Ok(LastStatus::NeverSeen),
        Err(err) => return Err(err),
    };
    let mut number = up_to_number.min(tip);
    loop {
        let block = chain.by_number(number)?;
        match block.membership_event(member)? {
            Some(MembershipEvent::Joined) => return Ok(LastStatus::Joined),
            Some(MembershipEvent::Left) => return Ok(LastStatus::Left),
            None => {}
        }
        if number == 0 {
            return Ok(LastStatus::NeverSeen);
        }
        number -= 1;
    }
}

/// Whether `member` is active as of block `up_to_number` on the linear view.
pub fn is_member(chain: &dyn ChainQuery, member: &str, up_to_number: u64) -> Result<bool> {
    Ok(last_status_of_member(chain, member, up_to_number)? == LastStatus::Joined)
}

/// Walks backward from the block at `(number, hash)` following
/// `previous_hash` links until a join or leave marker for `member` is found,
/// or genesis is reached. With a `floor`, the walk stops at that block number
/// and reports [`PresenceStatus::Unknown`] instead of scanning further down.
pub fn status_at(
    chain: &dyn ChainQuery,
    member: &str,
    number: u64,
    hash: &str,
    floor: Option<u64>,
) -> Result<PresenceStatus> {
    let mut block = chain.by_number_and_hash(number, hash)?;
    loop {
        match block.membership_event(member)? {
            Some(MembershipEvent::Joined) => return Ok(PresenceStatus::Member),
            Some(MembershipEvent::Left) => return Ok(PresenceStatus::NotMember),
            None => {}
        }
        if block.number == 0 {
            // Genesis reached with no occurrence found.
            return Ok(PresenceStatus::NotMember);
        }
        if floor.is_some_and(|floor| block.number <= floor) {
            return Ok(PresenceStatus::Unknown);
        }
        let previous_hash = block.previous_hash.clone().ok_or_else(|| {
            LedgerError::Inconsistent(format!(
                "Block #{} has no previous hash",
                block.number
            ))
        })?;
        debug!("presence walk: {} to {}", block.number, block.number - 1);
        block = chain.by_number_and_hash(block.number - 1, &previous_hash)?;
    }
}

/// Whether `member` is active as of the block identified by `(number, hash)`.
pub fn is_member_at(
    chain: &dyn ChainQuery,
    member: &str,
    number: u64,
    hash: &str,
) -> Result<bool> {
    Ok(status_at(chain, member, number, hash, None)? == PresenceStatus::Member)
}

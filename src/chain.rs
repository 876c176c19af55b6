//! Chain query surface
//!
//! Read-only lookups over stored blocks. These four primitives are the only
//! ones backward presence resolution may use; it never reads the membership
//! ledger. A lookup matching more than one stored block for a `(number)` or
//! `(number, hash)` slot violates the single-predecessor invariant and is
//! surfaced as an inconsistency, never silently resolved to either match.

use crate::block::Block;
use crate::error::{LedgerError, Result};

pub trait ChainQuery {
    /// Highest-number block of the chain. `NotFound` on an empty chain.
    fn current(&self) -> Result<Block>;

    /// Block at `number`. `NotFound` on zero matches, `Inconsistent` on more
    /// than one.
    fn by_number(&self, number: u64) -> Result<Block>;

    /// Block at `(number, hash)`, same failure policy as [`by_number`].
    ///
    /// [`by_number`]: ChainQuery::by_number
    fn by_number_and_hash(&self, number: u64, hash: &str) -> Result<Block>;

    /// Most recent block produced by `issuer`, if any.
    fn last_by_issuer(&self, issuer: &str) -> Result<Option<Block>>;

    /// Number the next accepted block should carry; 0 on an empty chain.
    fn next_number(&self) -> Result<u64> {
        match self.current() {
            Ok(block) => Ok(block.number + 1),
            Err(LedgerError::NotFound(_)) => Ok(0),
            Err(err) => Err(err),
        }
    }
}

/// Simple in-memory chain useful for tests and ephemeral runs.
#[derive(Clone, Default)]
pub struct InMemoryChain {
    blocks: Vec<Block>,
}

impl InMemoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }
}

impl ChainQuery for InMemoryChain {
    fn current(&self) -> Result<Block> {
        self.blocks
            .iter()
            .max_by_key(|block| block.number)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound("No current block".to_string()))
    }

    fn by_number(&self, number: u64) -> Result<Block> {
        let matches: Vec<&Block> = self
            .blocks
            .iter()
            .filter(|block| block.number == number)
            .collect();
        single_match(matches, &format!("block #{}", number))
    }

    fn by_number_and_hash(&self, number: u64, hash: &str) -> Result<Block> {
        let matches: Vec<&Block> = self
            .blocks
            .iter()
            .filter(|block| block.number == number && block.hash() == hash)
            .collect();
        single_match(matches, &format!("block #{}-{}", number, hash))
    }

    fn last_by_issuer(&self, issuer: &str) -> Result<Option<Block>> {
        Ok(self
            .blocks
            .iter()
            .filter(|block| block.issuer == issuer)
            .max_by_key(|block| block.number)
            .cloned())
    }
}

fn single_match(matches: Vec<&Block>, what: &str) -> Result<Block> {
    match matches.len() {
        0 => Err(LedgerError::NotFound(format!("No {}", what))),
        1 => Ok(matches[0].clone()),
        count => Err(LedgerError::Inconsistent(format!(
            "{} blocks stored for {}",
            count, what
        ))),
    }
}

//! Database persistence layer for wotledger
//!
//! One shared SQLite store backs both the hash-linked chain and the
//! membership ledger. Chain rows are immutable once accepted; membership
//! rows are exclusively owned by the ledger operations below and flip
//! between pending and written in response to block-lifecycle events.
//! Mutating operations are row-level atomic upserts keyed on
//! `(issuer, signature)`; batch ingestion runs in a scoped transaction so
//! partial writes are never observable.

use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::{params, Connection, ToSql};
use std::sync::{Mutex, MutexGuard};

use crate::block::Block;
use crate::chain::ChainQuery;
use crate::error::{LedgerError, Result};
use crate::membership::{ClaimState, MembershipClaim, MembershipType};

// The `block` table deliberately carries no unique constraint on
// `(number, hash)`: a duplicate slot is chain corruption that the query
// surface must detect and report, not a state the schema can rule out.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS block (
    number INTEGER NOT NULL,
    hash VARCHAR(40) NOT NULL,
    version INTEGER NOT NULL,
    currency VARCHAR(50) NOT NULL,
    nonce INTEGER NOT NULL,
    timestamp INTEGER NOT NULL,
    previousHash VARCHAR(40),
    previousIssuer VARCHAR(50),
    membersCount INTEGER NOT NULL,
    dividend INTEGER,
    fees INTEGER,
    issuer VARCHAR(50) NOT NULL,
    signature VARCHAR(100),
    identities TEXT NOT NULL,
    joiners TEXT NOT NULL,
    leavers TEXT NOT NULL,
    excluded TEXT NOT NULL,
    certifications TEXT NOT NULL,
    transactions TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_block_number ON block (number);
CREATE INDEX IF NOT EXISTS idx_block_issuer ON block (issuer);
CREATE TABLE IF NOT EXISTS membership (
    membership CHAR(2) NOT NULL,
    issuer VARCHAR(50) NOT NULL,
    number INTEGER NOT NULL,
    blockNumber INTEGER,
    blockHash VARCHAR(40) NOT NULL,
    userid VARCHAR(255) NOT NULL,
    certts DATETIME NOT NULL,
    block INTEGER,
    fpr VARCHAR(50),
    idtyHash VARCHAR(40),
    written BOOLEAN NOT NULL,
    signature VARCHAR(50),
    PRIMARY KEY (issuer,signature)
);
CREATE INDEX IF NOT EXISTS idx_membership_idtyHash ON membership (idtyHash);
CREATE INDEX IF NOT EXISTS idx_membership_membership ON membership (membership);
CREATE INDEX IF NOT EXISTS idx_membership_written ON membership (written);
";

const BLOCK_COLUMNS: &str = "number, hash, version, currency, nonce, timestamp, \
    previousHash, previousIssuer, membersCount, dividend, fees, issuer, signature, \
    identities, joiners, leavers, excluded, certifications, transactions";

const MS_COLUMNS: &str = "membership, issuer, number, blockNumber, blockHash, \
    userid, certts, block, fpr, idtyHash, written, signature";

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &str) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Database { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| LedgerError::StorageFailure("Mutex poisoned".to_string()))
    }

    // ------------------------------------------------------------------
    // Chain
    // ------------------------------------------------------------------

    /// Persists an accepted block. The memoized content hash is computed
    /// here if the acceptance path has not already done so.
    pub fn save_block(&self, block: &Block) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO block (number, hash, version, currency, nonce, timestamp, \
             previousHash, previousIssuer, membersCount, dividend, fees, issuer, signature, \
             identities, joiners, leavers, excluded, certifications, transactions) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
            params![
                block.number as i64,
                block.hash(),
                block.version as i64,
                block.currency,
                block.nonce as i64,
                block.timestamp as i64,
                block.previous_hash,
                block.previous_issuer,
                block.members_count as i64,
                block.dividend.map(|v| v as i64),
                block.fees.map(|v| v as i64),
                block.issuer,
                block.signature,
                serde_json::to_string(&block.identities)?,
                serde_json::to_string(&block.joiners)?,
                serde_json::to_string(&block.leavers)?,
                serde_json::to_string(&block.excluded)?,
                serde_json::to_string(&block.certifications)?,
                serde_json::to_string(&block.transactions)?,
            ],
        )?;
        debug!("saved block {}", block.quick_description());
        Ok(())
    }

    fn blocks_where(&self, suffix: &str, params: &[&dyn ToSql]) -> Result<Vec<Block>> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM block {}", BLOCK_COLUMNS, suffix);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params, |row| row_to_block(row))?;
        let mut blocks = Vec::new();
        for row in rows {
            blocks.push(row?);
        }
        Ok(blocks)
    }

    fn single_block(mut blocks: Vec<Block>, what: &str) -> Result<Block> {
        match blocks.len() {
            0 => Err(LedgerError::NotFound(format!("No {}", what))),
            1 => Ok(blocks.remove(0)),
            count => Err(LedgerError::Inconsistent(format!(
                "{} blocks stored for {}",
                count, what
            ))),
        }
    }

    pub fn current(&self) -> Result<Block> {
        let blocks = self.blocks_where("ORDER BY number DESC LIMIT 1", params![])?;
        blocks
            .into_iter()
            .next()
            .ok_or_else(|| LedgerError::NotFound("No current block".to_string()))
    }

    pub fn by_number(&self, number: u64) -> Result<Block> {
        let blocks = self.blocks_where("WHERE number = ?1 LIMIT 2", params![number as i64])?;
        Self::single_block(blocks, &format!("block #{}", number))
    }

    pub fn by_number_and_hash(&self, number: u64, hash: &str) -> Result<Block> {
        let blocks = self.blocks_where(
            "WHERE number = ?1 AND hash = ?2 LIMIT 2",
            params![number as i64, hash],
        )?;
        Self::single_block(blocks, &format!("block #{}-{}", number, hash))
    }

    pub fn last_by_issuer(&self, issuer: &str) -> Result<Option<Block>> {
        let blocks = self.blocks_where(
            "WHERE issuer = ?1 ORDER BY number DESC LIMIT 1",
            params![issuer],
        )?;
        Ok(blocks.into_iter().next())
    }

    // ------------------------------------------------------------------
    // Membership ledger
    // ------------------------------------------------------------------

    /// Records an announced claim: state is forced to pending and the row is
    /// upserted by `(issuer, signature)`.
    pub fn save_pending_membership(&self, claim: &MembershipClaim) -> Result<()> {
        claim.validate()?;
        let mut claim = claim.clone();
        claim.state = ClaimState::Pending;
        let conn = self.lock()?;
        upsert_claim(&conn, &claim)
    }

    /// Records a claim actually included in an accepted block: the type is
    /// forced to `membership` and the state to confirmed.
    pub fn save_official_ms(
        &self,
        membership: MembershipType,
        claim: &MembershipClaim,
    ) -> Result<()> {
        claim.validate()?;
        let mut claim = claim.clone();
        claim.membership = membership;
        claim.state = ClaimState::Confirmed;
        let conn = self.lock()?;
        upsert_claim(&conn, &claim)
    }

    /// Reverts a claim to pending when its including block leaves the
    /// canonical chain. Unknown keys are a no-op: the revert is idempotent.
    pub fn unwrite_ms(&self, claim: &MembershipClaim) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE membership SET written = 0 WHERE issuer = ?1 AND signature = ?2",
            params![claim.issuer, claim.signature],
        )?;
        Ok(())
    }

    /// Bulk-ingests claims for chain replay or import. All rows become
    /// visible or none; an empty input touches no storage at all.
    pub fn update_batch_of_memberships(&self, claims: &[MembershipClaim]) -> Result<()> {
        if claims.is_empty() {
            return Ok(());
        }
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        for claim in claims {
            claim.validate()?;
            upsert_claim(&tx, claim)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn claims_where(&self, suffix: &str, params: &[&dyn ToSql]) -> Result<Vec<MembershipClaim>> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM membership {}", MS_COLUMNS, suffix);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params, |row| row_to_claim(row))?;
        let mut claims = Vec::new();
        for row in rows {
            claims.push(row?);
        }
        Ok(claims)
    }

    /// Pending join claims, candidates for the next block.
    pub fn get_pending_in(&self) -> Result<Vec<MembershipClaim>> {
        self.claims_where("WHERE membership = 'IN' AND written = 0", params![])
    }

    /// Pending leave claims, candidates for the next block.
    pub fn get_pending_out(&self) -> Result<Vec<MembershipClaim>> {
        self.claims_where("WHERE membership = 'OUT' AND written = 0", params![])
    }

    /// Pending join claims referencing one identity.
    pub fn get_pending_in_of_target(&self, idty_hash: &str) -> Result<Vec<MembershipClaim>> {
        self.claims_where(
            "WHERE idtyHash = ?1 AND membership = 'IN' AND written = 0",
            params![idty_hash],
        )
    }

    /// Full claim history, pending and confirmed, for one issuer.
    pub fn get_memberships_of_issuer(&self, issuer: &str) -> Result<Vec<MembershipClaim>> {
        self.claims_where("WHERE issuer = ?1", params![issuer])
    }

    /// Point lookup by primary key.
    pub fn get_membership_of_issuer(
        &self,
        issuer: &str,
        signature: &str,
    ) -> Result<Option<MembershipClaim>> {
        let claims = self.claims_where(
            "WHERE issuer = ?1 AND signature = ?2",
            params![issuer, signature],
        )?;
        Ok(claims.into_iter().next())
    }
}

impl ChainQuery for Database {
    fn current(&self) -> Result<Block> {
        Database::current(self)
    }

    fn by_number(&self, number: u64) -> Result<Block> {
        Database::by_number(self, number)
    }

    fn by_number_and_hash(&self, number: u64, hash: &str) -> Result<Block> {
        Database::by_number_and_hash(self, number, hash)
    }

    fn last_by_issuer(&self, issuer: &str) -> Result<Option<Block>> {
        Database::last_by_issuer(self, issuer)
    }
}

fn upsert_claim(conn: &Connection, claim: &MembershipClaim) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO membership (membership, issuer, number, blockNumber, \
         blockHash, userid, certts, block, fpr, idtyHash, written, signature) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            claim.membership.as_str(),
            claim.issuer,
            claim.number as i64,
            claim.block_number.map(|v| v as i64),
            claim.block_hash,
            claim.userid,
            claim.certts.to_rfc3339(),
            claim.block.map(|v| v as i64),
            claim.fpr,
            claim.idty_hash,
            claim.state.is_written(),
            claim.signature,
        ],
    )?;
    Ok(())
}

fn row_to_claim(row: &rusqlite::Row) -> rusqlite::Result<MembershipClaim> {
    let membership: String = row.get(0)?;
    let membership = membership
        .parse::<MembershipType>()
        .map_err(|_| rusqlite::Error::InvalidQuery)?;
    let certts: String = row.get(6)?;
    let certts = DateTime::parse_from_rfc3339(&certts)
        .map_err(|_| rusqlite::Error::InvalidQuery)?
        .with_timezone(&Utc);
    let written: bool = row.get(10)?;
    Ok(MembershipClaim {
        membership,
        issuer: row.get(1)?,
        number: row.get::<_, i64>(2)? as u64,
        block_number: row.get::<_, Option<i64>>(3)?.map(|v| v as u64),
        block_hash: row.get(4)?,
        userid: row.get(5)?,
        certts,
        block: row.get::<_, Option<i64>>(7)?.map(|v| v as u64),
        fpr: row.get(8)?,
        idty_hash: row.get(9)?,
        state: ClaimState::from_written(written),
        signature: row.get(11)?,
    })
}

fn row_to_block(row: &rusqlite::Row) -> rusqlite::Result<Block> {
    let mut block = Block::default();
    block.number = row.get::<_, i64>(0)? as u64;
    let stored_hash: String = row.get(1)?;
    block.version = row.get::<_, i64>(2)? as u32;
    block.currency = row.get(3)?;
    block.nonce = row.get::<_, i64>(4)? as u64;
    block.timestamp = row.get::<_, i64>(5)? as u64;
    block.previous_hash = row.get(6)?;
    block.previous_issuer = row.get(7)?;
    block.members_count = row.get::<_, i64>(8)? as u64;
    block.dividend = row.get::<_, Option<i64>>(9)?.map(|v| v as u64);
    block.fees = row.get::<_, Option<i64>>(10)?.map(|v| v as u64);
    block.issuer = row.get(11)?;
    block.signature = row.get(12)?;
    block.identities = decode_array(row.get(13)?)?;
    block.joiners = decode_array(row.get(14)?)?;
    block.leavers = decode_array(row.get(15)?)?;
    block.excluded = decode_array(row.get(16)?)?;
    block.certifications = decode_array(row.get(17)?)?;
    let transactions: String = row.get(18)?;
    block.transactions =
        serde_json::from_str(&transactions).map_err(|_| rusqlite::Error::InvalidQuery)?;
    Ok(block.with_stored_hash(stored_hash))
}

fn decode_array(json: String) -> rusqlite::Result<Vec<String>> {
    serde_json::from_str(&json).map_err(|_| rusqlite::Error::InvalidQuery)
}

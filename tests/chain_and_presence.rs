//! Integration tests for chain queries and backward presence resolution

use serde_json::json;
use wotledger::block::Block;
use wotledger::chain::ChainQuery;
use wotledger::error::LedgerError;
use wotledger::persistence::Database;
use wotledger::presence::{
    is_member, is_member_at, last_status_of_member, status_at, LastStatus, PresenceStatus,
};

fn open_db() -> Database {
    let _ = env_logger::builder().is_test(true).try_init();
    Database::open_in_memory().expect("in-memory database")
}

fn block(number: u64, issuer: &str, previous_hash: Option<String>) -> Block {
    let mut block = Block::default();
    block.version = 1;
    block.currency = "testnet".to_string();
    block.nonce = number * 10;
    block.number = number;
    block.timestamp = 1_457_000_000 + number;
    block.previous_hash = previous_hash;
    block.members_count = 3;
    block.issuer = issuer.to_string();
    block.signature = format!("sig{}", number);
    block
}

/// Stores blocks 0..=3 linked by hash: X joins at block 1 and leaves at
/// block 3. Returns the block hashes by number.
fn seed_chain(db: &Database) -> Vec<String> {
    let mut hashes = Vec::new();
    let mut previous: Option<String> = None;
    for number in 0..=3u64 {
        let issuer = if number % 2 == 0 { "issuerA" } else { "issuerB" };
        let mut block = block(number, issuer, previous.clone());
        if number == 1 {
            block.joiners = vec!["X:sigX:0:h:1:xavier".to_string()];
        }
        if number == 3 {
            block.leavers = vec!["X:sigX:0:h:3:xavier".to_string()];
        }
        let hash = block.hash().to_string();
        db.save_block(&block).unwrap();
        previous = Some(hash.clone());
        hashes.push(hash);
    }
    hashes
}

#[test]
fn current_tracks_the_highest_accepted_block() {
    let db = open_db();
    assert!(matches!(db.current(), Err(LedgerError::NotFound(_))));

    seed_chain(&db);
    let tip = db.current().unwrap();
    assert_eq!(tip.number, 3);
    assert_eq!(db.next_number().unwrap(), 4);
}

#[test]
fn lookups_by_number_and_pair_enforce_the_failure_policy() {
    let db = open_db();
    let hashes = seed_chain(&db);

    assert_eq!(db.by_number(2).unwrap().number, 2);
    assert_eq!(db.by_number_and_hash(2, &hashes[2]).unwrap().number, 2);

    assert!(matches!(db.by_number(9), Err(LedgerError::NotFound(_))));
    assert!(matches!(
        db.by_number_and_hash(2, "DEADBEEF"),
        Err(LedgerError::NotFound(_))
    ));
}

#[test]
fn duplicate_slots_raise_inconsistent_not_either_match() {
    let db = open_db();
    let hashes = seed_chain(&db);

    // Same (number, hash) stored twice: corruption the queries must report.
    let duplicate = db.by_number_and_hash(2, &hashes[2]).unwrap();
    db.save_block(&duplicate).unwrap();

    assert!(matches!(db.by_number(2), Err(LedgerError::Inconsistent(_))));
    assert!(matches!(
        db.by_number_and_hash(2, &hashes[2]),
        Err(LedgerError::Inconsistent(_))
    ));
}

#[test]
fn last_by_issuer_returns_the_most_recent_block() {
    let db = open_db();
    seed_chain(&db);

    assert_eq!(db.last_by_issuer("issuerA").unwrap().unwrap().number, 2);
    assert_eq!(db.last_by_issuer("issuerB").unwrap().unwrap().number, 3);
    assert!(db.last_by_issuer("nobody").unwrap().is_none());
}

#[test]
fn presence_is_replayed_from_chain_history() {
    let db = open_db();
    let hashes = seed_chain(&db);

    assert!(is_member_at(&db, "X", 1, &hashes[1]).unwrap());
    // No event at block 2: status inherited from block 1.
    assert!(is_member_at(&db, "X", 2, &hashes[2]).unwrap());
    assert!(!is_member_at(&db, "X", 3, &hashes[3]).unwrap());
    assert!(!is_member_at(&db, "Y", 3, &hashes[3]).unwrap());
}

#[test]
fn genesis_bounds_the_backward_walk() {
    let db = open_db();
    let hashes = seed_chain(&db);
    assert!(!is_member_at(&db, "X", 0, &hashes[0]).unwrap());

    let db = open_db();
    let mut genesis = block(0, "issuerA", None);
    genesis.joiners = vec!["founder".to_string()];
    let hash = genesis.hash().to_string();
    db.save_block(&genesis).unwrap();
    assert!(is_member_at(&db, "founder", 0, &hash).unwrap());
}

#[test]
fn bounded_walk_reports_unknown_at_its_floor() {
    let db = open_db();
    let hashes = seed_chain(&db);

    let status = status_at(&db, "X", 2, &hashes[2], Some(2)).unwrap();
    assert_eq!(status, PresenceStatus::Unknown);
    let status = status_at(&db, "X", 2, &hashes[2], Some(1)).unwrap();
    assert_eq!(status, PresenceStatus::Member);
}

#[test]
fn last_status_generalizes_the_membership_question() {
    let db = open_db();
    seed_chain(&db);

    assert_eq!(last_status_of_member(&db, "X", 2).unwrap(), LastStatus::Joined);
    assert_eq!(last_status_of_member(&db, "X", 3).unwrap(), LastStatus::Left);
    assert_eq!(last_status_of_member(&db, "Y", 3).unwrap(), LastStatus::NeverSeen);
    assert!(is_member(&db, "X", 2).unwrap());
    assert!(!is_member(&db, "Y", 3).unwrap());

    // A limit beyond the stored tip is clamped, not an error.
    assert_eq!(last_status_of_member(&db, "X", 10).unwrap(), LastStatus::Left);
}

#[test]
fn linear_search_tolerates_an_empty_chain() {
    let db = open_db();
    assert_eq!(last_status_of_member(&db, "X", 4).unwrap(), LastStatus::NeverSeen);
    assert!(!is_member(&db, "X", 4).unwrap());
}

#[test]
fn stored_blocks_keep_their_content_hash() {
    let db = open_db();
    let mut block = block(0, "issuerA", None);
    block.transactions = vec![json!({"issuers": ["keyA"], "raw": "RAW", "comment": "c"})];
    let hash = block.hash().to_string();
    db.save_block(&block).unwrap();

    let loaded = db.by_number(0).unwrap();
    assert_eq!(loaded.hash(), hash);
    assert_eq!(loaded.raw_unsigned(), block.raw_unsigned());

    // The external view never leaks transaction internals.
    let view = loaded.to_view();
    assert!(view["transactions"][0].get("raw").is_none());
    assert_eq!(view["transactions"][0]["comment"], json!("c"));
    assert_eq!(view["hash"], json!(hash));
}

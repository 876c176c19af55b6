//! Canonical raw rendering of blocks
//!
//! The raw form is the hash and signature preimage: a newline-delimited
//! rendering of a block's fields in a fixed order, independent of storage or
//! insertion order. Two blocks with identical logical content must render to
//! identical bytes, since chain linkage via `previousHash` depends on it.
//! Field presence is enforced by the `Block` type itself, so rendering is
//! total and side-effect free.

use crate::block::Block;

/// Renders the signed content of a block, without its signature.
pub fn to_raw_unsigned(block: &Block) -> String {
    let mut raw = String::new();
    raw.push_str(&format!("Version: {}\n", block.version));
    raw.push_str("Type: Block\n");
    raw.push_str(&format!("Currency: {}\n", block.currency));
    raw.push_str(&format!("Nonce: {}\n", block.nonce));
    raw.push_str(&format!("Number: {}\n", block.number));
    raw.push_str(&format!("Timestamp: {}\n", block.timestamp));
    if let Some(dividend) = block.dividend {
        raw.push_str(&format!("UniversalDividend: {}\n", dividend));
    }
    if let Some(fees) = block.fees {
        raw.push_str(&format!("Fees: {}\n", fees));
    }
    raw.push_str(&format!("Issuer: {}\n", block.issuer));
    // Linkage fields are absent only on the genesis block.
    if let Some(previous_hash) = &block.previous_hash {
        raw.push_str(&format!("PreviousHash: {}\n", previous_hash));
    }
    if let Some(previous_issuer) = &block.previous_issuer {
        raw.push_str(&format!("PreviousIssuer: {}\n", previous_issuer));
    }
    raw.push_str(&format!("MembersCount: {}\n", block.members_count));
    section(&mut raw, "Identities", &block.identities);
    section(&mut raw, "Joiners", &block.joiners);
    section(&mut raw, "Leavers", &block.leavers);
    section(&mut raw, "Excluded", &block.excluded);
    section(&mut raw, "Certifications", &block.certifications);
    raw.push_str("Transactions:\n");
    for tx in &block.transactions {
        // Opaque payload; compact JSON participates in the preimage as-is.
        raw.push_str(&tx.to_string());
        raw.push('\n');
    }
    raw
}

/// Renders the signed form: the unsigned content followed by the signature.
pub fn to_raw_signed(block: &Block) -> String {
    let mut raw = to_raw_unsigned(block);
    raw.push_str(&block.signature);
    raw.push('\n');
    raw
}

fn section(raw: &mut String, name: &str, entries: &[String]) {
    raw.push_str(name);
    raw.push_str(":\n");
    for entry in entries {
        raw.push_str(entry);
        raw.push('\n');
    }
}

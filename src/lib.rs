//! wotledger - Identity-membership consensus core for a Web-of-Trust currency ledger
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Chain
//! - [`block`] - Block entity, content-hash cache and JSON projection
//! - [`raw`] - Canonical raw rendering, the hash and signature preimage
//! - [`chain`] - Read-only chain query surface
//! - [`presence`] - Backward presence resolution over chain history
//!
//! ## Membership
//! - [`membership`] - Claim types and boundary validation
//!
//! ## State Management
//! - [`persistence`] - Database layer (SQLite): chain store and membership ledger
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Chain
// ============================================================================
pub mod block;
pub mod chain;
pub mod presence;
pub mod raw;

// ============================================================================
// Membership
// ============================================================================
pub mod membership;

// ============================================================================
// State Management
// ============================================================================
pub mod persistence;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;

// crates/keyfed-ledger-sqlite/src/lib.rs
// ============================================================================
// Module: Keyfed SQLite Ledger Library
// Description: Durable batch tag ledger backed by SQLite.
// Purpose: Expose the SQLite ledger implementation and its configuration.
// Dependencies: crate::store
// ============================================================================

//! ## Overview
//! `keyfed-ledger-sqlite` provides the durable [`keyfed_core::BatchTagLedger`]
//! used in production deployments: one row per federation direction,
//! committed atomically after each acknowledged batch.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteJournalMode;
pub use store::SqliteLedger;
pub use store::SqliteLedgerConfig;
pub use store::SqliteLedgerError;
pub use store::SqliteSyncMode;

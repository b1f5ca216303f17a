//! Append-only audit trail
//!
//! Every committed row change is recorded as one JSON line in `audit.log`,
//! with the row's state before and after the commit. The trail is written
//! after the snapshot is durable, so it can lag the ledger but never lead it.

mod diff;
mod entry;
mod logger;

pub use diff::generate_diff;
pub use entry::{AuditEntry, EntityType, Operation};
pub use logger::AuditLogger;

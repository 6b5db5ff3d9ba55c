//! Domain model for reminders and time counters.
//!
//! # Responsibility
//! - Define canonical data structures used by scheduling and storage.
//! - Keep validation rules next to the records they protect.
//!
//! # Invariants
//! - Every record is identified by a stable UUID.
//! - Reminder deletion is a soft-delete tombstone, not a hard delete.

pub mod counter;
pub mod reminder;

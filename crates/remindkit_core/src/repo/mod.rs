//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the reminder store and preference map contracts.
//! - Isolate SQLite query details from scheduling and services.
//!
//! # Invariants
//! - Repository writes enforce `Reminder::validate()` before persistence.
//! - Repository APIs return semantic errors (`NotFound`, `AlreadyExists`) in
//!   addition to DB transport errors.

pub mod preference_repo;
pub mod reminder_repo;

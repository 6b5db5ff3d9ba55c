//! Reminder scheduling: recurrence math, per-tick delivery, poll loop.
//!
//! # Responsibility
//! - Compute next occurrences for repeat rules (`recurrence`).
//! - Fire owed reminders exactly once per occurrence per poller (`coordinator`).
//! - Own the foreground poll loop lifecycle (`scheduler`).
//!
//! # Invariants
//! - Every tick is idempotent: re-running it at the same instant changes nothing.
//! - Background wake-ups are best-effort; the foreground scheduler is the
//!   reliable delivery path while it runs.

pub mod clock;
pub mod coordinator;
pub mod recurrence;
pub mod scheduler;

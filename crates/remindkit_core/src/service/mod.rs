//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store/repository calls into use-case level APIs.
//! - Keep CLI and host layers decoupled from storage details.

pub mod counter_service;
pub mod reminder_service;

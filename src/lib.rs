//! Coordination engine for donated blood supply.
//!
//! The crate matches stored blood inventory units and eligible donors against
//! transfusion requests under ABO/Rh compatibility rules, ranks candidates by
//! expiry urgency and great-circle distance, and keeps the inventory state
//! machine race-free while a background sweeper reclaims expired stock. The
//! HTTP surface, authentication, and persistence mechanics live in the
//! embedding application; this crate owns only the engine.

pub mod config;
pub mod error;
pub mod matching;
pub mod telemetry;

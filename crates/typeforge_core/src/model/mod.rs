//! Runtime object model assembled by the factory.
//!
//! # Responsibility
//! - Define dynamic values, configuration records, built classes and
//!   instances.
//!
//! # Invariants
//! - Every built class is identified by a stable `ClassId`.
//! - Class identity is handle identity; ids are for diagnostics.

pub mod class;
pub mod config;
pub mod value;

//! Domain models for natal.
//!
//! These are the core types shared across all crates.

pub mod audit;
pub mod birth;
pub mod correction;
pub mod mother;
pub mod newborn;
pub mod role;
pub mod user;

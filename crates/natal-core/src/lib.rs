//! Natal Core — domain models, capabilities, field encryption, the
//! authorization guard and repository traits for the obstetrics record
//! system.

pub mod authz;
pub mod capability;
pub mod crypto;
pub mod env;
pub mod error;
pub mod models;
pub mod repository;
pub mod validation;

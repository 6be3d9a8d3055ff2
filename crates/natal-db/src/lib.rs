//! Natal Database — SurrealDB connection management, schema and
//! repository implementations of the `natal-core` traits.

mod connection;
mod error;
pub mod repository;
mod schema;
mod seed;

pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use schema::{latest_version, run_migrations};
pub use seed::{default_roles, seed_default_roles};

//! Natal Auth: configuration, password authentication, the audit trail
//! and user/role administration.

pub mod admin;
pub mod config;
pub mod error;
pub mod password;
pub mod service;
pub mod trail;

pub use admin::{AdminService, NewUser};
pub use config::{AuthConfig, Environment, ProtectionConfig};
pub use error::AuthError;
pub use service::{AuthService, LoginInput, TwoFactorEvent};
pub use trail::{AuditEntry, AuditQuery, AuditTrail, AuditView};

//! Natal Records: capability-gated, ownership-scoped and audited access
//! to admissions, births, newborns and correction annexes.

pub mod input;
pub mod service;
pub mod view;

pub use input::{AdmitMother, AnnexCorrection, MotherChanges, RegisterBirth, RegisterNewborn};
pub use service::RecordsService;
pub use view::{CorrectionView, MotherView, NewbornView};

//! Correction annex domain model.
//!
//! A correction records an amendment next to an existing record. The
//! original record is never rewritten.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CorrectedEntity {
    Birth,
    Mother,
    Newborn,
}

impl CorrectedEntity {
    /// Table holding the corrected record.
    pub fn table(self) -> &'static str {
        match self {
            CorrectedEntity::Birth => "birth",
            CorrectedEntity::Mother => "mother",
            CorrectedEntity::Newborn => "newborn",
        }
    }
}

impl fmt::Display for CorrectedEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

impl FromStr for CorrectedEntity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "birth" => Ok(CorrectedEntity::Birth),
            "mother" => Ok(CorrectedEntity::Mother),
            "newborn" => Ok(CorrectedEntity::Newborn),
            other => Err(format!("unknown corrected entity: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CorrectionTarget {
    pub entity: CorrectedEntity,
    pub id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Correction {
    pub id: Uuid,
    pub target: CorrectionTarget,
    pub field_name: String,
    /// Ciphertext snapshot of the value before the amendment.
    pub previous_value_encrypted: Option<String>,
    /// Ciphertext of the amended value.
    pub new_value_encrypted: Option<String>,
    pub justification: String,
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCorrection {
    pub target: CorrectionTarget,
    pub field_name: String,
    pub previous_value_encrypted: Option<String>,
    pub new_value_encrypted: Option<String>,
    pub justification: String,
    pub author_id: Uuid,
}

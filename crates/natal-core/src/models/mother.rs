//! Mother (admission) domain model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::SealedField;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum HealthInsurance {
    Fonasa,
    Isapre,
    Particular,
    Ninguna,
}

impl HealthInsurance {
    pub fn as_str(self) -> &'static str {
        match self {
            HealthInsurance::Fonasa => "FONASA",
            HealthInsurance::Isapre => "ISAPRE",
            HealthInsurance::Particular => "PARTICULAR",
            HealthInsurance::Ninguna => "NINGUNA",
        }
    }
}

impl fmt::Display for HealthInsurance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HealthInsurance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FONASA" => Ok(HealthInsurance::Fonasa),
            "ISAPRE" => Ok(HealthInsurance::Isapre),
            "PARTICULAR" => Ok(HealthInsurance::Particular),
            "NINGUNA" => Ok(HealthInsurance::Ninguna),
            other => Err(format!("unknown health insurance: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mother {
    pub id: Uuid,
    pub clinical_record_number: Option<String>,
    pub address: Option<String>,
    pub rut: SealedField,
    pub full_name: SealedField,
    pub phone: SealedField,
    pub birth_date: NaiveDate,
    pub nationality: Option<String>,
    pub indigenous: bool,
    pub health_insurance: Option<HealthInsurance>,
    pub medical_history: Option<String>,
    pub registered_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Persistence input. Sensitive fields arrive already sealed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMother {
    pub clinical_record_number: Option<String>,
    pub address: Option<String>,
    pub rut: SealedField,
    pub full_name: SealedField,
    pub phone: SealedField,
    pub birth_date: NaiveDate,
    pub nationality: Option<String>,
    pub indigenous: bool,
    pub health_insurance: Option<HealthInsurance>,
    pub medical_history: Option<String>,
    pub registered_by: Uuid,
}

/// A present sealed field rewrites both of its columns.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateMother {
    pub clinical_record_number: Option<String>,
    pub address: Option<String>,
    pub rut: Option<SealedField>,
    pub full_name: Option<SealedField>,
    pub phone: Option<SealedField>,
    pub nationality: Option<String>,
    pub indigenous: Option<bool>,
    pub health_insurance: Option<HealthInsurance>,
    pub medical_history: Option<String>,
}

//! Birth record (parto) domain model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DeliveryType {
    Eutocic,
    ElectiveCesarean,
    EmergencyCesarean,
    Forceps,
    Vacuum,
}

impl DeliveryType {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryType::Eutocic => "Eutocic",
            DeliveryType::ElectiveCesarean => "ElectiveCesarean",
            DeliveryType::EmergencyCesarean => "EmergencyCesarean",
            DeliveryType::Forceps => "Forceps",
            DeliveryType::Vacuum => "Vacuum",
        }
    }
}

impl fmt::Display for DeliveryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Eutocic" => Ok(DeliveryType::Eutocic),
            "ElectiveCesarean" => Ok(DeliveryType::ElectiveCesarean),
            "EmergencyCesarean" => Ok(DeliveryType::EmergencyCesarean),
            "Forceps" => Ok(DeliveryType::Forceps),
            "Vacuum" => Ok(DeliveryType::Vacuum),
            other => Err(format!("unknown delivery type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Anesthesia {
    Epidural,
    Spinal,
    General,
    Other,
    None,
}

impl Anesthesia {
    pub fn as_str(self) -> &'static str {
        match self {
            Anesthesia::Epidural => "Epidural",
            Anesthesia::Spinal => "Spinal",
            Anesthesia::General => "General",
            Anesthesia::Other => "Other",
            Anesthesia::None => "None",
        }
    }
}

impl FromStr for Anesthesia {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Epidural" => Ok(Anesthesia::Epidural),
            "Spinal" => Ok(Anesthesia::Spinal),
            "General" => Ok(Anesthesia::General),
            "Other" => Ok(Anesthesia::Other),
            "None" => Ok(Anesthesia::None),
            other => Err(format!("unknown anesthesia: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Birth {
    pub id: Uuid,
    pub mother_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub gestational_weeks: Option<u32>,
    pub delivery_type: DeliveryType,
    pub anesthesia: Option<Anesthesia>,
    pub partogram: Option<serde_json::Value>,
    pub epicrisis: Option<serde_json::Value>,
    /// Author; the ownership key for row-level scoping.
    pub registered_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Birth {
    pub fn has_epicrisis(&self) -> bool {
        match &self.epicrisis {
            Some(serde_json::Value::Object(map)) => !map.is_empty(),
            Some(serde_json::Value::Null) | None => false,
            Some(_) => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBirth {
    pub mother_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub gestational_weeks: Option<u32>,
    pub delivery_type: DeliveryType,
    pub anesthesia: Option<Anesthesia>,
    pub registered_by: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateBirth {
    pub occurred_at: Option<DateTime<Utc>>,
    pub gestational_weeks: Option<u32>,
    pub delivery_type: Option<DeliveryType>,
    pub anesthesia: Option<Anesthesia>,
}

/// Which clinical JSON document of a birth record is being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClinicalDocument {
    Partogram,
    Epicrisis,
}

impl ClinicalDocument {
    pub fn column(self) -> &'static str {
        match self {
            ClinicalDocument::Partogram => "partogram",
            ClinicalDocument::Epicrisis => "epicrisis",
        }
    }
}

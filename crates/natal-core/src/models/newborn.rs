//! Newborn (recién nacido) domain model.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::SealedField;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NewbornStatus {
    Alive,
    Stillborn,
}

impl NewbornStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            NewbornStatus::Alive => "Alive",
            NewbornStatus::Stillborn => "Stillborn",
        }
    }
}

impl FromStr for NewbornStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Alive" => Ok(NewbornStatus::Alive),
            "Stillborn" => Ok(NewbornStatus::Stillborn),
            other => Err(format!("unknown newborn status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Sex {
    Male,
    Female,
    Undetermined,
}

impl Sex {
    pub fn as_str(self) -> &'static str {
        match self {
            Sex::Male => "Male",
            Sex::Female => "Female",
            Sex::Undetermined => "Undetermined",
        }
    }
}

impl FromStr for Sex {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Male" => Ok(Sex::Male),
            "Female" => Ok(Sex::Female),
            "Undetermined" => Ok(Sex::Undetermined),
            other => Err(format!("unknown sex: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Newborn {
    pub id: Uuid,
    pub birth_id: Uuid,
    pub provisional_rut: SealedField,
    pub status: NewbornStatus,
    pub sex: Option<Sex>,
    pub weight_grams: Option<u32>,
    pub length_cm: Option<f64>,
    pub apgar_1_min: Option<u32>,
    pub apgar_5_min: Option<u32>,
    pub vitamin_k: bool,
    pub eye_prophylaxis: bool,
    pub registered_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNewborn {
    pub birth_id: Uuid,
    pub provisional_rut: SealedField,
    pub status: NewbornStatus,
    pub sex: Option<Sex>,
    pub weight_grams: Option<u32>,
    pub length_cm: Option<f64>,
    pub apgar_1_min: Option<u32>,
    pub apgar_5_min: Option<u32>,
    pub vitamin_k: bool,
    pub eye_prophylaxis: bool,
    pub registered_by: Uuid,
}

//! Plaintext inputs accepted by [`RecordsService`](crate::RecordsService).
//!
//! Sensitive values arrive here in clear and are sealed by the service
//! before anything reaches a repository.

use chrono::{DateTime, NaiveDate, Utc};
use natal_core::models::birth::{Anesthesia, DeliveryType};
use natal_core::models::correction::CorrectionTarget;
use natal_core::models::mother::HealthInsurance;
use natal_core::models::newborn::{NewbornStatus, Sex};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct AdmitMother {
    /// Required: the hash of the RUT is the uniqueness key.
    pub rut: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub birth_date: NaiveDate,
    pub clinical_record_number: Option<String>,
    pub address: Option<String>,
    pub nationality: Option<String>,
    pub indigenous: bool,
    pub health_insurance: Option<HealthInsurance>,
    pub medical_history: Option<String>,
}

/// Fields left as `None` are unchanged.
#[derive(Debug, Clone, Default)]
pub struct MotherChanges {
    pub rut: Option<String>,
    pub full_name: Option<String>,
    /// `Some("")` clears the phone.
    pub phone: Option<String>,
    pub clinical_record_number: Option<String>,
    pub address: Option<String>,
    pub nationality: Option<String>,
    pub indigenous: Option<bool>,
    pub health_insurance: Option<HealthInsurance>,
    pub medical_history: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RegisterBirth {
    pub mother_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub gestational_weeks: Option<u32>,
    pub delivery_type: DeliveryType,
    pub anesthesia: Option<Anesthesia>,
}

#[derive(Debug, Clone)]
pub struct RegisterNewborn {
    pub birth_id: Uuid,
    pub provisional_rut: Option<String>,
    pub status: NewbornStatus,
    pub sex: Option<Sex>,
    pub weight_grams: Option<u32>,
    pub length_cm: Option<f64>,
    pub apgar_1_min: Option<u32>,
    pub apgar_5_min: Option<u32>,
    pub vitamin_k: bool,
    pub eye_prophylaxis: bool,
}

#[derive(Debug, Clone)]
pub struct AnnexCorrection {
    pub target: CorrectionTarget,
    pub field_name: String,
    pub previous_value: Option<String>,
    pub new_value: Option<String>,
    pub justification: String,
}

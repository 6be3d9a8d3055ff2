//! Decrypted read models.
//!
//! A sealed value that no longer decrypts shows up as `None`; it never
//! fails the read.

use chrono::{DateTime, NaiveDate, Utc};
use natal_core::crypto::CryptoService;
use natal_core::models::correction::{Correction, CorrectionTarget};
use natal_core::models::mother::{HealthInsurance, Mother};
use natal_core::models::newborn::{Newborn, NewbornStatus, Sex};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct MotherView {
    pub id: Uuid,
    pub rut: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub birth_date: NaiveDate,
    pub clinical_record_number: Option<String>,
    pub address: Option<String>,
    pub nationality: Option<String>,
    pub indigenous: bool,
    pub health_insurance: Option<HealthInsurance>,
    pub medical_history: Option<String>,
    pub registered_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MotherView {
    pub fn open(mother: Mother, crypto: &CryptoService) -> Self {
        Self {
            id: mother.id,
            rut: mother.rut.open(crypto),
            full_name: mother.full_name.open(crypto),
            phone: mother.phone.open(crypto),
            birth_date: mother.birth_date,
            clinical_record_number: mother.clinical_record_number,
            address: mother.address,
            nationality: mother.nationality,
            indigenous: mother.indigenous,
            health_insurance: mother.health_insurance,
            medical_history: mother.medical_history,
            registered_by: mother.registered_by,
            created_at: mother.created_at,
            updated_at: mother.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewbornView {
    pub id: Uuid,
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
    pub registered_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl NewbornView {
    pub fn open(newborn: Newborn, crypto: &CryptoService) -> Self {
        Self {
            id: newborn.id,
            birth_id: newborn.birth_id,
            provisional_rut: newborn.provisional_rut.open(crypto),
            status: newborn.status,
            sex: newborn.sex,
            weight_grams: newborn.weight_grams,
            length_cm: newborn.length_cm,
            apgar_1_min: newborn.apgar_1_min,
            apgar_5_min: newborn.apgar_5_min,
            vitamin_k: newborn.vitamin_k,
            eye_prophylaxis: newborn.eye_prophylaxis,
            registered_by: newborn.registered_by,
            created_at: newborn.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CorrectionView {
    pub id: Uuid,
    pub target: CorrectionTarget,
    pub field_name: String,
    pub previous_value: Option<String>,
    pub new_value: Option<String>,
    pub justification: String,
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl CorrectionView {
    pub fn open(correction: Correction, crypto: &CryptoService) -> Self {
        let open = |c: Option<String>| c.as_deref().and_then(|v| crypto.decrypt(v));
        Self {
            id: correction.id,
            target: correction.target,
            field_name: correction.field_name,
            previous_value: open(correction.previous_value_encrypted),
            new_value: open(correction.new_value_encrypted),
            justification: correction.justification,
            author_id: correction.author_id,
            created_at: correction.created_at,
        }
    }
}

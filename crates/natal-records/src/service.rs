//! Clinical record service: admissions, births, newborns, corrections and
//! report-export authorization.
//!
//! Every operation checks a capability first, every birth or newborn
//! access goes through the principal's [`RecordScope`], and every
//! successful mutation writes exactly one audit record.

use chrono::Utc;
use natal_auth::trail::{AuditEntry, AuditTrail};
use natal_core::authz::{AuthorizationGuard, DashboardSegregation, RecordScope};
use natal_core::capability::Capability;
use natal_core::crypto::{CryptoService, SealedField, lookup_hash};
use natal_core::error::{NatalError, NatalResult};
use natal_core::models::birth::{Birth, ClinicalDocument, CreateBirth, UpdateBirth};
use natal_core::models::correction::{CorrectedEntity, CorrectionTarget, CreateCorrection};
use natal_core::models::mother::{CreateMother, UpdateMother};
use natal_core::models::newborn::CreateNewborn;
use natal_core::models::user::Principal;
use natal_core::repository::{
    AuditLogRepository, BirthRepository, CorrectionRepository, MotherRepository,
    NewbornRepository, PaginatedResult, Pagination,
};
use natal_core::validation;
use tracing::info;
use uuid::Uuid;

use crate::input::{AdmitMother, AnnexCorrection, MotherChanges, RegisterBirth, RegisterNewborn};
use crate::view::{CorrectionView, MotherView, NewbornView};

/// Either of these lets clinical staff look up and read admissions.
const ADMISSION_READERS: [Capability; 2] =
    [Capability::CreateAdmission, Capability::EditAdmission];

fn non_blank(field: &str, value: &str) -> NatalResult<()> {
    if value.trim().is_empty() {
        return Err(NatalError::validation(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Partograms and epicrises are structured documents, never bare scalars.
fn clinical_document(document: ClinicalDocument, content: &serde_json::Value) -> NatalResult<()> {
    if content.is_object() || content.is_array() {
        Ok(())
    } else {
        Err(NatalError::validation(format!(
            "{} must be a JSON object or array",
            document.column()
        )))
    }
}

fn missing_reference(entity: &str, id: Uuid) -> impl FnOnce(NatalError) -> NatalError {
    let entity = entity.to_string();
    move |e| match e {
        NatalError::NotFound { .. } => NatalError::Referential {
            message: format!("{entity} {id} does not exist"),
        },
        other => other,
    }
}

pub struct RecordsService<M, B, N, C, A>
where
    M: MotherRepository,
    B: BirthRepository,
    N: NewbornRepository,
    C: CorrectionRepository,
    A: AuditLogRepository,
{
    mothers: M,
    births: B,
    newborns: N,
    corrections: C,
    trail: AuditTrail<A>,
    crypto: CryptoService,
}

impl<M, B, N, C, A> RecordsService<M, B, N, C, A>
where
    M: MotherRepository,
    B: BirthRepository,
    N: NewbornRepository,
    C: CorrectionRepository,
    A: AuditLogRepository,
{
    pub fn new(
        mothers: M,
        births: B,
        newborns: N,
        corrections: C,
        trail: AuditTrail<A>,
        crypto: CryptoService,
    ) -> Self {
        Self {
            mothers,
            births,
            newborns,
            corrections,
            trail,
            crypto,
        }
    }

    async fn authorize(
        &self,
        principal: &Principal,
        capability: Capability,
        ip_address: Option<&str>,
    ) -> NatalResult<()> {
        self.trail.authorize(principal, capability, ip_address).await
    }

    /// Dashboard capabilities count only through [`DashboardSegregation`],
    /// so the system-admin class never reads admissions, whatever flags
    /// its role carries.
    async fn authorize_mother_read(
        &self,
        principal: &Principal,
        ip_address: Option<&str>,
    ) -> NatalResult<()> {
        let view = DashboardSegregation::resolve(principal);
        if view.allows_clinical() || view.allows_administrative() {
            return Ok(());
        }

        let system_admin = Capability::SYSTEM_ADMIN
            .into_iter()
            .any(|c| AuthorizationGuard::allowed(principal, c));
        if !system_admin
            && ADMISSION_READERS
                .into_iter()
                .any(|c| AuthorizationGuard::allowed(principal, c))
        {
            return Ok(());
        }

        self.trail
            .denied(&principal.user, Capability::ViewClinicalDashboard, ip_address)
            .await;
        Err(NatalError::AuthorizationDenied {
            capability: Capability::ViewClinicalDashboard,
            reason: "patient data is not visible to this user".into(),
        })
    }

    fn seal(&self, value: Option<&str>) -> NatalResult<SealedField> {
        Ok(SealedField::seal(&self.crypto, value.map(str::trim))?)
    }

    // -----------------------------------------------------------------
    // Mothers
    // -----------------------------------------------------------------

    pub async fn admit_mother(
        &self,
        principal: &Principal,
        input: AdmitMother,
        ip_address: Option<&str>,
    ) -> NatalResult<MotherView> {
        self.authorize(principal, Capability::CreateAdmission, ip_address)
            .await?;

        non_blank("RUT", &input.rut)?;
        non_blank("full name", &input.full_name)?;
        validation::mother_birth_date(input.birth_date, Utc::now().date_naive())?;

        let mother = self
            .mothers
            .create(CreateMother {
                clinical_record_number: input.clinical_record_number,
                address: input.address,
                rut: self.seal(Some(&input.rut))?,
                full_name: self.seal(Some(&input.full_name))?,
                phone: self.seal(input.phone.as_deref())?,
                birth_date: input.birth_date,
                nationality: input.nationality,
                indigenous: input.indigenous,
                health_insurance: input.health_insurance,
                medical_history: input.medical_history,
                registered_by: principal.id(),
            })
            .await?;

        info!(mother_id = %mother.id, user = %principal.username(), "mother admitted");
        self.trail
            .record_best_effort(
                &principal.user,
                AuditEntry::new("CREATE_MOTHER")
                    .on("mother", mother.id)
                    .detail(format!(
                        "clinical record: {}",
                        mother.clinical_record_number.as_deref().unwrap_or("-")
                    ))
                    .ip(ip_address),
            )
            .await;

        Ok(MotherView::open(mother, &self.crypto))
    }

    /// Changed sensitive fields are re-sealed as a whole: ciphertext and
    /// hash are rewritten together.
    pub async fn update_mother(
        &self,
        principal: &Principal,
        mother_id: Uuid,
        changes: MotherChanges,
        ip_address: Option<&str>,
    ) -> NatalResult<MotherView> {
        self.authorize(principal, Capability::EditAdmission, ip_address)
            .await?;

        if let Some(rut) = &changes.rut {
            non_blank("RUT", rut)?;
        }
        if let Some(name) = &changes.full_name {
            non_blank("full name", name)?;
        }

        let mut changed: Vec<&str> = Vec::new();
        let mut seal_if = |field: &'static str, value: Option<&str>| -> NatalResult<_> {
            match value {
                Some(v) => {
                    changed.push(field);
                    Ok(Some(SealedField::seal(&self.crypto, Some(v.trim()))?))
                }
                None => Ok(None),
            }
        };
        let rut = seal_if("rut", changes.rut.as_deref())?;
        let full_name = seal_if("full_name", changes.full_name.as_deref())?;
        let phone = seal_if("phone", changes.phone.as_deref())?;

        for (field, present) in [
            ("clinical_record_number", changes.clinical_record_number.is_some()),
            ("address", changes.address.is_some()),
            ("nationality", changes.nationality.is_some()),
            ("indigenous", changes.indigenous.is_some()),
            ("health_insurance", changes.health_insurance.is_some()),
            ("medical_history", changes.medical_history.is_some()),
        ] {
            if present {
                changed.push(field);
            }
        }

        let mother = self
            .mothers
            .update(
                mother_id,
                UpdateMother {
                    clinical_record_number: changes.clinical_record_number,
                    address: changes.address,
                    rut,
                    full_name,
                    phone,
                    nationality: changes.nationality,
                    indigenous: changes.indigenous,
                    health_insurance: changes.health_insurance,
                    medical_history: changes.medical_history,
                },
            )
            .await?;

        self.trail
            .record_best_effort(
                &principal.user,
                AuditEntry::new("UPDATE_MOTHER")
                    .on("mother", mother.id)
                    .detail(format!("fields: {}", changed.join(", ")))
                    .ip(ip_address),
            )
            .await;

        Ok(MotherView::open(mother, &self.crypto))
    }

    /// Exact match on the RUT as entered; formatting differences do not
    /// match.
    pub async fn find_mother_by_rut(
        &self,
        principal: &Principal,
        rut: &str,
        ip_address: Option<&str>,
    ) -> NatalResult<Option<MotherView>> {
        self.authorize_mother_read(principal, ip_address).await?;

        let Some(hash) = lookup_hash(&self.crypto, rut.trim()) else {
            return Ok(None);
        };
        match self.mothers.get_by_rut_hash(&hash).await {
            Ok(mother) => Ok(Some(MotherView::open(mother, &self.crypto))),
            Err(NatalError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn get_mother(
        &self,
        principal: &Principal,
        mother_id: Uuid,
        ip_address: Option<&str>,
    ) -> NatalResult<MotherView> {
        self.authorize_mother_read(principal, ip_address).await?;
        let mother = self.mothers.get_by_id(mother_id).await?;
        Ok(MotherView::open(mother, &self.crypto))
    }

    pub async fn list_mothers(
        &self,
        principal: &Principal,
        pagination: Pagination,
        ip_address: Option<&str>,
    ) -> NatalResult<PaginatedResult<MotherView>> {
        self.authorize_mother_read(principal, ip_address).await?;
        let page = self.mothers.list(pagination).await?;
        Ok(PaginatedResult {
            items: page
                .items
                .into_iter()
                .map(|m| MotherView::open(m, &self.crypto))
                .collect(),
            total: page.total,
            offset: page.offset,
            limit: page.limit,
        })
    }

    // -----------------------------------------------------------------
    // Births
    // -----------------------------------------------------------------

    pub async fn register_birth(
        &self,
        principal: &Principal,
        input: RegisterBirth,
        ip_address: Option<&str>,
    ) -> NatalResult<Birth> {
        self.authorize(principal, Capability::CreateBirth, ip_address)
            .await?;

        validation::gestational_weeks(input.gestational_weeks)?;
        if input.occurred_at > Utc::now() {
            return Err(NatalError::validation("birth time cannot be in the future"));
        }
        self.mothers
            .get_by_id(input.mother_id)
            .await
            .map_err(missing_reference("mother", input.mother_id))?;

        let birth = self
            .births
            .create(CreateBirth {
                mother_id: input.mother_id,
                occurred_at: input.occurred_at,
                gestational_weeks: input.gestational_weeks,
                delivery_type: input.delivery_type,
                anesthesia: input.anesthesia,
                registered_by: principal.id(),
            })
            .await?;

        info!(birth_id = %birth.id, user = %principal.username(), "birth registered");
        self.trail
            .record_best_effort(
                &principal.user,
                AuditEntry::new("CREATE_BIRTH")
                    .on("birth", birth.id)
                    .detail(format!(
                        "delivery: {}, mother: {}",
                        birth.delivery_type, birth.mother_id
                    ))
                    .ip(ip_address),
            )
            .await;

        Ok(birth)
    }

    pub async fn update_birth(
        &self,
        principal: &Principal,
        birth_id: Uuid,
        changes: UpdateBirth,
        ip_address: Option<&str>,
    ) -> NatalResult<Birth> {
        self.authorize(principal, Capability::EditBirth, ip_address)
            .await?;

        validation::gestational_weeks(changes.gestational_weeks)?;
        if changes.occurred_at.is_some_and(|t| t > Utc::now()) {
            return Err(NatalError::validation("birth time cannot be in the future"));
        }

        let scope = AuthorizationGuard::scope(principal);
        let birth = self.births.update(scope, birth_id, changes).await?;

        self.trail
            .record_best_effort(
                &principal.user,
                AuditEntry::new("UPDATE_BIRTH")
                    .on("birth", birth.id)
                    .ip(ip_address),
            )
            .await;
        Ok(birth)
    }

    pub async fn record_partogram(
        &self,
        principal: &Principal,
        birth_id: Uuid,
        content: serde_json::Value,
        ip_address: Option<&str>,
    ) -> NatalResult<Birth> {
        self.write_document(
            principal,
            birth_id,
            ClinicalDocument::Partogram,
            content,
            ip_address,
        )
        .await
    }

    pub async fn record_epicrisis(
        &self,
        principal: &Principal,
        birth_id: Uuid,
        content: serde_json::Value,
        ip_address: Option<&str>,
    ) -> NatalResult<Birth> {
        self.write_document(
            principal,
            birth_id,
            ClinicalDocument::Epicrisis,
            content,
            ip_address,
        )
        .await
    }

    async fn write_document(
        &self,
        principal: &Principal,
        birth_id: Uuid,
        document: ClinicalDocument,
        content: serde_json::Value,
        ip_address: Option<&str>,
    ) -> NatalResult<Birth> {
        let (capability, action) = match document {
            ClinicalDocument::Partogram => (Capability::EditPartogram, "UPDATE_PARTOGRAM"),
            ClinicalDocument::Epicrisis => (Capability::EditEpicrisis, "UPDATE_EPICRISIS"),
        };
        self.authorize(principal, capability, ip_address).await?;
        clinical_document(document, &content)?;

        let scope = AuthorizationGuard::scope(principal);
        let birth = self
            .births
            .set_document(scope, birth_id, document, content)
            .await?;

        self.trail
            .record_best_effort(
                &principal.user,
                AuditEntry::new(action).on("birth", birth.id).ip(ip_address),
            )
            .await;
        Ok(birth)
    }

    /// Out-of-scope births are reported as not found.
    pub async fn get_birth(&self, principal: &Principal, birth_id: Uuid) -> NatalResult<Birth> {
        self.births
            .get(AuthorizationGuard::scope(principal), birth_id)
            .await
    }

    pub async fn list_births(
        &self,
        principal: &Principal,
        pagination: Pagination,
    ) -> NatalResult<PaginatedResult<Birth>> {
        self.births
            .list(AuthorizationGuard::scope(principal), pagination)
            .await
    }

    /// Permanently remove a birth and its newborns. Refused while any
    /// correction is annexed to either, since the annex would be orphaned.
    pub async fn delete_birth(
        &self,
        principal: &Principal,
        birth_id: Uuid,
        ip_address: Option<&str>,
    ) -> NatalResult<()> {
        self.authorize(principal, Capability::HardDelete, ip_address)
            .await?;

        let birth = self.births.get(RecordScope::All, birth_id).await?;
        let mut annexed = self
            .corrections
            .count_for(CorrectionTarget {
                entity: CorrectedEntity::Birth,
                id: birth.id,
            })
            .await?;
        let newborns = self.newborns.list_by_birth(RecordScope::All, birth.id).await?;
        for newborn in &newborns {
            annexed += self
                .corrections
                .count_for(CorrectionTarget {
                    entity: CorrectedEntity::Newborn,
                    id: newborn.id,
                })
                .await?;
        }
        if annexed > 0 {
            return Err(NatalError::Referential {
                message: format!("birth {birth_id} has {annexed} annexed correction(s)"),
            });
        }

        self.births.delete(birth.id).await?;

        info!(%birth_id, user = %principal.username(), "birth deleted");
        self.trail
            .record_best_effort(
                &principal.user,
                AuditEntry::new("DELETE_BIRTH")
                    .on("birth", birth_id)
                    .detail(format!("newborns removed: {}", newborns.len()))
                    .ip(ip_address),
            )
            .await;
        Ok(())
    }

    // -----------------------------------------------------------------
    // Newborns
    // -----------------------------------------------------------------

    pub async fn register_newborn(
        &self,
        principal: &Principal,
        input: RegisterNewborn,
        ip_address: Option<&str>,
    ) -> NatalResult<NewbornView> {
        self.authorize(principal, Capability::CreateBirth, ip_address)
            .await?;

        validation::newborn_weight(input.weight_grams)?;
        validation::newborn_length(input.length_cm)?;
        validation::apgar(input.apgar_1_min)?;
        validation::apgar(input.apgar_5_min)?;

        // The parent birth must be within the caller's scope.
        let scope = AuthorizationGuard::scope(principal);
        let birth = self.births.get(scope, input.birth_id).await?;

        let newborn = self
            .newborns
            .create(CreateNewborn {
                birth_id: birth.id,
                provisional_rut: self.seal(input.provisional_rut.as_deref())?,
                status: input.status,
                sex: input.sex,
                weight_grams: input.weight_grams,
                length_cm: input.length_cm,
                apgar_1_min: input.apgar_1_min,
                apgar_5_min: input.apgar_5_min,
                vitamin_k: input.vitamin_k,
                eye_prophylaxis: input.eye_prophylaxis,
                registered_by: principal.id(),
            })
            .await?;

        self.trail
            .record_best_effort(
                &principal.user,
                AuditEntry::new("CREATE_NEWBORN")
                    .on("newborn", newborn.id)
                    .detail(format!("birth: {}", birth.id))
                    .ip(ip_address),
            )
            .await;

        Ok(NewbornView::open(newborn, &self.crypto))
    }

    pub async fn list_newborns(
        &self,
        principal: &Principal,
        birth_id: Uuid,
    ) -> NatalResult<Vec<NewbornView>> {
        let newborns = self
            .newborns
            .list_by_birth(AuthorizationGuard::scope(principal), birth_id)
            .await?;
        Ok(newborns
            .into_iter()
            .map(|n| NewbornView::open(n, &self.crypto))
            .collect())
    }

    // -----------------------------------------------------------------
    // Corrections
    // -----------------------------------------------------------------

    /// The target must exist and be visible to the caller.
    async fn ensure_target(
        &self,
        principal: &Principal,
        target: CorrectionTarget,
        ip_address: Option<&str>,
    ) -> NatalResult<()> {
        let scope = AuthorizationGuard::scope(principal);
        match target.entity {
            CorrectedEntity::Mother => {
                self.authorize_mother_read(principal, ip_address).await?;
                self.mothers.get_by_id(target.id).await.map(|_| ())
            }
            CorrectedEntity::Birth => self.births.get(scope, target.id).await.map(|_| ()),
            CorrectedEntity::Newborn => self.newborns.get(scope, target.id).await.map(|_| ()),
        }
    }

    /// Annex an amendment to a record. The record itself is not written.
    pub async fn annex_correction(
        &self,
        principal: &Principal,
        input: AnnexCorrection,
        ip_address: Option<&str>,
    ) -> NatalResult<CorrectionView> {
        self.authorize(principal, Capability::AnnexCorrection, ip_address)
            .await?;

        validation::justification(&input.justification)?;
        non_blank("field name", &input.field_name)?;
        self.ensure_target(principal, input.target, ip_address)
            .await?;

        let seal = |v: Option<&str>| -> NatalResult<Option<String>> {
            match v {
                Some(v) => Ok(self.crypto.encrypt(v)?),
                None => Ok(None),
            }
        };

        let correction = self
            .corrections
            .create(CreateCorrection {
                target: input.target,
                field_name: input.field_name.trim().to_string(),
                previous_value_encrypted: seal(input.previous_value.as_deref())?,
                new_value_encrypted: seal(input.new_value.as_deref())?,
                justification: input.justification.trim().to_string(),
                author_id: principal.id(),
            })
            .await?;

        self.trail
            .record_best_effort(
                &principal.user,
                AuditEntry::new("CREATE_CORRECTION")
                    .on(input.target.entity.table(), input.target.id)
                    .detail(format!(
                        "correction: {}, field: {}",
                        correction.id, correction.field_name
                    ))
                    .ip(ip_address),
            )
            .await;

        Ok(CorrectionView::open(correction, &self.crypto))
    }

    /// Corrections annexed to a visible record, oldest first.
    pub async fn list_corrections(
        &self,
        principal: &Principal,
        target: CorrectionTarget,
        ip_address: Option<&str>,
    ) -> NatalResult<Vec<CorrectionView>> {
        self.ensure_target(principal, target, ip_address).await?;
        let corrections = self.corrections.list_for(target).await?;
        Ok(corrections
            .into_iter()
            .map(|c| CorrectionView::open(c, &self.crypto))
            .collect())
    }

    // -----------------------------------------------------------------
    // Reports
    // -----------------------------------------------------------------

    /// Gate and audit a statistical report export. Rendering the report
    /// is the caller's job.
    pub async fn authorize_report_export(
        &self,
        principal: &Principal,
        report: &str,
        ip_address: Option<&str>,
    ) -> NatalResult<()> {
        self.authorize(principal, Capability::GenerateRemReports, ip_address)
            .await?;
        non_blank("report", report)?;

        self.trail
            .record(
                &principal.user,
                AuditEntry::new("EXPORT_REPORT")
                    .detail(format!("report: {}", report.trim()))
                    .ip(ip_address),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_must_be_structured() {
        let doc = ClinicalDocument::Partogram;
        assert!(clinical_document(doc, &serde_json::json!({"dilation_cm": 4})).is_ok());
        assert!(clinical_document(doc, &serde_json::json!([{"hour": 1}])).is_ok());
        assert!(clinical_document(doc, &serde_json::json!("dilatación 4")).is_err());
        assert!(clinical_document(doc, &serde_json::Value::Null).is_err());
    }

    #[test]
    fn missing_reference_only_rewrites_not_found() {
        let id = Uuid::new_v4();
        let mapped = missing_reference("mother", id)(NatalError::not_found("mother", id));
        assert!(matches!(mapped, NatalError::Referential { .. }));

        let mapped = missing_reference("mother", id)(NatalError::Database("down".into()));
        assert!(matches!(mapped, NatalError::Database(_)));
    }
}

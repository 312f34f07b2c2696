use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{tables, DbError, ScopedDb};
use shared_models::auth::TenantContext;
use shared_models::AppError;

use crate::models::{CreatePatientRequest, Patient, PatientError, PatientSearchQuery, UpdatePatientRequest};

pub struct PatientService {
    db: ScopedDb,
}

impl PatientService {
    pub fn bind(config: &AppConfig, ctx: &TenantContext) -> Result<Self, AppError> {
        Ok(Self {
            db: ScopedDb::bind(config, ctx)?,
        })
    }

    pub async fn create_patient(&self, request: CreatePatientRequest) -> Result<Patient, PatientError> {
        if request.first_name.trim().is_empty() {
            return Err(PatientError::Validation("first_name must not be empty".into()));
        }
        if request.first_last_name.trim().is_empty() {
            return Err(PatientError::Validation("first_last_name must not be empty".into()));
        }
        if request.document_number.trim().is_empty() {
            return Err(PatientError::Validation("document_number must not be empty".into()));
        }

        debug!(
            "Creating patient with document {}/{}",
            request.document_type_id, request.document_number
        );

        let existing = self
            .get_patient_by_document(request.document_type_id, &request.document_number)
            .await?;
        if existing.is_some() {
            return Err(PatientError::Validation(format!(
                "document_number: patient with document {} already exists",
                request.document_number
            )));
        }

        let row = self
            .db
            .insert(
                tables::PATIENT,
                json!({
                    "first_name": request.first_name,
                    "second_name": request.second_name,
                    "first_last_name": request.first_last_name,
                    "second_last_name": request.second_last_name,
                    "birth_date": request.birth_date,
                    "gender_id": request.gender_id,
                    "document_type_id": request.document_type_id,
                    "document_number": request.document_number,
                    "phone": request.phone,
                    "email": request.email,
                    "eps_id": request.eps_id,
                    "habeas_data": request.habeas_data,
                    "custom_fields": request.custom_fields.unwrap_or_else(|| json!({})),
                    "created_at": Utc::now().to_rfc3339(),
                    "updated_at": Utc::now().to_rfc3339(),
                }),
            )
            .await?;

        let patient = parse_patient(row)?;
        info!("Created patient {} for tenant {}", patient.id, self.db.tenant_id());

        Ok(patient)
    }

    pub async fn get_patient(&self, patient_id: Uuid) -> Result<Patient, PatientError> {
        let row = self
            .db
            .select_one(tables::PATIENT, &[("id", format!("eq.{}", patient_id))])
            .await?;

        match row {
            Some(row) => parse_patient(row),
            None => Err(PatientError::NotFound),
        }
    }

    pub async fn get_patient_by_document(
        &self,
        document_type_id: i32,
        document_number: &str,
    ) -> Result<Option<Patient>, PatientError> {
        let row = self
            .db
            .select_one(
                tables::PATIENT,
                &[
                    ("document_type_id", format!("eq.{}", document_type_id)),
                    ("document_number", format!("eq.{}", document_number)),
                ],
            )
            .await?;

        row.map(parse_patient).transpose()
    }

    pub async fn search_patients(&self, query: PatientSearchQuery) -> Result<Vec<Patient>, PatientError> {
        let mut filters: Vec<(&str, String)> = Vec::new();

        if let Some(document_type_id) = query.document_type_id {
            filters.push(("document_type_id", format!("eq.{}", document_type_id)));
        }
        if let Some(document_number) = &query.document_number {
            filters.push(("document_number", format!("ilike.*{}*", document_number)));
        }
        if let Some(name) = &query.name {
            filters.push((
                "or",
                format!("(first_name.ilike.*{}*,first_last_name.ilike.*{}*)", name, name),
            ));
        }
        if let Some(email) = &query.email {
            filters.push(("email", format!("ilike.*{}*", email)));
        }
        if let Some(phone) = &query.phone {
            filters.push(("phone", format!("ilike.*{}*", phone)));
        }

        filters.push(("order", "created_at.desc".to_string()));
        filters.push(("limit", query.limit.unwrap_or(50).to_string()));
        filters.push(("offset", query.offset.unwrap_or(0).to_string()));

        let rows = self.db.select(tables::PATIENT, &filters).await?;
        debug!("Patient search returned {} rows", rows.len());

        rows.into_iter().map(parse_patient).collect()
    }

    pub async fn update_patient(
        &self,
        patient_id: Uuid,
        request: UpdatePatientRequest,
    ) -> Result<Patient, PatientError> {
        let mut update_data = Map::new();

        if let Some(first_name) = request.first_name {
            if first_name.trim().is_empty() {
                return Err(PatientError::Validation("first_name must not be empty".into()));
            }
            update_data.insert("first_name".to_string(), json!(first_name));
        }
        if let Some(second_name) = request.second_name {
            update_data.insert("second_name".to_string(), json!(second_name));
        }
        if let Some(first_last_name) = request.first_last_name {
            if first_last_name.trim().is_empty() {
                return Err(PatientError::Validation("first_last_name must not be empty".into()));
            }
            update_data.insert("first_last_name".to_string(), json!(first_last_name));
        }
        if let Some(second_last_name) = request.second_last_name {
            update_data.insert("second_last_name".to_string(), json!(second_last_name));
        }
        if let Some(birth_date) = request.birth_date {
            update_data.insert("birth_date".to_string(), json!(birth_date));
        }
        if let Some(gender_id) = request.gender_id {
            update_data.insert("gender_id".to_string(), json!(gender_id));
        }
        if let Some(phone) = request.phone {
            update_data.insert("phone".to_string(), json!(phone));
        }
        if let Some(email) = request.email {
            update_data.insert("email".to_string(), json!(email));
        }
        if let Some(eps_id) = request.eps_id {
            update_data.insert("eps_id".to_string(), json!(eps_id));
        }
        if let Some(habeas_data) = request.habeas_data {
            update_data.insert("habeas_data".to_string(), json!(habeas_data));
        }
        if let Some(custom_fields) = request.custom_fields {
            update_data.insert("custom_fields".to_string(), custom_fields);
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let rows = self
            .db
            .update(
                tables::PATIENT,
                &[("id", format!("eq.{}", patient_id))],
                Value::Object(update_data),
            )
            .await?;

        let row = rows.into_iter().next().ok_or(PatientError::NotFound)?;
        let patient = parse_patient(row)?;
        info!("Updated patient {}", patient_id);

        Ok(patient)
    }

    /// Appointment rows keep the patient's document identity, so history
    /// survives the delete.
    pub async fn delete_patient(&self, patient_id: Uuid) -> Result<(), PatientError> {
        self.get_patient(patient_id).await?;

        self.db
            .delete(tables::PATIENT, &[("id", format!("eq.{}", patient_id))])
            .await?;
        info!("Deleted patient {}", patient_id);

        Ok(())
    }
}

fn parse_patient(row: Value) -> Result<Patient, PatientError> {
    serde_json::from_value(row)
        .map_err(|e| PatientError::Database(DbError::Invalid(format!("malformed patient row: {}", e))))
}

use axum::{Json, extract::State, http::StatusCode};
use garde::Validate;

use crate::error::AppError;
use crate::handlers::extract::{IdPath, JsonBody, StaffSession};
use crate::handlers::password_reset::MessageResponse;
use crate::models::{Patient, PatientInput};
use crate::state::AppState;

const RESOURCE: &str = "患者";

/// GET /patients
pub async fn list_patients(
    _staff: StaffSession,
    State(state): State<AppState>,
) -> Result<Json<Vec<Patient>>, AppError> {
    let patients = state.patient_repo.list().await?;
    Ok(Json(patients))
}

/// GET /patients/{id}
pub async fn get_patient(
    _staff: StaffSession,
    State(state): State<AppState>,
    IdPath(id): IdPath<i32>,
) -> Result<Json<Patient>, AppError> {
    let patient = state
        .patient_repo
        .find_by_id(id)
        .await?
        .ok_or(AppError::NotFound(RESOURCE))?;
    Ok(Json(patient))
}

/// POST /patients
pub async fn create_patient(
    staff: StaffSession,
    State(state): State<AppState>,
    JsonBody(input): JsonBody<PatientInput>,
) -> Result<(StatusCode, Json<Patient>), AppError> {
    input.validate()?;

    let patient = state.patient_repo.create(&input).await?;
    tracing::info!(patient_id = patient.id, staff_id = staff.account_id, "患者を登録");

    Ok((StatusCode::CREATED, Json(patient)))
}

/// PUT /patients/{id}
pub async fn update_patient(
    staff: StaffSession,
    State(state): State<AppState>,
    IdPath(id): IdPath<i32>,
    JsonBody(input): JsonBody<PatientInput>,
) -> Result<Json<Patient>, AppError> {
    input.validate()?;

    let patient = state
        .patient_repo
        .update(id, &input)
        .await?
        .ok_or(AppError::NotFound(RESOURCE))?;
    tracing::info!(patient_id = id, staff_id = staff.account_id, "患者情報を更新");

    Ok(Json(patient))
}

/// DELETE /patients/{id}
pub async fn delete_patient(
    staff: StaffSession,
    State(state): State<AppState>,
    IdPath(id): IdPath<i32>,
) -> Result<Json<MessageResponse>, AppError> {
    if state.patient_repo.delete(id).await? == 0 {
        return Err(AppError::NotFound(RESOURCE));
    }
    tracing::info!(patient_id = id, staff_id = staff.account_id, "患者を削除");

    Ok(Json(MessageResponse {
        message: "患者を削除しました".to_string(),
    }))
}

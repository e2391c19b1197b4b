use axum::{
    Json,
    body::Bytes,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::StatusCode,
};
use garde::Validate;

use crate::error::AppError;
use crate::handlers::extract::{IdPath, StaffSession};
use crate::handlers::password_reset::MessageResponse;
use crate::models::{Doctor, DoctorInput};
use crate::services::PhotoStore;
use crate::state::AppState;

const RESOURCE: &str = "医師";

/// アップロードされた写真
struct UploadedPhoto {
    file_name: Option<String>,
    bytes: Bytes,
}

/// multipart/form-data の解析結果
#[derive(Default)]
struct DoctorForm {
    input: DoctorInput,
    photo: Option<UploadedPhoto>,
}

/// GET /doctors
pub async fn list_doctors(
    _staff: StaffSession,
    State(state): State<AppState>,
) -> Result<Json<Vec<Doctor>>, AppError> {
    let doctors = state.doctor_repo.list().await?;
    Ok(Json(doctors))
}

/// GET /doctors/{id}
pub async fn get_doctor(
    _staff: StaffSession,
    State(state): State<AppState>,
    IdPath(id): IdPath<i32>,
) -> Result<Json<Doctor>, AppError> {
    let doctor = state
        .doctor_repo
        .find_by_id(id)
        .await?
        .ok_or(AppError::NotFound(RESOURCE))?;
    Ok(Json(doctor))
}

/// POST /doctors
///
/// multipart: name（必須）, specialization, contact, photo（任意）
///
/// DB 登録に失敗した場合は保存済みの写真を削除する
pub async fn create_doctor(
    staff: StaffSession,
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<Doctor>), AppError> {
    let form = read_doctor_form(multipart?).await?;
    form.input.validate()?;

    let photo = match &form.photo {
        Some(upload) => {
            state
                .photo_store
                .save(upload.file_name.as_deref(), &upload.bytes)
                .await?
        }
        None => String::new(),
    };

    let created = state.doctor_repo.create(&form.input, &photo).await;
    let doctor = settle_created(&state.photo_store, &photo, created).await?;
    tracing::info!(doctor_id = doctor.id, staff_id = staff.account_id, "医師を登録");

    Ok((StatusCode::CREATED, Json(doctor)))
}

/// PUT /doctors/{id}
///
/// 新しい写真があれば差し替え（更新成功後に旧ファイルを削除）、なければ現在の写真を維持
pub async fn update_doctor(
    staff: StaffSession,
    State(state): State<AppState>,
    IdPath(id): IdPath<i32>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Doctor>, AppError> {
    let form = read_doctor_form(multipart?).await?;
    form.input.validate()?;

    let current = state
        .doctor_repo
        .find_by_id(id)
        .await?
        .ok_or(AppError::NotFound(RESOURCE))?;

    let new_photo = match &form.photo {
        Some(upload) => Some(
            state
                .photo_store
                .save(upload.file_name.as_deref(), &upload.bytes)
                .await?,
        ),
        None => None,
    };
    let photo = new_photo.as_deref().unwrap_or(current.photo.as_str());

    let result = state.doctor_repo.update(id, &form.input, photo).await;
    let updated = settle_updated(
        &state.photo_store,
        new_photo.as_deref(),
        &current.photo,
        result,
    )
    .await?;
    tracing::info!(doctor_id = id, staff_id = staff.account_id, "医師情報を更新");

    Ok(Json(updated))
}

/// DELETE /doctors/{id}
pub async fn delete_doctor(
    staff: StaffSession,
    State(state): State<AppState>,
    IdPath(id): IdPath<i32>,
) -> Result<Json<MessageResponse>, AppError> {
    let deleted = state
        .doctor_repo
        .delete(id)
        .await?
        .ok_or(AppError::NotFound(RESOURCE))?;

    state.photo_store.remove(&deleted.photo).await;
    tracing::info!(doctor_id = id, staff_id = staff.account_id, "医師を削除");

    Ok(Json(MessageResponse {
        message: "医師を削除しました".to_string(),
    }))
}

/// 登録結果に応じて保存済み写真を残すか決める
///
/// 登録に失敗した場合は保存した写真を削除する
async fn settle_created(
    photos: &PhotoStore,
    photo: &str,
    result: Result<Doctor, sqlx::Error>,
) -> Result<Doctor, AppError> {
    match result {
        Ok(doctor) => Ok(doctor),
        Err(e) => {
            photos.remove(photo).await;
            Err(e.into())
        }
    }
}

/// 更新結果に応じて新旧どちらの写真を残すか決める
///
/// 成功時は差し替え前の写真を、失敗時（対象なしを含む）は新しく保存した写真を削除する
async fn settle_updated(
    photos: &PhotoStore,
    new_photo: Option<&str>,
    old_photo: &str,
    result: Result<Option<Doctor>, sqlx::Error>,
) -> Result<Doctor, AppError> {
    let outcome = match result {
        Ok(Some(doctor)) => {
            if new_photo.is_some() {
                photos.remove(old_photo).await;
            }
            return Ok(doctor);
        }
        Ok(None) => AppError::NotFound(RESOURCE),
        Err(e) => e.into(),
    };

    if let Some(path) = new_photo {
        photos.remove(path).await;
    }
    Err(outcome)
}

/// multipart フォームを読み取る
///
/// 未知の項目（旧クライアントの currentPhoto 等）は無視する
async fn read_doctor_form(mut multipart: Multipart) -> Result<DoctorForm, AppError> {
    let mut form = DoctorForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "name" => form.input.name = field.text().await?.trim().to_string(),
            "specialization" => form.input.specialization = field.text().await?.trim().to_string(),
            "contact" => form.input.contact = field.text().await?.trim().to_string(),
            "photo" => {
                let file_name = field.file_name().map(str::to_owned);
                let bytes = field.bytes().await?;
                // ファイル未選択のまま送信されたフォームは空のパートになる
                if !bytes.is_empty() {
                    form.photo = Some(UploadedPhoto { file_name, bytes });
                }
            }
            other => tracing::debug!(field = %other, "未知のフォーム項目を無視"),
        }
    }

    Ok(form)
}

use garde::Validate;
use serde::Serialize;
use sqlx::FromRow;

use super::patient::digits_only;

/// 医師
///
/// photo はアップロード写真の公開パス（`uploads/<file>`）、未登録なら空文字
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Doctor {
    pub id: i32,
    pub name: String,
    pub specialization: String,
    pub contact: String,
    pub photo: String,
}

/// 医師の登録・更新フォーム（multipart のテキスト項目）
#[derive(Debug, Clone, Default, Validate)]
pub struct DoctorInput {
    #[garde(length(min = 1, max = 100))]
    pub name: String,
    #[garde(length(max = 100))]
    pub specialization: String,
    #[garde(length(max = 20), custom(digits_only))]
    pub contact: String,
}

use axum::{Json, extract::State};
use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::handlers::extract::JsonBody;
use crate::state::AppState;

/// ログインリクエスト
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// スタッフのメールアドレス
    #[garde(email)]
    pub email: String,
    /// スタッフのパスワード
    #[garde(length(min = 1))]
    pub password: String,
}

/// ログインレスポンス
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    /// セッショントークン（JWT、Authorization: Bearer で使用）
    pub token: String,
}

/// ログインハンドラー
///
/// POST /login
///
/// 処理フロー:
/// 1. リクエストバリデーション
/// 2. アカウント認証（DB照合）
/// 3. セッショントークンを返却
pub async fn login(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    request.validate()?;

    let token = state
        .auth_service
        .login(&request.email, &request.password)
        .await?;

    Ok(Json(LoginResponse {
        message: "ログインしました".to_string(),
        token,
    }))
}

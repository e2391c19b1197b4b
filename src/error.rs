use std::fmt;

use axum::{
    Json,
    extract::multipart::{MultipartError, MultipartRejection},
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// ログイン失敗の内部理由
///
/// ログには区別して出力するが、レスポンスでは同一メッセージを返す
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    UnknownEmail,
    WrongPassword,
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownEmail => f.write_str("unknown_email"),
            Self::WrongPassword => f.write_str("wrong_password"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("認証エラー: {0}")]
    Authentication(AuthFailure),

    #[error("認証が必要です")]
    Unauthorized,

    #[error("バリデーションエラー: {0}")]
    Validation(String),

    #[error("アカウントが見つかりません")]
    AccountNotFound,

    #[error("{0}が見つかりません")]
    NotFound(&'static str),

    #[error("無効または使用済みのトークンです")]
    InvalidOrUsedToken,

    #[error("トークンの有効期限が切れています")]
    TokenExpired,

    #[error("通知の送信に失敗しました")]
    DeliveryFailed(#[source] anyhow::Error),

    #[error("セッショントークンの署名に失敗しました")]
    TokenSigning(#[source] jsonwebtoken::errors::Error),

    #[error("データベースエラー")]
    Database(#[from] sqlx::Error),

    #[error("ファイル保存エラー")]
    Storage(#[from] std::io::Error),

    #[error("内部エラー")]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Authentication(reason) => {
                tracing::warn!(reason = %reason, "ログイン失敗");
                (
                    StatusCode::UNAUTHORIZED,
                    "メールアドレスまたはパスワードが正しくありません".to_string(),
                )
            }
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "認証が必要です".to_string()),
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::AccountNotFound => (
                StatusCode::NOT_FOUND,
                "メールアドレスが見つかりません".to_string(),
            ),
            Self::NotFound(resource) => {
                (StatusCode::NOT_FOUND, format!("{resource}が見つかりません"))
            }
            Self::InvalidOrUsedToken => (
                StatusCode::BAD_REQUEST,
                "無効または使用済みのトークンです".to_string(),
            ),
            Self::TokenExpired => (
                StatusCode::BAD_REQUEST,
                "トークンの有効期限が切れています".to_string(),
            ),
            Self::DeliveryFailed(e) => {
                tracing::error!(error = ?e, "通知送信エラー");
                (
                    StatusCode::BAD_GATEWAY,
                    "リセット用メールの送信に失敗しました。時間をおいて再度お試しください"
                        .to_string(),
                )
            }
            Self::TokenSigning(e) => {
                tracing::error!(error = ?e, "JWT署名エラー");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "ログイントークンの生成に失敗しました".to_string(),
                )
            }
            Self::Database(e) => {
                tracing::error!(error = ?e, "データベースエラー");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "内部エラーが発生しました".to_string(),
                )
            }
            Self::Storage(e) => {
                tracing::error!(error = ?e, "ファイル保存エラー");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "内部エラーが発生しました".to_string(),
                )
            }
            Self::Internal(e) => {
                tracing::error!(error = ?e, "内部エラー");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "内部エラーが発生しました".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<garde::Report> for AppError {
    fn from(report: garde::Report) -> Self {
        Self::Validation(report.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection, "JSONボディの解析に失敗");
        Self::Validation("リクエストの形式が正しくありません".to_string())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        tracing::debug!(error = %rejection, "パスパラメータの解析に失敗");
        Self::Validation("IDの形式が正しくありません".to_string())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        tracing::debug!(error = %rejection, "multipart リクエストではありません");
        Self::Validation("multipart/form-data で送信してください".to_string())
    }
}

impl From<MultipartError> for AppError {
    fn from(e: MultipartError) -> Self {
        tracing::debug!(error = %e, "multipart の読み取りに失敗");
        Self::Validation(format!("フォームデータの読み取りに失敗しました: {}", e.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(error: AppError) -> StatusCode {
        error.into_response().status()
    }

    #[test]
    fn test_reset_flow_errors_map_to_distinct_statuses() {
        assert_eq!(status_of(AppError::AccountNotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(AppError::Validation("x".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(AppError::InvalidOrUsedToken),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(AppError::TokenExpired), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(AppError::DeliveryFailed(anyhow::anyhow!("smtp down"))),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(AppError::Database(sqlx::Error::PoolTimedOut)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_authentication_failures_share_status() {
        assert_eq!(
            status_of(AppError::Authentication(AuthFailure::UnknownEmail)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(AppError::Authentication(AuthFailure::WrongPassword)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(status_of(AppError::Unauthorized), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_not_found_message_names_resource() {
        assert_eq!(AppError::NotFound("患者").to_string(), "患者が見つかりません");
    }
}

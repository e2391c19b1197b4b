use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

/// スタッフアカウント（users テーブル）
///
/// reset_token と token_expiry は常に両方 NULL か両方非 NULL
/// reset_token には平文ではなく SHA256 ダイジェストを保存する
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Account {
    pub id: i32,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    #[serde(skip)]
    pub reset_token: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub token_expiry: Option<OffsetDateTime>,
}

impl Account {
    /// リセット要求が未消費のまま残っているか
    pub fn has_pending_reset(&self) -> bool {
        self.reset_token.is_some() && self.token_expiry.is_some()
    }
}

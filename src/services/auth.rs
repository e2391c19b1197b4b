use std::sync::Arc;

use time::OffsetDateTime;

use crate::error::{AppError, AuthFailure};
use crate::repositories::CredentialStore;
use crate::services::password::PasswordService;
use crate::services::session::SessionTokenService;

/// 認証サービス
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    hasher: PasswordService,
    sessions: SessionTokenService,
}

impl AuthService {
    /// 新しい AuthService を作成
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: PasswordService,
        sessions: SessionTokenService,
    ) -> Self {
        Self {
            store,
            hasher,
            sessions,
        }
    }

    /// ログインしてセッショントークンを返す
    ///
    /// タイミング攻撃対策: アカウントが存在しない場合もダミーのパスワード検証を実行
    pub async fn login(&self, email: &str, password: &str) -> Result<String, AppError> {
        let account = match self.store.get_by_email(email).await? {
            Some(account) => account,
            None => {
                self.hasher.verify_dummy(password);
                tracing::warn!(email = %email, "認証失敗: アカウント不在");
                return Err(AppError::Authentication(AuthFailure::UnknownEmail));
            }
        };

        if !self.hasher.verify(&account.password_hash, password)? {
            tracing::warn!(email = %email, "認証失敗: パスワード不一致");
            return Err(AppError::Authentication(AuthFailure::WrongPassword));
        }

        let token = self.sessions.issue(&account, OffsetDateTime::now_utc())?;
        tracing::info!(account_id = account.id, "認証成功");

        Ok(token)
    }
}

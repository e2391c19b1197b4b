use std::sync::Arc;

use time::OffsetDateTime;

use crate::error::AppError;
use crate::repositories::CredentialStore;
use crate::services::email::Notifier;
use crate::services::password::PasswordService;
use crate::services::reset_token::{self, ResetTokenIssuer};

/// 新パスワードの最小文字数
pub const MIN_PASSWORD_LENGTH: usize = 8;

const RESET_EMAIL_SUBJECT: &str = "パスワード再設定のご案内";

/// 現在時刻の取得元（テストでは固定時刻を注入する）
pub type Clock = Arc<dyn Fn() -> OffsetDateTime + Send + Sync>;

/// パスワードリセットサービス
///
/// 状態は持たず、すべて CredentialStore を経由して読み書きする
#[derive(Clone)]
pub struct PasswordResetService {
    store: Arc<dyn CredentialStore>,
    notifier: Arc<dyn Notifier>,
    hasher: PasswordService,
    issuer: ResetTokenIssuer,
    reset_url_base: String,
    clock: Clock,
}

impl PasswordResetService {
    /// 新しい PasswordResetService を作成
    pub fn new(
        store: Arc<dyn CredentialStore>,
        notifier: Arc<dyn Notifier>,
        hasher: PasswordService,
        issuer: ResetTokenIssuer,
        reset_url_base: String,
    ) -> Self {
        Self {
            store,
            notifier,
            hasher,
            issuer,
            reset_url_base,
            clock: Arc::new(OffsetDateTime::now_utc),
        }
    }

    /// 時刻の取得元を差し替える
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// パスワードリセットをリクエスト
    ///
    /// # Errors
    /// - アカウント不在: `AccountNotFound`（行は変更しない）
    /// - 通知失敗: `DeliveryFailed`（保存済みトークンは有効なまま残る）
    ///
    /// # Security
    /// - トークン（平文）はログにもレスポンスにも出さない
    pub async fn request_reset(&self, email: &str) -> Result<(), AppError> {
        tracing::info!(email = %email, "パスワードリセットリクエスト");

        let account = match self.store.get_by_email(email).await? {
            Some(account) => account,
            None => {
                tracing::warn!(email = %email, "パスワードリセット: アカウント不在");
                return Err(AppError::AccountNotFound);
            }
        };

        let issued = self.issuer.issue((self.clock)());

        // 既存の未使用トークンは上書きされ無効になる
        let updated = self
            .store
            .set_reset_token(account.id, &issued.digest, issued.expires_at)
            .await?;
        if updated == 0 {
            // 検索から更新までの間に削除された
            tracing::warn!(account_id = account.id, "パスワードリセット: 更新対象なし");
            return Err(AppError::AccountNotFound);
        }

        let reset_url = self.build_reset_url(&issued.token);
        let body = format!(
            "以下のリンクからパスワードを再設定してください。\n\n{reset_url}\n\nこのリンクの有効期限は {} (UTC) です。",
            issued.expires_at
        );

        self.notifier
            .send(email, RESET_EMAIL_SUBJECT, &body)
            .await
            .map_err(AppError::DeliveryFailed)?;

        tracing::info!(account_id = account.id, "パスワードリセットメール送信完了");

        Ok(())
    }

    /// トークンを検証・消費してパスワードを更新
    ///
    /// 使用済みトークンと未発行トークンは区別できないため、どちらも
    /// `InvalidOrUsedToken` を返す
    ///
    /// # Security
    /// - トークン・新パスワードはログに出力しない
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AppError> {
        validate_reset_input(token, new_password)?;

        let token_digest = reset_token::digest(token);

        let account = self
            .store
            .get_by_reset_token(&token_digest)
            .await?
            .ok_or(AppError::InvalidOrUsedToken)?;

        let Some(expires_at) = account.token_expiry else {
            tracing::error!(account_id = account.id, "有効期限のないリセットトークン");
            return Err(AppError::InvalidOrUsedToken);
        };

        // 期限切れトークンは削除せずそのまま残す
        if reset_token::is_expired(expires_at, (self.clock)()) {
            tracing::warn!(account_id = account.id, "期限切れトークン");
            return Err(AppError::TokenExpired);
        }

        let password_hash = self.hasher.hash(new_password)?;

        let consumed = self
            .store
            .update_password_and_clear_token(account.id, &token_digest, &password_hash)
            .await?;
        if consumed == 0 {
            tracing::warn!(account_id = account.id, "トークンは並行リクエストで消費済み");
            return Err(AppError::InvalidOrUsedToken);
        }

        tracing::info!(account_id = account.id, "パスワードリセット完了");

        Ok(())
    }

    /// リセットURLを構築
    fn build_reset_url(&self, token: &str) -> String {
        format!("{}?token={}", self.reset_url_base, token)
    }
}

/// ストレージに触れる前の入力検証
fn validate_reset_input(token: &str, new_password: &str) -> Result<(), AppError> {
    if token.trim().is_empty() {
        return Err(AppError::Validation("トークンは必須です".to_string()));
    }
    if new_password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::Validation(format!(
            "パスワードは{MIN_PASSWORD_LENGTH}文字以上で入力してください"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use time::Duration;

    use super::*;
    use crate::repositories::memory::InMemoryCredentialStore;
    use crate::services::email::RecordingMailer;

    const EMAIL: &str = "a@x.com";

    struct Fixture {
        store: Arc<InMemoryCredentialStore>,
        mailer: Arc<RecordingMailer>,
        now: Arc<Mutex<OffsetDateTime>>,
        service: PasswordResetService,
        account_id: i32,
    }

    fn hasher() -> PasswordService {
        PasswordService::new(8, 1, 1).unwrap()
    }

    fn fixture_with(store: InMemoryCredentialStore, mailer: RecordingMailer) -> Fixture {
        let store = Arc::new(store);
        let mailer = Arc::new(mailer);
        let account_id = store.insert(EMAIL, &hasher().hash("oldpassword").unwrap());
        let now = Arc::new(Mutex::new(OffsetDateTime::now_utc()));
        let clock_now = now.clone();

        let service = PasswordResetService::new(
            store.clone(),
            mailer.clone(),
            hasher(),
            ResetTokenIssuer::new(Duration::minutes(15)),
            "http://localhost:5173/reset-password".to_string(),
        )
        .with_clock(Arc::new(move || *clock_now.lock().unwrap()));

        Fixture {
            store,
            mailer,
            now,
            service,
            account_id,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(InMemoryCredentialStore::new(), RecordingMailer::new())
    }

    impl Fixture {
        fn advance(&self, by: Duration) {
            *self.now.lock().unwrap() += by;
        }

        fn set_now(&self, at: OffsetDateTime) {
            *self.now.lock().unwrap() = at;
        }
    }

    #[tokio::test]
    async fn test_request_reset_persists_token_pair() {
        let f = fixture();
        f.service.request_reset(EMAIL).await.unwrap();

        let account = f.store.get(f.account_id).unwrap();
        assert!(account.reset_token.is_some());
        let expiry = account.token_expiry.unwrap();
        assert!(expiry > *f.now.lock().unwrap());
    }

    #[tokio::test]
    async fn test_request_reset_sends_link_but_stores_digest_only() {
        let f = fixture();
        f.service.request_reset(EMAIL).await.unwrap();

        let sent = f.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, EMAIL);
        assert!(
            sent[0]
                .body
                .contains("http://localhost:5173/reset-password?token=")
        );

        let token = f.mailer.last_token().unwrap();
        let stored = f.store.get(f.account_id).unwrap().reset_token.unwrap();
        assert_ne!(stored, token);
        assert_eq!(stored, reset_token::digest(&token));
    }

    #[tokio::test]
    async fn test_request_reset_unknown_email() {
        let f = fixture();
        let result = f.service.request_reset("missing@x.com").await;

        assert!(matches!(result, Err(AppError::AccountNotFound)));
        assert!(f.store.all().iter().all(|a| !a.has_pending_reset()));
        assert!(f.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_full_reset_lifecycle() {
        let f = fixture();
        let old_hash = f.store.get(f.account_id).unwrap().password_hash;

        f.service.request_reset(EMAIL).await.unwrap();
        let token = f.mailer.last_token().unwrap();

        f.service.reset_password(&token, "newpass1").await.unwrap();

        let account = f.store.get(f.account_id).unwrap();
        assert!(account.reset_token.is_none());
        assert!(account.token_expiry.is_none());
        assert_ne!(account.password_hash, old_hash);
        assert!(hasher().verify(&account.password_hash, "newpass1").unwrap());

        let again = f.service.reset_password(&token, "againpass").await;
        assert!(matches!(again, Err(AppError::InvalidOrUsedToken)));
    }

    #[tokio::test]
    async fn test_unknown_token_is_generic() {
        let f = fixture();
        let result = f.service.reset_password("never-issued", "newpass1").await;
        assert!(matches!(result, Err(AppError::InvalidOrUsedToken)));
    }

    #[tokio::test]
    async fn test_second_request_invalidates_first_token() {
        let f = fixture();
        f.service.request_reset(EMAIL).await.unwrap();
        let first = f.mailer.last_token().unwrap();
        f.service.request_reset(EMAIL).await.unwrap();
        let second = f.mailer.last_token().unwrap();
        assert_ne!(first, second);

        let result = f.service.reset_password(&first, "newpass1").await;
        assert!(matches!(result, Err(AppError::InvalidOrUsedToken)));

        f.service.reset_password(&second, "newpass1").await.unwrap();
    }

    #[tokio::test]
    async fn test_token_rejected_at_expiry_instant() {
        let f = fixture();
        f.service.request_reset(EMAIL).await.unwrap();
        let token = f.mailer.last_token().unwrap();
        let expiry = f.store.get(f.account_id).unwrap().token_expiry.unwrap();

        f.set_now(expiry);
        let result = f.service.reset_password(&token, "newpass1").await;
        assert!(matches!(result, Err(AppError::TokenExpired)));

        // 期限切れでもトークンは残る
        let account = f.store.get(f.account_id).unwrap();
        assert!(account.has_pending_reset());
    }

    #[tokio::test]
    async fn test_token_accepted_one_second_before_expiry() {
        let f = fixture();
        f.service.request_reset(EMAIL).await.unwrap();
        let token = f.mailer.last_token().unwrap();
        let expiry = f.store.get(f.account_id).unwrap().token_expiry.unwrap();

        f.set_now(expiry - Duration::seconds(1));
        f.service.reset_password(&token, "newpass1").await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_token_after_ttl() {
        let f = fixture();
        f.service.request_reset(EMAIL).await.unwrap();
        let token = f.mailer.last_token().unwrap();

        f.advance(Duration::minutes(16));
        let result = f.service.reset_password(&token, "newpass1").await;
        assert!(matches!(result, Err(AppError::TokenExpired)));
    }

    #[tokio::test]
    async fn test_empty_token_rejected_before_lookup() {
        let f = fixture();
        let result = f.service.reset_password("   ", "newpass1").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_short_password_keeps_token() {
        let f = fixture();
        f.service.request_reset(EMAIL).await.unwrap();
        let token = f.mailer.last_token().unwrap();

        let result = f.service.reset_password(&token, "short").await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(f.store.get(f.account_id).unwrap().has_pending_reset());
    }

    #[tokio::test]
    async fn test_delivery_failure_keeps_token_usable() {
        let f = fixture_with(InMemoryCredentialStore::new(), RecordingMailer::failing());

        let result = f.service.request_reset(EMAIL).await;
        assert!(matches!(result, Err(AppError::DeliveryFailed(_))));

        let account = f.store.get(f.account_id).unwrap();
        assert!(account.has_pending_reset());
    }

    #[tokio::test]
    async fn test_storage_failure_surfaces_as_database_error() {
        let f = fixture_with(
            InMemoryCredentialStore::failing_writes(),
            RecordingMailer::new(),
        );

        let result = f.service.request_reset(EMAIL).await;
        assert!(matches!(result, Err(AppError::Database(_))));
        assert!(f.mailer.sent().is_empty());
        assert!(!f.store.get(f.account_id).unwrap().has_pending_reset());
    }

    #[tokio::test]
    async fn test_concurrent_consume_succeeds_once() {
        let f = fixture();
        f.service.request_reset(EMAIL).await.unwrap();
        let token = f.mailer.last_token().unwrap();

        let (first, second) = tokio::join!(
            f.service.reset_password(&token, "firstpass"),
            f.service.reset_password(&token, "secondpass"),
        );

        let successes = [first.is_ok(), second.is_ok()]
            .iter()
            .filter(|ok| **ok)
            .count();
        assert_eq!(successes, 1);
        assert!(matches!(
            (first, second),
            (Ok(()), Err(AppError::InvalidOrUsedToken)) | (Err(AppError::InvalidOrUsedToken), Ok(()))
        ));
    }

    #[tokio::test]
    async fn test_compare_and_clear_rejects_stale_token() {
        // 検索後・更新前にトークンが差し替えられたケースをストア単体で確認
        let store = InMemoryCredentialStore::new();
        let id = store.insert(EMAIL, "hash");
        let expiry = OffsetDateTime::now_utc() + Duration::minutes(15);
        store.set_reset_token(id, "digest-1", expiry).await.unwrap();
        store.set_reset_token(id, "digest-2", expiry).await.unwrap();

        let stale = store
            .update_password_and_clear_token(id, "digest-1", "new-hash")
            .await
            .unwrap();
        assert_eq!(stale, 0);
        assert_eq!(store.get(id).unwrap().password_hash, "hash");

        let fresh = store
            .update_password_and_clear_token(id, "digest-2", "new-hash")
            .await
            .unwrap();
        assert_eq!(fresh, 1);
    }
}

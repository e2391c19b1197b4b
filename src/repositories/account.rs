use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::models::Account;

/// 認証情報ストア
///
/// パスワードリセットとログインが共有する唯一の可変状態。
/// 実装はキャッシュを持たず、毎回ストレージを読み書きすること
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// メールアドレスでアカウントを検索
    async fn get_by_email(&self, email: &str) -> Result<Option<Account>, sqlx::Error>;

    /// リセットトークンのダイジェストでアカウントを検索
    async fn get_by_reset_token(&self, token_digest: &str)
    -> Result<Option<Account>, sqlx::Error>;

    /// リセットトークンと有効期限を同時に設定（既存トークンは上書き）
    ///
    /// # Returns
    /// 更新された行数
    async fn set_reset_token(
        &self,
        id: i32,
        token_digest: &str,
        expiry: OffsetDateTime,
    ) -> Result<u64, sqlx::Error>;

    /// パスワードを更新し、リセットトークンと有効期限を同時に消去
    ///
    /// reset_token が token_digest と一致する場合のみ更新する（compare-and-clear）。
    /// 並行リクエストで先に消費された場合は 0 を返す
    async fn update_password_and_clear_token(
        &self,
        id: i32,
        token_digest: &str,
        new_password_hash: &str,
    ) -> Result<u64, sqlx::Error>;
}

#[derive(Clone)]
pub struct AccountRepository {
    pool: PgPool,
}

impl AccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// アカウントが未登録の場合のみ作成
    ///
    /// # Returns
    /// 新規作成した場合は `true`、既に存在した場合は `false`
    pub async fn create_if_absent(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (email, password_hash)
            VALUES ($1, $2)
            ON CONFLICT (email) DO NOTHING
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl CredentialStore for AccountRepository {
    async fn get_by_email(&self, email: &str) -> Result<Option<Account>, sqlx::Error> {
        sqlx::query_as::<_, Account>(
            r#"
            SELECT id, email, password_hash, reset_token, token_expiry
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_by_reset_token(
        &self,
        token_digest: &str,
    ) -> Result<Option<Account>, sqlx::Error> {
        sqlx::query_as::<_, Account>(
            r#"
            SELECT id, email, password_hash, reset_token, token_expiry
            FROM users
            WHERE reset_token = $1
            "#,
        )
        .bind(token_digest)
        .fetch_optional(&self.pool)
        .await
    }

    async fn set_reset_token(
        &self,
        id: i32,
        token_digest: &str,
        expiry: OffsetDateTime,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET reset_token = $2, token_expiry = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(token_digest)
        .bind(expiry)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn update_password_and_clear_token(
        &self,
        id: i32,
        token_digest: &str,
        new_password_hash: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $3, reset_token = NULL, token_expiry = NULL, updated_at = NOW()
            WHERE id = $1 AND reset_token = $2
            "#,
        )
        .bind(id)
        .bind(token_digest)
        .bind(new_password_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

use std::sync::Arc;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use time::Duration;

use crate::config::Config;
use crate::error::AppError;
use crate::repositories::{AccountRepository, CredentialStore, DoctorRepository, PatientRepository};
use crate::services::email::notifier_from_config;
use crate::services::{
    AuthService, Notifier, PasswordResetService, PasswordService, PhotoStore, ResetTokenIssuer,
    SessionTokenService,
};

/// アプリケーション共有状態
///
/// axum の State として全ハンドラーで共有される。
/// Clone は必須（axum が内部で clone するため）。
#[derive(Clone)]
pub struct AppState {
    /// アプリケーション設定（Arc で共有）
    pub config: Arc<Config>,
    /// 患者リポジトリ
    pub patient_repo: PatientRepository,
    /// 医師リポジトリ
    pub doctor_repo: DoctorRepository,
    /// ログイン
    pub auth_service: AuthService,
    /// パスワードリセット
    pub password_reset_service: PasswordResetService,
    /// セッショントークン検証（Bearer 認証）
    pub session_tokens: SessionTokenService,
    /// 医師写真の保存先
    pub photo_store: PhotoStore,
}

impl AppState {
    /// 新しい AppState を作成
    pub fn new(db_pool: PgPool, config: Config) -> Result<Self, AppError> {
        let notifier = notifier_from_config(&config)?;
        let credentials = Arc::new(AccountRepository::new(db_pool.clone()));
        Self::with_components(db_pool, Arc::new(config), credentials, notifier)
    }

    /// 認証情報ストアと通知送信を指定して AppState を作成
    pub fn with_components(
        db_pool: PgPool,
        config: Arc<Config>,
        credentials: Arc<dyn CredentialStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, AppError> {
        let hasher = PasswordService::new(
            config.password_hash_memory_kib,
            config.password_hash_iterations,
            config.password_hash_parallelism,
        )?;
        let session_tokens = SessionTokenService::new(
            config.jwt_secret.expose_secret(),
            Duration::seconds(config.session_token_ttl_secs),
        );

        let auth_service =
            AuthService::new(credentials.clone(), hasher.clone(), session_tokens.clone());
        let password_reset_service = PasswordResetService::new(
            credentials,
            notifier,
            hasher,
            ResetTokenIssuer::new(Duration::seconds(config.password_reset_token_ttl_secs)),
            config.password_reset_url_base.clone(),
        );

        tracing::info!(upload_dir = %config.upload_dir, "写真保存先を設定");

        Ok(Self {
            patient_repo: PatientRepository::new(db_pool.clone()),
            doctor_repo: DoctorRepository::new(db_pool),
            auth_service,
            password_reset_service,
            session_tokens,
            photo_store: PhotoStore::new(config.upload_dir.clone()),
            config,
        })
    }
}

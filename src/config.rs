use secrecy::{ExposeSecret, SecretBox};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub database_url: SecretBox<String>,
    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    /// CORS 許可オリジン（カンマ区切り）
    #[serde(default = "default_cors_allowed_origins")]
    pub cors_allowed_origins: Vec<String>,

    // セッション（JWT）設定
    /// HS256 署名鍵（32バイト以上）
    pub jwt_secret: SecretBox<String>,
    #[serde(default = "default_session_token_ttl_secs")]
    pub session_token_ttl_secs: i64,

    // パスワードハッシュ（argon2id）コスト設定
    #[serde(default = "default_password_hash_memory_kib")]
    pub password_hash_memory_kib: u32,
    #[serde(default = "default_password_hash_iterations")]
    pub password_hash_iterations: u32,
    #[serde(default = "default_password_hash_parallelism")]
    pub password_hash_parallelism: u32,

    // SMTP設定（オプション - email機能有効時のみ使用）
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_username: Option<SecretBox<String>>,
    pub smtp_password: Option<SecretBox<String>>,
    #[serde(default)]
    pub smtp_from_address: Option<String>,

    // パスワードリセット設定
    #[serde(default = "default_password_reset_url_base")]
    pub password_reset_url_base: String,
    #[serde(default = "default_password_reset_token_ttl_secs")]
    pub password_reset_token_ttl_secs: i64,

    // 初期スタッフアカウント（未登録の場合のみ起動時に作成）
    #[serde(default)]
    pub bootstrap_staff_email: Option<String>,
    pub bootstrap_staff_password: Option<SecretBox<String>>,

    // 医師写真アップロード設定
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "http://localhost:5173";
const DEFAULT_SESSION_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_PASSWORD_RESET_URL_BASE: &str = "http://localhost:5173/reset-password";
const DEFAULT_PASSWORD_RESET_TOKEN_TTL_SECS: i64 = 15 * 60;
const DEFAULT_UPLOAD_DIR: &str = "uploads";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// セッション・リセットトークン有効期間の上限（秒、366日）
pub const MAX_TOKEN_TTL_SECS: i64 = 366 * 24 * 60 * 60;

/// JWT 署名鍵の最小長（バイト）
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

fn default_database_max_connections() -> u32 {
    DEFAULT_DATABASE_MAX_CONNECTIONS
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_cors_allowed_origins() -> Vec<String> {
    vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()]
}

fn default_session_token_ttl_secs() -> i64 {
    DEFAULT_SESSION_TOKEN_TTL_SECS
}

fn default_password_hash_memory_kib() -> u32 {
    argon2::Params::DEFAULT_M_COST
}

fn default_password_hash_iterations() -> u32 {
    argon2::Params::DEFAULT_T_COST
}

fn default_password_hash_parallelism() -> u32 {
    argon2::Params::DEFAULT_P_COST
}

fn default_smtp_port() -> u16 {
    DEFAULT_SMTP_PORT
}

fn default_password_reset_url_base() -> String {
    DEFAULT_PASSWORD_RESET_URL_BASE.to_string()
}

fn default_password_reset_token_ttl_secs() -> i64 {
    DEFAULT_PASSWORD_RESET_TOKEN_TTL_SECS
}

fn default_upload_dir() -> String {
    DEFAULT_UPLOAD_DIR.to_string()
}

fn default_max_upload_bytes() -> usize {
    DEFAULT_MAX_UPLOAD_BYTES
}

impl Config {
    pub fn load() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    /// 起動前の設定値検証
    ///
    /// 値の組み合わせとして不正なものをここで弾き、実行中に失敗させない
    pub fn validate(&self) -> anyhow::Result<()> {
        let secret_len = self.jwt_secret.expose_secret().len();
        anyhow::ensure!(
            secret_len >= MIN_JWT_SECRET_LENGTH,
            "JWT_SECRET must be at least {MIN_JWT_SECRET_LENGTH} bytes, got {secret_len}"
        );
        anyhow::ensure!(
            (1..=MAX_TOKEN_TTL_SECS).contains(&self.session_token_ttl_secs),
            "SESSION_TOKEN_TTL_SECS must be between 1 and {MAX_TOKEN_TTL_SECS}"
        );
        anyhow::ensure!(
            (1..=MAX_TOKEN_TTL_SECS).contains(&self.password_reset_token_ttl_secs),
            "PASSWORD_RESET_TOKEN_TTL_SECS must be between 1 and {MAX_TOKEN_TTL_SECS}"
        );
        anyhow::ensure!(
            !self.password_reset_url_base.trim().is_empty(),
            "PASSWORD_RESET_URL_BASE must not be empty"
        );
        anyhow::ensure!(
            self.database_max_connections > 0,
            "DATABASE_MAX_CONNECTIONS must be positive"
        );
        argon2::Params::new(
            self.password_hash_memory_kib,
            self.password_hash_iterations,
            self.password_hash_parallelism,
            None,
        )
        .map_err(|e| anyhow::anyhow!("invalid argon2 parameters: {e}"))?;
        anyhow::ensure!(
            self.smtp_username.is_some() == self.smtp_password.is_some(),
            "SMTP_USERNAME and SMTP_PASSWORD must be set together"
        );
        anyhow::ensure!(
            self.bootstrap_staff_email.is_some() == self.bootstrap_staff_password.is_some(),
            "BOOTSTRAP_STAFF_EMAIL and BOOTSTRAP_STAFF_PASSWORD must be set together"
        );
        Ok(())
    }

    /// SMTP 送信に必要な設定が揃っているか
    ///
    /// 認証情報は任意（認証なしのリレーも許可）
    pub fn smtp_configured(&self) -> bool {
        self.smtp_host.is_some() && self.smtp_from_address.is_some()
    }
}

#[cfg(test)]
impl Config {
    /// テスト用設定（DB接続不要、argon2 は最小コスト）
    pub fn for_tests() -> Self {
        Self {
            database_url: SecretBox::new(Box::new(
                "postgres://postgres@localhost/hospital_test".to_string(),
            )),
            database_max_connections: 1,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            cors_allowed_origins: default_cors_allowed_origins(),
            jwt_secret: SecretBox::new(Box::new(
                "test-secret-key-that-is-long-enough-for-hs256".to_string(),
            )),
            session_token_ttl_secs: DEFAULT_SESSION_TOKEN_TTL_SECS,
            password_hash_memory_kib: 8,
            password_hash_iterations: 1,
            password_hash_parallelism: 1,
            smtp_host: None,
            smtp_port: DEFAULT_SMTP_PORT,
            smtp_username: None,
            smtp_password: None,
            smtp_from_address: None,
            password_reset_url_base: DEFAULT_PASSWORD_RESET_URL_BASE.to_string(),
            password_reset_token_ttl_secs: DEFAULT_PASSWORD_RESET_TOKEN_TTL_SECS,
            bootstrap_staff_email: None,
            bootstrap_staff_password: None,
            upload_dir: DEFAULT_UPLOAD_DIR.to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_test_config() {
        assert!(Config::for_tests().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_short_jwt_secret() {
        let config = Config {
            jwt_secret: SecretBox::new(Box::new("too-short".to_string())),
            ..Config::for_tests()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_positive_reset_ttl() {
        let config = Config {
            password_reset_token_ttl_secs: 0,
            ..Config::for_tests()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_invalid_argon2_params() {
        let config = Config {
            password_hash_parallelism: 0,
            ..Config::for_tests()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_partial_bootstrap_account() {
        let config = Config {
            bootstrap_staff_email: Some("admin@example.com".to_string()),
            ..Config::for_tests()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_smtp_configured_requires_host_and_sender() {
        let mut config = Config::for_tests();
        assert!(!config.smtp_configured());

        config.smtp_host = Some("smtp.example.com".to_string());
        assert!(!config.smtp_configured());

        // 認証なしのリレー
        config.smtp_from_address = Some("noreply@example.com".to_string());
        assert!(config.smtp_configured());
    }

    #[test]
    fn test_validate_rejects_partial_smtp_credentials() {
        let config = Config {
            smtp_username: Some(SecretBox::new(Box::new("user".to_string()))),
            ..Config::for_tests()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unbounded_ttls() {
        let config = Config {
            password_reset_token_ttl_secs: MAX_TOKEN_TTL_SECS + 1,
            ..Config::for_tests()
        };
        assert!(config.validate().is_err());

        let config = Config {
            session_token_ttl_secs: i64::MAX,
            ..Config::for_tests()
        };
        assert!(config.validate().is_err());

        let config = Config {
            session_token_ttl_secs: MAX_TOKEN_TTL_SECS,
            password_reset_token_ttl_secs: MAX_TOKEN_TTL_SECS,
            ..Config::for_tests()
        };
        assert!(config.validate().is_ok());
    }
}

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::error::AppError;
use crate::models::Account;

/// セッショントークン（JWT）のクレーム
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// アカウントID
    pub sub: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    pub fn account_id(&self) -> Result<i32, AppError> {
        self.sub.parse().map_err(|_| AppError::Unauthorized)
    }
}

/// HS256 署名付きセッショントークンの発行・検証
///
/// 署名鍵は設定から注入する（グローバル変数にしない）
#[derive(Clone)]
pub struct SessionTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl SessionTokenService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    /// ログイン成功時のトークンを発行
    pub fn issue(&self, account: &Account, now: OffsetDateTime) -> Result<String, AppError> {
        let claims = SessionClaims {
            sub: account.id.to_string(),
            email: account.email.clone(),
            iat: now.unix_timestamp(),
            exp: (now + self.ttl).unix_timestamp(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(AppError::TokenSigning)
    }

    /// トークンを検証してクレームを返す
    ///
    /// 署名不正・期限切れはいずれも `Unauthorized`
    pub fn verify(&self, token: &str) -> Result<SessionClaims, AppError> {
        let validation = Validation::new(Algorithm::HS256);
        jsonwebtoken::decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "セッショントークン検証失敗");
                AppError::Unauthorized
            })
    }
}

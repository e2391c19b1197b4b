use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};

/// トークンのバイト長（256ビット）
const TOKEN_BYTES: usize = 32;

/// 発行済みリセットトークン
///
/// `token`（平文）は通知にのみ使い、ストアには `digest` を保存する
pub struct IssuedToken {
    pub token: String,
    pub digest: String,
    pub expires_at: OffsetDateTime,
}

/// パスワードリセットトークン発行器
///
/// 副作用なし。現在時刻は呼び出し側から渡す
#[derive(Clone, Copy)]
pub struct ResetTokenIssuer {
    ttl: Duration,
}

impl ResetTokenIssuer {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    /// OS乱数から32バイトのトークンを生成し、有効期限 `now + ttl` を付与
    pub fn issue(&self, now: OffsetDateTime) -> IssuedToken {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut bytes);
        let token = URL_SAFE_NO_PAD.encode(bytes);
        let digest = digest(&token);

        IssuedToken {
            token,
            digest,
            expires_at: now + self.ttl,
        }
    }
}

/// トークンを SHA256 でハッシュ化（16進文字列）
pub fn digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// 期限切れ判定
///
/// 有効期限ちょうどの時刻は期限切れとして扱う
pub fn is_expired(expires_at: OffsetDateTime, now: OffsetDateTime) -> bool {
    now >= expires_at
}

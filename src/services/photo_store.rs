use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::AppError;

/// 公開URL上のプレフィックス（`GET /uploads/<file>` で配信）
pub const PUBLIC_PREFIX: &str = "uploads";

const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// 医師写真のファイル保存
///
/// クライアントのファイル名はパスに使わず、UUID で採番する
#[derive(Clone)]
pub struct PhotoStore {
    dir: PathBuf,
}

impl PhotoStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 写真を保存し、DB に保存する公開パス（`uploads/<uuid>.<ext>`）を返す
    pub async fn save(
        &self,
        client_file_name: Option<&str>,
        bytes: &[u8],
    ) -> Result<String, AppError> {
        let extension = client_file_name
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "写真は {} のいずれかの形式でアップロードしてください",
                    ALLOWED_EXTENSIONS.join(", ")
                ))
            })?;

        tokio::fs::create_dir_all(&self.dir).await?;

        let file_name = format!("{}.{}", Uuid::new_v4(), extension);
        tokio::fs::write(self.dir.join(&file_name), bytes).await?;

        tracing::info!(file = %file_name, size = bytes.len(), "写真を保存");

        Ok(format!("{PUBLIC_PREFIX}/{file_name}"))
    }

    /// 保存済み写真を削除（ベストエフォート）
    ///
    /// 公開パスの形式でないもの、ディレクトリ外を指すものは無視する
    pub async fn remove(&self, public_path: &str) {
        let Some(path) = self.resolve(public_path) else {
            if !public_path.is_empty() {
                tracing::warn!(photo = %public_path, "削除対象外の写真パス");
            }
            return;
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => tracing::info!(photo = %public_path, "写真を削除"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(photo = %public_path, "削除対象の写真が存在しない");
            }
            Err(e) => tracing::warn!(error = ?e, photo = %public_path, "写真の削除に失敗"),
        }
    }

    /// 公開パスを保存先の実ファイルパスに変換
    fn resolve(&self, public_path: &str) -> Option<PathBuf> {
        let file_name = public_path.strip_prefix(PUBLIC_PREFIX)?.strip_prefix('/')?;
        let is_plain_name = !file_name.is_empty()
            && !file_name.contains(['/', '\\'])
            && file_name != "."
            && file_name != "..";
        is_plain_name.then(|| self.dir.join(file_name))
    }
}

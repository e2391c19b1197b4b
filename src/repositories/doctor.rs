use sqlx::PgPool;

use crate::models::{Doctor, DoctorInput};

#[derive(Clone)]
pub struct DoctorRepository {
    pool: PgPool,
}

impl DoctorRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 全医師をID降順で取得
    pub async fn list(&self) -> Result<Vec<Doctor>, sqlx::Error> {
        sqlx::query_as::<_, Doctor>(
            r#"
            SELECT id, name, specialization, contact, photo
            FROM doctors
            ORDER BY id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<Doctor>, sqlx::Error> {
        sqlx::query_as::<_, Doctor>(
            r#"
            SELECT id, name, specialization, contact, photo
            FROM doctors
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn create(&self, input: &DoctorInput, photo: &str) -> Result<Doctor, sqlx::Error> {
        sqlx::query_as::<_, Doctor>(
            r#"
            INSERT INTO doctors (name, specialization, contact, photo)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, specialization, contact, photo
            "#,
        )
        .bind(&input.name)
        .bind(&input.specialization)
        .bind(&input.contact)
        .bind(photo)
        .fetch_one(&self.pool)
        .await
    }

    /// # Returns
    /// 対象が存在しない場合は `None`
    pub async fn update(
        &self,
        id: i32,
        input: &DoctorInput,
        photo: &str,
    ) -> Result<Option<Doctor>, sqlx::Error> {
        sqlx::query_as::<_, Doctor>(
            r#"
            UPDATE doctors
            SET name = $2, specialization = $3, contact = $4, photo = $5
            WHERE id = $1
            RETURNING id, name, specialization, contact, photo
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.specialization)
        .bind(&input.contact)
        .bind(photo)
        .fetch_optional(&self.pool)
        .await
    }

    /// 医師を削除し、削除した行を返す
    ///
    /// # Note
    /// 写真ファイルの削除は呼び出し側で行う
    pub async fn delete(&self, id: i32) -> Result<Option<Doctor>, sqlx::Error> {
        sqlx::query_as::<_, Doctor>(
            r#"
            DELETE FROM doctors
            WHERE id = $1
            RETURNING id, name, specialization, contact, photo
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }
}

use sqlx::PgPool;

use crate::models::{Patient, PatientInput};

#[derive(Clone)]
pub struct PatientRepository {
    pool: PgPool,
}

impl PatientRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 全患者を登録日時の新しい順に取得
    pub async fn list(&self) -> Result<Vec<Patient>, sqlx::Error> {
        sqlx::query_as::<_, Patient>(
            r#"
            SELECT id, name, birth_date, gender, address, contact, visit_date, complaint, created_at
            FROM patients
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<Patient>, sqlx::Error> {
        sqlx::query_as::<_, Patient>(
            r#"
            SELECT id, name, birth_date, gender, address, contact, visit_date, complaint, created_at
            FROM patients
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn create(&self, input: &PatientInput) -> Result<Patient, sqlx::Error> {
        sqlx::query_as::<_, Patient>(
            r#"
            INSERT INTO patients (name, birth_date, gender, address, contact, visit_date, complaint)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, name, birth_date, gender, address, contact, visit_date, complaint, created_at
            "#,
        )
        .bind(&input.name)
        .bind(input.birth_date)
        .bind(&input.gender)
        .bind(&input.address)
        .bind(&input.contact)
        .bind(input.visit_date)
        .bind(&input.complaint)
        .fetch_one(&self.pool)
        .await
    }

    /// 患者情報を全項目置き換え
    ///
    /// # Returns
    /// 対象が存在しない場合は `None`
    pub async fn update(
        &self,
        id: i32,
        input: &PatientInput,
    ) -> Result<Option<Patient>, sqlx::Error> {
        sqlx::query_as::<_, Patient>(
            r#"
            UPDATE patients
            SET name = $2, birth_date = $3, gender = $4, address = $5,
                contact = $6, visit_date = $7, complaint = $8
            WHERE id = $1
            RETURNING id, name, birth_date, gender, address, contact, visit_date, complaint, created_at
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(input.birth_date)
        .bind(&input.gender)
        .bind(&input.address)
        .bind(&input.contact)
        .bind(input.visit_date)
        .bind(&input.complaint)
        .fetch_optional(&self.pool)
        .await
    }

    /// # Returns
    /// 削除された行数
    pub async fn delete(&self, id: i32) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM patients WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Patient {
    pub id: i32,
    pub name: String,
    pub birth_date: Date,
    pub gender: String,
    pub address: String,
    pub contact: String,
    pub visit_date: Date,
    pub complaint: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// 患者の登録・更新リクエスト
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PatientInput {
    #[garde(length(min = 1, max = 100))]
    pub name: String,
    #[garde(skip)]
    pub birth_date: Date,
    #[garde(length(min = 1, max = 20))]
    pub gender: String,
    #[garde(length(max = 255))]
    #[serde(default)]
    pub address: String,
    #[garde(length(max = 20), custom(digits_only))]
    #[serde(default)]
    pub contact: String,
    #[garde(custom(not_before(&self.birth_date)))]
    pub visit_date: Date,
    #[garde(length(max = 2000))]
    #[serde(default)]
    pub complaint: String,
}

/// 電話番号は数字（先頭の + のみ許可）
#[allow(clippy::ptr_arg)]
pub(crate) fn digits_only(value: &String, _context: &()) -> garde::Result {
    let digits = value.strip_prefix('+').unwrap_or(value);
    if digits.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(garde::Error::new("数字のみで入力してください"))
    }
}

fn not_before(birth_date: &Date) -> impl FnOnce(&Date, &()) -> garde::Result + '_ {
    move |visit_date, _| {
        if visit_date < birth_date {
            return Err(garde::Error::new("受診日は生年月日以降の日付にしてください"));
        }
        Ok(())
    }
}

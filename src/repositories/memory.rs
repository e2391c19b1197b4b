//! テスト用のインメモリ CredentialStore

use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;

use super::CredentialStore;
use crate::models::Account;

#[derive(Default)]
pub struct InMemoryCredentialStore {
    accounts: Mutex<Vec<Account>>,
    fail_writes: bool,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 書き込み系操作が常に失敗するストア
    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    /// アカウントを追加し、採番したIDを返す
    pub fn insert(&self, email: &str, password_hash: &str) -> i32 {
        let mut accounts = self.accounts.lock().unwrap();
        let id = accounts.len() as i32 + 1;
        accounts.push(Account {
            id,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            reset_token: None,
            token_expiry: None,
        });
        id
    }

    pub fn get(&self, id: i32) -> Option<Account> {
        self.accounts
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id == id)
            .cloned()
    }

    pub fn all(&self) -> Vec<Account> {
        self.accounts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get_by_email(&self, email: &str) -> Result<Option<Account>, sqlx::Error> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.email == email)
            .cloned())
    }

    async fn get_by_reset_token(
        &self,
        token_digest: &str,
    ) -> Result<Option<Account>, sqlx::Error> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.reset_token.as_deref() == Some(token_digest))
            .cloned())
    }

    async fn set_reset_token(
        &self,
        id: i32,
        token_digest: &str,
        expiry: OffsetDateTime,
    ) -> Result<u64, sqlx::Error> {
        if self.fail_writes {
            return Err(sqlx::Error::PoolTimedOut);
        }
        let mut accounts = self.accounts.lock().unwrap();
        match accounts.iter_mut().find(|a| a.id == id) {
            Some(account) => {
                account.reset_token = Some(token_digest.to_string());
                account.token_expiry = Some(expiry);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn update_password_and_clear_token(
        &self,
        id: i32,
        token_digest: &str,
        new_password_hash: &str,
    ) -> Result<u64, sqlx::Error> {
        if self.fail_writes {
            return Err(sqlx::Error::PoolTimedOut);
        }
        let mut accounts = self.accounts.lock().unwrap();
        match accounts
            .iter_mut()
            .find(|a| a.id == id && a.reset_token.as_deref() == Some(token_digest))
        {
            Some(account) => {
                account.password_hash = new_password_hash.to_string();
                account.reset_token = None;
                account.token_expiry = None;
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;

/// 通知送信（メール等）
///
/// 失敗は呼び出し側にそのまま返す。再送ポリシーを持たせる場合は実装側で行う
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// 設定に応じて通知送信の実装を選ぶ
///
/// SMTP 未設定の場合のみログ出力スタブを使う。
/// SMTP 設定があるのに email 機能が無効なビルドは起動時にエラーとする
pub fn notifier_from_config(config: &Config) -> anyhow::Result<Arc<dyn Notifier>> {
    if !config.smtp_configured() {
        tracing::warn!("SMTP 未設定: メールは送信されません（開発モード）");
        return Ok(Arc::new(LogMailer));
    }

    #[cfg(feature = "email")]
    {
        tracing::info!(smtp_host = ?config.smtp_host, "SMTP メール送信を初期化");
        Ok(Arc::new(smtp::SmtpMailer::from_config(config)?))
    }

    #[cfg(not(feature = "email"))]
    {
        anyhow::bail!("SMTP is configured but this build lacks the `email` feature")
    }
}

/// メール送信スタブ（開発環境）
///
/// 本文にはリセットトークンが含まれるため、宛先と件名のみ記録する
#[derive(Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Notifier for LogMailer {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        tracing::info!(
            to = %recipient,
            subject = %subject,
            body_len = body.len(),
            "メール送信を省略（開発モード）"
        );
        Ok(())
    }
}

#[cfg(feature = "email")]
mod smtp {
    use anyhow::Context;
    use async_trait::async_trait;
    use lettre::message::{Mailbox, header::ContentType};
    use lettre::transport::smtp::authentication::Credentials;
    use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
    use secrecy::ExposeSecret;

    use super::Notifier;
    use crate::config::Config;

    /// lettre による SMTP 送信（STARTTLS）
    pub struct SmtpMailer {
        transport: AsyncSmtpTransport<Tokio1Executor>,
        from: Mailbox,
    }

    impl SmtpMailer {
        pub fn from_config(config: &Config) -> anyhow::Result<Self> {
            let host = config.smtp_host.as_deref().context("SMTP_HOST is not set")?;
            let from = config
                .smtp_from_address
                .as_deref()
                .context("SMTP_FROM_ADDRESS is not set")?
                .parse::<Mailbox>()
                .context("SMTP_FROM_ADDRESS is not a valid mailbox")?;

            let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
                .port(config.smtp_port);
            if let (Some(username), Some(password)) = (&config.smtp_username, &config.smtp_password)
            {
                builder = builder.credentials(Credentials::new(
                    username.expose_secret().clone(),
                    password.expose_secret().clone(),
                ));
            }

            Ok(Self {
                transport: builder.build(),
                from,
            })
        }
    }

    #[async_trait]
    impl Notifier for SmtpMailer {
        async fn send(&self, recipient: &str, subject: &str, body: &str) -> anyhow::Result<()> {
            let to = recipient
                .parse::<Mailbox>()
                .context("invalid recipient address")?;
            let message = Message::builder()
                .from(self.from.clone())
                .to(to)
                .subject(subject)
                .header(ContentType::TEXT_PLAIN)
                .body(body.to_string())?;

            self.transport.send(message).await?;
            tracing::info!(to = %recipient, "メール送信完了");
            Ok(())
        }
    }
}

#[cfg(test)]
pub use recording::{RecordingMailer, SentMail};

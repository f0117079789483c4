//! Noop 送信実装
//!
//! メールを実際に送信せず、ログ出力のみ行う。
//! テスト環境や配信無効化時に使用する。

use async_trait::async_trait;
use reformworks_domain::mail::{OutgoingEmail, SendError};

use super::MailSender;

/// Noop 送信（ログ出力のみ）
#[derive(Debug, Clone)]
pub struct NoopMailSender;

#[async_trait]
impl MailSender for NoopMailSender {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), SendError> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "Noop: メール送信をスキップ"
        );
        Ok(())
    }
}

//! SES 送信実装
//!
//! AWS SES v2 API を使用してメールを送信する。
//! 本番環境で使用する。

use async_trait::async_trait;
use aws_sdk_sesv2::{
    Client,
    types::{Body, Content, Destination, EmailContent, Message, MessageTag},
};
use reformworks_domain::mail::{OutgoingEmail, SendError};

use super::MailSender;

/// SES 送信
///
/// `aws_sdk_sesv2::Client` をラップする。
/// 本番環境で AWS SES を通じてメールを送信する。
/// 相関メタデータは SES のメッセージタグとして添付され、
/// イベント通知での突き合わせに使用できる。
pub struct SesMailSender {
    client: Client,
}

impl SesMailSender {
    /// 新しい SES 送信インスタンスを作成
    ///
    /// # 引数
    ///
    /// - `client`: AWS SES v2 クライアント。差出人アドレスは
    ///   メッセージごとに指定される（SES で検証済みであること）
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MailSender for SesMailSender {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), SendError> {
        let destination = Destination::builder().to_addresses(email.to.as_str()).build();

        let content = EmailContent::builder()
            .simple(
                Message::builder()
                    .subject(
                        Content::builder()
                            .data(&email.subject)
                            .build()
                            .map_err(|e| SendError::InvalidMessage(format!("件名構築失敗: {e}")))?,
                    )
                    .body(
                        Body::builder()
                            .html(Content::builder().data(&email.html_body).build().map_err(
                                |e| SendError::InvalidMessage(format!("HTML 本文構築失敗: {e}")),
                            )?)
                            .build(),
                    )
                    .build(),
            )
            .build();

        let mut request = self
            .client
            .send_email()
            .from_email_address(email.from_mailbox())
            .destination(destination)
            .content(content);

        if let Some(reply_to) = &email.reply_to {
            request = request.reply_to_addresses(reply_to.as_str());
        }

        for (name, value) in &email.metadata {
            let tag = MessageTag::builder()
                .name(name)
                .value(value)
                .build()
                .map_err(|e| SendError::InvalidMessage(format!("メッセージタグ構築失敗: {e}")))?;
            request = request.email_tags(tag);
        }

        request
            .send()
            .await
            .map_err(|e| SendError::Provider(format!("SES 送信失敗: {e}")))?;

        Ok(())
    }
}

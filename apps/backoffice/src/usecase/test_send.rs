//! # テスト送信
//!
//! 実際のキャンペーン配信前にテンプレートをプレビューするための
//! 単一宛先送信。Campaign / 追跡行の状態には一切触れない
//! （配信パイプラインとは完全に別経路）。
//!
//! ## 設計方針
//!
//! - **差出人の検証**: 指定された from アドレスが登録済みの差出人
//!   コンタクトであることを要求する（未登録の身元での送信を防ぐ）
//! - **`[TEST]` プレフィクス**: 受信者が本番配信と誤認しないよう、
//!   レンダリング済み件名の先頭に可視マーカーを付ける
//! - **サンプルデータ**: 固定のダミー値の上に呼び出し側のデータを重ねる

use std::{collections::HashMap, sync::Arc};

use reformworks_domain::{
    contact::Email,
    mail::{OutgoingEmail, SendError},
    template::TemplateId,
};
use reformworks_infra::{
    InfraError,
    mailer::MailSender,
    repository::{ContactRepository, TemplateRepository},
};
use thiserror::Error;

use super::renderer::CampaignRenderer;

/// テスト送信のエラー
#[derive(Debug, Error)]
pub enum TestSendError {
    /// テンプレートが存在しない
    #[error("テンプレートが見つかりません: {0}")]
    TemplateNotFound(TemplateId),

    /// 差出人コンタクトが未登録
    #[error("差出人が登録されていません: {0}")]
    SenderNotRegistered(String),

    /// プロバイダレベルの送信失敗
    #[error(transparent)]
    Send(#[from] SendError),

    /// 永続化層の失敗
    #[error(transparent)]
    Repository(#[from] InfraError),
}

/// テスト送信の入力
pub struct TestSendInput {
    pub template_id: TemplateId,
    pub recipient_email: Email,
    pub from_email: Email,
    pub from_name: String,
    pub reply_to: Option<Email>,
    pub sample_data: HashMap<String, String>,
}

/// テスト送信ユースケース
pub struct TestSendUseCase {
    template_repo: Arc<dyn TemplateRepository>,
    contact_repo:  Arc<dyn ContactRepository>,
    mailer:        Arc<dyn MailSender>,
    renderer:      CampaignRenderer,
}

impl TestSendUseCase {
    pub fn new(
        template_repo: Arc<dyn TemplateRepository>,
        contact_repo: Arc<dyn ContactRepository>,
        mailer: Arc<dyn MailSender>,
        renderer: CampaignRenderer,
    ) -> Self {
        Self {
            template_repo,
            contact_repo,
            mailer,
            renderer,
        }
    }

    /// テストメールを 1 通送信する
    #[tracing::instrument(skip_all, fields(template_id = %input.template_id))]
    pub async fn send_test(&self, input: TestSendInput) -> Result<(), TestSendError> {
        let template = self
            .template_repo
            .find_by_id(&input.template_id)
            .await?
            .ok_or_else(|| TestSendError::TemplateNotFound(input.template_id.clone()))?;

        if self
            .contact_repo
            .find_sender_by_email(&input.from_email)
            .await?
            .is_none()
        {
            return Err(TestSendError::SenderNotRegistered(
                input.from_email.to_string(),
            ));
        }

        // 固定のサンプル値の上に呼び出し側のデータを重ねる
        let mut recipient_data = HashMap::from([
            ("name".to_string(), "Test User".to_string()),
            ("email".to_string(), input.recipient_email.to_string()),
            ("company".to_string(), "サンプル工務店".to_string()),
            ("phone".to_string(), "000-0000-0000".to_string()),
        ]);
        recipient_data.extend(input.sample_data);

        let rendered = self
            .renderer
            .render_email(&template, &recipient_data, &HashMap::new());

        let email = OutgoingEmail {
            to: input.recipient_email,
            from_email: input.from_email,
            from_name: input.from_name,
            reply_to: input.reply_to,
            subject: format!("[TEST] {}", rendered.subject),
            html_body: rendered.html_body,
            metadata: vec![("kind".to_string(), "test_send".to_string())],
        };

        self.mailer.send(&email).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use reformworks_domain::{
        clock::FixedClock,
        contact::{Contact, ContactId, ContactKind, ContactName},
        template::{Template, TemplateName},
        user::UserId,
    };
    use reformworks_infra::mock::{MockContactRepository, MockMailSender, MockTemplateRepository};

    use super::*;

    struct Fixture {
        template_repo: MockTemplateRepository,
        contact_repo:  MockContactRepository,
        mailer:        MockMailSender,
        usecase:       TestSendUseCase,
    }

    fn make_fixture() -> Fixture {
        let template_repo = MockTemplateRepository::new();
        let contact_repo = MockContactRepository::new();
        let mailer = MockMailSender::new();
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 3, 7, 9, 30, 0).unwrap(),
        ));

        let usecase = TestSendUseCase::new(
            Arc::new(template_repo.clone()),
            Arc::new(contact_repo.clone()),
            Arc::new(mailer.clone()),
            CampaignRenderer::new(clock, "https://reform.example.com"),
        );

        Fixture {
            template_repo,
            contact_repo,
            mailer,
            usecase,
        }
    }

    fn add_template(fixture: &Fixture) -> TemplateId {
        let template = Template::new(
            TemplateId::new(),
            TemplateName::new("お知らせ").unwrap(),
            "{{name}}様へのご案内".to_string(),
            "<p>{{name}}様（{{company}}）</p>".to_string(),
            vec!["company".to_string()],
            UserId::new(),
            Utc::now(),
        )
        .unwrap();
        let id = template.id().clone();
        fixture.template_repo.add_template(template);
        id
    }

    fn add_sender(fixture: &Fixture, email: &str) {
        fixture.contact_repo.add_contact(Contact::new(
            ContactId::new(),
            ContactName::new("広報").unwrap(),
            Email::new(email).unwrap(),
            vec![],
            ContactKind::Sender,
            UserId::new(),
            Utc::now(),
        ));
    }

    fn make_input(template_id: TemplateId) -> TestSendInput {
        TestSendInput {
            template_id,
            recipient_email: Email::new("preview@example.com").unwrap(),
            from_email: Email::new("news@reform.example.com").unwrap(),
            from_name: "ReformWorks 広報".to_string(),
            reply_to: None,
            sample_data: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_件名にtestマーカーが付く() {
        let fixture = make_fixture();
        let template_id = add_template(&fixture);
        add_sender(&fixture, "news@reform.example.com");

        fixture.usecase.send_test(make_input(template_id)).await.unwrap();

        let sent = fixture.mailer.sent_emails();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "[TEST] Test User様へのご案内");
        assert_eq!(sent[0].to.as_str(), "preview@example.com");
    }

    #[tokio::test]
    async fn test_サンプルデータが固定値を上書きする() {
        let fixture = make_fixture();
        let template_id = add_template(&fixture);
        add_sender(&fixture, "news@reform.example.com");

        let mut input = make_input(template_id);
        input.sample_data = HashMap::from([
            ("name".to_string(), "佐藤".to_string()),
            ("company".to_string(), "佐藤工務店".to_string()),
        ]);
        fixture.usecase.send_test(input).await.unwrap();

        let sent = fixture.mailer.sent_emails();
        assert_eq!(sent[0].subject, "[TEST] 佐藤様へのご案内");
        assert_eq!(sent[0].html_body, "<p>佐藤様（佐藤工務店）</p>");
    }

    #[tokio::test]
    async fn test_固定のダミー値が使われる() {
        let fixture = make_fixture();
        let template_id = add_template(&fixture);
        add_sender(&fixture, "news@reform.example.com");

        fixture.usecase.send_test(make_input(template_id)).await.unwrap();

        let sent = fixture.mailer.sent_emails();
        assert_eq!(sent[0].html_body, "<p>Test User様（サンプル工務店）</p>");
    }

    #[tokio::test]
    async fn test_テンプレートがなければnot_found() {
        let fixture = make_fixture();
        add_sender(&fixture, "news@reform.example.com");

        let result = fixture.usecase.send_test(make_input(TemplateId::new())).await;

        assert!(matches!(result, Err(TestSendError::TemplateNotFound(_))));
        assert!(fixture.mailer.sent_emails().is_empty());
    }

    #[tokio::test]
    async fn test_未登録の差出人は拒否される() {
        let fixture = make_fixture();
        let template_id = add_template(&fixture);
        // 差出人を登録しない

        let result = fixture.usecase.send_test(make_input(template_id)).await;

        assert!(matches!(result, Err(TestSendError::SenderNotRegistered(_))));
        assert!(fixture.mailer.sent_emails().is_empty());
    }

    #[tokio::test]
    async fn test_宛先種別のコンタクトは差出人として認められない() {
        let fixture = make_fixture();
        let template_id = add_template(&fixture);
        // 同じアドレスだが宛先種別で登録
        fixture.contact_repo.add_contact(Contact::new(
            ContactId::new(),
            ContactName::new("宛先").unwrap(),
            Email::new("news@reform.example.com").unwrap(),
            vec![],
            ContactKind::Recipient,
            UserId::new(),
            Utc::now(),
        ));

        let result = fixture.usecase.send_test(make_input(template_id)).await;

        assert!(matches!(result, Err(TestSendError::SenderNotRegistered(_))));
    }

    #[tokio::test]
    async fn test_プロバイダ失敗はエラーとして返る() {
        let fixture = make_fixture();
        let template_id = add_template(&fixture);
        add_sender(&fixture, "news@reform.example.com");
        fixture.mailer.fail_for("preview@example.com");

        let result = fixture.usecase.send_test(make_input(template_id)).await;

        assert!(matches!(result, Err(TestSendError::Send(_))));
    }
}

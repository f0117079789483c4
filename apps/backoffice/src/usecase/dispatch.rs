//! # キャンペーン配信パイプライン
//!
//! このサービスの中核。キャンペーン ID を受け取り、宛先の解決から
//! 宛先ごとの送信・結果記録・最終ステータス確定までを実行する。
//!
//! ## アルゴリズム
//!
//! 1. キャンペーンを取得（なければ `CampaignNotFound`）
//! 2. `draft` 以外なら `AlreadyProcessed`（先行チェック）
//! 3. テンプレートを取得（なければ `TemplateMissing`。claim **前**に検証し、
//!    参照切れのキャンペーンを `sending` のまま残さない）
//! 4. 条件付き UPDATE で `draft → sending` を claim。影響行数 0 は
//!    他のリクエストが先に claim したことを意味し `AlreadyProcessed`
//! 5. タグ重複で宛先を解決。0 件なら `failed` を書き込み `NoRecipients`
//! 6. 宛先ごとの追跡行を一括作成（`email_sent = false`）
//! 7. 宛先ごとに**逐次**: レンダリング → 送信 → 追跡行更新。
//!    宛先単位の失敗は追跡行に記録してループを継続する（バッチを
//!    中断しない）
//! 8. 集計から最終ステータスを導出して書き込む
//!    （成功 0 件のみ `failed`、部分失敗は `sent`）
//!
//! claim 後のあらゆる失敗は、キャンペーンを `failed` にしてから
//! 呼び出し側へ返す。
//!
//! ## 並行性
//!
//! 宛先ループは意図的に逐次実行とする（送信と追跡行書き込みの await が
//! 完了してから次の宛先へ進む）。キャンペーン規模は数十〜数百件の想定で、
//! リトライ・キュー・並行プールは持たない。

use std::{collections::HashMap, sync::Arc};

use reformworks_domain::{
    campaign::{Campaign, CampaignId, CampaignRecipient, CampaignStatus, DispatchStats},
    clock::Clock,
    contact::Contact,
    mail::OutgoingEmail,
    template::{Template, TemplateId},
};
use reformworks_infra::{
    InfraError,
    mailer::MailSender,
    repository::{
        CampaignRecipientRepository,
        CampaignRepository,
        ContactRepository,
        TemplateRepository,
    },
};
use thiserror::Error;

use super::renderer::CampaignRenderer;

/// 配信パイプラインのエラー
#[derive(Debug, Error)]
pub enum DispatchError {
    /// キャンペーンが存在しない
    #[error("キャンペーンが見つかりません: {0}")]
    CampaignNotFound(CampaignId),

    /// 参照先テンプレートが存在しない（参照切れ）
    #[error("テンプレートが見つかりません: {0}")]
    TemplateMissing(TemplateId),

    /// すでに送信処理が開始・完了している（再送信ガード）
    #[error("キャンペーンは既に処理されています: {0}")]
    AlreadyProcessed(CampaignId),

    /// タグにマッチする宛先が 0 件
    #[error("配信対象の宛先がいません")]
    NoRecipients,

    /// 永続化層の失敗
    #[error(transparent)]
    Repository(#[from] InfraError),
}

/// キャンペーンディスパッチャ
pub struct CampaignDispatcher {
    campaign_repo: Arc<dyn CampaignRepository>,
    template_repo: Arc<dyn TemplateRepository>,
    contact_repo: Arc<dyn ContactRepository>,
    tracking_repo: Arc<dyn CampaignRecipientRepository>,
    mailer: Arc<dyn MailSender>,
    renderer: CampaignRenderer,
    clock: Arc<dyn Clock>,
}

impl CampaignDispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        campaign_repo: Arc<dyn CampaignRepository>,
        template_repo: Arc<dyn TemplateRepository>,
        contact_repo: Arc<dyn ContactRepository>,
        tracking_repo: Arc<dyn CampaignRecipientRepository>,
        mailer: Arc<dyn MailSender>,
        renderer: CampaignRenderer,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            campaign_repo,
            template_repo,
            contact_repo,
            tracking_repo,
            mailer,
            renderer,
            clock,
        }
    }

    /// キャンペーンを配信する
    ///
    /// 成功時は試行・成功・失敗件数の集計を返す。
    /// 部分失敗は集計に現れるだけで、エラーにはならない。
    #[tracing::instrument(skip(self), fields(campaign_id = %campaign_id))]
    pub async fn dispatch(&self, campaign_id: &CampaignId) -> Result<DispatchStats, DispatchError> {
        let campaign = self
            .campaign_repo
            .find_by_id(campaign_id)
            .await?
            .ok_or_else(|| DispatchError::CampaignNotFound(campaign_id.clone()))?;

        // 先行チェック。確定的なガードは claim の条件付き UPDATE
        if campaign.status() != CampaignStatus::Draft {
            return Err(DispatchError::AlreadyProcessed(campaign_id.clone()));
        }

        // テンプレートの参照切れは claim 前に検出する
        let template = self
            .template_repo
            .find_by_id(campaign.template_id())
            .await?
            .ok_or_else(|| DispatchError::TemplateMissing(campaign.template_id().clone()))?;

        if !self
            .campaign_repo
            .claim_for_sending(campaign_id, self.clock.now())
            .await?
        {
            // 条件付き UPDATE が 0 行: 別リクエストが先に claim した
            return Err(DispatchError::AlreadyProcessed(campaign_id.clone()));
        }

        match self.run_send_loop(&campaign, &template).await {
            Ok(stats) => {
                tracing::info!(
                    attempted = stats.attempted,
                    succeeded = stats.succeeded,
                    failed = stats.failed,
                    status = %stats.outcome(),
                    "キャンペーン配信が完了"
                );
                Ok(stats)
            }
            Err(e) => {
                // claim 後の失敗はキャンペーンを failed にしてから返す
                if let Err(finish_err) = self
                    .campaign_repo
                    .finish(campaign_id, CampaignStatus::Failed, None, self.clock.now())
                    .await
                {
                    tracing::error!(
                        error = %finish_err,
                        "失敗ステータスの書き込みに失敗"
                    );
                }
                Err(e)
            }
        }
    }

    /// 宛先解決から最終ステータス確定まで
    ///
    /// claim 済みのキャンペーンに対してのみ呼ばれる。
    async fn run_send_loop(
        &self,
        campaign: &Campaign,
        template: &Template,
    ) -> Result<DispatchStats, DispatchError> {
        let recipients = self
            .contact_repo
            .find_recipients_by_tags(campaign.recipient_tags())
            .await?;

        if recipients.is_empty() {
            return Err(DispatchError::NoRecipients);
        }

        let mut rows: Vec<CampaignRecipient> = recipients
            .iter()
            .map(|r| CampaignRecipient::pending(campaign.id().clone(), r.id().clone()))
            .collect();
        self.tracking_repo.insert_batch(&rows).await?;

        let mut stats = DispatchStats::default();

        // 宛先ごとに逐次処理する。並行化しない
        for (recipient, row) in recipients.iter().zip(rows.iter_mut()) {
            let email = self.build_email(campaign, template, recipient);

            match self.mailer.send(&email).await {
                Ok(()) => {
                    row.mark_sent(self.clock.now());
                    stats.record_success();
                }
                Err(e) => {
                    tracing::warn!(
                        recipient = %recipient.email(),
                        error = %e,
                        "宛先への送信に失敗（バッチは継続）"
                    );
                    row.mark_failed(e.to_string());
                    stats.record_failure();
                }
            }

            // 追跡行の更新はベストエフォート。失敗してもバッチは継続する
            if let Err(e) = self.tracking_repo.update_outcome(row).await {
                tracing::error!(error = %e, "配信追跡行の更新に失敗");
            }
        }

        let now = self.clock.now();
        self.campaign_repo
            .finish(campaign.id(), stats.outcome(), Some(now), now)
            .await?;

        Ok(stats)
    }

    /// 宛先向けの送信メッセージを構築する
    fn build_email(
        &self,
        campaign: &Campaign,
        template: &Template,
        recipient: &Contact,
    ) -> OutgoingEmail {
        let recipient_data = HashMap::from([
            ("name".to_string(), recipient.name().as_str().to_string()),
            ("email".to_string(), recipient.email().as_str().to_string()),
        ]);

        let rendered = self
            .renderer
            .render_email(template, &recipient_data, &HashMap::new());

        OutgoingEmail {
            to: recipient.email().clone(),
            from_email: campaign.from_email().clone(),
            from_name: campaign.from_name().to_string(),
            reply_to: None,
            subject: rendered.subject,
            html_body: rendered.html_body,
            metadata: vec![
                ("campaign_id".to_string(), campaign.id().to_string()),
                ("recipient_id".to_string(), recipient.id().to_string()),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use reformworks_domain::{
        campaign::{CampaignName, NewCampaign},
        clock::FixedClock,
        contact::{ContactId, ContactKind, ContactName, Email, Tag},
        template::{TemplateName, TemplateRecord},
        user::UserId,
    };
    use reformworks_infra::mock::{
        MockCampaignRecipientRepository,
        MockCampaignRepository,
        MockContactRepository,
        MockMailSender,
        MockTemplateRepository,
    };

    use super::*;

    struct Fixture {
        campaign_repo: MockCampaignRepository,
        template_repo: MockTemplateRepository,
        contact_repo:  MockContactRepository,
        tracking_repo: MockCampaignRecipientRepository,
        mailer:        MockMailSender,
        dispatcher:    CampaignDispatcher,
    }

    fn fixed_now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 7, 9, 30, 0).unwrap()
    }

    fn make_fixture() -> Fixture {
        let campaign_repo = MockCampaignRepository::new();
        let template_repo = MockTemplateRepository::new();
        let contact_repo = MockContactRepository::new();
        let tracking_repo = MockCampaignRecipientRepository::new();
        let mailer = MockMailSender::new();
        let clock = Arc::new(FixedClock::new(fixed_now()));

        let dispatcher = CampaignDispatcher::new(
            Arc::new(campaign_repo.clone()),
            Arc::new(template_repo.clone()),
            Arc::new(contact_repo.clone()),
            Arc::new(tracking_repo.clone()),
            Arc::new(mailer.clone()),
            CampaignRenderer::new(clock.clone(), "https://reform.example.com"),
            clock,
        );

        Fixture {
            campaign_repo,
            template_repo,
            contact_repo,
            tracking_repo,
            mailer,
            dispatcher,
        }
    }

    fn add_template(fixture: &Fixture) -> TemplateId {
        let template = Template::from_db(TemplateRecord {
            id: TemplateId::new(),
            name: TemplateName::new("お知らせ").unwrap(),
            subject: "Hello {{name}}".to_string(),
            html_body: "<p>{{name}}, your code is {{code}}</p>".to_string(),
            variables: vec!["code".to_string()],
            created_by: UserId::new(),
            created_at: fixed_now(),
            updated_at: fixed_now(),
        });
        let id = template.id().clone();
        fixture.template_repo.add_template(template);
        id
    }

    fn add_campaign(fixture: &Fixture, template_id: TemplateId, tags: &[&str]) -> CampaignId {
        let campaign = Campaign::new(NewCampaign {
            id: CampaignId::new(),
            name: CampaignName::new("春のリフォームフェア").unwrap(),
            template_id,
            recipient_tags: tags.iter().map(|t| Tag::new(*t).unwrap()).collect(),
            from_email: Email::new("news@reform.example.com").unwrap(),
            from_name: "ReformWorks 広報".to_string(),
            created_by: UserId::new(),
            now: fixed_now(),
        });
        let id = campaign.id().clone();
        fixture.campaign_repo.add_campaign(campaign);
        id
    }

    fn add_recipient(fixture: &Fixture, name: &str, email: &str, tags: &[&str]) -> ContactId {
        let contact = Contact::new(
            ContactId::new(),
            ContactName::new(name).unwrap(),
            Email::new(email).unwrap(),
            tags.iter().map(|t| Tag::new(*t).unwrap()).collect(),
            ContactKind::Recipient,
            UserId::new(),
            fixed_now(),
        );
        let id = contact.id().clone();
        fixture.contact_repo.add_contact(contact);
        id
    }

    fn campaign_status(fixture: &Fixture, id: &CampaignId) -> CampaignStatus {
        fixture
            .campaign_repo
            .campaigns()
            .iter()
            .find(|c| c.id() == id)
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn test_全宛先成功でsentになる() {
        let fixture = make_fixture();
        let template_id = add_template(&fixture);
        let campaign_id = add_campaign(&fixture, template_id, &[]);
        add_recipient(&fixture, "Ana", "a@x.com", &["vip"]);
        add_recipient(&fixture, "Ben", "b@x.com", &[]);

        let stats = fixture.dispatcher.dispatch(&campaign_id).await.unwrap();

        assert_eq!(stats.attempted, 2);
        assert_eq!(stats.succeeded, 2);
        assert_eq!(stats.failed, 0);
        assert_eq!(campaign_status(&fixture, &campaign_id), CampaignStatus::Sent);

        let rows = fixture.tracking_repo.rows();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.email_sent));
        assert!(rows.iter().all(|r| r.sent_at == Some(fixed_now())));
    }

    #[tokio::test]
    async fn test_タグ重複で宛先が絞られる() {
        // vip タグのキャンペーンは ["vip","east"] にマッチし ["west"] を除外する
        let fixture = make_fixture();
        let template_id = add_template(&fixture);
        let campaign_id = add_campaign(&fixture, template_id, &["vip"]);
        add_recipient(&fixture, "Ana", "a@x.com", &["vip", "east"]);
        add_recipient(&fixture, "Ben", "b@x.com", &["west"]);

        let stats = fixture.dispatcher.dispatch(&campaign_id).await.unwrap();

        assert_eq!(stats.attempted, 1);
        let sent = fixture.mailer.sent_emails();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to.as_str(), "a@x.com");
    }

    #[tokio::test]
    async fn test_レンダリング結果が送信メッセージに反映される() {
        let fixture = make_fixture();
        let template_id = add_template(&fixture);
        let campaign_id = add_campaign(&fixture, template_id, &[]);
        add_recipient(&fixture, "Ana", "a@x.com", &[]);

        fixture.dispatcher.dispatch(&campaign_id).await.unwrap();

        let sent = fixture.mailer.sent_emails();
        assert_eq!(sent[0].subject, "Hello Ana");
        // code は宛先データにないため空文字列
        assert_eq!(sent[0].html_body, "<p>Ana, your code is </p>");
        assert_eq!(sent[0].from_email.as_str(), "news@reform.example.com");
        assert_eq!(sent[0].from_name, "ReformWorks 広報");
    }

    #[tokio::test]
    async fn test_部分失敗でもsentになり追跡行に結果が残る() {
        let fixture = make_fixture();
        let template_id = add_template(&fixture);
        let campaign_id = add_campaign(&fixture, template_id, &[]);
        let ana_id = add_recipient(&fixture, "Ana", "a@x.com", &[]);
        let ben_id = add_recipient(&fixture, "Ben", "b@x.com", &[]);
        fixture.mailer.fail_for("b@x.com");

        let stats = fixture.dispatcher.dispatch(&campaign_id).await.unwrap();

        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.failed, 1);
        // 部分失敗はキャンペーンとしては成功
        assert_eq!(campaign_status(&fixture, &campaign_id), CampaignStatus::Sent);

        let rows = fixture.tracking_repo.rows();
        let ana_row = rows.iter().find(|r| r.recipient_id == ana_id).unwrap();
        let ben_row = rows.iter().find(|r| r.recipient_id == ben_id).unwrap();
        assert!(ana_row.email_sent);
        assert!(ana_row.error_message.is_none());
        assert!(!ben_row.email_sent);
        assert!(
            ben_row
                .error_message
                .as_deref()
                .unwrap()
                .contains("mailbox unavailable")
        );
    }

    #[tokio::test]
    async fn test_全滅でfailedになる() {
        let fixture = make_fixture();
        let template_id = add_template(&fixture);
        let campaign_id = add_campaign(&fixture, template_id, &[]);
        add_recipient(&fixture, "Ana", "a@x.com", &[]);
        add_recipient(&fixture, "Ben", "b@x.com", &[]);
        fixture.mailer.fail_for("a@x.com");
        fixture.mailer.fail_for("b@x.com");

        let stats = fixture.dispatcher.dispatch(&campaign_id).await.unwrap();

        assert_eq!(stats.succeeded, 0);
        assert_eq!(stats.failed, 2);
        assert_eq!(
            campaign_status(&fixture, &campaign_id),
            CampaignStatus::Failed
        );

        let rows = fixture.tracking_repo.rows();
        assert!(rows.iter().all(|r| !r.email_sent));
        assert!(rows.iter().all(|r| r.error_message.is_some()));
    }

    #[tokio::test]
    async fn test_宛先ゼロはfailedで追跡行も作られない() {
        let fixture = make_fixture();
        let template_id = add_template(&fixture);
        let campaign_id = add_campaign(&fixture, template_id, &["vip"]);
        // vip にマッチしない宛先のみ
        add_recipient(&fixture, "Ben", "b@x.com", &["west"]);

        let result = fixture.dispatcher.dispatch(&campaign_id).await;

        assert!(matches!(result, Err(DispatchError::NoRecipients)));
        assert_eq!(
            campaign_status(&fixture, &campaign_id),
            CampaignStatus::Failed
        );
        assert!(fixture.tracking_repo.rows().is_empty());
        assert!(fixture.mailer.sent_emails().is_empty());

        // 送信試行が一度も完了していないため sent_at は残らない
        let campaign = fixture.campaign_repo.campaigns()[0].clone();
        assert_eq!(campaign.sent_at(), None);
    }

    #[tokio::test]
    async fn test_存在しないキャンペーンはnot_found() {
        let fixture = make_fixture();

        let result = fixture.dispatcher.dispatch(&CampaignId::new()).await;

        assert!(matches!(result, Err(DispatchError::CampaignNotFound(_))));
    }

    #[tokio::test]
    async fn test_送信済みキャンペーンの再送信は拒否され送信が発生しない() {
        let fixture = make_fixture();
        let template_id = add_template(&fixture);
        let campaign_id = add_campaign(&fixture, template_id, &[]);
        add_recipient(&fixture, "Ana", "a@x.com", &[]);

        fixture.dispatcher.dispatch(&campaign_id).await.unwrap();
        let sent_before = fixture.mailer.sent_emails().len();

        let result = fixture.dispatcher.dispatch(&campaign_id).await;

        assert!(matches!(result, Err(DispatchError::AlreadyProcessed(_))));
        // 新しい送信は発生しない
        assert_eq!(fixture.mailer.sent_emails().len(), sent_before);
        assert_eq!(campaign_status(&fixture, &campaign_id), CampaignStatus::Sent);
    }

    #[tokio::test]
    async fn test_テンプレート参照切れはclaim前に失敗しdraftのまま残る() {
        let fixture = make_fixture();
        // テンプレートを登録しないままキャンペーンを作る
        let campaign_id = add_campaign(&fixture, TemplateId::new(), &[]);
        add_recipient(&fixture, "Ana", "a@x.com", &[]);

        let result = fixture.dispatcher.dispatch(&campaign_id).await;

        assert!(matches!(result, Err(DispatchError::TemplateMissing(_))));
        // claim 前に失敗するため draft のまま（再実行可能）
        assert_eq!(
            campaign_status(&fixture, &campaign_id),
            CampaignStatus::Draft
        );
        assert!(fixture.mailer.sent_emails().is_empty());
    }

    #[tokio::test]
    async fn test_追跡行は送信前にemail_sent_falseで作成される() {
        let fixture = make_fixture();
        let template_id = add_template(&fixture);
        let campaign_id = add_campaign(&fixture, template_id, &[]);
        let ana_id = add_recipient(&fixture, "Ana", "a@x.com", &[]);

        fixture.dispatcher.dispatch(&campaign_id).await.unwrap();

        let rows = fixture.tracking_repo.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].campaign_id, campaign_id);
        assert_eq!(rows[0].recipient_id, ana_id);
    }

    #[tokio::test]
    async fn test_相関メタデータが送信メッセージに添付される() {
        let fixture = make_fixture();
        let template_id = add_template(&fixture);
        let campaign_id = add_campaign(&fixture, template_id, &[]);
        add_recipient(&fixture, "Ana", "a@x.com", &[]);

        fixture.dispatcher.dispatch(&campaign_id).await.unwrap();

        let sent = fixture.mailer.sent_emails();
        let metadata: HashMap<_, _> = sent[0].metadata.iter().cloned().collect();
        assert_eq!(metadata["campaign_id"], campaign_id.to_string());
        assert!(metadata.contains_key("recipient_id"));
    }
}

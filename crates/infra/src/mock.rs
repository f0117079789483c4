//! # テスト用モック実装
//!
//! ユースケーステストで使用するインメモリモックリポジトリと
//! モック送信アダプタ。`test-utils` feature を有効にすることで、
//! 他クレートからも利用可能。
//!
//! ```toml
//! [dev-dependencies]
//! reformworks-infra = { workspace = true, features = ["test-utils"] }
//! ```

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reformworks_domain::{
    campaign::{Campaign, CampaignId, CampaignRecipient, CampaignRecord, CampaignStatus},
    contact::{Contact, ContactId, ContactKind, ContactRecord, Email, Tag},
    mail::{OutgoingEmail, SendError},
    template::{Template, TemplateId},
};

use crate::{
    error::InfraError,
    mailer::MailSender,
    repository::{
        CampaignRecipientRepository,
        CampaignRepository,
        ContactRepository,
        TemplateRepository,
    },
};

// ===== MockTemplateRepository =====

#[derive(Clone, Default)]
pub struct MockTemplateRepository {
    templates: Arc<Mutex<Vec<Template>>>,
}

impl MockTemplateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_template(&self, template: Template) {
        self.templates.lock().unwrap().push(template);
    }

    pub fn templates(&self) -> Vec<Template> {
        self.templates.lock().unwrap().clone()
    }
}

#[async_trait]
impl TemplateRepository for MockTemplateRepository {
    async fn insert(&self, template: &Template) -> Result<(), InfraError> {
        self.templates.lock().unwrap().push(template.clone());
        Ok(())
    }

    async fn update(&self, template: &Template) -> Result<(), InfraError> {
        let mut templates = self.templates.lock().unwrap();
        if let Some(pos) = templates.iter().position(|t| t.id() == template.id()) {
            templates[pos] = template.clone();
        }
        Ok(())
    }

    async fn delete(&self, id: &TemplateId) -> Result<bool, InfraError> {
        let mut templates = self.templates.lock().unwrap();
        let before = templates.len();
        templates.retain(|t| t.id() != id);
        Ok(templates.len() < before)
    }

    async fn find_by_id(&self, id: &TemplateId) -> Result<Option<Template>, InfraError> {
        Ok(self
            .templates
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id() == id)
            .cloned())
    }

    async fn find_all(&self) -> Result<Vec<Template>, InfraError> {
        Ok(self.templates.lock().unwrap().clone())
    }
}

// ===== MockContactRepository =====

#[derive(Clone, Default)]
pub struct MockContactRepository {
    contacts: Arc<Mutex<Vec<Contact>>>,
}

impl MockContactRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_contact(&self, contact: Contact) {
        self.contacts.lock().unwrap().push(contact);
    }

    pub fn contacts(&self) -> Vec<Contact> {
        self.contacts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContactRepository for MockContactRepository {
    async fn insert(&self, contact: &Contact) -> Result<(), InfraError> {
        self.contacts.lock().unwrap().push(contact.clone());
        Ok(())
    }

    async fn update(&self, contact: &Contact) -> Result<(), InfraError> {
        let mut contacts = self.contacts.lock().unwrap();
        if let Some(pos) = contacts.iter().position(|c| c.id() == contact.id()) {
            contacts[pos] = contact.clone();
        }
        Ok(())
    }

    async fn delete(&self, id: &ContactId) -> Result<bool, InfraError> {
        let mut contacts = self.contacts.lock().unwrap();
        let before = contacts.len();
        contacts.retain(|c| c.id() != id);
        Ok(contacts.len() < before)
    }

    async fn find_by_id(&self, id: &ContactId) -> Result<Option<Contact>, InfraError> {
        Ok(self
            .contacts
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id() == id)
            .cloned())
    }

    async fn find_all(&self) -> Result<Vec<Contact>, InfraError> {
        Ok(self.contacts.lock().unwrap().clone())
    }

    async fn find_recipients_by_tags(&self, tags: &[Tag]) -> Result<Vec<Contact>, InfraError> {
        Ok(self
            .contacts
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.kind() == ContactKind::Recipient && c.matches_any(tags))
            .cloned()
            .collect())
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<Contact>, InfraError> {
        Ok(self
            .contacts
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.email() == email)
            .cloned())
    }

    async fn find_sender_by_email(&self, email: &Email) -> Result<Option<Contact>, InfraError> {
        Ok(self
            .contacts
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.kind() == ContactKind::Sender && c.email() == email)
            .cloned())
    }

    async fn find_default_sender(&self) -> Result<Option<Contact>, InfraError> {
        Ok(self
            .contacts
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.is_default_sender())
            .cloned())
    }

    async fn set_default_sender(
        &self,
        id: &ContactId,
        now: DateTime<Utc>,
    ) -> Result<(), InfraError> {
        let mut contacts = self.contacts.lock().unwrap();
        for contact in contacts.iter_mut() {
            if contact.kind() != ContactKind::Sender {
                continue;
            }
            let is_target = contact.id() == id;
            *contact = rebuild_with_default_flag(contact, is_target, now)?;
        }
        Ok(())
    }
}

/// デフォルトフラグだけを差し替えたコンタクトを再構築する
fn rebuild_with_default_flag(
    contact: &Contact,
    is_default: bool,
    now: DateTime<Utc>,
) -> Result<Contact, InfraError> {
    Contact::from_db(ContactRecord {
        id: contact.id().clone(),
        name: contact.name().clone(),
        email: contact.email().clone(),
        tags: contact.tags().to_vec(),
        kind: contact.kind(),
        is_default_sender: is_default,
        created_by: contact.created_by().clone(),
        created_at: contact.created_at(),
        updated_at: now,
    })
    .map_err(|e| InfraError::unexpected(e.to_string()))
}

// ===== MockCampaignRepository =====

#[derive(Clone, Default)]
pub struct MockCampaignRepository {
    campaigns: Arc<Mutex<Vec<Campaign>>>,
}

impl MockCampaignRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_campaign(&self, campaign: Campaign) {
        self.campaigns.lock().unwrap().push(campaign);
    }

    pub fn campaigns(&self) -> Vec<Campaign> {
        self.campaigns.lock().unwrap().clone()
    }
}

#[async_trait]
impl CampaignRepository for MockCampaignRepository {
    async fn insert(&self, campaign: &Campaign) -> Result<(), InfraError> {
        self.campaigns.lock().unwrap().push(campaign.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &CampaignId) -> Result<Option<Campaign>, InfraError> {
        Ok(self
            .campaigns
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id() == id)
            .cloned())
    }

    async fn find_all(&self) -> Result<Vec<Campaign>, InfraError> {
        Ok(self.campaigns.lock().unwrap().clone())
    }

    async fn delete(&self, id: &CampaignId) -> Result<bool, InfraError> {
        let mut campaigns = self.campaigns.lock().unwrap();
        let before = campaigns.len();
        campaigns.retain(|c| c.id() != id);
        Ok(campaigns.len() < before)
    }

    async fn claim_for_sending(
        &self,
        id: &CampaignId,
        now: DateTime<Utc>,
    ) -> Result<bool, InfraError> {
        let mut campaigns = self.campaigns.lock().unwrap();
        let Some(pos) = campaigns.iter().position(|c| c.id() == id) else {
            return Ok(false);
        };

        match campaigns[pos].clone().begin_sending(now) {
            Ok(updated) => {
                campaigns[pos] = updated;
                Ok(true)
            }
            // draft 以外: 条件付き UPDATE の影響行数 0 に相当
            Err(_) => Ok(false),
        }
    }

    async fn finish(
        &self,
        id: &CampaignId,
        status: CampaignStatus,
        sent_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(), InfraError> {
        let mut campaigns = self.campaigns.lock().unwrap();
        let Some(pos) = campaigns.iter().position(|c| c.id() == id) else {
            return Ok(());
        };

        let current = &campaigns[pos];
        let updated = Campaign::from_db(CampaignRecord {
            id: current.id().clone(),
            name: current.name().clone(),
            template_id: current.template_id().clone(),
            recipient_tags: current.recipient_tags().to_vec(),
            from_email: current.from_email().clone(),
            from_name: current.from_name().to_string(),
            status,
            sent_at,
            created_by: current.created_by().clone(),
            created_at: current.created_at(),
            updated_at: now,
        })
        .map_err(|e| InfraError::unexpected(e.to_string()))?;

        campaigns[pos] = updated;
        Ok(())
    }
}

// ===== MockCampaignRecipientRepository =====

#[derive(Clone, Default)]
pub struct MockCampaignRecipientRepository {
    rows: Arc<Mutex<Vec<CampaignRecipient>>>,
}

impl MockCampaignRecipientRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> Vec<CampaignRecipient> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl CampaignRecipientRepository for MockCampaignRecipientRepository {
    async fn insert_batch(&self, rows: &[CampaignRecipient]) -> Result<(), InfraError> {
        self.rows.lock().unwrap().extend(rows.iter().cloned());
        Ok(())
    }

    async fn update_outcome(&self, row: &CampaignRecipient) -> Result<(), InfraError> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(pos) = rows.iter().position(|r| r.id == row.id) {
            rows[pos] = row.clone();
        }
        Ok(())
    }

    async fn find_by_campaign(
        &self,
        campaign_id: &CampaignId,
    ) -> Result<Vec<CampaignRecipient>, InfraError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| &r.campaign_id == campaign_id)
            .cloned()
            .collect())
    }
}

// ===== MockMailSender =====

/// テスト用モック送信アダプタ
///
/// 送信したメッセージを記録する。`fail_for()` で登録したアドレス宛の
/// 送信はプロバイダエラーを返す（宛先単位の失敗シナリオ用）。
#[derive(Clone, Default)]
pub struct MockMailSender {
    sent:            Arc<Mutex<Vec<OutgoingEmail>>>,
    fail_recipients: Arc<Mutex<HashSet<String>>>,
}

impl MockMailSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// 指定アドレス宛の送信を失敗させる
    pub fn fail_for(&self, email: &str) {
        self.fail_recipients
            .lock()
            .unwrap()
            .insert(email.to_string());
    }

    /// 送信されたメッセージを取得する（送信順）
    pub fn sent_emails(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailSender for MockMailSender {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), SendError> {
        if self
            .fail_recipients
            .lock()
            .unwrap()
            .contains(email.to.as_str())
        {
            return Err(SendError::Provider(
                "550 mailbox unavailable (mock)".to_string(),
            ));
        }

        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use reformworks_domain::{
        campaign::{CampaignName, NewCampaign},
        contact::{ContactKind, ContactName},
        user::UserId,
    };

    use super::*;

    fn make_draft_campaign() -> Campaign {
        Campaign::new(NewCampaign {
            id: CampaignId::new(),
            name: CampaignName::new("テスト").unwrap(),
            template_id: TemplateId::new(),
            recipient_tags: vec![],
            from_email: Email::new("news@reform.example.com").unwrap(),
            from_name: "ReformWorks".to_string(),
            created_by: UserId::new(),
            now: Utc::now(),
        })
    }

    fn make_sender(email: &str) -> Contact {
        Contact::new(
            ContactId::new(),
            ContactName::new("広報").unwrap(),
            Email::new(email).unwrap(),
            vec![],
            ContactKind::Sender,
            UserId::new(),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_claim_for_sendingはdraftのみ成功する() {
        let repo = MockCampaignRepository::new();
        let campaign = make_draft_campaign();
        let id = campaign.id().clone();
        repo.add_campaign(campaign);

        // 1 回目: draft → sending
        assert!(repo.claim_for_sending(&id, Utc::now()).await.unwrap());
        // 2 回目: すでに sending のため失敗
        assert!(!repo.claim_for_sending(&id, Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn test_set_default_senderは他の差出人のフラグを下ろす() {
        let repo = MockContactRepository::new();
        let first = make_sender("a@reform.example.com");
        let second = make_sender("b@reform.example.com");
        let first_id = first.id().clone();
        let second_id = second.id().clone();
        repo.add_contact(first);
        repo.add_contact(second);

        repo.set_default_sender(&first_id, Utc::now()).await.unwrap();
        repo.set_default_sender(&second_id, Utc::now()).await.unwrap();

        let default = repo.find_default_sender().await.unwrap().unwrap();
        assert_eq!(default.id(), &second_id);

        let defaults = repo
            .contacts()
            .iter()
            .filter(|c| c.is_default_sender())
            .count();
        assert_eq!(defaults, 1);
    }

    #[tokio::test]
    async fn test_mock_mail_senderは失敗注入できる() {
        let sender = MockMailSender::new();
        sender.fail_for("ng@example.com");

        let ok_email = OutgoingEmail {
            to: Email::new("ok@example.com").unwrap(),
            from_email: Email::new("news@reform.example.com").unwrap(),
            from_name: "ReformWorks".to_string(),
            reply_to: None,
            subject: "件名".to_string(),
            html_body: "<p>本文</p>".to_string(),
            metadata: vec![],
        };
        let ng_email = OutgoingEmail {
            to: Email::new("ng@example.com").unwrap(),
            ..ok_email.clone()
        };

        assert!(sender.send(&ok_email).await.is_ok());
        assert!(sender.send(&ng_email).await.is_err());
        assert_eq!(sender.sent_emails().len(), 1);
    }
}

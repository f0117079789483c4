//! コンタクト管理ユースケース

use std::sync::Arc;

use reformworks_domain::{
    clock::Clock,
    contact::{Contact, ContactId, ContactKind, ContactName, Email, Tag},
    user::UserId,
};
use reformworks_infra::repository::ContactRepository;

use crate::error::ApiError;

/// コンタクト作成の入力
pub struct CreateContactInput {
    pub name: ContactName,
    pub email: Email,
    pub tags: Vec<Tag>,
    pub kind: ContactKind,
    pub created_by: UserId,
}

/// コンタクト更新の入力
pub struct UpdateContactInput {
    pub contact_id: ContactId,
    pub name: ContactName,
    pub email: Email,
    pub tags: Vec<Tag>,
}

/// コンタクト管理ユースケース
pub struct ContactUseCaseImpl {
    contact_repo: Arc<dyn ContactRepository>,
    clock:        Arc<dyn Clock>,
}

impl ContactUseCaseImpl {
    pub fn new(contact_repo: Arc<dyn ContactRepository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            contact_repo,
            clock,
        }
    }

    /// コンタクトを作成する
    ///
    /// メールアドレスは種別をまたいで一意。
    pub async fn create_contact(&self, input: CreateContactInput) -> Result<Contact, ApiError> {
        if self
            .contact_repo
            .find_by_email(&input.email)
            .await?
            .is_some()
        {
            return Err(ApiError::Conflict(
                "このメールアドレスは既に登録されています".to_string(),
            ));
        }

        let contact = Contact::new(
            ContactId::new(),
            input.name,
            input.email,
            input.tags,
            input.kind,
            input.created_by,
            self.clock.now(),
        );

        self.contact_repo.insert(&contact).await?;

        Ok(contact)
    }

    /// コンタクトを更新する（名前・メールアドレス・タグ）
    pub async fn update_contact(&self, input: UpdateContactInput) -> Result<Contact, ApiError> {
        let contact = self
            .contact_repo
            .find_by_id(&input.contact_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("コンタクトが見つかりません".to_string()))?;

        // アドレス変更時の重複チェック
        if let Some(existing) = self.contact_repo.find_by_email(&input.email).await?
            && existing.id() != &input.contact_id
        {
            return Err(ApiError::Conflict(
                "このメールアドレスは既に登録されています".to_string(),
            ));
        }

        let updated = contact.with_details(input.name, input.email, input.tags, self.clock.now());
        self.contact_repo.update(&updated).await?;

        Ok(updated)
    }

    /// コンタクトを削除する（物理削除・復元不可）
    pub async fn delete_contact(&self, contact_id: &ContactId) -> Result<(), ApiError> {
        let deleted = self.contact_repo.delete(contact_id).await?;

        if !deleted {
            return Err(ApiError::NotFound("コンタクトが見つかりません".to_string()));
        }

        Ok(())
    }

    /// コンタクト一覧を取得する
    pub async fn list_contacts(&self) -> Result<Vec<Contact>, ApiError> {
        Ok(self.contact_repo.find_all().await?)
    }

    /// 指定した差出人をデフォルトに設定する
    ///
    /// 他の差出人のデフォルトフラグは同一文で下ろされる
    /// （「デフォルト差出人は高々ひとつ」の書き込み時強制）。
    pub async fn set_default_sender(&self, contact_id: &ContactId) -> Result<(), ApiError> {
        let contact = self
            .contact_repo
            .find_by_id(contact_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("コンタクトが見つかりません".to_string()))?;

        if contact.kind() != ContactKind::Sender {
            return Err(ApiError::BadRequest(
                "宛先コンタクトはデフォルト差出人に設定できません".to_string(),
            ));
        }

        self.contact_repo
            .set_default_sender(contact_id, self.clock.now())
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use reformworks_domain::clock::FixedClock;
    use reformworks_infra::mock::MockContactRepository;

    use super::*;

    fn make_usecase() -> (MockContactRepository, ContactUseCaseImpl) {
        let repo = MockContactRepository::new();
        let usecase = ContactUseCaseImpl::new(
            Arc::new(repo.clone()),
            Arc::new(FixedClock::new(Utc::now())),
        );
        (repo, usecase)
    }

    fn make_input(email: &str, kind: ContactKind) -> CreateContactInput {
        CreateContactInput {
            name: ContactName::new("佐藤花子").unwrap(),
            email: Email::new(email).unwrap(),
            tags: vec![Tag::new("vip").unwrap()],
            kind,
            created_by: UserId::new(),
        }
    }

    #[tokio::test]
    async fn test_コンタクトを作成できる() {
        let (repo, usecase) = make_usecase();

        let contact = usecase
            .create_contact(make_input("hanako@example.com", ContactKind::Recipient))
            .await
            .unwrap();

        assert_eq!(contact.email().as_str(), "hanako@example.com");
        assert_eq!(repo.contacts().len(), 1);
    }

    #[tokio::test]
    async fn test_メールアドレスの重複はconflict() {
        let (_repo, usecase) = make_usecase();
        usecase
            .create_contact(make_input("hanako@example.com", ContactKind::Recipient))
            .await
            .unwrap();

        let result = usecase
            .create_contact(make_input("hanako@example.com", ContactKind::Sender))
            .await;

        assert!(matches!(result, Err(ApiError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_宛先はデフォルト差出人に設定できない() {
        let (_repo, usecase) = make_usecase();
        let recipient = usecase
            .create_contact(make_input("hanako@example.com", ContactKind::Recipient))
            .await
            .unwrap();

        let result = usecase.set_default_sender(recipient.id()).await;

        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_デフォルト差出人は高々ひとつ() {
        let (repo, usecase) = make_usecase();
        let first = usecase
            .create_contact(make_input("a@reform.example.com", ContactKind::Sender))
            .await
            .unwrap();
        let second = usecase
            .create_contact(make_input("b@reform.example.com", ContactKind::Sender))
            .await
            .unwrap();

        usecase.set_default_sender(first.id()).await.unwrap();
        usecase.set_default_sender(second.id()).await.unwrap();

        let defaults: Vec<_> = repo
            .contacts()
            .into_iter()
            .filter(|c| c.is_default_sender())
            .collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].id(), second.id());
    }

    #[tokio::test]
    async fn test_削除は物理削除() {
        let (repo, usecase) = make_usecase();
        let contact = usecase
            .create_contact(make_input("hanako@example.com", ContactKind::Recipient))
            .await
            .unwrap();

        usecase.delete_contact(contact.id()).await.unwrap();

        assert!(repo.contacts().is_empty());
        // 二重削除は not_found
        let result = usecase.delete_contact(contact.id()).await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }
}

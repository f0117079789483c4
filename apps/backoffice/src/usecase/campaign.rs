//! キャンペーン管理ユースケース

use std::sync::Arc;

use reformworks_domain::{
    campaign::{Campaign, CampaignId, CampaignName, CampaignRecipient, NewCampaign},
    clock::Clock,
    contact::{ContactId, ContactKind, Tag},
    template::TemplateId,
    user::UserId,
};
use reformworks_infra::repository::{
    CampaignRecipientRepository,
    CampaignRepository,
    ContactRepository,
    TemplateRepository,
};

use crate::error::ApiError;

/// キャンペーン作成の入力
pub struct CreateCampaignInput {
    /// キャンペーン名
    pub name: CampaignName,
    /// 使用するテンプレート
    pub template_id: TemplateId,
    /// 宛先タグ（空なら全宛先。送信時に評価される）
    pub recipient_tags: Vec<Tag>,
    /// 差出人コンタクト。None ならデフォルト差出人を使う
    pub sender_contact_id: Option<ContactId>,
    /// 作成ユーザー
    pub created_by: UserId,
}

/// キャンペーン管理ユースケース
pub struct CampaignUseCaseImpl {
    campaign_repo: Arc<dyn CampaignRepository>,
    template_repo: Arc<dyn TemplateRepository>,
    contact_repo:  Arc<dyn ContactRepository>,
    tracking_repo: Arc<dyn CampaignRecipientRepository>,
    clock:         Arc<dyn Clock>,
}

impl CampaignUseCaseImpl {
    pub fn new(
        campaign_repo: Arc<dyn CampaignRepository>,
        template_repo: Arc<dyn TemplateRepository>,
        contact_repo: Arc<dyn ContactRepository>,
        tracking_repo: Arc<dyn CampaignRecipientRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            campaign_repo,
            template_repo,
            contact_repo,
            tracking_repo,
            clock,
        }
    }

    /// キャンペーンを作成する（`draft` 状態）
    ///
    /// 差出人アドレス・表示名はこの時点で差出人コンタクトから取り込む
    /// （コンタクトの後日の編集はキャンペーンに影響しない）。
    pub async fn create_campaign(&self, input: CreateCampaignInput) -> Result<Campaign, ApiError> {
        // テンプレートの存在確認
        if self
            .template_repo
            .find_by_id(&input.template_id)
            .await?
            .is_none()
        {
            return Err(ApiError::BadRequest(format!(
                "テンプレート ID '{}' が見つかりません",
                input.template_id
            )));
        }

        // 差出人の解決: 明示指定 > デフォルト差出人
        let sender = match &input.sender_contact_id {
            Some(id) => {
                let contact = self
                    .contact_repo
                    .find_by_id(id)
                    .await?
                    .ok_or_else(|| {
                        ApiError::BadRequest(format!("差出人コンタクト ID '{}' が見つかりません", id))
                    })?;
                if contact.kind() != ContactKind::Sender {
                    return Err(ApiError::BadRequest(
                        "宛先コンタクトは差出人に指定できません".to_string(),
                    ));
                }
                contact
            }
            None => self.contact_repo.find_default_sender().await?.ok_or_else(|| {
                ApiError::BadRequest(
                    "デフォルト差出人が設定されていません。差出人を指定してください".to_string(),
                )
            })?,
        };

        let campaign = Campaign::new(NewCampaign {
            id: CampaignId::new(),
            name: input.name,
            template_id: input.template_id,
            recipient_tags: input.recipient_tags,
            from_email: sender.email().clone(),
            from_name: sender.name().as_str().to_string(),
            created_by: input.created_by,
            now: self.clock.now(),
        });

        self.campaign_repo.insert(&campaign).await?;

        Ok(campaign)
    }

    /// キャンペーンを取得する
    pub async fn get_campaign(&self, campaign_id: &CampaignId) -> Result<Campaign, ApiError> {
        self.campaign_repo
            .find_by_id(campaign_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("キャンペーンが見つかりません".to_string()))
    }

    /// キャンペーン一覧を取得する
    pub async fn list_campaigns(&self) -> Result<Vec<Campaign>, ApiError> {
        Ok(self.campaign_repo.find_all().await?)
    }

    /// キャンペーンを削除する
    ///
    /// 追跡行はストレージのカスケード削除で消える。
    pub async fn delete_campaign(&self, campaign_id: &CampaignId) -> Result<(), ApiError> {
        let deleted = self.campaign_repo.delete(campaign_id).await?;

        if !deleted {
            return Err(ApiError::NotFound(
                "キャンペーンが見つかりません".to_string(),
            ));
        }

        Ok(())
    }

    /// キャンペーンの配信追跡行を取得する
    ///
    /// 宛先単位の配信結果（成功・失敗・エラーメッセージ）はこの一覧でのみ
    /// 確認できる。
    pub async fn list_campaign_recipients(
        &self,
        campaign_id: &CampaignId,
    ) -> Result<Vec<CampaignRecipient>, ApiError> {
        // 存在チェック（存在しないキャンペーンの空一覧と区別する）
        self.get_campaign(campaign_id).await?;

        Ok(self.tracking_repo.find_by_campaign(campaign_id).await?)
    }
}

//! # キャンペーン API ハンドラ
//!
//! キャンペーンの CRUD と配信追跡行の閲覧エンドポイントを実装する。
//! 配信トリガー（送信・テスト送信）は `handler::dispatch` が担当する。

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use reformworks_domain::{
    campaign::{Campaign, CampaignId, CampaignName, CampaignRecipient, CampaignStatus},
    contact::{ContactId, Tag},
    error::DomainError,
    role::Capability,
    template::TemplateId,
};
use reformworks_shared::ApiResponse;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    context::ActingUser,
    error::ApiError,
    usecase::{CampaignUseCaseImpl, CreateCampaignInput},
};

/// キャンペーンハンドラーの State
pub struct CampaignState {
    pub usecase: CampaignUseCaseImpl,
}

/// キャンペーン DTO
#[derive(Debug, Serialize)]
pub struct CampaignDto {
    pub id: Uuid,
    pub name: String,
    pub template_id: Uuid,
    pub recipient_tags: Vec<String>,
    pub from_email: String,
    pub from_name: String,
    pub status: CampaignStatus,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Campaign> for CampaignDto {
    fn from(campaign: Campaign) -> Self {
        Self {
            id: *campaign.id().as_uuid(),
            name: campaign.name().to_string(),
            template_id: *campaign.template_id().as_uuid(),
            recipient_tags: campaign
                .recipient_tags()
                .iter()
                .map(|t| t.to_string())
                .collect(),
            from_email: campaign.from_email().as_str().to_string(),
            from_name: campaign.from_name().to_string(),
            status: campaign.status(),
            sent_at: campaign.sent_at(),
            created_at: campaign.created_at(),
        }
    }
}

/// 配信追跡行 DTO
#[derive(Debug, Serialize)]
pub struct CampaignRecipientDto {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub email_sent: bool,
    pub sent_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl From<CampaignRecipient> for CampaignRecipientDto {
    fn from(row: CampaignRecipient) -> Self {
        Self {
            id: *row.id.as_uuid(),
            recipient_id: *row.recipient_id.as_uuid(),
            email_sent: row.email_sent,
            sent_at: row.sent_at,
            error_message: row.error_message,
        }
    }
}

/// キャンペーン作成リクエスト
#[derive(Debug, Deserialize)]
pub struct CreateCampaignRequest {
    pub name: String,
    pub template_id: Uuid,
    #[serde(default)]
    pub recipient_tags: Vec<String>,
    pub sender_contact_id: Option<Uuid>,
}

/// キャンペーン一覧を取得する
///
/// ## エンドポイント
/// GET /api/campaigns
#[tracing::instrument(skip_all)]
pub async fn list_campaigns(
    State(state): State<Arc<CampaignState>>,
    acting_user: ActingUser,
) -> Result<Response, ApiError> {
    acting_user.require(Capability::ViewCampaigns)?;

    let campaigns = state.usecase.list_campaigns().await?;
    let dtos: Vec<CampaignDto> = campaigns.into_iter().map(CampaignDto::from).collect();

    Ok((StatusCode::OK, Json(ApiResponse::new(dtos))).into_response())
}

/// キャンペーンを取得する
///
/// ## エンドポイント
/// GET /api/campaigns/{id}
#[tracing::instrument(skip_all)]
pub async fn get_campaign(
    State(state): State<Arc<CampaignState>>,
    acting_user: ActingUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    acting_user.require(Capability::ViewCampaigns)?;

    let campaign = state.usecase.get_campaign(&CampaignId::from_uuid(id)).await?;

    Ok((StatusCode::OK, Json(ApiResponse::new(CampaignDto::from(campaign)))).into_response())
}

/// キャンペーンを作成する
///
/// ## エンドポイント
/// POST /api/campaigns
#[tracing::instrument(skip_all)]
pub async fn create_campaign(
    State(state): State<Arc<CampaignState>>,
    acting_user: ActingUser,
    Json(request): Json<CreateCampaignRequest>,
) -> Result<Response, ApiError> {
    acting_user.require(Capability::ManageCampaigns)?;

    let recipient_tags: Vec<Tag> = request
        .recipient_tags
        .into_iter()
        .map(Tag::new)
        .collect::<Result<_, DomainError>>()?;

    let campaign = state
        .usecase
        .create_campaign(CreateCampaignInput {
            name: CampaignName::new(request.name)?,
            template_id: TemplateId::from_uuid(request.template_id),
            recipient_tags,
            sender_contact_id: request.sender_contact_id.map(ContactId::from_uuid),
            created_by: acting_user.user_id.clone(),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(CampaignDto::from(campaign))),
    )
        .into_response())
}

/// キャンペーンを削除する
///
/// ## エンドポイント
/// DELETE /api/campaigns/{id}
#[tracing::instrument(skip_all)]
pub async fn delete_campaign(
    State(state): State<Arc<CampaignState>>,
    acting_user: ActingUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    acting_user.require(Capability::ManageCampaigns)?;

    state
        .usecase
        .delete_campaign(&CampaignId::from_uuid(id))
        .await?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

/// キャンペーンの配信追跡行を取得する
///
/// 宛先単位の配信結果（成功・失敗・エラーメッセージ）を返す。
///
/// ## エンドポイント
/// GET /api/campaigns/{id}/recipients
#[tracing::instrument(skip_all)]
pub async fn list_campaign_recipients(
    State(state): State<Arc<CampaignState>>,
    acting_user: ActingUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    acting_user.require(Capability::ViewCampaigns)?;

    let rows = state
        .usecase
        .list_campaign_recipients(&CampaignId::from_uuid(id))
        .await?;
    let dtos: Vec<CampaignRecipientDto> =
        rows.into_iter().map(CampaignRecipientDto::from).collect();

    Ok((StatusCode::OK, Json(ApiResponse::new(dtos))).into_response())
}

//! # テンプレート API ハンドラ
//!
//! メールテンプレートの CRUD エンドポイントを実装する。

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use reformworks_domain::{
    role::Capability,
    template::{Template, TemplateId, TemplateName},
};
use reformworks_shared::ApiResponse;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    context::ActingUser,
    error::ApiError,
    usecase::{CreateTemplateInput, TemplateUseCaseImpl, UpdateTemplateInput},
};

/// テンプレートハンドラーの State
pub struct TemplateState {
    pub usecase: TemplateUseCaseImpl,
}

/// テンプレート DTO
#[derive(Debug, Serialize)]
pub struct TemplateDto {
    pub id: Uuid,
    pub name: String,
    pub subject: String,
    pub html_body: String,
    pub variables: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Template> for TemplateDto {
    fn from(template: Template) -> Self {
        Self {
            id: *template.id().as_uuid(),
            name: template.name().to_string(),
            subject: template.subject().to_string(),
            html_body: template.html_body().to_string(),
            variables: template.variables().to_vec(),
            created_at: template.created_at(),
            updated_at: template.updated_at(),
        }
    }
}

/// テンプレート作成・更新リクエスト
#[derive(Debug, Deserialize)]
pub struct TemplateRequest {
    pub name: String,
    pub subject: String,
    pub html_body: String,
    #[serde(default)]
    pub variables: Vec<String>,
}

/// テンプレート一覧を取得する
///
/// ## エンドポイント
/// GET /api/templates
#[tracing::instrument(skip_all)]
pub async fn list_templates(
    State(state): State<Arc<TemplateState>>,
    acting_user: ActingUser,
) -> Result<Response, ApiError> {
    acting_user.require(Capability::ViewCampaigns)?;

    let templates = state.usecase.list_templates().await?;
    let dtos: Vec<TemplateDto> = templates.into_iter().map(TemplateDto::from).collect();

    Ok((StatusCode::OK, Json(ApiResponse::new(dtos))).into_response())
}

/// テンプレートを取得する
///
/// ## エンドポイント
/// GET /api/templates/{id}
#[tracing::instrument(skip_all)]
pub async fn get_template(
    State(state): State<Arc<TemplateState>>,
    acting_user: ActingUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    acting_user.require(Capability::ViewCampaigns)?;

    let template = state.usecase.get_template(&TemplateId::from_uuid(id)).await?;

    Ok((StatusCode::OK, Json(ApiResponse::new(TemplateDto::from(template)))).into_response())
}

/// テンプレートを作成する
///
/// ## エンドポイント
/// POST /api/templates
#[tracing::instrument(skip_all)]
pub async fn create_template(
    State(state): State<Arc<TemplateState>>,
    acting_user: ActingUser,
    Json(request): Json<TemplateRequest>,
) -> Result<Response, ApiError> {
    acting_user.require(Capability::ManageTemplates)?;

    let template = state
        .usecase
        .create_template(CreateTemplateInput {
            name: TemplateName::new(request.name)?,
            subject: request.subject,
            html_body: request.html_body,
            variables: request.variables,
            created_by: acting_user.user_id.clone(),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(TemplateDto::from(template))),
    )
        .into_response())
}

/// テンプレートを更新する
///
/// ## エンドポイント
/// PUT /api/templates/{id}
#[tracing::instrument(skip_all)]
pub async fn update_template(
    State(state): State<Arc<TemplateState>>,
    acting_user: ActingUser,
    Path(id): Path<Uuid>,
    Json(request): Json<TemplateRequest>,
) -> Result<Response, ApiError> {
    acting_user.require(Capability::ManageTemplates)?;

    let template = state
        .usecase
        .update_template(UpdateTemplateInput {
            template_id: TemplateId::from_uuid(id),
            name: TemplateName::new(request.name)?,
            subject: request.subject,
            html_body: request.html_body,
            variables: request.variables,
        })
        .await?;

    Ok((StatusCode::OK, Json(ApiResponse::new(TemplateDto::from(template)))).into_response())
}

/// テンプレートを削除する
///
/// ## エンドポイント
/// DELETE /api/templates/{id}
#[tracing::instrument(skip_all)]
pub async fn delete_template(
    State(state): State<Arc<TemplateState>>,
    acting_user: ActingUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    acting_user.require(Capability::ManageTemplates)?;

    state
        .usecase
        .delete_template(&TemplateId::from_uuid(id))
        .await?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

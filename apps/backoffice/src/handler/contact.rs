//! # コンタクト API ハンドラ
//!
//! 宛先・差出人コンタクトの CRUD エンドポイントを実装する。

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use reformworks_domain::{
    contact::{Contact, ContactId, ContactKind, ContactName, Email, Tag},
    error::DomainError,
    role::Capability,
};
use reformworks_shared::ApiResponse;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    context::ActingUser,
    error::ApiError,
    usecase::{ContactUseCaseImpl, CreateContactInput, UpdateContactInput},
};

/// コンタクトハンドラーの State
pub struct ContactState {
    pub usecase: ContactUseCaseImpl,
}

/// コンタクト DTO
#[derive(Debug, Serialize)]
pub struct ContactDto {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub tags: Vec<String>,
    pub kind: ContactKind,
    pub is_default_sender: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Contact> for ContactDto {
    fn from(contact: Contact) -> Self {
        Self {
            id: *contact.id().as_uuid(),
            name: contact.name().as_str().to_string(),
            email: contact.email().as_str().to_string(),
            tags: contact.tags().iter().map(|t| t.to_string()).collect(),
            kind: contact.kind(),
            is_default_sender: contact.is_default_sender(),
            created_at: contact.created_at(),
            updated_at: contact.updated_at(),
        }
    }
}

/// コンタクト作成リクエスト
#[derive(Debug, Deserialize)]
pub struct CreateContactRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub kind: ContactKind,
}

/// コンタクト更新リクエスト
#[derive(Debug, Deserialize)]
pub struct UpdateContactRequest {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn parse_tags(tags: Vec<String>) -> Result<Vec<Tag>, DomainError> {
    tags.into_iter().map(Tag::new).collect()
}

/// コンタクト一覧を取得する
///
/// ## エンドポイント
/// GET /api/contacts
#[tracing::instrument(skip_all)]
pub async fn list_contacts(
    State(state): State<Arc<ContactState>>,
    acting_user: ActingUser,
) -> Result<Response, ApiError> {
    acting_user.require(Capability::ViewCampaigns)?;

    let contacts = state.usecase.list_contacts().await?;
    let dtos: Vec<ContactDto> = contacts.into_iter().map(ContactDto::from).collect();

    Ok((StatusCode::OK, Json(ApiResponse::new(dtos))).into_response())
}

/// コンタクトを作成する
///
/// ## エンドポイント
/// POST /api/contacts
#[tracing::instrument(skip_all)]
pub async fn create_contact(
    State(state): State<Arc<ContactState>>,
    acting_user: ActingUser,
    Json(request): Json<CreateContactRequest>,
) -> Result<Response, ApiError> {
    acting_user.require(Capability::ManageContacts)?;

    let contact = state
        .usecase
        .create_contact(CreateContactInput {
            name: ContactName::new(request.name)?,
            email: Email::new(request.email)?,
            tags: parse_tags(request.tags)?,
            kind: request.kind,
            created_by: acting_user.user_id.clone(),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(ContactDto::from(contact))),
    )
        .into_response())
}

/// コンタクトを更新する
///
/// ## エンドポイント
/// PUT /api/contacts/{id}
#[tracing::instrument(skip_all)]
pub async fn update_contact(
    State(state): State<Arc<ContactState>>,
    acting_user: ActingUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateContactRequest>,
) -> Result<Response, ApiError> {
    acting_user.require(Capability::ManageContacts)?;

    let contact = state
        .usecase
        .update_contact(UpdateContactInput {
            contact_id: ContactId::from_uuid(id),
            name: ContactName::new(request.name)?,
            email: Email::new(request.email)?,
            tags: parse_tags(request.tags)?,
        })
        .await?;

    Ok((StatusCode::OK, Json(ApiResponse::new(ContactDto::from(contact)))).into_response())
}

/// コンタクトを削除する
///
/// ## エンドポイント
/// DELETE /api/contacts/{id}
#[tracing::instrument(skip_all)]
pub async fn delete_contact(
    State(state): State<Arc<ContactState>>,
    acting_user: ActingUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    acting_user.require(Capability::ManageContacts)?;

    state
        .usecase
        .delete_contact(&ContactId::from_uuid(id))
        .await?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

/// コンタクトをデフォルト差出人に設定する
///
/// ## エンドポイント
/// PUT /api/contacts/{id}/default-sender
#[tracing::instrument(skip_all)]
pub async fn set_default_sender(
    State(state): State<Arc<ContactState>>,
    acting_user: ActingUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    acting_user.require(Capability::ManageContacts)?;

    state
        .usecase
        .set_default_sender(&ContactId::from_uuid(id))
        .await?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

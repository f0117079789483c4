//! # 配信トリガー API ハンドラ
//!
//! キャンペーン送信とテスト送信のエンドポイントを実装する。
//!
//! レスポンス形式は管理 CRUD と異なり `{ success, message?, stats?, error? }`
//! （フィールドは camelCase）。管理画面のトースト表示がこの形式に依存して
//! いるため、エンベロープを揃えずに互換形式を維持する。

use std::{collections::HashMap, sync::Arc};

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use reformworks_domain::{
    campaign::{CampaignId, DispatchStats},
    contact::Email,
    role::Capability,
    template::TemplateId,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    context::ActingUser,
    error::ApiError,
    usecase::{CampaignDispatcher, DispatchError, TestSendError, TestSendInput, TestSendUseCase},
};

/// 配信トリガーハンドラーの State
pub struct DispatchState {
    pub dispatcher: CampaignDispatcher,
    pub test_send:  TestSendUseCase,
}

/// キャンペーン送信リクエスト
///
/// `campaignId` の欠落・不正は 400 で返すため、パースはハンドラ内で行う。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendCampaignRequest {
    pub campaign_id: Option<String>,
}

/// 配信集計 DTO
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchStatsDto {
    pub success_count: usize,
    pub failure_count: usize,
}

impl From<DispatchStats> for DispatchStatsDto {
    fn from(stats: DispatchStats) -> Self {
        Self {
            success_count: stats.succeeded,
            failure_count: stats.failed,
        }
    }
}

/// キャンペーン送信レスポンス
#[derive(Debug, Serialize)]
pub struct SendCampaignResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats:   Option<DispatchStatsDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error:   Option<String>,
}

impl SendCampaignResponse {
    fn ok(message: impl Into<String>, stats: DispatchStats) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            stats:   Some(stats.into()),
            error:   None,
        }
    }

    fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            stats:   None,
            error:   Some(error.into()),
        }
    }
}

/// テスト送信リクエスト
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSendRequest {
    pub template_id: Option<String>,
    pub recipient_email: Option<String>,
    pub from_email: Option<String>,
    pub from_name: Option<String>,
    pub reply_to: Option<String>,
    #[serde(default)]
    pub test_data: HashMap<String, String>,
}

/// テスト送信レスポンス
#[derive(Debug, Serialize)]
pub struct TestSendResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error:   Option<String>,
}

impl TestSendResponse {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error:   None,
        }
    }

    fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error:   Some(error.into()),
        }
    }
}

/// キャンペーンを送信する
///
/// ## エンドポイント
/// POST /api/campaigns/send
///
/// ## ステータスコード
///
/// - 400: campaignId 欠落・不正、宛先ゼロ、再送信
/// - 404: キャンペーン・テンプレートが存在しない
/// - 500: 予期しない失敗
#[tracing::instrument(skip_all)]
pub async fn send_campaign(
    State(state): State<Arc<DispatchState>>,
    acting_user: ActingUser,
    Json(request): Json<SendCampaignRequest>,
) -> Result<Response, ApiError> {
    acting_user.require(Capability::DispatchCampaigns)?;

    let Some(raw_id) = request.campaign_id else {
        return Ok(send_failure(
            StatusCode::BAD_REQUEST,
            "campaignId は必須です",
        ));
    };
    let Ok(id) = raw_id.parse::<Uuid>() else {
        return Ok(send_failure(StatusCode::BAD_REQUEST, "campaignId が不正です"));
    };

    match state.dispatcher.dispatch(&CampaignId::from_uuid(id)).await {
        Ok(stats) => Ok((
            StatusCode::OK,
            Json(SendCampaignResponse::ok(
                format!(
                    "キャンペーンを送信しました（成功 {} 件 / 失敗 {} 件）",
                    stats.succeeded, stats.failed
                ),
                stats,
            )),
        )
            .into_response()),
        Err(e) => {
            let status = match &e {
                DispatchError::CampaignNotFound(_) | DispatchError::TemplateMissing(_) => {
                    StatusCode::NOT_FOUND
                }
                DispatchError::AlreadyProcessed(_) | DispatchError::NoRecipients => {
                    StatusCode::BAD_REQUEST
                }
                DispatchError::Repository(infra) => {
                    tracing::error!(error = %infra, "配信中の永続化エラー");
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
            Ok(send_failure(status, e.to_string()))
        }
    }
}

/// テストメールを送信する
///
/// ## エンドポイント
/// POST /api/campaigns/test-send
///
/// ## ステータスコード
///
/// - 400: 必須フィールド欠落、メールアドレス不正、差出人未登録
/// - 404: テンプレートが存在しない
/// - 500: プロバイダ失敗・予期しない失敗
#[tracing::instrument(skip_all)]
pub async fn send_test(
    State(state): State<Arc<DispatchState>>,
    acting_user: ActingUser,
    Json(request): Json<TestSendRequest>,
) -> Result<Response, ApiError> {
    acting_user.require(Capability::DispatchCampaigns)?;

    let input = match build_test_send_input(request) {
        Ok(input) => input,
        Err(message) => return Ok(test_failure(StatusCode::BAD_REQUEST, message)),
    };

    match state.test_send.send_test(input).await {
        Ok(()) => Ok((
            StatusCode::OK,
            Json(TestSendResponse::ok("テストメールを送信しました")),
        )
            .into_response()),
        Err(e) => {
            let status = match &e {
                TestSendError::TemplateNotFound(_) => StatusCode::NOT_FOUND,
                TestSendError::SenderNotRegistered(_) => StatusCode::BAD_REQUEST,
                TestSendError::Send(_) | TestSendError::Repository(_) => {
                    tracing::error!(error = %e, "テスト送信に失敗");
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
            Ok(test_failure(status, e.to_string()))
        }
    }
}

/// リクエストを検証してユースケース入力に変換する
///
/// 欠落・不正は人間可読なメッセージで返し、ハンドラが 400 にする。
fn build_test_send_input(request: TestSendRequest) -> Result<TestSendInput, String> {
    let template_id = request
        .template_id
        .ok_or("templateId は必須です")?
        .parse::<Uuid>()
        .map_err(|_| "templateId が不正です".to_string())?;

    let recipient_email = request.recipient_email.ok_or("recipientEmail は必須です")?;
    let recipient_email =
        Email::new(recipient_email).map_err(|_| "recipientEmail の形式が不正です".to_string())?;

    let from_email = request.from_email.ok_or("fromEmail は必須です")?;
    let from_email =
        Email::new(from_email).map_err(|_| "fromEmail の形式が不正です".to_string())?;

    let from_name = request.from_name.ok_or("fromName は必須です")?;

    let reply_to = request
        .reply_to
        .map(|value| Email::new(value).map_err(|_| "replyTo の形式が不正です".to_string()))
        .transpose()?;

    Ok(TestSendInput {
        template_id: TemplateId::from_uuid(template_id),
        recipient_email,
        from_email,
        from_name,
        reply_to,
        sample_data: request.test_data,
    })
}

fn send_failure(status: StatusCode, error: impl Into<String>) -> Response {
    (status, Json(SendCampaignResponse::err(error))).into_response()
}

fn test_failure(status: StatusCode, error: impl Into<String>) -> Response {
    (status, Json(TestSendResponse::err(error))).into_response()
}

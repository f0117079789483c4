//! # キャンペーン
//!
//! タグで導出した宛先集合にひとつのテンプレートを配信する送信ジョブと、
//! その宛先ごとの配信追跡行を管理する。
//!
//! ## ドメイン用語
//!
//! | 型 | ドメイン用語 | 要件 |
//! |---|------------|------|
//! | [`Campaign`] | キャンペーン | 配信ジョブ。`draft → sending → sent/failed` のライフサイクルを持つ |
//! | [`CampaignRecipient`] | 配信追跡行 | 宛先ごとの配信結果（成功・失敗・エラーメッセージ） |
//! | [`DispatchStats`] | 配信集計 | 試行・成功・失敗件数と最終ステータスの導出 |
//!
//! 状態遷移は ADT（代数的データ型）で表現し、不正な状態を型レベルで防止する。
//! `sent` / `failed` は吸収状態であり、いかなる遷移も許可しない。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::{
    DomainError,
    contact::{ContactId, Email, Tag},
    template::TemplateId,
    user::UserId,
};

define_uuid_id! {
    /// キャンペーン ID（一意識別子）
    pub struct CampaignId;
}

define_uuid_id! {
    /// 配信追跡行 ID（一意識別子）
    pub struct CampaignRecipientId;
}

define_validated_string! {
    /// キャンペーン名（値オブジェクト）
    ///
    /// # バリデーション
    ///
    /// - 空文字列ではない
    /// - 最大 200 文字
    pub struct CampaignName {
        label: "キャンペーン名",
        max_length: 200,
    }
}

/// キャンペーンステータス
///
/// campaigns テーブルの `status` カラムに格納される値。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CampaignStatus {
    /// 下書き（未送信）
    Draft,
    /// 送信処理中
    Sending,
    /// 送信完了（1 件以上の配信成功。部分失敗を含む）
    Sent,
    /// 送信失敗（配信成功 0 件、または送信開始後の処理失敗）
    Failed,
}

impl CampaignStatus {
    /// 吸収状態（以後の遷移を許可しない）か判定する
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Sent | Self::Failed)
    }
}

impl std::str::FromStr for CampaignStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "sending" => Ok(Self::Sending),
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            _ => Err(DomainError::Validation(format!(
                "不正なキャンペーンステータス: {}",
                s
            ))),
        }
    }
}

/// キャンペーンの状態（ADT ベースステートマシン）
///
/// 各状態で有効なフィールドのみを持たせることで、不正な状態
/// （例: `sent` なのに `sent_at` が NULL）を型レベルで防止する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CampaignState {
    /// 下書き
    Draft,
    /// 送信処理中（ステータスを先に永続化してから宛先ループに入るため、
    /// クラッシュ時はこの状態が残る）
    Sending,
    /// 送信完了
    Sent {
        /// 全宛先の処理が完了した日時
        sent_at: DateTime<Utc>,
    },
    /// 送信失敗
    Failed {
        /// 宛先ループ完了後の失敗（全滅）では完了日時を持つ。
        /// 宛先ゼロ・送信開始後の処理失敗では None
        sent_at: Option<DateTime<Utc>>,
    },
}

/// キャンペーンエンティティ
///
/// 差出人（`from_email` / `from_name`）は作成時に差出人コンタクトから
/// 取り込んだスナップショットであり、コンタクトの後日の編集とは独立する。
/// 宛先タグは送信時に評価される（作成時のスナップショットではない）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Campaign {
    id: CampaignId,
    name: CampaignName,
    template_id: TemplateId,
    recipient_tags: Vec<Tag>,
    from_email: Email,
    from_name: String,
    created_by: UserId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    state: CampaignState,
}

/// キャンペーンの新規作成パラメータ
pub struct NewCampaign {
    pub id: CampaignId,
    pub name: CampaignName,
    pub template_id: TemplateId,
    pub recipient_tags: Vec<Tag>,
    pub from_email: Email,
    pub from_name: String,
    pub created_by: UserId,
    pub now: DateTime<Utc>,
}

/// キャンペーンの DB 復元パラメータ
///
/// DB スキーマのフラット構造を表現する。`from_db()` で不変条件を検証して
/// ADT に変換する。
pub struct CampaignRecord {
    pub id: CampaignId,
    pub name: CampaignName,
    pub template_id: TemplateId,
    pub recipient_tags: Vec<Tag>,
    pub from_email: Email,
    pub from_name: String,
    pub status: CampaignStatus,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// 新しいキャンペーンを作成する（`draft` 状態）
    pub fn new(params: NewCampaign) -> Self {
        Self {
            id: params.id,
            name: params.name,
            template_id: params.template_id,
            recipient_tags: params.recipient_tags,
            from_email: params.from_email,
            from_name: params.from_name,
            created_by: params.created_by,
            created_at: params.now,
            updated_at: params.now,
            state: CampaignState::Draft,
        }
    }

    /// 既存のデータから復元する
    ///
    /// # Errors
    ///
    /// - `DomainError::Validation`: 不変条件違反（`sent` なのに `sent_at` が
    ///   NULL）
    pub fn from_db(record: CampaignRecord) -> Result<Self, DomainError> {
        let state = match record.status {
            CampaignStatus::Draft => CampaignState::Draft,
            CampaignStatus::Sending => CampaignState::Sending,
            CampaignStatus::Sent => {
                let sent_at = record.sent_at.ok_or_else(|| {
                    DomainError::Validation(
                        "sent キャンペーンには sent_at が必要です".to_string(),
                    )
                })?;
                CampaignState::Sent { sent_at }
            }
            CampaignStatus::Failed => CampaignState::Failed {
                sent_at: record.sent_at,
            },
        };

        Ok(Self {
            id: record.id,
            name: record.name,
            template_id: record.template_id,
            recipient_tags: record.recipient_tags,
            from_email: record.from_email,
            from_name: record.from_name,
            created_by: record.created_by,
            created_at: record.created_at,
            updated_at: record.updated_at,
            state,
        })
    }

    /// 送信処理を開始する（`draft → sending`）
    ///
    /// # Errors
    ///
    /// - `DomainError::InvalidState`: `draft` 以外からの遷移
    ///   （再送信ガード。永続化層の条件付き UPDATE と対になる）
    pub fn begin_sending(self, now: DateTime<Utc>) -> Result<Self, DomainError> {
        match self.state {
            CampaignState::Draft => Ok(Self {
                state: CampaignState::Sending,
                updated_at: now,
                ..self
            }),
            _ => Err(DomainError::InvalidState(format!(
                "キャンペーンは既に処理されています（現在: {}）",
                self.status()
            ))),
        }
    }

    /// 宛先ループ完了後の最終ステータスを確定する（`sending → sent/failed`）
    ///
    /// 最終ステータスは集計から導出する: 成功 0 件なら `failed`、
    /// 1 件でも成功していれば `sent`（部分失敗もキャンペーンとしては成功）。
    ///
    /// # Errors
    ///
    /// - `DomainError::InvalidState`: `sending` 以外からの遷移
    pub fn complete(self, stats: &DispatchStats, now: DateTime<Utc>) -> Result<Self, DomainError> {
        match self.state {
            CampaignState::Sending => {
                let state = match stats.outcome() {
                    CampaignStatus::Sent => CampaignState::Sent { sent_at: now },
                    _ => CampaignState::Failed { sent_at: Some(now) },
                };
                Ok(Self {
                    state,
                    updated_at: now,
                    ..self
                })
            }
            _ => Err(DomainError::InvalidState(format!(
                "sending 以外の状態から完了できません（現在: {}）",
                self.status()
            ))),
        }
    }

    /// 送信開始後の処理失敗を記録する（`sending → failed`）
    ///
    /// 宛先ゼロや途中の予期しないエラーで使用する。ひとつも送信を
    /// 試行していないため `sent_at` は設定しない。
    ///
    /// # Errors
    ///
    /// - `DomainError::InvalidState`: `sending` 以外からの遷移
    pub fn fail(self, now: DateTime<Utc>) -> Result<Self, DomainError> {
        match self.state {
            CampaignState::Sending => Ok(Self {
                state: CampaignState::Failed { sent_at: None },
                updated_at: now,
                ..self
            }),
            _ => Err(DomainError::InvalidState(format!(
                "sending 以外の状態から失敗にできません（現在: {}）",
                self.status()
            ))),
        }
    }

    /// 現在のステータスを返す（DB カラム値と一致）
    pub fn status(&self) -> CampaignStatus {
        match self.state {
            CampaignState::Draft => CampaignStatus::Draft,
            CampaignState::Sending => CampaignStatus::Sending,
            CampaignState::Sent { .. } => CampaignStatus::Sent,
            CampaignState::Failed { .. } => CampaignStatus::Failed,
        }
    }

    /// 配信完了日時を返す（未完了なら None）
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        match self.state {
            CampaignState::Sent { sent_at } => Some(sent_at),
            CampaignState::Failed { sent_at } => sent_at,
            _ => None,
        }
    }

    pub fn id(&self) -> &CampaignId {
        &self.id
    }

    pub fn name(&self) -> &CampaignName {
        &self.name
    }

    pub fn template_id(&self) -> &TemplateId {
        &self.template_id
    }

    pub fn recipient_tags(&self) -> &[Tag] {
        &self.recipient_tags
    }

    pub fn from_email(&self) -> &Email {
        &self.from_email
    }

    pub fn from_name(&self) -> &str {
        &self.from_name
    }

    pub fn created_by(&self) -> &UserId {
        &self.created_by
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn state(&self) -> &CampaignState {
        &self.state
    }
}

/// 配信追跡行（キャンペーン × 宛先）
///
/// 配信開始時に宛先ごとに一括作成され（`email_sent = false`）、
/// 送信試行の解決後にちょうど一度更新される。
/// 削除はキャンペーン削除のカスケードのみ（ストレージ層に委譲）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignRecipient {
    pub id: CampaignRecipientId,
    pub campaign_id: CampaignId,
    pub recipient_id: ContactId,
    pub email_sent: bool,
    pub sent_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl CampaignRecipient {
    /// 送信前の追跡行を作成する
    pub fn pending(campaign_id: CampaignId, recipient_id: ContactId) -> Self {
        Self {
            id: CampaignRecipientId::new(),
            campaign_id,
            recipient_id,
            email_sent: false,
            sent_at: None,
            error_message: None,
        }
    }

    /// 配信成功を記録する
    pub fn mark_sent(&mut self, now: DateTime<Utc>) {
        self.email_sent = true;
        self.sent_at = Some(now);
        self.error_message = None;
    }

    /// 配信失敗を記録する（プロバイダのエラーメッセージを保持）
    pub fn mark_failed(&mut self, error_message: impl Into<String>) {
        self.email_sent = false;
        self.sent_at = None;
        self.error_message = Some(error_message.into());
    }
}

/// 配信集計
///
/// 宛先ループの成功・失敗件数を数え、最終ステータスを導出する。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed:    usize,
}

impl DispatchStats {
    /// 配信成功を 1 件記録する
    pub fn record_success(&mut self) {
        self.attempted += 1;
        self.succeeded += 1;
    }

    /// 配信失敗を 1 件記録する
    pub fn record_failure(&mut self) {
        self.attempted += 1;
        self.failed += 1;
    }

    /// 集計から最終ステータスを導出する
    ///
    /// 成功 0 件のときのみ `failed`。1 件でも成功していれば `sent`
    /// （部分失敗はキャンペーンとしては成功扱い）。
    pub fn outcome(&self) -> CampaignStatus {
        if self.succeeded == 0 {
            CampaignStatus::Failed
        } else {
            CampaignStatus::Sent
        }
    }
}

//! # CampaignRecipientRepository
//!
//! 配信追跡行の永続化を担当するリポジトリ。
//!
//! ## 設計方針
//!
//! - **一括作成**: 配信開始時に `UNNEST` で宛先分の行をまとめて挿入する
//! - **行単位の結果更新**: 送信試行の解決ごとに 1 行ずつ更新する
//!   （配信ループの逐次性に対応）
//! - **削除なし**: 追跡行の削除はキャンペーン削除のカスケードのみ

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reformworks_domain::{
    campaign::{CampaignId, CampaignRecipient, CampaignRecipientId},
    contact::ContactId,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::InfraError;

/// 配信追跡行リポジトリトレイト
#[async_trait]
pub trait CampaignRecipientRepository: Send + Sync {
    /// 追跡行を一括作成する
    async fn insert_batch(&self, rows: &[CampaignRecipient]) -> Result<(), InfraError>;

    /// 送信試行の結果を書き込む
    async fn update_outcome(&self, row: &CampaignRecipient) -> Result<(), InfraError>;

    /// キャンペーンの追跡行を取得する
    async fn find_by_campaign(
        &self,
        campaign_id: &CampaignId,
    ) -> Result<Vec<CampaignRecipient>, InfraError>;
}

/// DB 行の表現
#[derive(sqlx::FromRow)]
struct CampaignRecipientRow {
    id:            Uuid,
    campaign_id:   Uuid,
    recipient_id:  Uuid,
    email_sent:    bool,
    sent_at:       Option<DateTime<Utc>>,
    error_message: Option<String>,
}

impl CampaignRecipientRow {
    fn into_domain(self) -> CampaignRecipient {
        CampaignRecipient {
            id: CampaignRecipientId::from_uuid(self.id),
            campaign_id: CampaignId::from_uuid(self.campaign_id),
            recipient_id: ContactId::from_uuid(self.recipient_id),
            email_sent: self.email_sent,
            sent_at: self.sent_at,
            error_message: self.error_message,
        }
    }
}

/// PostgreSQL 実装の CampaignRecipientRepository
#[derive(Debug, Clone)]
pub struct PostgresCampaignRecipientRepository {
    pool: PgPool,
}

impl PostgresCampaignRecipientRepository {
    /// 新しいリポジトリインスタンスを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CampaignRecipientRepository for PostgresCampaignRecipientRepository {
    #[tracing::instrument(skip_all, level = "debug")]
    async fn insert_batch(&self, rows: &[CampaignRecipient]) -> Result<(), InfraError> {
        if rows.is_empty() {
            return Ok(());
        }

        let ids: Vec<Uuid> = rows.iter().map(|r| *r.id.as_uuid()).collect();
        let campaign_ids: Vec<Uuid> = rows.iter().map(|r| *r.campaign_id.as_uuid()).collect();
        let recipient_ids: Vec<Uuid> = rows.iter().map(|r| *r.recipient_id.as_uuid()).collect();
        let email_sent: Vec<bool> = rows.iter().map(|r| r.email_sent).collect();

        sqlx::query(
            r#"
            INSERT INTO campaign_recipients (id, campaign_id, recipient_id, email_sent)
            SELECT * FROM UNNEST($1::uuid[], $2::uuid[], $3::uuid[], $4::boolean[])
            "#,
        )
        .bind(ids)
        .bind(campaign_ids)
        .bind(recipient_ids)
        .bind(email_sent)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn update_outcome(&self, row: &CampaignRecipient) -> Result<(), InfraError> {
        sqlx::query(
            r#"
            UPDATE campaign_recipients
            SET email_sent = $2, sent_at = $3, error_message = $4
            WHERE id = $1
            "#,
        )
        .bind(row.id.as_uuid())
        .bind(row.email_sent)
        .bind(row.sent_at)
        .bind(row.error_message.as_deref())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_campaign(
        &self,
        campaign_id: &CampaignId,
    ) -> Result<Vec<CampaignRecipient>, InfraError> {
        let rows = sqlx::query_as::<_, CampaignRecipientRow>(
            r#"
            SELECT id, campaign_id, recipient_id, email_sent, sent_at, error_message
            FROM campaign_recipients
            WHERE campaign_id = $1
            "#,
        )
        .bind(campaign_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(CampaignRecipientRow::into_domain)
            .collect())
    }
}

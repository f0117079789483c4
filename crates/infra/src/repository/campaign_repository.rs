//! # CampaignRepository
//!
//! キャンペーンの永続化とステータス遷移の書き込みを担当するリポジトリ。
//!
//! ## 設計方針
//!
//! - **条件付き claim**: `draft → sending` の遷移は
//!   `UPDATE ... WHERE status = 'draft'` の単一文で行い、
//!   同時に到着した二重送信リクエストのどちらか一方だけが成功する。
//!   影響行数 0 は「他のリクエストが先に claim した」ことを意味する
//! - **最終ステータスの書き込み**: `finish` は遷移の妥当性を検証しない。
//!   妥当性はドメイン層のステートマシンが担保する

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reformworks_domain::{
    campaign::{Campaign, CampaignId, CampaignName, CampaignRecord, CampaignStatus},
    contact::Email,
    template::TemplateId,
    user::UserId,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::InfraError,
    repository::{tags_from_strings, tags_to_strings},
};

/// キャンペーンリポジトリトレイト
#[async_trait]
pub trait CampaignRepository: Send + Sync {
    /// キャンペーンを挿入する
    async fn insert(&self, campaign: &Campaign) -> Result<(), InfraError>;

    /// ID でキャンペーンを検索する
    async fn find_by_id(&self, id: &CampaignId) -> Result<Option<Campaign>, InfraError>;

    /// 全キャンペーンを取得する
    async fn find_all(&self) -> Result<Vec<Campaign>, InfraError>;

    /// キャンペーンを削除する
    ///
    /// 追跡行はストレージのカスケード削除に委ねる。
    /// 削除対象が存在した場合は true を返す。
    async fn delete(&self, id: &CampaignId) -> Result<bool, InfraError>;

    /// 送信処理の claim（`draft → sending` の原子的遷移）
    ///
    /// `draft` 状態の場合のみステータスを `sending` に更新し true を返す。
    /// すでに他の状態であれば何も変更せず false を返す。
    async fn claim_for_sending(
        &self,
        id: &CampaignId,
        now: DateTime<Utc>,
    ) -> Result<bool, InfraError>;

    /// 最終ステータスと完了日時を書き込む
    async fn finish(
        &self,
        id: &CampaignId,
        status: CampaignStatus,
        sent_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(), InfraError>;
}

/// DB 行の表現
#[derive(sqlx::FromRow)]
struct CampaignRow {
    id:             Uuid,
    name:           String,
    template_id:    Uuid,
    recipient_tags: Vec<String>,
    from_email:     String,
    from_name:      String,
    status:         String,
    sent_at:        Option<DateTime<Utc>>,
    created_by:     Uuid,
    created_at:     DateTime<Utc>,
    updated_at:     DateTime<Utc>,
}

impl CampaignRow {
    fn into_domain(self) -> Result<Campaign, InfraError> {
        Campaign::from_db(CampaignRecord {
            id: CampaignId::from_uuid(self.id),
            name: CampaignName::new(self.name)
                .map_err(|e| InfraError::unexpected(e.to_string()))?,
            template_id: TemplateId::from_uuid(self.template_id),
            recipient_tags: tags_from_strings(self.recipient_tags)?,
            from_email: Email::new(self.from_email)
                .map_err(|e| InfraError::unexpected(e.to_string()))?,
            from_name: self.from_name,
            status: self
                .status
                .parse::<CampaignStatus>()
                .map_err(|e| InfraError::unexpected(e.to_string()))?,
            sent_at: self.sent_at,
            created_by: UserId::from_uuid(self.created_by),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
        .map_err(|e| InfraError::unexpected(e.to_string()))
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, name, template_id, recipient_tags, from_email, from_name,
           status, sent_at, created_by, created_at, updated_at
    FROM campaigns
"#;

/// PostgreSQL 実装の CampaignRepository
#[derive(Debug, Clone)]
pub struct PostgresCampaignRepository {
    pool: PgPool,
}

impl PostgresCampaignRepository {
    /// 新しいリポジトリインスタンスを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CampaignRepository for PostgresCampaignRepository {
    #[tracing::instrument(skip_all, level = "debug")]
    async fn insert(&self, campaign: &Campaign) -> Result<(), InfraError> {
        sqlx::query(
            r#"
            INSERT INTO campaigns (
                id, name, template_id, recipient_tags, from_email, from_name,
                status, sent_at, created_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(campaign.id().as_uuid())
        .bind(campaign.name().as_str())
        .bind(campaign.template_id().as_uuid())
        .bind(tags_to_strings(campaign.recipient_tags()))
        .bind(campaign.from_email().as_str())
        .bind(campaign.from_name())
        .bind(campaign.status().to_string())
        .bind(campaign.sent_at())
        .bind(campaign.created_by().as_uuid())
        .bind(campaign.created_at())
        .bind(campaign.updated_at())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: &CampaignId) -> Result<Option<Campaign>, InfraError> {
        let row = sqlx::query_as::<_, CampaignRow>(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(CampaignRow::into_domain).transpose()
    }

    async fn find_all(&self) -> Result<Vec<Campaign>, InfraError> {
        let rows =
            sqlx::query_as::<_, CampaignRow>(&format!("{SELECT_COLUMNS} ORDER BY created_at DESC"))
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(CampaignRow::into_domain).collect()
    }

    async fn delete(&self, id: &CampaignId) -> Result<bool, InfraError> {
        let result = sqlx::query("DELETE FROM campaigns WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn claim_for_sending(
        &self,
        id: &CampaignId,
        now: DateTime<Utc>,
    ) -> Result<bool, InfraError> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns
            SET status = 'sending', updated_at = $2
            WHERE id = $1 AND status = 'draft'
            "#,
        )
        .bind(id.as_uuid())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn finish(
        &self,
        id: &CampaignId,
        status: CampaignStatus,
        sent_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(), InfraError> {
        sqlx::query(
            r#"
            UPDATE campaigns
            SET status = $2, sent_at = $3, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(status.to_string())
        .bind(sent_at)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

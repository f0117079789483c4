//! # TemplateRepository
//!
//! メールテンプレートの永続化を担当するリポジトリ。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reformworks_domain::{
    template::{Template, TemplateId, TemplateName, TemplateRecord},
    user::UserId,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::InfraError;

/// テンプレートリポジトリトレイト
#[async_trait]
pub trait TemplateRepository: Send + Sync {
    /// テンプレートを挿入する
    async fn insert(&self, template: &Template) -> Result<(), InfraError>;

    /// テンプレートを更新する
    async fn update(&self, template: &Template) -> Result<(), InfraError>;

    /// テンプレートを削除する
    ///
    /// 削除対象が存在した場合は true を返す。
    async fn delete(&self, id: &TemplateId) -> Result<bool, InfraError>;

    /// ID でテンプレートを検索する
    async fn find_by_id(&self, id: &TemplateId) -> Result<Option<Template>, InfraError>;

    /// 全テンプレートを取得する
    async fn find_all(&self) -> Result<Vec<Template>, InfraError>;
}

/// DB 行の表現
#[derive(sqlx::FromRow)]
struct TemplateRow {
    id:         Uuid,
    name:       String,
    subject:    String,
    html_body:  String,
    variables:  Vec<String>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TemplateRow {
    fn into_domain(self) -> Result<Template, InfraError> {
        Ok(Template::from_db(TemplateRecord {
            id: TemplateId::from_uuid(self.id),
            name: TemplateName::new(self.name)
                .map_err(|e| InfraError::unexpected(e.to_string()))?,
            subject: self.subject,
            html_body: self.html_body,
            variables: self.variables,
            created_by: UserId::from_uuid(self.created_by),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }))
    }
}

/// PostgreSQL 実装の TemplateRepository
#[derive(Debug, Clone)]
pub struct PostgresTemplateRepository {
    pool: PgPool,
}

impl PostgresTemplateRepository {
    /// 新しいリポジトリインスタンスを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TemplateRepository for PostgresTemplateRepository {
    #[tracing::instrument(skip_all, level = "debug")]
    async fn insert(&self, template: &Template) -> Result<(), InfraError> {
        sqlx::query(
            r#"
            INSERT INTO templates (
                id, name, subject, html_body, variables,
                created_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(template.id().as_uuid())
        .bind(template.name().as_str())
        .bind(template.subject())
        .bind(template.html_body())
        .bind(template.variables().to_vec())
        .bind(template.created_by().as_uuid())
        .bind(template.created_at())
        .bind(template.updated_at())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn update(&self, template: &Template) -> Result<(), InfraError> {
        sqlx::query(
            r#"
            UPDATE templates
            SET name = $2, subject = $3, html_body = $4, variables = $5,
                updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(template.id().as_uuid())
        .bind(template.name().as_str())
        .bind(template.subject())
        .bind(template.html_body())
        .bind(template.variables().to_vec())
        .bind(template.updated_at())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, id: &TemplateId) -> Result<bool, InfraError> {
        let result = sqlx::query("DELETE FROM templates WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_by_id(&self, id: &TemplateId) -> Result<Option<Template>, InfraError> {
        let row = sqlx::query_as::<_, TemplateRow>(
            r#"
            SELECT id, name, subject, html_body, variables,
                   created_by, created_at, updated_at
            FROM templates
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TemplateRow::into_domain).transpose()
    }

    async fn find_all(&self) -> Result<Vec<Template>, InfraError> {
        let rows = sqlx::query_as::<_, TemplateRow>(
            r#"
            SELECT id, name, subject, html_body, variables,
                   created_by, created_at, updated_at
            FROM templates
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TemplateRow::into_domain).collect()
    }
}

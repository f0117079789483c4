//! # ContactRepository
//!
//! コンタクト（宛先・差出人）の永続化を担当するリポジトリ。
//!
//! ## 設計方針
//!
//! - **タグ重複検索**: PostgreSQL の配列重複演算子 `&&` と GIN インデックスで
//!   宛先セグメンテーションを実現する
//! - **デフォルト差出人の一意性**: 単一の UPDATE 文でフラグを切り替え、
//!   「高々ひとつ」をトランザクションなしで保証する

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reformworks_domain::{
    contact::{Contact, ContactId, ContactKind, ContactName, ContactRecord, Email, Tag},
    user::UserId,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::InfraError,
    repository::{tags_from_strings, tags_to_strings},
};

/// コンタクトリポジトリトレイト
#[async_trait]
pub trait ContactRepository: Send + Sync {
    /// コンタクトを挿入する
    async fn insert(&self, contact: &Contact) -> Result<(), InfraError>;

    /// コンタクトを更新する
    async fn update(&self, contact: &Contact) -> Result<(), InfraError>;

    /// コンタクトを削除する（物理削除）
    ///
    /// 削除対象が存在した場合は true を返す。
    async fn delete(&self, id: &ContactId) -> Result<bool, InfraError>;

    /// ID でコンタクトを検索する
    async fn find_by_id(&self, id: &ContactId) -> Result<Option<Contact>, InfraError>;

    /// 全コンタクトを取得する
    async fn find_all(&self) -> Result<Vec<Contact>, InfraError>;

    /// タグ重複で宛先コンタクトを検索する
    ///
    /// 空のタグ集合はすべての宛先コンタクトを返す。
    /// それ以外は OR セマンティクス（ひとつでもタグが一致すれば対象）。
    /// 返却順は実装定義であり、呼び出し側は順序に依存してはならない。
    async fn find_recipients_by_tags(&self, tags: &[Tag]) -> Result<Vec<Contact>, InfraError>;

    /// メールアドレスでコンタクトを検索する（種別を問わない）
    ///
    /// 登録時の重複チェックに使用する。
    async fn find_by_email(&self, email: &Email) -> Result<Option<Contact>, InfraError>;

    /// メールアドレスで差出人コンタクトを検索する
    async fn find_sender_by_email(&self, email: &Email) -> Result<Option<Contact>, InfraError>;

    /// デフォルト差出人を取得する
    async fn find_default_sender(&self) -> Result<Option<Contact>, InfraError>;

    /// 指定した差出人をデフォルトに設定する
    ///
    /// 他の差出人のデフォルトフラグは同時に下ろされる。
    /// 対象が差出人種別であることは呼び出し側が検証すること。
    async fn set_default_sender(
        &self,
        id: &ContactId,
        now: DateTime<Utc>,
    ) -> Result<(), InfraError>;
}

/// DB 行の表現
#[derive(sqlx::FromRow)]
struct ContactRow {
    id:                Uuid,
    name:              String,
    email:             String,
    tags:              Vec<String>,
    kind:              String,
    is_default_sender: bool,
    created_by:        Uuid,
    created_at:        DateTime<Utc>,
    updated_at:        DateTime<Utc>,
}

impl ContactRow {
    fn into_domain(self) -> Result<Contact, InfraError> {
        Contact::from_db(ContactRecord {
            id: ContactId::from_uuid(self.id),
            name: ContactName::new(self.name)
                .map_err(|e| InfraError::unexpected(e.to_string()))?,
            email: Email::new(self.email).map_err(|e| InfraError::unexpected(e.to_string()))?,
            tags: tags_from_strings(self.tags)?,
            kind: self
                .kind
                .parse::<ContactKind>()
                .map_err(|e| InfraError::unexpected(e.to_string()))?,
            is_default_sender: self.is_default_sender,
            created_by: UserId::from_uuid(self.created_by),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
        .map_err(|e| InfraError::unexpected(e.to_string()))
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, name, email, tags, kind, is_default_sender,
           created_by, created_at, updated_at
    FROM contacts
"#;

/// PostgreSQL 実装の ContactRepository
#[derive(Debug, Clone)]
pub struct PostgresContactRepository {
    pool: PgPool,
}

impl PostgresContactRepository {
    /// 新しいリポジトリインスタンスを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContactRepository for PostgresContactRepository {
    #[tracing::instrument(skip_all, level = "debug")]
    async fn insert(&self, contact: &Contact) -> Result<(), InfraError> {
        sqlx::query(
            r#"
            INSERT INTO contacts (
                id, name, email, tags, kind, is_default_sender,
                created_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(contact.id().as_uuid())
        .bind(contact.name().as_str())
        .bind(contact.email().as_str())
        .bind(tags_to_strings(contact.tags()))
        .bind(contact.kind().to_string())
        .bind(contact.is_default_sender())
        .bind(contact.created_by().as_uuid())
        .bind(contact.created_at())
        .bind(contact.updated_at())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn update(&self, contact: &Contact) -> Result<(), InfraError> {
        sqlx::query(
            r#"
            UPDATE contacts
            SET name = $2, email = $3, tags = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(contact.id().as_uuid())
        .bind(contact.name().as_str())
        .bind(contact.email().as_str())
        .bind(tags_to_strings(contact.tags()))
        .bind(contact.updated_at())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, id: &ContactId) -> Result<bool, InfraError> {
        let result = sqlx::query("DELETE FROM contacts WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_by_id(&self, id: &ContactId) -> Result<Option<Contact>, InfraError> {
        let row = sqlx::query_as::<_, ContactRow>(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(ContactRow::into_domain).transpose()
    }

    async fn find_all(&self) -> Result<Vec<Contact>, InfraError> {
        let rows =
            sqlx::query_as::<_, ContactRow>(&format!("{SELECT_COLUMNS} ORDER BY created_at DESC"))
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(ContactRow::into_domain).collect()
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn find_recipients_by_tags(&self, tags: &[Tag]) -> Result<Vec<Contact>, InfraError> {
        let rows = if tags.is_empty() {
            // 空のタグ集合 = 全宛先
            sqlx::query_as::<_, ContactRow>(&format!(
                "{SELECT_COLUMNS} WHERE kind = 'recipient'"
            ))
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query_as::<_, ContactRow>(&format!(
                "{SELECT_COLUMNS} WHERE kind = 'recipient' AND tags && $1"
            ))
            .bind(tags_to_strings(tags))
            .fetch_all(&self.pool)
            .await?
        };

        rows.into_iter().map(ContactRow::into_domain).collect()
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<Contact>, InfraError> {
        let row = sqlx::query_as::<_, ContactRow>(&format!("{SELECT_COLUMNS} WHERE email = $1"))
            .bind(email.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(ContactRow::into_domain).transpose()
    }

    async fn find_sender_by_email(&self, email: &Email) -> Result<Option<Contact>, InfraError> {
        let row = sqlx::query_as::<_, ContactRow>(&format!(
            "{SELECT_COLUMNS} WHERE kind = 'sender' AND email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(ContactRow::into_domain).transpose()
    }

    async fn find_default_sender(&self) -> Result<Option<Contact>, InfraError> {
        let row = sqlx::query_as::<_, ContactRow>(&format!(
            "{SELECT_COLUMNS} WHERE kind = 'sender' AND is_default_sender LIMIT 1"
        ))
        .fetch_optional(&self.pool)
        .await?;

        row.map(ContactRow::into_domain).transpose()
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn set_default_sender(
        &self,
        id: &ContactId,
        now: DateTime<Utc>,
    ) -> Result<(), InfraError> {
        // 対象のフラグを立て、他の差出人のフラグを同一文で下ろす
        sqlx::query(
            r#"
            UPDATE contacts
            SET is_default_sender = (id = $1), updated_at = $2
            WHERE kind = 'sender'
            "#,
        )
        .bind(id.as_uuid())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_トレイトはsendとsyncを実装している() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PostgresContactRepository>();
    }
}

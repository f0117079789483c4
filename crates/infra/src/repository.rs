//! # リポジトリ実装
//!
//! ドメインエンティティの永続化を担当するリポジトリを提供する。
//!
//! ## 設計方針
//!
//! - **依存性逆転**: trait をこのモジュールで定義し、PostgreSQL 実装を提供
//! - **行の復元**: DB のフラットな行を `from_db` 系コンストラクタで
//!   ドメインエンティティに変換し、不変条件違反は `Unexpected` として報告
//! - **テスタビリティ**: trait 経由でモック可能な設計

pub mod campaign_recipient_repository;
pub mod campaign_repository;
pub mod contact_repository;
pub mod template_repository;

pub use campaign_recipient_repository::{
    CampaignRecipientRepository,
    PostgresCampaignRecipientRepository,
};
pub use campaign_repository::{CampaignRepository, PostgresCampaignRepository};
pub use contact_repository::{ContactRepository, PostgresContactRepository};
pub use template_repository::{PostgresTemplateRepository, TemplateRepository};

use reformworks_domain::contact::Tag;

use crate::error::InfraError;

/// タグ列を DB の text[] 表現に変換する
pub(crate) fn tags_to_strings(tags: &[Tag]) -> Vec<String> {
    tags.iter().map(|t| t.as_str().to_string()).collect()
}

/// DB の text[] 表現からタグ列を復元する
pub(crate) fn tags_from_strings(values: Vec<String>) -> Result<Vec<Tag>, InfraError> {
    values
        .into_iter()
        .map(|v| Tag::new(v).map_err(|e| InfraError::unexpected(e.to_string())))
        .collect()
}

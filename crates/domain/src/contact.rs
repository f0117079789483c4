//! # コンタクト
//!
//! キャンペーンの宛先（recipient）と差出人（sender）を表すコンタクトを定義する。
//!
//! ## ドメイン用語
//!
//! | 型 | ドメイン用語 | 要件 |
//! |---|------------|------|
//! | [`Contact`] | コンタクト | 宛先・差出人を種別で区別して一元管理する連絡先 |
//! | [`ContactKind`] | コンタクト種別 | `recipient`（宛先）/ `sender`（差出人） |
//! | [`Tag`] | タグ | 宛先セグメンテーション用の自由記述ラベル |
//! | [`Email`] | メールアドレス | 一意な連絡先アドレス |
//!
//! ## 設計方針
//!
//! - **種別の判別**: 宛先と差出人は同じテーブルに格納し、`kind` で判別する
//! - **タグ重複判定**: キャンペーンのタグとコンタクトのタグに共通要素が
//!   ひとつでもあれば配信対象（OR セマンティクス）
//! - **デフォルト差出人**: `is_default_sender` は差出人種別のみに許可される。
//!   「高々ひとつ」の保証は書き込み時にリポジトリが行う

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::{DomainError, user::UserId};

define_uuid_id! {
    /// コンタクト ID（一意識別子）
    pub struct ContactId;
}

/// メールアドレス（値オブジェクト）
///
/// `local@domain.tld` 形状の簡易検証を生成時に実行し、
/// 不正な値の作成を防ぐ。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Email(String);

impl Email {
    /// メールアドレスを作成する
    ///
    /// # バリデーション
    ///
    /// - 空文字列ではない
    /// - `local@domain` の形式で、ドメイン部がドットを含む
    /// - 最大 255 文字
    ///
    /// # エラー
    ///
    /// バリデーションに失敗した場合は `DomainError::Validation` を返す。
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into().trim().to_string();

        if value.is_empty() {
            return Err(DomainError::Validation(
                "メールアドレスは必須です".to_string(),
            ));
        }

        // 基本的な構造検証: local@domain.tld の形状であること
        let Some((local, domain)) = value.split_once('@') else {
            return Err(DomainError::Validation(
                "メールアドレスの形式が不正です".to_string(),
            ));
        };

        if local.is_empty() || domain.is_empty() || !domain.contains('.') {
            return Err(DomainError::Validation(
                "メールアドレスの形式が不正です".to_string(),
            ));
        }

        if value.len() > 255 {
            return Err(DomainError::Validation(
                "メールアドレスは255文字以内である必要があります".to_string(),
            ));
        }

        Ok(Self(value))
    }

    /// 文字列参照を取得する
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 所有権を持つ文字列に変換する
    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

define_validated_string! {
    /// コンタクト名（値オブジェクト）
    ///
    /// PII（個人識別情報）のため、Debug 出力はマスクされる。
    ///
    /// # バリデーション
    ///
    /// - 空文字列ではない
    /// - 最大 100 文字
    pub struct ContactName {
        label: "コンタクト名",
        max_length: 100,
        pii: true,
    }
}

define_validated_string! {
    /// タグ（値オブジェクト）
    ///
    /// 宛先セグメンテーション用の自由記述ラベル。大文字小文字は区別する。
    ///
    /// # バリデーション
    ///
    /// - 空文字列ではない
    /// - 最大 50 文字
    pub struct Tag {
        label: "タグ",
        max_length: 50,
    }
}

/// コンタクト種別
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ContactKind {
    /// 宛先（キャンペーン配信の受信者）
    Recipient,
    /// 差出人（From アドレスとして使用可能な送信元）
    Sender,
}

impl std::str::FromStr for ContactKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recipient" => Ok(Self::Recipient),
            "sender" => Ok(Self::Sender),
            _ => Err(DomainError::Validation(format!(
                "不正なコンタクト種別: {}",
                s
            ))),
        }
    }
}

/// コンタクトエンティティ
///
/// 宛先・差出人の連絡先を表現する。削除は物理削除（論理削除なし）。
///
/// # 不変条件
///
/// - `is_default_sender` が true の場合、`kind` は `Sender` であること
/// - `email` はテーブル内で一意（ストレージ層の UNIQUE 制約で保証）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    id: ContactId,
    name: ContactName,
    email: Email,
    tags: Vec<Tag>,
    kind: ContactKind,
    is_default_sender: bool,
    created_by: UserId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// コンタクトの DB 復元パラメータ
pub struct ContactRecord {
    pub id: ContactId,
    pub name: ContactName,
    pub email: Email,
    pub tags: Vec<Tag>,
    pub kind: ContactKind,
    pub is_default_sender: bool,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contact {
    /// 新しいコンタクトを作成する
    ///
    /// デフォルト差出人フラグは false で初期化される。
    /// フラグの切り替えはリポジトリの一括更新（他の差出人のフラグを
    /// 同時に下ろす）経由でのみ行う。
    pub fn new(
        id: ContactId,
        name: ContactName,
        email: Email,
        tags: Vec<Tag>,
        kind: ContactKind,
        created_by: UserId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            email,
            tags,
            kind,
            is_default_sender: false,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// 既存のデータから復元する
    ///
    /// # Errors
    ///
    /// - `DomainError::Validation`: 宛先コンタクトにデフォルト差出人フラグが
    ///   立っている場合
    pub fn from_db(record: ContactRecord) -> Result<Self, DomainError> {
        if record.is_default_sender && record.kind != ContactKind::Sender {
            return Err(DomainError::Validation(
                "デフォルト差出人フラグは差出人コンタクトのみに設定できます".to_string(),
            ));
        }

        Ok(Self {
            id: record.id,
            name: record.name,
            email: record.email,
            tags: record.tags,
            kind: record.kind,
            is_default_sender: record.is_default_sender,
            created_by: record.created_by,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }

    /// 名前・メールアドレス・タグを更新した新しいコンタクトを返す
    pub fn with_details(
        self,
        name: ContactName,
        email: Email,
        tags: Vec<Tag>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            name,
            email,
            tags,
            updated_at: now,
            ..self
        }
    }

    /// キャンペーンのタグ集合と重複があるか判定する
    ///
    /// 空のタグ集合は「全宛先」を意味するため常に true を返す。
    /// それ以外は OR セマンティクス: 自身のタグとひとつでも一致すれば true。
    pub fn matches_any(&self, tags: &[Tag]) -> bool {
        tags.is_empty() || self.tags.iter().any(|t| tags.contains(t))
    }

    pub fn id(&self) -> &ContactId {
        &self.id
    }

    pub fn name(&self) -> &ContactName {
        &self.name
    }

    pub fn email(&self) -> &Email {
        &self.email
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn kind(&self) -> ContactKind {
        self.kind
    }

    pub fn is_default_sender(&self) -> bool {
        self.is_default_sender
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
}

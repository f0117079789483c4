//! # ロール（権限管理）
//!
//! バックオフィス利用者のロールと、キャンペーン機能に対する権限を管理する。
//!
//! ## ドメイン用語
//!
//! | 型 | ドメイン用語 | 要件 |
//! |---|------------|------|
//! | [`Role`] | ロール（役割） | 管理者・社内スタッフ・フランチャイズ・顧客・一般の 5 区分 |
//! | [`Capability`] | 操作権限 | ロールに紐づく操作許可（テンプレート管理、配信実行など） |
//!
//! ## 設計方針
//!
//! - **閉じた列挙型**: ロールは文字列比較ではなく閉じた enum で表現し、
//!   権限マッピングの網羅性をコンパイル時に保証する
//! - **権限の導出**: ロール → 権限集合は `capabilities()` の網羅的 match で
//!   一元管理する。ハンドラ側に個別のロール分岐を書かない

use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::DomainError;

/// バックオフィス利用者のロール
///
/// 外部認証サービスがセッションに保持するロール文字列を、
/// リクエスト受付時にこの enum へ変換して以降は型として扱う。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    /// 管理者: バックオフィス全機能
    Admin,
    /// 社内スタッフ: キャンペーン運用の実務担当
    Internal,
    /// フランチャイズ: 閲覧のみ
    Franchise,
    /// 顧客: キャンペーン機能へのアクセスなし
    Client,
    /// 一般ユーザー: キャンペーン機能へのアクセスなし
    User,
}

impl std::str::FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "internal" => Ok(Self::Internal),
            "franchise" => Ok(Self::Franchise),
            "client" => Ok(Self::Client),
            "user" => Ok(Self::User),
            _ => Err(DomainError::Validation(format!("不正なロール: {}", s))),
        }
    }
}

/// キャンペーン機能に対する操作権限
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// テンプレートの作成・更新・削除
    ManageTemplates,
    /// コンタクト（宛先・差出人）の作成・更新・削除
    ManageContacts,
    /// キャンペーンの作成・削除
    ManageCampaigns,
    /// キャンペーンの配信・テスト送信
    DispatchCampaigns,
    /// キャンペーン・配信結果の閲覧
    ViewCampaigns,
}

impl Role {
    /// このロールが持つ権限の集合を返す
    ///
    /// 網羅的 match により、ロールを追加した際は必ずここで
    /// 権限集合の定義を強制される。
    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            Role::Admin | Role::Internal => &[
                Capability::ManageTemplates,
                Capability::ManageContacts,
                Capability::ManageCampaigns,
                Capability::DispatchCampaigns,
                Capability::ViewCampaigns,
            ],
            Role::Franchise => &[Capability::ViewCampaigns],
            Role::Client | Role::User => &[],
        }
    }

    /// このロールが指定した操作を実行できるか判定する
    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

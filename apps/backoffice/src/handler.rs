//! # HTTP リクエストハンドラ
//!
//! axum のルートに対応するハンドラ関数を定義する。
//!
//! ## 設計方針
//!
//! - 各ハンドラはサブモジュールに配置
//! - 親モジュール（この `handler.rs`）で re-export し、フラットな API を提供
//! - ハンドラは薄く保ち、ビジネスロジックはユースケース層に委譲
//! - すべてのハンドラは `ActingUser` エクストラクタでゲートウェイの
//!   ユーザーコンテキストを受け取り、権限を検証する

pub mod campaign;
pub mod contact;
pub mod dispatch;
pub mod health;
pub mod template;

pub use campaign::{
    CampaignState,
    create_campaign,
    delete_campaign,
    get_campaign,
    list_campaign_recipients,
    list_campaigns,
};
pub use contact::{
    ContactState,
    create_contact,
    delete_contact,
    list_contacts,
    set_default_sender,
    update_contact,
};
pub use dispatch::{DispatchState, send_campaign, send_test};
pub use health::health_check;
pub use template::{
    TemplateState,
    create_template,
    delete_template,
    get_template,
    list_templates,
    update_template,
};

//! # ユースケース層
//!
//! バックオフィスのビジネスロジックを実装する。
//!
//! ## 設計方針
//!
//! - **依存性注入**: リポジトリ・送信アダプタを `Arc<dyn Trait>` で外部から注入
//! - **薄いハンドラ**: ハンドラは薄く保ち、ロジックはユースケースに集約
//!
//! ## モジュール構成
//!
//! - `dispatch`: キャンペーン配信パイプライン（このサービスの中核）
//! - `test_send`: テスト送信（配信前プレビュー）
//! - `renderer`: テンプレートレンダリング
//! - `template` / `contact` / `campaign`: 管理 CRUD

pub mod campaign;
pub mod contact;
pub mod dispatch;
pub mod renderer;
pub mod template;
pub mod test_send;

pub use campaign::{CampaignUseCaseImpl, CreateCampaignInput};
pub use contact::{ContactUseCaseImpl, CreateContactInput, UpdateContactInput};
pub use dispatch::{CampaignDispatcher, DispatchError};
pub use renderer::CampaignRenderer;
pub use template::{CreateTemplateInput, TemplateUseCaseImpl, UpdateTemplateInput};
pub use test_send::{TestSendError, TestSendInput, TestSendUseCase};

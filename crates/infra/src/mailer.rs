//! # メール送信アダプタ
//!
//! トランザクショナルメールの送信を担当するインフラストラクチャモジュール。
//!
//! ## 設計方針
//!
//! - **trait による抽象化**: `MailSender` trait でメール送信を抽象化
//! - **3 つの実装**: SMTP（Mailpit 開発用）、SES（本番用）、Noop（テスト用）
//! - **環境変数切替**: `MAILER_BACKEND` でランタイム選択
//! - **1 呼び出し = 1 送信試行**: アダプタ内部でのリトライは行わない。
//!   失敗は `SendError` として返し、呼び出し側が宛先単位で処理する

mod noop;
mod ses;
mod smtp;

use async_trait::async_trait;
pub use noop::NoopMailSender;
use reformworks_domain::mail::{OutgoingEmail, SendError};
pub use ses::SesMailSender;
pub use smtp::SmtpMailSender;

/// メール送信トレイト
///
/// 配信パイプラインの境界。1 回の呼び出しでちょうど 1 回の外部送信を
/// 試行し、プロバイダレベルの失敗は `SendError` として返す
/// （この境界を越えて panic しない）。
#[async_trait]
pub trait MailSender: Send + Sync {
    /// メールを送信する
    async fn send(&self, email: &OutgoingEmail) -> Result<(), SendError>;
}

//! # バックオフィス設定
//!
//! 環境変数からバックオフィスサーバーの設定を読み込む。

use std::env;

/// バックオフィスサーバーの設定
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// バインドアドレス
    pub host: String,
    /// ポート番号
    pub port: u16,
    /// データベース接続 URL
    pub database_url: String,
    /// 公開サイトのベース URL（配信停止リンク用）
    pub site_base_url: String,
    /// メール配信設定
    pub mailer: MailerConfig,
}

/// メール配信の設定
///
/// `MAILER_BACKEND` 環境変数で送信バックエンドを切り替える:
/// - `smtp`: Mailpit（開発）/ SMTP サーバー経由で送信
/// - `ses`: Amazon SES v2 経由で送信（本番）
/// - `noop`: 送信しない（ログ出力のみ）
#[derive(Debug, Clone)]
pub struct MailerConfig {
    /// 送信バックエンド（"smtp" | "ses" | "noop"）
    pub backend:   String,
    /// SMTP ホスト（backend=smtp の場合に使用）
    pub smtp_host: String,
    /// SMTP ポート（backend=smtp の場合に使用）
    pub smtp_port: u16,
}

impl AppConfig {
    /// 環境変数から設定を読み込む
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Self {
            host: env::var("BACKOFFICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("BACKOFFICE_PORT")
                .expect("BACKOFFICE_PORT が設定されていません（.env を確認してください）")
                .parse()
                .expect("BACKOFFICE_PORT は有効なポート番号である必要があります"),
            database_url: env::var("DATABASE_URL")
                .expect("DATABASE_URL が設定されていません（.env を確認してください）"),
            site_base_url: env::var("SITE_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            mailer: MailerConfig::from_env(),
        })
    }
}

impl MailerConfig {
    /// 環境変数からメール配信設定を読み込む
    fn from_env() -> Self {
        Self {
            backend:   env::var("MAILER_BACKEND").unwrap_or_else(|_| "noop".to_string()),
            smtp_host: env::var("SMTP_HOST").unwrap_or_else(|_| "localhost".to_string()),
            smtp_port: env::var("SMTP_PORT")
                .unwrap_or_else(|_| "1025".to_string())
                .parse()
                .expect("SMTP_PORT は有効なポート番号である必要があります"),
        }
    }
}

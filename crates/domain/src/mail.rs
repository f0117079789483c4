//! # 送信メッセージ
//!
//! メール配信に関するドメインモデルを定義する。
//!
//! ## 設計方針
//!
//! - **1 呼び出し = 1 送信試行**: 送信アダプタはリトライしない。
//!   失敗の扱い（追跡行への記録、ループ継続）は呼び出し側の責務
//! - **相関メタデータ**: キャンペーン ID 等の相関情報はプロバイダ固有の
//!   タグとして不透明に添付する。メタデータの有無は配信動作を変えない

use thiserror::Error;

use crate::contact::Email;

/// メール送信エラー
///
/// 送信アダプタの境界で発生するエラー。プロバイダのメッセージを保持し、
/// 配信追跡行の `error_message` に記録される。
#[derive(Debug, Error)]
pub enum SendError {
    /// プロバイダレベルの失敗（ネットワークエラー、宛先拒否、認証失敗、
    /// レート制限など）
    #[error("メール送信に失敗: {0}")]
    Provider(String),

    /// メッセージ構築に失敗（アドレスのパース失敗など）
    #[error("メッセージ構築に失敗: {0}")]
    InvalidMessage(String),
}

/// 送信メッセージ
///
/// テンプレートレンダリングの出力。`MailSender` に渡される。
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    /// 宛先メールアドレス
    pub to: Email,
    /// 差出人メールアドレス
    pub from_email: Email,
    /// 差出人表示名
    pub from_name: String,
    /// 返信先（未指定なら差出人と同じ扱い）
    pub reply_to: Option<Email>,
    /// 件名（レンダリング済み）
    pub subject: String,
    /// HTML 本文（レンダリング済み）
    pub html_body: String,
    /// 相関用メタデータ（キー・値のペア）
    ///
    /// デバッグ・追跡用にプロバイダのタグとして添付される。
    /// タグ機構を持たないバックエンドでは無視される。
    pub metadata: Vec<(String, String)>,
}

impl OutgoingEmail {
    /// 差出人の表示形式（`名前 <アドレス>`）を返す
    pub fn from_mailbox(&self) -> String {
        format!("{} <{}>", self.from_name, self.from_email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_email() -> OutgoingEmail {
        OutgoingEmail {
            to: Email::new("hanako@example.com").unwrap(),
            from_email: Email::new("news@reform.example.com").unwrap(),
            from_name: "ReformWorks 広報".to_string(),
            reply_to: None,
            subject: "件名".to_string(),
            html_body: "<p>本文</p>".to_string(),
            metadata: vec![],
        }
    }

    #[test]
    fn test_差出人の表示形式が正しい() {
        let email = make_email();

        assert_eq!(
            email.from_mailbox(),
            "ReformWorks 広報 <news@reform.example.com>"
        );
    }

    #[test]
    fn test_send_errorはプロバイダのメッセージを保持する() {
        let error = SendError::Provider("550 mailbox unavailable".to_string());

        assert_eq!(
            error.to_string(),
            "メール送信に失敗: 550 mailbox unavailable"
        );
    }
}

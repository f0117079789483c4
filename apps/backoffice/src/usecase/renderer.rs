//! # キャンペーンレンダラー
//!
//! テンプレートの件名・本文を宛先ごとのデータで置換する。
//!
//! ## 設計方針
//!
//! - **優先順位**: 宛先データ > 呼び出し側の共通データ > 導出共通トークン。
//!   同名キーは優先順位の高い方が勝つ
//! - **未解決トークン**: 空文字列に置換し、debug ログに残す
//!   （エンドユーザーには表面化させない）
//! - **時刻は Clock 経由**: `date` / `time` 等の導出トークンをテストで
//!   固定できるようにする

use std::{collections::HashMap, sync::Arc};

use reformworks_domain::{
    clock::Clock,
    render::{Substitution, common_token_values, substitute},
    template::Template,
};

/// レンダリング済みメール
#[derive(Debug, Clone)]
pub struct RenderedEmail {
    pub subject:   String,
    pub html_body: String,
}

/// キャンペーンレンダラー
///
/// `Clock` と配信停止 URL を保持し、`Template` から送信可能な
/// 件名・本文を生成する。
pub struct CampaignRenderer {
    clock:           Arc<dyn Clock>,
    unsubscribe_url: String,
}

impl CampaignRenderer {
    /// 新しいレンダラーインスタンスを作成
    ///
    /// # 引数
    ///
    /// - `clock`: 導出トークン（日付・時刻）用の時刻プロバイダ
    /// - `site_base_url`: 公開サイトのベース URL（例: `https://reform.example.com`）
    pub fn new(clock: Arc<dyn Clock>, site_base_url: &str) -> Self {
        let unsubscribe_url = format!("{}/unsubscribe", site_base_url.trim_end_matches('/'));
        Self {
            clock,
            unsubscribe_url,
        }
    }

    /// 単一コンテンツを置換する
    ///
    /// 導出共通トークンの上に `global_data`、さらに `recipient_data` を
    /// 重ねたマップで置換する。
    pub fn render(
        &self,
        content: &str,
        recipient_data: &HashMap<String, String>,
        global_data: &HashMap<String, String>,
    ) -> Substitution {
        let mut data = common_token_values(self.clock.now(), &self.unsubscribe_url);
        data.extend(global_data.clone());
        data.extend(recipient_data.clone());

        substitute(content, &data)
    }

    /// テンプレートの件名・本文をレンダリングする
    ///
    /// 未解決トークンは空文字列になり、debug ログに記録される。
    pub fn render_email(
        &self,
        template: &Template,
        recipient_data: &HashMap<String, String>,
        global_data: &HashMap<String, String>,
    ) -> RenderedEmail {
        let subject = self.render(template.subject(), recipient_data, global_data);
        let html_body = self.render(template.html_body(), recipient_data, global_data);

        for token in subject.missing.iter().chain(html_body.missing.iter()) {
            tracing::debug!(
                template_id = %template.id(),
                token,
                "未解決のテンプレート変数を空文字列に置換"
            );
        }

        RenderedEmail {
            subject:   subject.text,
            html_body: html_body.text,
        }
    }
}

//! # テンプレート置換
//!
//! `{{variable}}` プレースホルダの走査と置換を行う純粋関数群。
//!
//! ## プレースホルダ文法（永続化されるテンプレートの互換形式）
//!
//! - 二重波括弧: `{{name}}`, `{{email}}`
//! - 識別子は単語構成文字（英数字とアンダースコア）のみ、大文字小文字を区別
//! - データに存在しない識別子は**空文字列**に置換される（リテラルとして
//!   残さない）。欠落は診断リストに記録され、呼び出し側がログに出す
//!
//! ## 冪等性
//!
//! 置換後の文字列にはプレースホルダが残らないため、置換済みの文字列を
//! 再度置換しても変化しない（データ値自体が `{{...}}` を含む場合を除く）。

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Utc};
use regex::Regex;

/// プレースホルダにマッチする正規表現
///
/// グループ 1 が識別子。`{{ name }}`（空白入り）は意図的にマッチしない。
static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(\w+)\}\}").expect("トークン正規表現は不変のリテラル"));

/// 宛先フィールド由来のトークン名
///
/// 配信時に宛先コンタクトから自動で埋まるため、テンプレートでの
/// 変数宣言は不要。
pub const RECIPIENT_TOKENS: [&str; 2] = ["name", "email"];

/// 共通トークン名（配信時に導出される値）
///
/// [`common_token_values`] が生成する固定集合。呼び出し側データに
/// 同名キーがある場合はそちらが優先される。
pub const COMMON_TOKENS: [&str; 6] = ["date", "time", "year", "month", "day", "unsubscribe_url"];

/// 置換結果
///
/// `text` は置換済み文字列、`missing` はデータに存在せず空文字列に
/// 置換された識別子（出現順、重複あり）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub text:    String,
    pub missing: Vec<String>,
}

/// コンテンツ内のプレースホルダ識別子を出現順に列挙する
///
/// 重複は除去される。テンプレート保存時の宣言変数チェックに使用する。
pub fn scan_tokens(content: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for caps in TOKEN_RE.captures_iter(content) {
        let name = &caps[1];
        if !seen.iter().any(|s| s == name) {
            seen.push(name.to_string());
        }
    }
    seen
}

/// プレースホルダをデータで置換する
///
/// データに存在する識別子は値に、存在しない識別子は空文字列に置換する。
/// HTML エスケープは行わない（値は運用者管理の文字列であるため）。
pub fn substitute(content: &str, data: &HashMap<String, String>) -> Substitution {
    let mut missing = Vec::new();
    let text = TOKEN_RE.replace_all(content, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        match data.get(name) {
            Some(value) => value.clone(),
            None => {
                missing.push(name.to_string());
                String::new()
            }
        }
    });

    Substitution {
        text: text.into_owned(),
        missing,
    }
}

/// 共通トークンの値を生成する
///
/// | トークン | 値 |
/// |---------|-----|
/// | `date` | `YYYY-MM-DD` |
/// | `time` | `HH:MM` |
/// | `year` | 西暦 4 桁 |
/// | `month` | 英語の月名 |
/// | `day` | 日（1〜31） |
/// | `unsubscribe_url` | 配信停止ページの URL |
pub fn common_token_values(
    now: DateTime<Utc>,
    unsubscribe_url: &str,
) -> HashMap<String, String> {
    HashMap::from([
        ("date".to_string(), now.format("%Y-%m-%d").to_string()),
        ("time".to_string(), now.format("%H:%M").to_string()),
        ("year".to_string(), now.format("%Y").to_string()),
        ("month".to_string(), now.format("%B").to_string()),
        ("day".to_string(), now.day().to_string()),
        ("unsubscribe_url".to_string(), unsubscribe_url.to_string()),
    ])
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;

    fn make_data(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    // scan_tokens のテスト

    #[test]
    fn test_走査はトークンを出現順に返す() {
        let tokens = scan_tokens("<p>{{name}}さん、{{code}} を {{name}} 宛に送付</p>");
        assert_eq!(tokens, vec!["name".to_string(), "code".to_string()]);
    }

    #[test]
    fn test_走査はトークンのない文字列で空を返す() {
        assert!(scan_tokens("プレーンテキスト").is_empty());
        assert!(scan_tokens("").is_empty());
    }

    #[test]
    fn test_走査は不正な形状のトークンを無視する() {
        // 空白入り・片側のみ・ハイフン入りはプレースホルダではない
        assert!(scan_tokens("{{ name }}").is_empty());
        assert!(scan_tokens("{name}").is_empty());
        assert!(scan_tokens("{{first-name}}").is_empty());
    }

    // substitute のテスト

    #[test]
    fn test_既知のトークンは値に置換される() {
        let result = substitute("Hello {{name}}", &make_data(&[("name", "Ana")]));

        assert_eq!(result.text, "Hello Ana");
        assert!(result.missing.is_empty());
    }

    #[test]
    fn test_未知のトークンは空文字列に置換され診断に記録される() {
        // 仕様シナリオ: subject="Hello {{name}}",
        // body="<p>{{name}}, your code is {{code}}</p>", data に code なし
        let data = make_data(&[("name", "Ana"), ("email", "a@x.com")]);

        let subject = substitute("Hello {{name}}", &data);
        let body = substitute("<p>{{name}}, your code is {{code}}</p>", &data);

        assert_eq!(subject.text, "Hello Ana");
        assert_eq!(body.text, "<p>Ana, your code is </p>");
        assert_eq!(body.missing, vec!["code".to_string()]);
    }

    #[test]
    fn test_置換は冪等である() {
        let data = make_data(&[("name", "Ana")]);
        let once = substitute("Hello {{name}}, code: {{code}}", &data);
        let twice = substitute(&once.text, &data);

        assert_eq!(once.text, twice.text);
        assert!(twice.missing.is_empty());
    }

    #[test]
    fn test_大文字小文字を区別する() {
        let result = substitute("{{Name}}", &make_data(&[("name", "Ana")]));

        assert_eq!(result.text, "");
        assert_eq!(result.missing, vec!["Name".to_string()]);
    }

    #[test]
    fn test_置換値はエスケープされない() {
        let result = substitute(
            "{{greeting}}",
            &make_data(&[("greeting", "<b>こんにちは</b>")]),
        );

        assert_eq!(result.text, "<b>こんにちは</b>");
    }

    #[test]
    fn test_同一トークンの複数出現はすべて置換される() {
        let result = substitute("{{name}} / {{name}}", &make_data(&[("name", "Ana")]));

        assert_eq!(result.text, "Ana / Ana");
    }

    // common_token_values のテスト

    #[test]
    fn test_共通トークンの値が導出される() {
        let now = Utc.with_ymd_and_hms(2025, 3, 7, 9, 30, 0).unwrap();
        let values = common_token_values(now, "https://reform.example.com/unsubscribe");

        assert_eq!(values["date"], "2025-03-07");
        assert_eq!(values["time"], "09:30");
        assert_eq!(values["year"], "2025");
        assert_eq!(values["month"], "March");
        assert_eq!(values["day"], "7");
        assert_eq!(
            values["unsubscribe_url"],
            "https://reform.example.com/unsubscribe"
        );
    }

    #[test]
    fn test_共通トークン名の定数と生成値のキーが一致する() {
        let values = common_token_values(Utc::now(), "");

        for name in COMMON_TOKENS {
            assert!(values.contains_key(name), "共通トークン {name} が欠落");
        }
        assert_eq!(values.len(), COMMON_TOKENS.len());
    }
}

//! # メールテンプレート
//!
//! 件名と HTML 本文にプレースホルダを持つ再利用可能なテンプレートを定義する。
//!
//! ## ドメイン用語
//!
//! | 型 | ドメイン用語 | 要件 |
//! |---|------------|------|
//! | [`Template`] | テンプレート | 件名 + HTML 本文 + 宣言済みカスタム変数のリスト |
//!
//! ## 設計方針
//!
//! - **保存時の変数検証**: 件名・本文に現れるプレースホルダは、宣言済み
//!   カスタム変数・宛先フィールド・共通トークンのいずれかであること。
//!   未宣言トークンは保存時にバリデーションエラーとなり、配信時の
//!   「不明な変数 → 空文字列」がサイレントに起きる範囲を縮小する
//! - **スナップショットなし**: キャンペーンはテンプレートを参照で保持し、
//!   編集は以後の配信に反映される。送信済みメールは遡って変化しない

use chrono::{DateTime, Utc};

use crate::{
    DomainError,
    render::{COMMON_TOKENS, RECIPIENT_TOKENS, scan_tokens},
    user::UserId,
};

define_uuid_id! {
    /// テンプレート ID（一意識別子）
    pub struct TemplateId;
}

define_validated_string! {
    /// テンプレート名（値オブジェクト）
    ///
    /// # バリデーション
    ///
    /// - 空文字列ではない
    /// - 最大 200 文字
    pub struct TemplateName {
        label: "テンプレート名",
        max_length: 200,
    }
}

/// テンプレートエンティティ
///
/// # 不変条件
///
/// - `subject`・`html_body` は空ではない
/// - 件名・本文中のプレースホルダはすべて宣言済み変数または組み込み
///   トークン（保存時に検証。DB から復元した過去データは再検証しない）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    id: TemplateId,
    name: TemplateName,
    subject: String,
    html_body: String,
    variables: Vec<String>,
    created_by: UserId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// テンプレートの DB 復元パラメータ
pub struct TemplateRecord {
    pub id: TemplateId,
    pub name: TemplateName,
    pub subject: String,
    pub html_body: String,
    pub variables: Vec<String>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Template {
    /// 新しいテンプレートを作成する
    ///
    /// # Errors
    ///
    /// - `DomainError::Validation`: 件名・本文が空、変数名が識別子として
    ///   不正、または未宣言のプレースホルダが含まれる場合
    pub fn new(
        id: TemplateId,
        name: TemplateName,
        subject: String,
        html_body: String,
        variables: Vec<String>,
        created_by: UserId,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        validate_content(&subject, &html_body, &variables)?;

        Ok(Self {
            id,
            name,
            subject,
            html_body,
            variables,
            created_by,
            created_at: now,
            updated_at: now,
        })
    }

    /// 既存のデータから復元する
    ///
    /// 保存時検証は作成・更新時にのみ実行するため、ここでは再検証しない
    /// （検証規則の強化が過去データの読み出しを壊さないようにする）。
    pub fn from_db(record: TemplateRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            subject: record.subject,
            html_body: record.html_body,
            variables: record.variables,
            created_by: record.created_by,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    /// 内容を更新した新しいテンプレートを返す
    ///
    /// # Errors
    ///
    /// 作成時と同じバリデーションを実行する。
    pub fn with_content(
        self,
        name: TemplateName,
        subject: String,
        html_body: String,
        variables: Vec<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        validate_content(&subject, &html_body, &variables)?;

        Ok(Self {
            name,
            subject,
            html_body,
            variables,
            updated_at: now,
            ..self
        })
    }

    pub fn id(&self) -> &TemplateId {
        &self.id
    }

    pub fn name(&self) -> &TemplateName {
        &self.name
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn html_body(&self) -> &str {
        &self.html_body
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
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

/// 件名・本文・宣言変数の保存時バリデーション
fn validate_content(
    subject: &str,
    html_body: &str,
    variables: &[String],
) -> Result<(), DomainError> {
    if subject.trim().is_empty() {
        return Err(DomainError::Validation("件名は必須です".to_string()));
    }
    if html_body.trim().is_empty() {
        return Err(DomainError::Validation("本文は必須です".to_string()));
    }

    for variable in variables {
        if variable.is_empty() || !variable.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(DomainError::Validation(format!(
                "変数名が不正です: {}",
                variable
            )));
        }
    }

    let undeclared: Vec<String> = scan_tokens(subject)
        .into_iter()
        .chain(scan_tokens(html_body))
        .filter(|token| {
            !variables.iter().any(|v| v == token)
                && !RECIPIENT_TOKENS.contains(&token.as_str())
                && !COMMON_TOKENS.contains(&token.as_str())
        })
        .collect();

    if !undeclared.is_empty() {
        return Err(DomainError::Validation(format!(
            "未宣言の変数が含まれています: {}",
            undeclared.join(", ")
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn make_template(
        subject: &str,
        html_body: &str,
        variables: &[&str],
    ) -> Result<Template, DomainError> {
        Template::new(
            TemplateId::new(),
            TemplateName::new("完工お礼メール").unwrap(),
            subject.to_string(),
            html_body.to_string(),
            variables.iter().map(|v| v.to_string()).collect(),
            UserId::new(),
            Utc::now(),
        )
    }

    #[test]
    fn test_宣言済み変数のみのテンプレートは有効() {
        let template = make_template(
            "{{name}}様 施工完了のお知らせ",
            "<p>{{name}}様、{{project}} の施工が完了しました。</p>",
            &["project"],
        );

        assert!(template.is_ok());
    }

    #[test]
    fn test_宛先フィールドと共通トークンは宣言不要() {
        let template = make_template(
            "{{name}}様へ",
            "<p>{{email}} 宛 / {{date}} {{time}} / {{year}}年{{month}}{{day}}日 \
             / <a href=\"{{unsubscribe_url}}\">配信停止</a></p>",
            &[],
        );

        assert!(template.is_ok());
    }

    #[test]
    fn test_未宣言の変数はエラーになる() {
        let result = make_template("件名", "<p>{{coupon_code}}</p>", &[]);

        let Err(DomainError::Validation(message)) = result else {
            panic!("バリデーションエラーであること");
        };
        assert!(message.contains("coupon_code"));
    }

    #[test]
    fn test_件名の未宣言変数も検出される() {
        let result = make_template("{{promo}}", "<p>本文</p>", &[]);

        assert!(result.is_err());
    }

    #[test]
    fn test_空の件名や本文は拒否される() {
        assert!(make_template("", "<p>本文</p>", &[]).is_err());
        assert!(make_template("件名", "   ", &[]).is_err());
    }

    #[test]
    fn test_不正な変数名は拒否される() {
        assert!(make_template("件名", "<p>本文</p>", &["first-name"]).is_err());
        assert!(make_template("件名", "<p>本文</p>", &[""]).is_err());
    }

    #[test]
    fn test_from_dbは再検証しない() {
        // 検証規則強化前に保存された未宣言変数入りテンプレートも復元できる
        let template = Template::from_db(TemplateRecord {
            id: TemplateId::new(),
            name: TemplateName::new("旧テンプレート").unwrap(),
            subject: "{{legacy_token}}".to_string(),
            html_body: "<p>{{legacy_token}}</p>".to_string(),
            variables: vec![],
            created_by: UserId::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        });

        assert_eq!(template.subject(), "{{legacy_token}}");
    }

    #[test]
    fn test_with_contentは更新時にも検証する() {
        let template = make_template("件名", "<p>本文</p>", &[]).unwrap();

        let result = template.with_content(
            TemplateName::new("更新後").unwrap(),
            "件名".to_string(),
            "<p>{{undeclared}}</p>".to_string(),
            vec![],
            Utc::now(),
        );

        assert!(result.is_err());
    }
}

//! テンプレート管理ユースケース

use std::sync::Arc;

use reformworks_domain::{
    clock::Clock,
    template::{Template, TemplateId, TemplateName},
    user::UserId,
};
use reformworks_infra::repository::TemplateRepository;

use crate::error::ApiError;

/// テンプレート作成の入力
pub struct CreateTemplateInput {
    pub name: TemplateName,
    pub subject: String,
    pub html_body: String,
    pub variables: Vec<String>,
    pub created_by: UserId,
}

/// テンプレート更新の入力
pub struct UpdateTemplateInput {
    pub template_id: TemplateId,
    pub name: TemplateName,
    pub subject: String,
    pub html_body: String,
    pub variables: Vec<String>,
}

/// テンプレート管理ユースケース
pub struct TemplateUseCaseImpl {
    template_repo: Arc<dyn TemplateRepository>,
    clock:         Arc<dyn Clock>,
}

impl TemplateUseCaseImpl {
    pub fn new(template_repo: Arc<dyn TemplateRepository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            template_repo,
            clock,
        }
    }

    /// テンプレートを作成する
    ///
    /// プレースホルダの宣言チェックは `Template::new` が行う
    /// （未宣言トークンは保存時にバリデーションエラー）。
    pub async fn create_template(&self, input: CreateTemplateInput) -> Result<Template, ApiError> {
        let template = Template::new(
            TemplateId::new(),
            input.name,
            input.subject,
            input.html_body,
            input.variables,
            input.created_by,
            self.clock.now(),
        )?;

        self.template_repo.insert(&template).await?;

        Ok(template)
    }

    /// テンプレートを更新する
    pub async fn update_template(&self, input: UpdateTemplateInput) -> Result<Template, ApiError> {
        let template = self
            .template_repo
            .find_by_id(&input.template_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("テンプレートが見つかりません".to_string()))?;

        let updated = template.with_content(
            input.name,
            input.subject,
            input.html_body,
            input.variables,
            self.clock.now(),
        )?;

        self.template_repo.update(&updated).await?;

        Ok(updated)
    }

    /// テンプレートを削除する
    ///
    /// 参照中のキャンペーンがあっても削除は成功する。参照切れは
    /// 配信開始時に検出され、そのキャンペーンは送信できなくなる。
    pub async fn delete_template(&self, template_id: &TemplateId) -> Result<(), ApiError> {
        let deleted = self.template_repo.delete(template_id).await?;

        if !deleted {
            return Err(ApiError::NotFound(
                "テンプレートが見つかりません".to_string(),
            ));
        }

        Ok(())
    }

    /// テンプレートを取得する
    pub async fn get_template(&self, template_id: &TemplateId) -> Result<Template, ApiError> {
        self.template_repo
            .find_by_id(template_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("テンプレートが見つかりません".to_string()))
    }

    /// テンプレート一覧を取得する
    pub async fn list_templates(&self) -> Result<Vec<Template>, ApiError> {
        Ok(self.template_repo.find_all().await?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use reformworks_domain::clock::FixedClock;
    use reformworks_infra::mock::MockTemplateRepository;

    use super::*;

    fn make_usecase() -> (MockTemplateRepository, TemplateUseCaseImpl) {
        let repo = MockTemplateRepository::new();
        let usecase = TemplateUseCaseImpl::new(
            Arc::new(repo.clone()),
            Arc::new(FixedClock::new(Utc::now())),
        );
        (repo, usecase)
    }

    fn make_input(subject: &str, html_body: &str, variables: &[&str]) -> CreateTemplateInput {
        CreateTemplateInput {
            name: TemplateName::new("完工お礼メール").unwrap(),
            subject: subject.to_string(),
            html_body: html_body.to_string(),
            variables: variables.iter().map(|v| v.to_string()).collect(),
            created_by: UserId::new(),
        }
    }

    #[tokio::test]
    async fn test_テンプレートを作成できる() {
        let (repo, usecase) = make_usecase();

        let template = usecase
            .create_template(make_input("{{name}}様", "<p>{{project}}</p>", &["project"]))
            .await
            .unwrap();

        assert_eq!(template.subject(), "{{name}}様");
        assert_eq!(repo.templates().len(), 1);
    }

    #[tokio::test]
    async fn test_未宣言変数のテンプレートは保存できない() {
        let (repo, usecase) = make_usecase();

        let result = usecase
            .create_template(make_input("件名", "<p>{{coupon}}</p>", &[]))
            .await;

        assert!(matches!(result, Err(ApiError::BadRequest(_))));
        assert!(repo.templates().is_empty());
    }

    #[tokio::test]
    async fn test_存在しないテンプレートの更新はnot_found() {
        let (_repo, usecase) = make_usecase();

        let result = usecase
            .update_template(UpdateTemplateInput {
                template_id: TemplateId::new(),
                name: TemplateName::new("更新").unwrap(),
                subject: "件名".to_string(),
                html_body: "<p>本文</p>".to_string(),
                variables: vec![],
            })
            .await;

        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_削除は存在チェックする() {
        let (_repo, usecase) = make_usecase();

        let result = usecase.delete_template(&TemplateId::new()).await;

        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }
}

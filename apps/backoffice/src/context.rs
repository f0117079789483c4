//! # リクエストコンテキスト
//!
//! 外部認証ゲートウェイが注入するユーザーコンテキストを、リクエストごとに
//! 明示的なオブジェクトとして解決する。
//!
//! ## 設計方針
//!
//! - **アンビエントな状態を持たない**: セッションはグローバル変数ではなく、
//!   エクストラクタでリクエストごとに解決してハンドラに引数で渡す
//! - **ロールは閉じた enum**: ゲートウェイのロール文字列は受付時に
//!   [`Role`] へ変換し、以降の権限判定は型に対して行う
//! - **認証は委譲**: セッション検証・パスワード・ログインフローは
//!   外部認証サービスの責務。このサービスはゲートウェイを信頼する

use axum::http::request::Parts;
use reformworks_domain::{
    role::{Capability, Role},
    user::UserId,
};
use uuid::Uuid;

use crate::error::ApiError;

/// ゲートウェイが付与するユーザー ID ヘッダ
pub const HEADER_USER_ID: &str = "x-backoffice-user-id";

/// ゲートウェイが付与するロールヘッダ
pub const HEADER_ROLE: &str = "x-backoffice-role";

/// 操作ユーザーのコンテキスト
///
/// すべての管理 API ハンドラがエクストラクタとして受け取る。
/// ヘッダが欠落・不正な場合は 401 を返す。
#[derive(Debug, Clone)]
pub struct ActingUser {
    pub user_id: UserId,
    pub role:    Role,
}

impl ActingUser {
    /// 指定した操作権限を要求する
    ///
    /// # Errors
    ///
    /// - `ApiError::Forbidden`: ロールが権限を持たない場合
    pub fn require(&self, capability: Capability) -> Result<(), ApiError> {
        if self.role.can(capability) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "ロール {} はこの操作を実行できません",
                self.role
            )))
        }
    }
}

impl<S> axum::extract::FromRequestParts<S> for ActingUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header_value(parts, HEADER_USER_ID)?
            .parse::<Uuid>()
            .map_err(|_| {
                ApiError::Unauthorized(format!("{HEADER_USER_ID} ヘッダが不正です"))
            })?;

        let role = header_value(parts, HEADER_ROLE)?
            .parse::<Role>()
            .map_err(|_| ApiError::Unauthorized(format!("{HEADER_ROLE} ヘッダが不正です")))?;

        Ok(Self {
            user_id: UserId::from_uuid(user_id),
            role,
        })
    }
}

fn header_value<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, ApiError> {
    parts
        .headers
        .get(name)
        .ok_or_else(|| ApiError::Unauthorized(format!("{name} ヘッダがありません")))?
        .to_str()
        .map_err(|_| ApiError::Unauthorized(format!("{name} ヘッダが不正です")))
}

#[cfg(test)]
mod tests {
    use axum::{extract::FromRequestParts, http::Request};

    use super::*;

    fn make_parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/api/campaigns");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (parts, ()) = builder.body(()).unwrap().into_parts();
        parts
    }

    #[tokio::test]
    async fn test_正しいヘッダからコンテキストを解決する() {
        let user_id = Uuid::now_v7();
        let mut parts = make_parts(&[
            (HEADER_USER_ID, &user_id.to_string()),
            (HEADER_ROLE, "admin"),
        ]);

        let acting_user = ActingUser::from_request_parts(&mut parts, &()).await.unwrap();

        assert_eq!(acting_user.user_id.as_uuid(), &user_id);
        assert_eq!(acting_user.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_ヘッダ欠落は401になる() {
        let mut parts = make_parts(&[]);

        let result = ActingUser::from_request_parts(&mut parts, &()).await;

        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_不正なロールは401になる() {
        let mut parts = make_parts(&[
            (HEADER_USER_ID, &Uuid::now_v7().to_string()),
            (HEADER_ROLE, "superuser"),
        ]);

        let result = ActingUser::from_request_parts(&mut parts, &()).await;

        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    }

    #[test]
    fn test_requireは権限不足で403相当のエラーを返す() {
        let acting_user = ActingUser {
            user_id: UserId::new(),
            role:    Role::Client,
        };

        let result = acting_user.require(Capability::DispatchCampaigns);

        assert!(matches!(result, Err(ApiError::Forbidden(_))));
    }

    #[test]
    fn test_requireは権限があれば成功する() {
        let acting_user = ActingUser {
            user_id: UserId::new(),
            role:    Role::Internal,
        };

        assert!(acting_user.require(Capability::DispatchCampaigns).is_ok());
    }
}

//! # ユーザー識別子
//!
//! バックオフィスの操作ユーザーを参照するための識別子を定義する。
//!
//! ユーザーエンティティ本体（プロフィール、認証情報、セッション）は
//! 外部のマネージド認証サービスが管理するため、このクレートには存在しない。
//! キャンペーンやテンプレートの `created_by` 等の監査フィールドが
//! この ID を保持するのみである。

define_uuid_id! {
    /// バックオフィスユーザー ID（一意識別子）
    ///
    /// 外部認証サービスが発行したユーザー ID をそのまま保持する。
    pub struct UserId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_uuidで同じ値を復元できる() {
        let id = UserId::new();
        let restored = UserId::from_uuid(*id.as_uuid());

        assert_eq!(id, restored);
    }
}

//! # ReformWorks インフラ層
//!
//! データベースと外部メール配信プロバイダへのアクセスを実装する。
//!
//! ## 設計方針
//!
//! - **依存性逆転**: リポジトリ・送信アダプタは trait で抽象化し、
//!   ユースケース層はこのクレートの具象型に依存しない
//! - **PostgreSQL 専用**: sqlx による非同期アクセス
//! - **テスト支援**: `test-utils` feature でインメモリモックを公開

pub mod db;
pub mod error;
pub mod mailer;
pub mod repository;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use error::{InfraError, InfraErrorKind};

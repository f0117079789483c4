//! # バックオフィス API サーバー
//!
//! リフォーム会社サイトの管理バックオフィスを支える内部サービス。
//! コンタクト・テンプレート・キャンペーンの管理 CRUD と、
//! メールキャンペーンの配信パイプラインを提供する。
//!
//! ## 役割分担
//!
//! 認証・セッション・ファイルストレージ・マーケティングページの描画は
//! 外部のマネージドサービスと公開サイト側が担当する。このサービスは
//! 認証ゲートウェイが注入するユーザーコンテキストヘッダを信頼し、
//! キャンペーンサブシステムの 4 テーブルだけを所有する。
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │   Internet   │──X──│ Backoffice   │─────│  PostgreSQL  │
//! └──────────────┘     └──────────────┘     └──────────────┘
//!                             ↑                    │
//!                      認証ゲートウェイ経由のみ      └── SMTP / SES
//! ```
//!
//! ## 環境変数
//!
//! | 変数名 | 必須 | 説明 |
//! |--------|------|------|
//! | `BACKOFFICE_HOST` | No | バインドアドレス（デフォルト: `0.0.0.0`） |
//! | `BACKOFFICE_PORT` | **Yes** | ポート番号 |
//! | `DATABASE_URL` | **Yes** | PostgreSQL 接続 URL |
//! | `SITE_BASE_URL` | No | 公開サイトのベース URL（配信停止リンク用） |
//! | `MAILER_BACKEND` | No | `smtp` / `ses` / `noop`（デフォルト: `noop`） |
//! | `SMTP_HOST` / `SMTP_PORT` | No | backend=smtp の接続先 |
//!
//! ## 起動方法
//!
//! ```bash
//! # 開発環境（Mailpit に送信）
//! MAILER_BACKEND=smtp cargo run -p reformworks-backoffice
//! ```

mod config;
mod context;
mod error;
mod handler;
mod usecase;

use std::{net::SocketAddr, sync::Arc};

use axum::{
    Router,
    routing::{get, post, put},
};
use config::AppConfig;
use handler::{
    CampaignState,
    ContactState,
    DispatchState,
    TemplateState,
    create_campaign,
    create_contact,
    create_template,
    delete_campaign,
    delete_contact,
    delete_template,
    get_campaign,
    get_template,
    health_check,
    list_campaign_recipients,
    list_campaigns,
    list_contacts,
    list_templates,
    send_campaign,
    send_test,
    set_default_sender,
    update_contact,
    update_template,
};
use reformworks_domain::clock::{Clock, SystemClock};
use reformworks_infra::{
    db,
    mailer::{MailSender, NoopMailSender, SesMailSender, SmtpMailSender},
    repository::{
        CampaignRecipientRepository,
        CampaignRepository,
        ContactRepository,
        PostgresCampaignRecipientRepository,
        PostgresCampaignRepository,
        PostgresContactRepository,
        PostgresTemplateRepository,
        TemplateRepository,
    },
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use usecase::{
    CampaignDispatcher,
    CampaignRenderer,
    CampaignUseCaseImpl,
    ContactUseCaseImpl,
    TemplateUseCaseImpl,
    TestSendUseCase,
};

/// バックオフィスサーバーのエントリーポイント
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env ファイルを読み込む（存在する場合）
    dotenvy::dotenv().ok();

    // トレーシング初期化
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,reformworks=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 設定読み込み
    let config = AppConfig::from_env().expect("設定の読み込みに失敗しました");

    tracing::info!(
        "バックオフィスサーバーを起動します: {}:{}",
        config.host,
        config.port
    );

    // データベース接続プールを作成
    let pool = db::create_pool(&config.database_url)
        .await
        .expect("データベース接続に失敗しました");
    db::run_migrations(&pool)
        .await
        .expect("マイグレーションの適用に失敗しました");
    tracing::info!("データベースに接続しました");

    // メール送信バックエンドを選択
    let mailer: Arc<dyn MailSender> = match config.mailer.backend.as_str() {
        "smtp" => {
            tracing::info!(
                host = %config.mailer.smtp_host,
                port = config.mailer.smtp_port,
                "SMTP バックエンドでメールを送信します"
            );
            Arc::new(SmtpMailSender::new(
                &config.mailer.smtp_host,
                config.mailer.smtp_port,
            ))
        }
        "ses" => {
            let aws_config = aws_config::load_from_env().await;
            tracing::info!("SES バックエンドでメールを送信します");
            Arc::new(SesMailSender::new(aws_sdk_sesv2::Client::new(&aws_config)))
        }
        other => {
            if other != "noop" {
                tracing::warn!(backend = other, "未知の MAILER_BACKEND。noop を使用します");
            }
            Arc::new(NoopMailSender)
        }
    };

    // 依存コンポーネントを初期化
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let template_repo: Arc<dyn TemplateRepository> =
        Arc::new(PostgresTemplateRepository::new(pool.clone()));
    let contact_repo: Arc<dyn ContactRepository> =
        Arc::new(PostgresContactRepository::new(pool.clone()));
    let campaign_repo: Arc<dyn CampaignRepository> =
        Arc::new(PostgresCampaignRepository::new(pool.clone()));
    let tracking_repo: Arc<dyn CampaignRecipientRepository> =
        Arc::new(PostgresCampaignRecipientRepository::new(pool.clone()));

    let template_state = Arc::new(TemplateState {
        usecase: TemplateUseCaseImpl::new(template_repo.clone(), clock.clone()),
    });
    let contact_state = Arc::new(ContactState {
        usecase: ContactUseCaseImpl::new(contact_repo.clone(), clock.clone()),
    });
    let campaign_state = Arc::new(CampaignState {
        usecase: CampaignUseCaseImpl::new(
            campaign_repo.clone(),
            template_repo.clone(),
            contact_repo.clone(),
            tracking_repo.clone(),
            clock.clone(),
        ),
    });
    let dispatch_state = Arc::new(DispatchState {
        dispatcher: CampaignDispatcher::new(
            campaign_repo,
            template_repo.clone(),
            contact_repo.clone(),
            tracking_repo,
            mailer.clone(),
            CampaignRenderer::new(clock.clone(), &config.site_base_url),
            clock.clone(),
        ),
        test_send:  TestSendUseCase::new(
            template_repo,
            contact_repo,
            mailer,
            CampaignRenderer::new(clock.clone(), &config.site_base_url),
        ),
    });

    // ルーター構築
    let app = Router::new()
        .route("/health", get(health_check))
        // テンプレート API
        .route("/api/templates", get(list_templates).post(create_template))
        .route(
            "/api/templates/{id}",
            get(get_template).put(update_template).delete(delete_template),
        )
        .with_state(template_state)
        // コンタクト API
        .route("/api/contacts", get(list_contacts).post(create_contact))
        .route(
            "/api/contacts/{id}",
            put(update_contact).delete(delete_contact),
        )
        .route("/api/contacts/{id}/default-sender", put(set_default_sender))
        .with_state(contact_state)
        // キャンペーン API
        .route("/api/campaigns", get(list_campaigns).post(create_campaign))
        .route(
            "/api/campaigns/{id}",
            get(get_campaign).delete(delete_campaign),
        )
        .route(
            "/api/campaigns/{id}/recipients",
            get(list_campaign_recipients),
        )
        .with_state(campaign_state)
        // 配信トリガー API
        .route("/api/campaigns/send", post(send_campaign))
        .route("/api/campaigns/test-send", post(send_test))
        .with_state(dispatch_state)
        .layer(TraceLayer::new_for_http());

    // サーバー起動
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("アドレスのパースに失敗しました");

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("バックオフィスサーバーが起動しました: {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

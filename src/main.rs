use std::net::SocketAddr;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use hospital::{
    config::Config, repositories::AccountRepository, routes::create_router,
    services::PasswordService, state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ログ初期化（JSON形式、環境変数でレベル制御）
    init_tracing();

    tracing::info!("hospital 起動中...");

    // 設定読み込み
    let config = Config::load().map_err(|e| {
        tracing::error!(error = ?e, "設定の読み込みに失敗");
        anyhow::anyhow!("Failed to load config: {}", e)
    })?;
    config.validate().map_err(|e| {
        tracing::error!(error = ?e, "設定値が不正");
        e
    })?;

    tracing::info!(host = %config.host, port = %config.port, "設定読み込み完了");

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| {
            tracing::error!(error = ?e, "アドレスのパースに失敗");
            anyhow::anyhow!("Failed to parse address: {}", e)
        })?;

    // データベース接続プール作成
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(config.database_url.expose_secret())
        .await
        .map_err(|e| {
            tracing::error!(error = ?e, "データベース接続に失敗");
            anyhow::anyhow!("Failed to connect to database: {}", e)
        })?;

    tracing::info!("データベース接続完了");

    // スキーマ適用
    sqlx::migrate!().run(&db_pool).await.map_err(|e| {
        tracing::error!(error = ?e, "マイグレーションに失敗");
        anyhow::anyhow!("Failed to run migrations: {}", e)
    })?;

    tracing::info!("マイグレーション完了");

    bootstrap_staff_account(&config, &db_pool).await?;

    // AppState 構築
    let state = AppState::new(db_pool, config).map_err(|e| {
        tracing::error!(error = ?e, "AppState の構築に失敗");
        anyhow::anyhow!("Failed to create AppState: {}", e)
    })?;

    let app = create_router(state);

    // サーバー起動
    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        tracing::error!(error = ?e, addr = %addr, "ポートのバインドに失敗");
        anyhow::anyhow!("Failed to bind to {}: {}", addr, e)
    })?;

    tracing::info!(addr = %addr, "サーバー起動");

    // Graceful shutdown 対応
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            tracing::error!(error = ?e, "サーバーエラー");
            anyhow::anyhow!("Server error: {}", e)
        })?;

    tracing::info!("サーバー終了");

    Ok(())
}

/// 初期スタッフアカウントの作成（設定されている場合のみ）
async fn bootstrap_staff_account(config: &Config, db_pool: &PgPool) -> anyhow::Result<()> {
    let (Some(email), Some(password)) =
        (&config.bootstrap_staff_email, &config.bootstrap_staff_password)
    else {
        return Ok(());
    };

    let hasher = PasswordService::new(
        config.password_hash_memory_kib,
        config.password_hash_iterations,
        config.password_hash_parallelism,
    )?;
    let password_hash = hasher.hash(password.expose_secret())?;

    let created = AccountRepository::new(db_pool.clone())
        .create_if_absent(email, &password_hash)
        .await?;
    if created {
        tracing::info!(email = %email, "初期スタッフアカウントを作成");
    } else {
        tracing::info!(email = %email, "初期スタッフアカウントは作成済み");
    }

    Ok(())
}

/// tracing の初期化（JSON形式）
fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,hospital=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// Graceful shutdown シグナル待機
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = ?e, "Ctrl+C ハンドラーのインストールに失敗");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        let installed = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .map(|mut signal| async move {
                signal.recv().await;
            });
        wait_for_signal("SIGTERM", installed).await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Ctrl+C received, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("SIGTERM received, starting graceful shutdown");
        }
    }
}

/// シグナルの受信を待つ
///
/// ハンドラーを登録できなかった場合は解決しない（起動直後に終了させない）
#[cfg_attr(not(unix), allow(dead_code))]
async fn wait_for_signal<F: Future>(name: &str, installed: std::io::Result<F>) {
    match installed {
        Ok(signal) => {
            signal.await;
        }
        Err(e) => {
            tracing::error!(error = ?e, signal = %name, "シグナルハンドラーのインストールに失敗");
            std::future::pending::<()>().await;
        }
    }
}

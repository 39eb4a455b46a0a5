//! API 网关主入口

use api_gateway::{
    config::AppConfig, db, handlers::health, middleware::AppState, repository::PgCredentialStore,
    routes, telemetry,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::oneshot;

/// 启动模式
enum Mode {
    Serve,
    Migrate,
    SeedDemo,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ===== CLI 参数处理 =====
    let args: Vec<String> = std::env::args().collect();

    let mode = match args.get(1).map(String::as_str) {
        None => Mode::Serve,
        Some("--version") => {
            println!("api-gateway {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Some("--help") => {
            print_help();
            return Ok(());
        }
        Some("--migrate") => Mode::Migrate,
        Some("--seed-demo") => Mode::SeedDemo,
        Some(other) => {
            eprintln!("未知参数: {}", other);
            print_help();
            std::process::exit(1);
        }
    };

    // 加载 .env 文件（开发环境）
    // 生产环境应该直接设置环境变量
    if let Ok(env) = std::env::var("GATEWAY_ENV") {
        dotenv::from_filename(format!(".env.{}", env)).ok();
    } else {
        dotenv::from_filename(".env.local").ok();
        dotenv::from_filename(".env.development").ok();
        dotenv::dotenv().ok();
    }

    health::set_start_time();

    // 1. 加载配置
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;

    // 2. 初始化日志
    telemetry::init_telemetry(&config);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "API gateway starting...");

    // 3. 数据库连接池 + 迁移
    let db_pool = db::create_pool(&config.database).await?;
    db::run_migrations(&db_pool).await?;

    match mode {
        Mode::Migrate => {
            tracing::info!("Migrations applied, exiting");
            return Ok(());
        }
        Mode::SeedDemo => {
            db::seed_demo_data(&db_pool).await?;
            tracing::info!(email = db::DEMO_EMAIL, "Demo data seeded, exiting");
            return Ok(());
        }
        Mode::Serve => {}
    }

    tracing::info!("Database initialized");

    // 4. 构建应用状态
    let store = Arc::new(PgCredentialStore::new(db_pool.clone())?);
    let app_state = Arc::new(AppState::new(config.clone(), store)?);

    // 5. 构建路由
    let app = routes::create_router(app_state);

    // 6. 启动服务器
    let addr = &config.server.addr;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(addr = %addr, "Server listening");

    // 7. 优雅关闭：收到信号后，进行中的请求最多再等待 graceful_shutdown_timeout_secs
    let shutdown_timeout = Duration::from_secs(config.server.graceful_shutdown_timeout_secs);
    let (signal_tx, signal_rx) = oneshot::channel::<()>();

    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                let _ = signal_tx.send(());
            })
            .await
    });

    tokio::select! {
        result = &mut server => result??,
        _ = signal_rx => {
            match tokio::time::timeout(shutdown_timeout, &mut server).await {
                Ok(result) => result??,
                Err(_) => tracing::warn!("Graceful shutdown timeout reached, forcing exit"),
            }
        }
    }

    db_pool.close().await;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// 优雅关闭信号处理
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Ctrl+C received, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Terminate signal received, starting graceful shutdown");
        },
    }
}

/// 打印帮助信息
fn print_help() {
    println!("api-gateway {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("用法: api-gateway [选项]");
    println!();
    println!("选项:");
    println!("  --version     打印版本信息并退出");
    println!("  --help        打印此帮助信息并退出");
    println!("  --migrate     执行数据库迁移并退出");
    println!("  --seed-demo   执行迁移、写入演示用户和 API Key 后退出");
    println!();
    println!("环境变量:");
    println!("  所有配置通过 GATEWAY_ 前缀的环境变量完成，例如");
    println!("  GATEWAY_DATABASE__URL, GATEWAY_SECURITY__JWT_SECRET");
}

use actix_cors::Cors;
use actix_files::Files;
use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use anyhow::Result;
use sentinel_core::load_config;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod state;

use api::create_api_router;
use state::AppState;

async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[actix_web::main]
async fn main() -> Result<()> {
    // .env 文件可选
    dotenv::dotenv().ok();

    // 初始化日志
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sentinel_web=debug,sentinel_core=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置：SENTINEL_CONFIG 指向可选的 YAML 文件
    let config_path = std::env::var("SENTINEL_CONFIG").ok();
    let config = load_config(config_path.as_deref())?;

    let bind_address = config.server.bind_address.clone();
    let static_dir = config.server.static_dir.clone();

    // 初始化状态
    let state = AppState::new(&config)?;

    tracing::info!("Sentinel web server listening on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(Cors::permissive())
            .wrap(TracingLogger::default())
            // API 路由
            .service(create_api_router())
            // 健康检查
            .route("/health", web::get().to(health_check))
            // 静态文件服务
            .service(Files::new("/", static_dir.clone()).index_file("index.html"))
    })
    .bind(bind_address)?
    .run()
    .await?;

    Ok(())
}

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::http::HeaderValue;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use study_api::app;
use study_api::config::Config;
use study_api::AppStateInner;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "study=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let config = Config::from_env()?;

    // Init database
    let db = study_db::Database::open(&PathBuf::from(&config.db_path))?;

    let cors = cors_layer(&config)?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    // Shared state
    let state = AppStateInner::new(db, config);

    let app = app::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    info!("Study Together server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    if config.cors_origins.is_empty() {
        return Ok(CorsLayer::permissive());
    }

    let origins = config
        .cors_origins
        .iter()
        .map(|origin| HeaderValue::from_str(origin))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any))
}

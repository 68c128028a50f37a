use dotenvy::dotenv;
use log::info;
use std::sync::Arc;
use tower_cookies::CookieManagerLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use kpiserver::api_router::configure_api_routes;
use kpiserver::shared::config::AppConfig;
use kpiserver::shared::state::AppState;
use kpiserver::shared::utils::create_conn;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env()?;
    let conn = create_conn(&config.database_url())?;

    let state = Arc::new(AppState {
        conn,
        config: config.clone(),
    });

    let app = configure_api_routes()
        .layer(CookieManagerLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("kpiserver listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

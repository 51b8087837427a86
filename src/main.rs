mod app;
mod config;
mod engine;
mod plans;
mod state;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "dietplan=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = state::AppState::init().await?;
    tracing::info!(
        plan_store = ?app_state.config.plan_store,
        catalog = %app_state.catalog_source.describe(),
        max_options = app_state.config.engine.max_options,
        timeout_ms = app_state.config.engine.timeout.as_millis() as u64,
        "configuration loaded"
    );

    if let Some(db) = &app_state.db {
        if let Err(e) = sqlx::migrate!("./migrations").run(db).await {
            tracing::warn!(error = %e, "migration failed; continuing");
        }
    }

    app_state.load_catalog().await;

    app::serve(app::build_app(app_state)).await
}

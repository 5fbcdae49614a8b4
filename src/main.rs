use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use constancia::{config, db, routes, state, storage};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "constancia=info,tower_http=info".into()),
        )
        .init();

    let config = config::Config::from_env()?;
    let config = Arc::new(config);

    storage::ensure_dirs(&config.output_dir)?;

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(pool.as_ref()).await?;

    let storage = storage::Storage::from_config(&config);

    let state = Arc::new(state::AppState {
        pool,
        config: config.clone(),
        storage,
    });

    let app = Router::new()
        .route("/", get(routes::index))
        .route("/healthz", get(routes::healthz))
        .route("/verificar", get(routes::verificar))
        .route("/verificar/:folio", get(routes::verificar_folio))
        .route("/ingresar", get(routes::ingresar))
        .route("/api/estado/:folio", get(routes::estado))
        .route("/pdfs/:filename", get(routes::download_pdf))
        .route("/admin/generar", get(routes::admin_generar))
        .route("/admin/generar/:student_id", get(routes::admin_generar_alumno))
        .route("/admin/sync", get(routes::admin_sync))
        .route("/admin/auditar", get(routes::admin_auditar))
        .route("/admin/anular/:folio", get(routes::admin_anular))
        .route("/admin/restaurar/:folio", get(routes::admin_restaurar))
        .nest_service("/static", tower_http::services::ServeDir::new("static"))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Portal escolar listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

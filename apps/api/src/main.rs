mod config;
mod errors;
mod extraction;
mod llm_client;
mod models;
mod pipeline;
mod profile;
mod rendering;
mod routes;
mod state;
mod storage;
mod structuring;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::DefaultBodyLimit;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, StorageBackend};
use crate::extraction::PdfTextExtractor;
use crate::llm_client::LlmClient;
use crate::pipeline::ProfilePipeline;
use crate::rendering::NodeSiteRenderer;
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::{ArtifactStore, MemoryArtifactStore, S3ArtifactStore};
use crate::structuring::LlmContentStructurer;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting profile API v{}", env!("CARGO_PKG_VERSION"));

    let store = build_store(&config).await?;

    let llm = LlmClient::new(config.anthropic_api_key.clone())?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let renderer = NodeSiteRenderer::new(
        config.renderer_program.clone(),
        config.renderer_script.clone(),
        config.renderer_workdir.clone(),
        config.render_timeout(),
    );
    info!(
        "Renderer: {} {} in {}",
        config.renderer_program,
        config.renderer_script,
        config.renderer_workdir.display()
    );

    let settings = config.pipeline_settings();
    let pipeline = ProfilePipeline::new(
        store.clone(),
        Arc::new(PdfTextExtractor::new(store.clone())),
        Arc::new(LlmContentStructurer::new(llm.clone())),
        Arc::new(renderer),
        settings.clone(),
    );

    let state = AppState {
        pipeline,
        store,
        llm,
        settings,
    };

    let app = build_router(state)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn build_store(config: &Config) -> Result<Arc<dyn ArtifactStore>> {
    let store: Arc<dyn ArtifactStore> = match (config.storage_backend, &config.s3) {
        (StorageBackend::S3, Some(settings)) => Arc::new(
            S3ArtifactStore::connect(
                settings,
                &config.storage_dir_prefix,
                &config.storage_url_prefix,
            )
            .await,
        ),
        (StorageBackend::S3, None) => anyhow::bail!("S3 backend selected without S3 settings"),
        (StorageBackend::Memory, _) => {
            info!("Using in-memory artifact store; artifacts are lost on restart");
            Arc::new(MemoryArtifactStore::new(
                config.storage_dir_prefix.clone(),
                config.storage_url_prefix.clone(),
            ))
        }
    };
    Ok(store)
}

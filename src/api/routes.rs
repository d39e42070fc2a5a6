//! Shared application state and router construction.
use std::path::PathBuf;
use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use reqwest::Client;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::api::handlers;
use crate::artifact::ArtifactStore;
use crate::config::{Config, ProviderKind};
use crate::enhancer::{
    ChatCompletionsEnhancer, PassthroughEnhancer, PromptEnhancer, PromptTemplate, DEFAULT_USER_TEMPLATE,
};
use crate::error::{AppError, AppResult};
use crate::orchestrator::{Dispatcher, Orchestrator};
use crate::provider::{HuggingFaceProvider, LtxProvider, MockProvider, RunwayProvider, VideoProvider};
use crate::task::{InMemoryTaskRegistry, TaskRegistry};

/// Public URL prefix under which persisted videos are served.
pub const VIDEOS_PREFIX: &str = "/static/videos";

pub struct AppState {
    pub registry: Arc<dyn TaskRegistry>,
    pub dispatcher: Dispatcher,
    pub provider: Arc<dyn VideoProvider>,
    pub enhancer: Arc<dyn PromptEnhancer>,
}

impl AppState {
    /// Assemble state around an already-built orchestrator.
    pub fn new(orchestrator: Arc<Orchestrator>, max_concurrent: Option<usize>) -> Self {
        AppState {
            registry: Arc::clone(orchestrator.registry()),
            provider: Arc::clone(orchestrator.provider()),
            enhancer: Arc::clone(orchestrator.enhancer()),
            dispatcher: Dispatcher::new(orchestrator, max_concurrent),
        }
    }

    /// Wire the provider, enhancer, store and registry selected by `config`.
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let client = Client::builder().timeout(config.http_timeout).build()?;

        let provider: Arc<dyn VideoProvider> = match config.resolved_provider() {
            ProviderKind::Ltx => {
                let url = config.ltx_api_url.as_deref().ok_or_else(|| {
                    AppError::Config("VIDEO_PROVIDER=ltx requires LTX_API_URL".to_string())
                })?;
                Arc::new(LtxProvider::new(url, client.clone()))
            }
            ProviderKind::Runway => {
                let key = config.runway_api_key.as_deref().ok_or_else(|| {
                    AppError::Config("VIDEO_PROVIDER=runway requires RUNWAY_API_KEY".to_string())
                })?;
                Arc::new(RunwayProvider::new(
                    config.runway_api_url.as_str(),
                    key,
                    config.runway_model.as_str(),
                    client.clone(),
                ))
            }
            ProviderKind::HuggingFace => {
                let token = config.hf_token.as_deref().ok_or_else(|| {
                    AppError::Config("VIDEO_PROVIDER=huggingface requires HF_TOKEN".to_string())
                })?;
                Arc::new(HuggingFaceProvider::new(
                    config.hf_api_url.as_str(),
                    token,
                    config.hf_model.as_str(),
                    client.clone(),
                ))
            }
            ProviderKind::Mock | ProviderKind::Auto => Arc::new(MockProvider::new(config.mock_delay)),
        };

        let enhancer: Arc<dyn PromptEnhancer> = match &config.openai_api_key {
            Some(key) => Arc::new(ChatCompletionsEnhancer::new(
                config.openai_base_url.as_str(),
                Some(key.clone()),
                config.enhancer_model.as_str(),
                PromptTemplate::new(DEFAULT_USER_TEMPLATE)?,
                client.clone(),
            )),
            None => Arc::new(PassthroughEnhancer),
        };

        let store = ArtifactStore::new(videos_dir(config), VIDEOS_PREFIX, client);
        let registry: Arc<dyn TaskRegistry> = Arc::new(InMemoryTaskRegistry::new());
        let orchestrator = Orchestrator::new(registry, enhancer, provider, store)
            .with_poll_policy(config.poll_policy())
            .with_defaults(config.generation.clone())
            .mirror_remote_results(config.mirror_remote_results);

        Ok(AppState::new(Arc::new(orchestrator), config.max_concurrent_tasks))
    }
}

/// Directory the artifact store writes into.
pub fn videos_dir(config: &Config) -> PathBuf {
    PathBuf::from(&config.static_drive_path).join("videos")
}

/// API routes only, without static files or middleware.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/api/generate-video", post(handlers::generate_video))
        .route("/api/video-status/:task_id", get(handlers::video_status))
        .with_state(state)
}

/// The full application: API routes, `/static` file serving, CORS and tracing.
pub fn app(state: Arc<AppState>, config: &Config) -> Router {
    router(state)
        .nest_service("/static", ServeDir::new(&config.static_drive_path))
        .layer(cors_layer(&config.cors_origins()))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("ignoring invalid CORS origin '{}'", o);
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

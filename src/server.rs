use std::sync::Arc;

use axum::{
    Router,
    extract::FromRef,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use axum_extra::extract::cookie::Key;
use reqwest::Client;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    Res, api,
    config::Config,
    error::Error,
    management::{InMemorySessionStore, SessionStore, spawn_sweeper},
    spotify::{auth::TokenClient, proxy::SpotifyApi},
};

/// Shared handler state. Cloned per request; everything inside is an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn SessionStore>,
    pub tokens: Arc<TokenClient>,
    pub api: Arc<SpotifyApi>,
}

impl AppState {
    /// State backed by a fresh [`InMemorySessionStore`].
    pub fn new(config: Config) -> Result<Self, Error> {
        Self::with_store(config, Arc::new(InMemorySessionStore::new()))
    }

    /// Wires the token client and the proxy around one HTTP client, which
    /// carries the upstream timeout for every outbound call.
    pub fn with_store(config: Config, store: Arc<dyn SessionStore>) -> Result<Self, Error> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("cannot build HTTP client: {e}")))?;

        let tokens = Arc::new(TokenClient::new(&config, http.clone()));
        let api = Arc::new(SpotifyApi::new(
            &config,
            http,
            Arc::clone(&tokens),
            Arc::clone(&store),
        ));

        Ok(Self {
            config: Arc::new(config),
            store,
            tokens,
            api,
        })
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.config.cookie_key.clone()
    }
}

/// All routes with CORS and request tracing applied.
pub fn build_router(state: AppState) -> Result<Router, Error> {
    let origin = HeaderValue::from_str(&state.config.frontend_origin())
        .map_err(|e| Error::Config(format!("FRONTEND_URI: {e}")))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let auth = Router::new()
        .route("/login", get(api::login))
        .route("/callback", get(api::callback))
        .route("/spotify", get(api::login))
        .route("/spotify/callback", get(api::callback));

    let spotify = Router::new()
        .route("/me", get(api::me))
        .route("/top/{kind}", get(api::top_items))
        .route("/recently-played", get(api::recently_played))
        .route("/playlists", get(api::playlists))
        .route("/audio-features", get(api::audio_features))
        .route("/now-playing", get(api::now_playing))
        .route("/vibe-summary", get(api::vibe_summary))
        .route("/refresh-token", post(api::refresh_token))
        .route("/logout", post(api::logout));

    Ok(Router::new()
        .route("/health", get(api::health))
        .route("/logout", get(api::logout_redirect))
        .nest("/auth", auth)
        .nest("/api", spotify)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state))
}

/// Serves until Ctrl-C, then stops the session sweep.
pub async fn start_api_server(config: Config) -> Res<()> {
    let addr = config.bind_addr;
    let sweep_interval = config.sweep_interval;

    let state = AppState::new(config)?;
    let sweeper = spawn_sweeper(Arc::clone(&state.store), sweep_interval);
    let app = build_router(state)?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "vibeify backend listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    sweeper.abort();
    tracing::info!("server stopped");
    Ok(served?)
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown requested"),
        Err(e) => {
            tracing::warn!(error = %e, "cannot listen for Ctrl-C, running until killed");
            std::future::pending::<()>().await;
        }
    }
}

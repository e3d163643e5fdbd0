//! HTTP summarization service.
//!
//! Routes:
//! - `POST /summarize/`: article text in, summary and statistics out
//! - `GET /health/`: loads the model if needed and reports whether it is usable
//!
//! Both routes also answer without the trailing slash.

pub mod backend;
mod error;
mod extract;
mod handlers;

pub use backend::{BackendError, SummaryBackend};
#[cfg(feature = "onnx")]
pub use backend::OnnxBackend;
pub use error::{ApiError, ServerError};
pub use extract::SummarizeInput;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{get, post};
use precis_core::{GenerationSettings, ServerSettings};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn SummaryBackend>,
    pub generation: Arc<GenerationSettings>,
}

impl AppState {
    pub fn new(backend: Arc<dyn SummaryBackend>, generation: GenerationSettings) -> Self {
        Self {
            backend,
            generation: Arc::new(generation),
        }
    }
}

/// Build the router with all routes and middleware.
pub fn router(state: AppState, settings: &ServerSettings) -> Router {
    let mut router = Router::new()
        .route("/summarize/", post(handlers::summarize_article))
        .route("/summarize", post(handlers::summarize_article))
        .route("/health/", get(handlers::health_check))
        .route("/health", get(handlers::health_check))
        .with_state(state)
        .layer(DefaultBodyLimit::max(settings.max_body_bytes))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(settings.request_timeout_secs),
        ))
        .layer(TraceLayer::new_for_http());

    if settings.cors {
        router = router.layer(CorsLayer::permissive());
    }
    router
}

/// The summarization HTTP server.
pub struct Server {
    router: Router,
    settings: ServerSettings,
}

impl Server {
    pub fn new(state: AppState, settings: ServerSettings) -> Self {
        Self {
            router: router(state, &settings),
            settings,
        }
    }

    /// Serve on an already-bound listener until the process ends.
    pub async fn run_on(self, listener: TcpListener) -> Result<(), ServerError> {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "precis server listening");
        }
        axum::serve(listener, self.router).await?;
        Ok(())
    }

    /// Bind the configured address and serve until `shutdown` resolves.
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.settings.bind_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        info!(%addr, "precis server listening");
        info!("summarize endpoint: http://{addr}/summarize/");
        info!("health endpoint: http://{addr}/health/");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("precis server shut down gracefully");
        Ok(())
    }
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

//! evproc Head: dispatcher, pipeline registry and process plumbing
pub mod config;
pub mod handlers;
pub mod head;
pub mod metrics;
pub mod registry;
pub mod telemetry;

pub use config::ProcessorConfig;
pub use handlers::AdminState;
pub use head::{
    escalate, watched_queue, watches_control_queue, DependencySetup, Dispatch, Dispatcher, Head,
    NoDependencies, SORTER,
};
pub use metrics::DispatchMetrics;
pub use registry::{default_registry, PipelineFactory, PipelineRegistry};

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

pub fn create_app(state: AdminState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the admin endpoints on `addr` until the process exits.
pub async fn serve_admin(addr: std::net::SocketAddr, state: AdminState) -> std::io::Result<()> {
    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("admin endpoint listening on {}", addr);
    axum::serve(listener, app).await
}

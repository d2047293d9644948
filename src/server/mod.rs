//! HTTP surface of the media service.

pub mod routes;

use crate::service::CourseImageService;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Slightly above the 5 MB image limit so oversized uploads reach the
/// handler and get a JSON 400 instead of a bare transport error.
pub const MAX_BODY_BYTES: usize = 6 * 1024 * 1024;

pub type AppState = Arc<CourseImageService>;

pub fn router(service: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route(
            "/api/courses/images",
            post(routes::upload_image).delete(routes::delete_image),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

pub async fn serve(service: AppState, bind_addr: &str) -> crate::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, router(service)).await?;
    Ok(())
}

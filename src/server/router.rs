//! Router construction

use super::{handlers, AppState};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Build the application router
///
/// ```rust
/// use rmbg_server::{config::ServerConfig, processor::BackgroundRemover, server::{create_router, AppState}};
/// use std::sync::Arc;
///
/// struct Passthrough;
///
/// impl BackgroundRemover for Passthrough {
///     fn remove(
///         &self,
///         image: image::DynamicImage,
///         _post_process_mask: bool,
///     ) -> rmbg_server::Result<image::DynamicImage> {
///         Ok(image)
///     }
/// }
///
/// let state = AppState::new(Arc::new(Passthrough), &ServerConfig::default());
/// let _router = create_router(state);
/// ```
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(handlers::root))
        .route("/rmbg", post(handlers::remove_background))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(TraceLayer::new_for_http());

    if state.cors_permissive {
        router = router.layer(CorsLayer::permissive());
    }

    router.with_state(state)
}

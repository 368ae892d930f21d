pub mod comments;
pub mod forms;
pub mod health;
pub mod home;
pub mod images;
pub mod users;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use imagehoster_gallery::Gallery;

use crate::session::{SessionLayer, SessionManager};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The gallery services.
    pub gallery: Arc<Gallery>,
    /// Cookie session issuance and lookup.
    pub sessions: Arc<SessionManager>,
    /// Largest accepted request body, in bytes.
    pub max_upload_bytes: usize,
}

/// Build the Axum router with all page routes and middleware.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home::index))
        .route("/health", get(health::health))
        // Images
        .route("/images", get(images::list))
        .route(
            "/images/upload",
            get(images::upload_form).post(images::upload),
        )
        .route("/images/{id}/{title}", get(images::show))
        .route("/images/{title}", get(images::show_by_title))
        .route("/editImage", get(images::edit_form).post(images::edit))
        .route("/deleteImage", post(images::delete))
        // Comments
        .route(
            "/image/{image_id}/{image_title}/comments",
            post(comments::add),
        )
        // Accounts
        .route(
            "/users/registration",
            get(users::registration_form).post(users::register),
        )
        .route("/users/login", get(users::login_form).post(users::login))
        .route("/users/logout", post(users::logout))
        .layer(SessionLayer::new(Arc::clone(&state.sessions)))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

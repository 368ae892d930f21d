use axum::extract::State;
use axum::response::Html;
use minijinja::context;

use super::AppState;
use crate::error::ServerError;
use crate::session::MaybeUser;
use crate::templates;

/// `GET /` -- the public gallery index.
pub async fn index(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
) -> Result<Html<String>, ServerError> {
    let images = state.gallery.images().list().await?;
    templates::page("index.html", context! { images, user })
}

use axum::extract::{Form, Path, State};
use axum::response::Html;

use imagehoster_core::ImageId;
use imagehoster_gallery::{GalleryError, ImageDetail};

use super::AppState;
use super::forms::CommentForm;
use super::images::render_detail;
use crate::error::ServerError;
use crate::session::SessionUser;

/// `POST /image/{imageId}/{imageTitle}/comments` -- add a comment and show
/// the image with its refreshed comment list.
pub async fn add(
    State(state): State<AppState>,
    user: SessionUser,
    Path((image_id, _title)): Path<(String, String)>,
    Form(form): Form<CommentForm>,
) -> Result<Html<String>, ServerError> {
    let id: ImageId = image_id
        .parse()
        .map_err(|_| GalleryError::NotFound(format!("image {image_id}")))?;

    let comments = state
        .gallery
        .comments()
        .add_comment(id, user.id, &form.comment)
        .await?;
    let image = state.gallery.images().get(id).await?;

    render_detail(&ImageDetail { image, comments }, Some(&user), None, None)
}

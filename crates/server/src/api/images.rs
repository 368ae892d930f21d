use axum::extract::rejection::FormRejection;
use axum::extract::{Form, Multipart, Path, Query, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use minijinja::context;
use tracing::debug;

use imagehoster_core::{Image, ImageId};
use imagehoster_gallery::{GalleryError, ImageDetail};

use super::AppState;
use super::forms::{ImageFields, ImageIdParam, parse_image_id};
use crate::error::ServerError;
use crate::session::{MaybeUser, SessionUser};
use crate::templates;

/// Canonical detail URL of an image.
pub fn image_url(image: &Image) -> String {
    format!(
        "/images/{}/{}",
        image.id,
        templates::path_segment(&image.title)
    )
}

fn not_found(raw: &str) -> ServerError {
    ServerError::Gallery(GalleryError::NotFound(format!("image {raw}")))
}

/// Render the detail page, optionally with an ownership error.
pub(crate) fn render_detail(
    detail: &ImageDetail,
    user: Option<&SessionUser>,
    edit_error: Option<&str>,
    delete_error: Option<&str>,
) -> Result<Html<String>, ServerError> {
    templates::page(
        "image.html",
        context! {
            image => &detail.image,
            tags => &detail.image.tags,
            comments => &detail.comments,
            user => user,
            editError => edit_error,
            deleteError => delete_error,
        },
    )
}

/// `GET /images` -- every image, for signed-in users.
pub async fn list(
    State(state): State<AppState>,
    user: SessionUser,
) -> Result<Html<String>, ServerError> {
    let images = state.gallery.images().list().await?;
    templates::page("images.html", context! { images, user })
}

/// `GET /images/{id}/{title}` -- image detail. The title segment is
/// cosmetic.
pub async fn show(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path((id, _title)): Path<(String, String)>,
) -> Result<Html<String>, ServerError> {
    let image_id: ImageId = id.parse().map_err(|_| not_found(&id))?;
    let detail = state.gallery.images().detail(image_id).await?;
    render_detail(&detail, user.as_ref(), None, None)
}

/// `GET /images/{title}` -- old title-only links, redirected to the
/// canonical URL of the first image with that title.
pub async fn show_by_title(
    State(state): State<AppState>,
    Path(title): Path<String>,
) -> Result<Redirect, ServerError> {
    let image = state
        .gallery
        .images()
        .find_by_title(&title)
        .await?
        .ok_or_else(|| not_found(&title))?;
    Ok(Redirect::to(&image_url(&image)))
}

/// `GET /images/upload`
pub async fn upload_form(user: SessionUser) -> Result<Html<String>, ServerError> {
    templates::page("upload.html", context! { user })
}

/// `POST /images/upload` -- multipart `file`, `title`, `description`, `tags`.
pub async fn upload(
    State(state): State<AppState>,
    user: SessionUser,
    multipart: Multipart,
) -> Result<Redirect, ServerError> {
    let fields = ImageFields::read(multipart).await?;
    state
        .gallery
        .images()
        .create(user.id, fields.into_new_image())
        .await?;
    Ok(Redirect::to("/images"))
}

/// `GET /editImage?imageId=` -- the edit form, or the detail page with an
/// error for anyone but the owner.
pub async fn edit_form(
    State(state): State<AppState>,
    user: SessionUser,
    Query(param): Query<ImageIdParam>,
) -> Result<Html<String>, ServerError> {
    let image_id = parse_image_id([param.image_id.as_deref()])?;
    match state.gallery.images().edit_form(user.id, image_id).await {
        Ok(form) => templates::page(
            "edit.html",
            context! { image => form.image, tags => form.tags, user },
        ),
        Err(GalleryError::Forbidden(message)) => {
            let detail = state.gallery.images().detail(image_id).await?;
            render_detail(&detail, Some(&user), Some(&message), None)
        }
        Err(e) => Err(e.into()),
    }
}

/// `POST /editImage?imageId=` -- multipart edit submission. The id may also
/// arrive as an `imageId` form field.
pub async fn edit(
    State(state): State<AppState>,
    user: SessionUser,
    Query(param): Query<ImageIdParam>,
    multipart: Multipart,
) -> Result<Response, ServerError> {
    let fields = ImageFields::read(multipart).await?;
    let image_id = parse_image_id([param.image_id.as_deref(), fields.image_id.as_deref()])?;

    match state
        .gallery
        .images()
        .update(user.id, image_id, fields.into_edit())
        .await
    {
        Ok(image) => Ok(Redirect::to(&image_url(&image)).into_response()),
        Err(GalleryError::Forbidden(message)) => {
            let detail = state.gallery.images().detail(image_id).await?;
            Ok(render_detail(&detail, Some(&user), Some(&message), None)?.into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// `POST /deleteImage` -- `imageId` from the form body or the query string.
pub async fn delete(
    State(state): State<AppState>,
    user: SessionUser,
    Query(query): Query<ImageIdParam>,
    form: Result<Form<ImageIdParam>, FormRejection>,
) -> Result<Response, ServerError> {
    let form = form.map(|Form(form)| form).unwrap_or_else(|rejection| {
        debug!(%rejection, "no form body on delete");
        ImageIdParam::default()
    });
    let image_id = parse_image_id([form.image_id.as_deref(), query.image_id.as_deref()])?;

    match state.gallery.images().delete(user.id, image_id).await {
        Ok(()) => Ok(Redirect::to("/images").into_response()),
        Err(GalleryError::Forbidden(message)) => {
            let detail = state.gallery.images().detail(image_id).await?;
            Ok(render_detail(&detail, Some(&user), None, Some(&message))?.into_response())
        }
        Err(e) => Err(e.into()),
    }
}

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use imagehoster_gallery::GalleryError;
use minijinja::context;
use thiserror::Error;
use tracing::error;

use crate::templates;

/// Errors that can occur when running the ImageHoster server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A page template failed to render.
    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),

    /// A gallery-level error surfaced through a handler.
    #[error(transparent)]
    Gallery(#[from] GalleryError),

    /// The request was malformed (bad form, missing field, bad multipart).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Issuing or revoking a session failed.
    #[error("session error: {0}")]
    Session(String),
}

impl ServerError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Gallery(GalleryError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Gallery(GalleryError::Validation(_)) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Gallery(GalleryError::InvalidCredentials) => StatusCode::UNAUTHORIZED,
            Self::Gallery(GalleryError::Forbidden(_)) => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!(error = %self, "request failed");
            "Something went wrong".to_owned()
        } else {
            self.to_string()
        };

        let ctx = context! {
            status => status.as_u16(),
            reason => status.canonical_reason().unwrap_or_default(),
            message => message,
        };
        match templates::render("error.html", ctx) {
            Ok(html) => (status, Html(html)).into_response(),
            Err(e) => {
                error!(error = %e, "failed to render error page");
                (status, message).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gallery_errors_map_to_status_codes() {
        let cases = [
            (GalleryError::NotFound("image 1".into()), StatusCode::NOT_FOUND),
            (GalleryError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (GalleryError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (GalleryError::Forbidden("no".into()), StatusCode::FORBIDDEN),
            (
                GalleryError::PasswordHash("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ServerError::from(err).status(), expected);
        }
    }

    #[test]
    fn bad_request_is_400() {
        let response = ServerError::BadRequest("missing imageId".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn not_found_renders_page() {
        let response =
            ServerError::Gallery(GalleryError::NotFound("image 7".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let content_type = response.headers().get("content-type").unwrap();
        assert!(content_type.to_str().unwrap().starts_with("text/html"));
    }
}

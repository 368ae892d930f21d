use axum::extract::{Form, State};
use axum::http::HeaderMap;
use axum::http::header::SET_COOKIE;
use axum::response::{Html, IntoResponse, Redirect, Response};
use minijinja::context;

use imagehoster_gallery::GalleryError;

use super::AppState;
use super::forms::{LoginForm, RegistrationForm};
use crate::error::ServerError;
use crate::session::{LOGIN_PATH, MaybeUser};
use crate::templates;

const LOGIN_FAILED: &str = "Invalid username or password";

/// `GET /users/registration`
pub async fn registration_form(
    MaybeUser(user): MaybeUser,
) -> Result<Html<String>, ServerError> {
    templates::page("registration.html", context! { user })
}

/// `POST /users/registration` -- on success send the new user to the login
/// page, otherwise show the form again with the reason.
pub async fn register(
    State(state): State<AppState>,
    Form(form): Form<RegistrationForm>,
) -> Result<Response, ServerError> {
    match state.gallery.users().register(form.into()).await {
        Ok(_) => Ok(Redirect::to(LOGIN_PATH).into_response()),
        Err(GalleryError::Validation(message)) => Ok(templates::page(
            "registration.html",
            context! { passwordTypeError => message },
        )?
        .into_response()),
        Err(e) => Err(e.into()),
    }
}

/// `GET /users/login`
pub async fn login_form(MaybeUser(user): MaybeUser) -> Result<Html<String>, ServerError> {
    templates::page("login.html", context! { user })
}

/// `POST /users/login` -- start a session and go to `/images`.
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Response, ServerError> {
    match state
        .gallery
        .users()
        .login(&form.username, &form.password)
        .await
    {
        Ok(user) => {
            let cookie = state.sessions.login(&user).await?;
            Ok(([(SET_COOKIE, cookie)], Redirect::to("/images")).into_response())
        }
        Err(GalleryError::InvalidCredentials) => {
            Ok(templates::page("login.html", context! { loginError => LOGIN_FAILED })?
                .into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// `POST /users/logout` -- revoke the session, clear the cookie and show the
/// index page.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ServerError> {
    if let Some(token) = state.sessions.token_from_headers(&headers) {
        state.sessions.logout(&token).await?;
    }

    let images = state.gallery.images().list().await?;
    let page = templates::page("index.html", context! { images })?;
    Ok(([(SET_COOKIE, state.sessions.clear_cookie())], page).into_response())
}

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use tower::{Layer, Service};

use super::SessionManager;

/// Tower layer that resolves the session cookie into a
/// [`SessionUser`](super::SessionUser) request extension.
#[derive(Clone)]
pub struct SessionLayer {
    manager: Arc<SessionManager>,
}

impl SessionLayer {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self { manager }
    }
}

impl<S> Layer<S> for SessionLayer {
    type Service = SessionMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SessionMiddleware {
            inner,
            manager: Arc::clone(&self.manager),
        }
    }
}

/// Tower service that attaches the signed-in user, if any.
///
/// Requests without a valid session pass through untouched; each handler
/// decides whether it needs a user.
#[derive(Clone)]
pub struct SessionMiddleware<S> {
    inner: S,
    manager: Arc<SessionManager>,
}

impl<S> Service<Request<Body>> for SessionMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let manager = Arc::clone(&self.manager);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            if let Some(token) = manager.token_from_headers(req.headers())
                && let Some(user) = manager.authenticate(&token).await
            {
                req.extensions_mut().insert(user);
            }
            inner.call(req).await
        })
    }
}

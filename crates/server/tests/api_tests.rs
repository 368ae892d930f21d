use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use tower::ServiceExt;

use imagehoster_gallery::{Gallery, GalleryBuilder};
use imagehoster_server::api::{AppState, router};
use imagehoster_server::config::SessionConfig;
use imagehoster_server::session::SessionManager;
use imagehoster_store_memory::MemoryStore;

const BOUNDARY: &str = "imagehoster-test-boundary";

// -- Helpers --------------------------------------------------------------

struct TestApp {
    app: axum::Router,
    gallery: Arc<Gallery>,
}

fn build_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let gallery = Arc::new(
        GalleryBuilder::new()
            .store(store.clone())
            .build()
            .expect("gallery should build"),
    );
    let sessions = SessionManager::new(
        &SessionConfig {
            secret: Some("test-secret".into()),
            ..SessionConfig::default()
        },
        store,
    );
    let state = AppState {
        gallery: Arc::clone(&gallery),
        sessions: Arc::new(sessions),
        max_upload_bytes: 1024 * 1024,
    };
    TestApp {
        app: router(state),
        gallery,
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> Response {
        self.app.clone().oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    async fn post_form(&self, uri: &str, body: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_owned())).unwrap())
            .await
    }

    async fn post_multipart(
        &self,
        uri: &str,
        fields: &[(&str, &str)],
        file: Option<&[u8]>,
        cookie: &str,
    ) -> Response {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .header(header::COOKIE, cookie)
            .body(Body::from(multipart_body(fields, file)))
            .unwrap();
        self.send(request).await
    }

    /// Register and log in, returning the `Cookie` header value.
    async fn sign_up(&self, username: &str) -> String {
        let response = self
            .post_form(
                "/users/registration",
                &format!("username={username}&password=abc%231&fullName=Test+User"),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/users/login");

        let response = self
            .post_form(
                "/users/login",
                &format!("username={username}&password=abc%231"),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/images");
        session_cookie(&response)
    }

    async fn upload_sunset(&self, cookie: &str) {
        let response = self
            .post_multipart(
                "/images/upload",
                &[
                    ("title", "Sunset"),
                    ("description", "evening sky"),
                    ("tags", "nature,photo"),
                ],
                Some(b"fake-png-bytes"),
                cookie,
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/images");
    }
}

fn multipart_body(fields: &[(&str, &str)], file: Option<&[u8]>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some(bytes) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"image.png\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .expect("redirect should carry a location")
        .to_str()
        .unwrap()
}

fn session_cookie(response: &Response) -> String {
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("login should set a cookie")
        .to_str()
        .unwrap();
    set_cookie.split(';').next().unwrap().to_owned()
}

async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// -- Tests ----------------------------------------------------------------

#[tokio::test]
async fn health_returns_200() {
    let app = build_app();
    let response = app.get("/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn index_is_public() {
    let app = build_app();
    let response = app.get("/", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("No images"));
}

#[tokio::test]
async fn protected_pages_redirect_to_login() {
    let app = build_app();
    for uri in ["/images", "/images/upload", "/editImage?imageId=1"] {
        let response = app.get(uri, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{uri}");
        assert_eq!(location(&response), "/users/login", "{uri}");
    }

    let response = app.post_form("/deleteImage", "imageId=1", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn weak_password_rerenders_registration() {
    let app = build_app();
    let response = app
        .post_form("/users/registration", "username=alice&password=abc", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("Password must contain atleast 1 alphabet, 1 number &amp; 1 special character"));
}

#[tokio::test]
async fn wrong_password_rerenders_login() {
    let app = build_app();
    app.sign_up("alice").await;

    let response = app
        .post_form("/users/login", "username=alice&password=nope%231", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    assert!(body_string(response).await.contains("Invalid username or password"));
}

#[tokio::test]
async fn login_grants_access_to_images() {
    let app = build_app();
    let cookie = app.sign_up("alice").await;

    let response = app.get("/images", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("Signed in as alice"));
}

#[tokio::test]
async fn list_pages_link_to_uploaded_image() {
    let app = build_app();
    let cookie = app.sign_up("alice").await;
    app.upload_sunset(&cookie).await;

    let response = app.get("/", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("Sunset"));
    assert!(body.contains(r#"href="/images/1/Sunset""#));

    let response = app.get("/images", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("evening sky"));
    assert!(body.contains(r#"href="/images/1/Sunset""#));
}

#[tokio::test]
async fn slash_in_title_keeps_links_routable() {
    let app = build_app();
    let cookie = app.sign_up("alice").await;
    let response = app
        .post_multipart(
            "/images/upload",
            &[("title", "a/b"), ("tags", "")],
            Some(b"bytes"),
            &cookie,
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let body = body_string(app.get("/", None).await).await;
    assert!(body.contains(r#"href="/images/1/a%2Fb""#), "{body}");

    let response = app.get("/images/1/a%2Fb", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains(r#"action="/image/1/a%2Fb/comments""#), "{body}");

    let response = app
        .post_form("/image/1/a%2Fb/comments", "comment=hello", Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("hello"));
}

#[tokio::test]
async fn upload_then_view_detail() {
    let app = build_app();
    let cookie = app.sign_up("alice").await;
    app.upload_sunset(&cookie).await;

    let images = app.gallery.images().list().await.unwrap();
    assert_eq!(images.len(), 1);
    let image = &images[0];
    assert_eq!(image.title, "Sunset");
    assert_eq!(image.owner_username, "alice");
    assert_eq!(image.tag_names(), vec!["nature", "photo"]);
    assert_eq!(image.image_file, "ZmFrZS1wbmctYnl0ZXM=");

    let response = app
        .get(&format!("/images/{}/Sunset", image.id), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("Sunset"));
    assert!(body.contains("nature"));
    assert!(body.contains("photo"));
    assert!(body.contains("No comments yet."));
}

#[tokio::test]
async fn missing_image_renders_404() {
    let app = build_app();
    let response = app.get("/images/99/Nothing", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_string(response).await.contains("404"));

    let response = app.get("/images/abc/Nothing", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn title_link_redirects_to_canonical_url() {
    let app = build_app();
    let cookie = app.sign_up("alice").await;
    app.upload_sunset(&cookie).await;

    let response = app.get("/images/Sunset", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/images/1/Sunset");

    let response = app.get("/images/Unknown", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_owner_delete_is_refused() {
    let app = build_app();
    let alice = app.sign_up("alice").await;
    let bob = app.sign_up("bob").await;
    app.upload_sunset(&alice).await;

    let response = app.post_form("/deleteImage", "imageId=1", Some(&bob)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        body_string(response)
            .await
            .contains("Only the owner of the image can delete the image")
    );
    assert_eq!(app.gallery.images().list().await.unwrap().len(), 1);

    let response = app.post_form("/deleteImage", "imageId=1", Some(&alice)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/images");
    assert!(app.gallery.images().list().await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_accepts_image_id_in_query() {
    let app = build_app();
    let alice = app.sign_up("alice").await;
    app.upload_sunset(&alice).await;

    let response = app.post_form("/deleteImage?imageId=1", "", Some(&alice)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(app.gallery.images().list().await.unwrap().is_empty());
}

#[tokio::test]
async fn edit_form_is_owner_only() {
    let app = build_app();
    let alice = app.sign_up("alice").await;
    let bob = app.sign_up("bob").await;
    app.upload_sunset(&alice).await;

    let response = app.get("/editImage?imageId=1", Some(&alice)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("value=\"nature,photo\""));

    let response = app.get("/editImage?imageId=1", Some(&bob)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        body_string(response)
            .await
            .contains("Only the owner of the image can edit the image")
    );
}

#[tokio::test]
async fn edit_without_file_keeps_content() {
    let app = build_app();
    let alice = app.sign_up("alice").await;
    app.upload_sunset(&alice).await;

    let response = app
        .post_multipart(
            "/editImage?imageId=1",
            &[
                ("title", "Dusk sky"),
                ("description", "later"),
                ("tags", "sky, sea"),
            ],
            None,
            &alice,
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/images/1/Dusk%20sky");

    let image = app
        .gallery
        .images()
        .get(imagehoster_core::ImageId::new(1))
        .await
        .unwrap();
    assert_eq!(image.title, "Dusk sky");
    assert_eq!(image.image_file, "ZmFrZS1wbmctYnl0ZXM=");
    assert_eq!(image.tag_names(), vec!["sky", "sea"]);
}

#[tokio::test]
async fn edit_by_non_owner_is_refused() {
    let app = build_app();
    let alice = app.sign_up("alice").await;
    let bob = app.sign_up("bob").await;
    app.upload_sunset(&alice).await;

    let response = app
        .post_multipart(
            "/editImage",
            &[("imageId", "1"), ("title", "Mine now"), ("tags", "")],
            None,
            &bob,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        body_string(response)
            .await
            .contains("Only the owner of the image can edit the image")
    );

    let image = app.gallery.images().list().await.unwrap().remove(0);
    assert_eq!(image.title, "Sunset");
    assert_eq!(image.owner_username, "alice");
}

#[tokio::test]
async fn comment_is_added_and_shown() {
    let app = build_app();
    let alice = app.sign_up("alice").await;
    let bob = app.sign_up("bob").await;
    app.upload_sunset(&alice).await;

    let response = app
        .post_form("/image/1/Sunset/comments", "comment=nice%21", Some(&bob))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("nice!"));
    assert!(body.contains("bob on"));

    let detail = app
        .gallery
        .images()
        .detail(imagehoster_core::ImageId::new(1))
        .await
        .unwrap();
    assert_eq!(detail.comments.len(), 1);
    assert_eq!(detail.comments[0].text, "nice!");
    assert_eq!(detail.comments[0].author_username, "bob");
}

#[tokio::test]
async fn comment_on_missing_image_is_404() {
    let app = build_app();
    let bob = app.sign_up("bob").await;
    let response = app
        .post_form("/image/7/Ghost/comments", "comment=hello", Some(&bob))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn logout_revokes_session() {
    let app = build_app();
    let cookie = app.sign_up("alice").await;

    let response = app.post_form("/users/logout", "", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let cleared = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_owned();
    assert!(cleared.contains("Max-Age=0"));
    assert!(body_string(response).await.contains("Image Hoster"));

    let response = app.get("/images", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/users/login");
}

#[tokio::test]
async fn upload_larger_than_limit_is_rejected() {
    let app = build_app();
    let cookie = app.sign_up("alice").await;
    let big = vec![0_u8; 2 * 1024 * 1024];

    let response = app
        .post_multipart(
            "/images/upload",
            &[("title", "Huge"), ("tags", "")],
            Some(&big),
            &cookie,
        )
        .await;
    assert!(response.status().is_client_error());
    assert!(app.gallery.images().list().await.unwrap().is_empty());
}

use std::sync::LazyLock;

use axum::response::Html;
use minijinja::{Environment, Value, default_auto_escape_callback};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use crate::error::ServerError;

static ENGINE: LazyLock<Environment<'static>> = LazyLock::new(|| {
    let mut env = Environment::new();
    env.set_auto_escape_callback(default_auto_escape_callback);
    env.set_loader(embedded_template_loader);
    env.add_filter("path_segment", path_segment);
    env
});

/// Characters left unescaped in a path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Escape `value` for use as a single URL path segment. `/` is escaped too.
pub fn path_segment(value: &str) -> String {
    utf8_percent_encode(value, PATH_SEGMENT).to_string()
}

/// Template loader for minijinja that loads from embedded sources.
fn embedded_template_loader(name: &str) -> Result<Option<String>, minijinja::Error> {
    let template_content = match name {
        "base.html" => Some(include_str!("templates/base.html")),
        "error.html" => Some(include_str!("templates/error.html")),
        "index.html" => Some(include_str!("templates/index.html")),
        "images.html" => Some(include_str!("templates/images.html")),
        "image.html" => Some(include_str!("templates/image.html")),
        "upload.html" => Some(include_str!("templates/upload.html")),
        "edit.html" => Some(include_str!("templates/edit.html")),
        "registration.html" => Some(include_str!("templates/registration.html")),
        "login.html" => Some(include_str!("templates/login.html")),
        _ => None,
    };

    Ok(template_content.map(str::to_owned))
}

/// Render a named template to a string.
pub fn render(name: &str, ctx: Value) -> Result<String, minijinja::Error> {
    ENGINE.get_template(name)?.render(ctx)
}

/// Render a named template as an HTML page.
pub fn page(name: &str, ctx: Value) -> Result<Html<String>, ServerError> {
    Ok(Html(render(name, ctx)?))
}

#[cfg(test)]
mod tests {
    use minijinja::context;

    use super::*;

    #[test]
    fn every_page_loads() {
        for name in [
            "error.html",
            "index.html",
            "images.html",
            "image.html",
            "upload.html",
            "edit.html",
            "registration.html",
            "login.html",
        ] {
            assert!(ENGINE.get_template(name).is_ok(), "{name} should load");
        }
    }

    #[test]
    fn unknown_template_is_an_error() {
        assert!(render("missing.html", context! {}).is_err());
    }

    #[test]
    fn path_segment_escapes_slashes() {
        assert_eq!(path_segment("Sunset"), "Sunset");
        assert_eq!(path_segment("Sunset over sea"), "Sunset%20over%20sea");
        assert_eq!(path_segment("a/b?c"), "a%2Fb%3Fc");
    }

    #[test]
    fn list_links_escape_titles() {
        let html = render(
            "index.html",
            context! {
                images => vec![context! { id => 1, title => "a/b", owner_username => "alice" }],
            },
        )
        .unwrap();
        assert!(html.contains(r#"href="/images/1/a%2Fb""#), "{html}");
    }

    #[test]
    fn comment_form_targets_escaped_title() {
        let html = render(
            "image.html",
            context! {
                image => context! { id => 3, title => "a/b", tags => Vec::<String>::new() },
                tags => Vec::<String>::new(),
                comments => Vec::<String>::new(),
                user => context! { id => 1, username => "alice" },
            },
        )
        .unwrap();
        assert!(html.contains(r#"action="/image/3/a%2Fb/comments""#), "{html}");
    }

    #[test]
    fn output_is_escaped() {
        let html = render(
            "error.html",
            context! { status => 400, reason => "Bad Request", message => "<script>" },
        )
        .unwrap();
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }
}

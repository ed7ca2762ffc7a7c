use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use unicode_normalization::UnicodeNormalization;

/// Address of the index page; the fallback target after a question is deleted.
pub const INDEX_PATH: &str = "/";

/// slugify
///
/// Folds accents (NFKD, then drops what is left outside ASCII), lower-cases,
/// keeps word characters, spaces and hyphens, then collapses every run of
/// whitespace or hyphens into a single hyphen.
pub fn slugify(title: &str) -> String {
    let kept: String = title
        .nfkd()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-' || c.is_ascii_whitespace())
        .collect();

    let mut slug = String::with_capacity(kept.len());
    let mut pending_dash = false;
    for c in kept.trim().to_ascii_lowercase().chars() {
        if c == '-' || c.is_ascii_whitespace() {
            pending_dash = true;
            continue;
        }
        if pending_dash {
            slug.push('-');
            pending_dash = false;
        }
        slug.push(c);
    }
    if pending_dash {
        slug.push('-');
    }
    slug
}

/// question_url
///
/// Canonical thread address: `/thread/<id>/<slug>/`, or `/thread/<id>/` when the
/// title slugs to nothing.
pub fn question_url(id: i64, title: &str) -> String {
    let slug = slugify(title);
    if slug.is_empty() {
        format!("/thread/{}/", id)
    } else {
        format!("/thread/{}/{}/", id, slug)
    }
}

/// Login address with the original target appended, percent-encoded, as `next`.
pub fn login_with_next(login_url: &str, next: &str) -> String {
    format!("{}?next={}", login_url, urlencoding::encode(next))
}

/// 302 Found.
pub fn found(location: &str) -> Response {
    redirect(StatusCode::FOUND, location)
}

/// 301 Moved Permanently. Used for canonical URL drift.
pub fn moved_permanently(location: &str) -> Response {
    redirect(StatusCode::MOVED_PERMANENTLY, location)
}

fn redirect(status: StatusCode, location: &str) -> Response {
    (status, [(header::LOCATION, location.to_string())]).into_response()
}

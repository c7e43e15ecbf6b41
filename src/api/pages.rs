//! Minimal page handlers fronted by the route guard.
//!
//! The real UI is a separate client; these placeholders exist so the
//! guard has navigations to protect and a login path to redirect to.

use axum::response::Html;

pub async fn auth_page() -> Html<&'static str> {
    Html("<!doctype html><title>Sign in</title><h1>Sign in</h1>")
}

pub async fn register_page() -> Html<&'static str> {
    Html("<!doctype html><title>Register</title><h1>Create an account</h1>")
}

/// Every non-public path lands here once the guard lets it through.
pub async fn app_page() -> Html<&'static str> {
    Html("<!doctype html><title>gatekeep</title><div id=\"app\"></div>")
}

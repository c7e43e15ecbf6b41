mod auth;
mod error;
mod pages;
mod users;
mod validation;

pub use error::{ApiError, ErrorCode};

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::guard;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // JSON API (public by design; see the listing endpoint's contract)
    let api_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/user", post(auth::register))
        .route("/users", get(users::list_users));

    // Page navigations run through the route guard
    let page_routes = Router::new()
        .route("/auth", get(pages::auth_page))
        .route("/register", get(pages::register_page))
        .fallback(pages::app_page)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            guard::guard_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .merge(page_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::DbPool;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn test_app() -> (Router, DbPool) {
        let mut config = Config::default();
        // Minimal hashing work factor so tests stay fast.
        config.auth.hash_memory_kib = 8;
        config.auth.hash_iterations = 1;

        let db = crate::db::init_test().await.unwrap();
        let state = Arc::new(AppState::new(config, db.clone()).unwrap());
        (create_router(state), db)
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn register_then_login_over_http() {
        let (app, _db) = test_app().await;

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/user",
                serde_json::json!({"email": "a@b.com", "password": "x", "name": "Ada"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["user"]["email"], "a@b.com");
        assert!(body["user"].get("password_hash").is_none());

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/login",
                serde_json::json!({"email": "a@b.com", "password": "x"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(set_cookie.starts_with("user="));
        assert!(set_cookie.contains("SameSite=Lax"));

        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["user"]["name"], "Ada");
    }

    #[tokio::test]
    async fn double_registration_returns_conflict() {
        let (app, db) = test_app().await;
        let payload = serde_json::json!({"email": "a@b.com", "password": "x"});

        let first = app
            .clone()
            .oneshot(json_request("POST", "/api/user", payload.clone()))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);

        let second = app
            .oneshot(json_request("POST", "/api/user", payload))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
        let body = body_json(second).await;
        assert_eq!(body["error"]["code"], "conflict");

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(count.0, 1);
    }

    #[tokio::test]
    async fn login_with_missing_fields_is_bad_request() {
        let (app, _db) = test_app().await;
        let response = app
            .oneshot(json_request(
                "POST",
                "/api/login",
                serde_json::json!({"email": "", "password": ""}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn bad_credentials_are_unauthorized_either_way() {
        let (app, _db) = test_app().await;
        app.clone()
            .oneshot(json_request(
                "POST",
                "/api/user",
                serde_json::json!({"email": "a@b.com", "password": "x"}),
            ))
            .await
            .unwrap();

        let wrong_password = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/login",
                serde_json::json!({"email": "a@b.com", "password": "nope"}),
            ))
            .await
            .unwrap();
        let unknown_email = app
            .oneshot(json_request(
                "POST",
                "/api/login",
                serde_json::json!({"email": "z@b.com", "password": "x"}),
            ))
            .await
            .unwrap();

        assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);
        let a = body_json(wrong_password).await;
        let b = body_json(unknown_email).await;
        // Non-enumerable: both failures produce the same response body.
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn register_with_malformed_email_is_rejected() {
        let (app, _db) = test_app().await;
        let response = app
            .oneshot(json_request(
                "POST",
                "/api/user",
                serde_json::json!({"email": "not-an-email", "password": "x"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "validation_error");
    }

    #[tokio::test]
    async fn anonymous_private_navigation_redirects_to_login() {
        let (app, _db) = test_app().await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/dashboard")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/auth");
    }

    #[tokio::test]
    async fn public_pages_are_open_without_a_session() {
        let (app, _db) = test_app().await;
        for path in ["/auth", "/register"] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{path} should be open");
        }
    }

    #[tokio::test]
    async fn session_cookie_opens_private_navigation() {
        let (app, _db) = test_app().await;
        app.clone()
            .oneshot(json_request(
                "POST",
                "/api/user",
                serde_json::json!({"email": "a@b.com", "password": "x"}),
            ))
            .await
            .unwrap();
        let login = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/login",
                serde_json::json!({"email": "a@b.com", "password": "x"}),
            ))
            .await
            .unwrap();
        let set_cookie = login
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        let cookie = set_cookie.split(';').next().unwrap().to_string();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/dashboard")
                    .header(header::COOKIE, cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn corrupt_cookie_degrades_to_logged_out() {
        let (app, _db) = test_app().await;
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/dashboard")
                    .header(header::COOKIE, "user={broken")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }

    #[tokio::test]
    async fn logout_erases_the_session_cookie() {
        let (app, _db) = test_app().await;
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/logout")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(set_cookie.starts_with("user="));
        assert!(set_cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn listing_eager_loads_relations_and_hides_hashes() {
        let (app, db) = test_app().await;
        app.clone()
            .oneshot(json_request(
                "POST",
                "/api/user",
                serde_json::json!({"email": "a@b.com", "password": "x", "name": "Ada"}),
            ))
            .await
            .unwrap();

        let user_id: (String,) = sqlx::query_as("SELECT id FROM users WHERE email = 'a@b.com'")
            .fetch_one(&db)
            .await
            .unwrap();
        sqlx::query("INSERT INTO datasets (id, user_id, name) VALUES ('d1', ?, 'measurements')")
            .bind(&user_id.0)
            .execute(&db)
            .await
            .unwrap();
        sqlx::query("INSERT INTO templates (id, user_id, name) VALUES ('t1', ?, 'report')")
            .bind(&user_id.0)
            .execute(&db)
            .await
            .unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/users")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes_body = response.into_body().collect().await.unwrap().to_bytes();
        let raw = String::from_utf8(bytes_body.to_vec()).unwrap();
        assert!(!raw.contains("password_hash"));

        let body: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["email"], "a@b.com");
        assert_eq!(body[0]["datasets"][0]["name"], "measurements");
        assert_eq!(body[0]["templates"][0]["name"], "report");
    }
}

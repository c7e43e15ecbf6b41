//! Per-navigation route protection.
//!
//! The guard runs once per page navigation, before the response is
//! produced. It hydrates the session from the cookie when memory is
//! empty, lets public paths and authenticated visitors through, and
//! replaces everything else with a redirect to the login path.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;

use crate::config::AuthConfig;
use crate::session::SessionStore;
use crate::AppState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Navigation proceeds.
    Open,
    /// Navigation is replaced with a redirect to the contained path.
    Redirect(String),
}

pub struct RouteGuard {
    public_paths: Vec<String>,
    login_path: String,
}

impl RouteGuard {
    /// The login path must itself appear in `public_paths`, otherwise
    /// redirecting to it would loop. Config defaults satisfy this.
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            public_paths: config.public_paths.clone(),
            login_path: config.login_path.clone(),
        }
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.public_paths.iter().any(|p| p == path)
    }

    pub fn check(&self, path: &str, session: &mut SessionStore, jar: &CookieJar) -> GuardDecision {
        // Hydrate first: a returning visitor has a cookie but an empty
        // in-memory session.
        session.load_user(jar);

        if self.is_public(path) || session.user().is_some() {
            GuardDecision::Open
        } else {
            GuardDecision::Redirect(self.login_path.clone())
        }
    }
}

/// Axum middleware applying the guard to page routes.
pub async fn guard_middleware(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    let mut session = SessionStore::new();
    match state.guard.check(request.uri().path(), &mut session, &jar) {
        GuardDecision::Open => next.run(request).await,
        GuardDecision::Redirect(to) => Redirect::to(&to).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SessionUser;
    use axum_extra::extract::cookie::Cookie;
    use crate::session::SESSION_COOKIE;

    fn guard() -> RouteGuard {
        RouteGuard::new(&AuthConfig::default())
    }

    fn cookie_jar_with_user() -> CookieJar {
        let user = SessionUser {
            id: "u1".to_string(),
            email: "ada@example.com".to_string(),
            name: None,
        };
        CookieJar::new().add(Cookie::new(
            SESSION_COOKIE,
            serde_json::to_string(&user).unwrap(),
        ))
    }

    #[test]
    fn private_path_without_session_redirects_to_login() {
        let mut session = SessionStore::new();
        let decision = guard().check("/dashboard", &mut session, &CookieJar::new());
        assert_eq!(decision, GuardDecision::Redirect("/auth".to_string()));
    }

    #[test]
    fn public_paths_are_open_without_a_session() {
        let mut session = SessionStore::new();
        let jar = CookieJar::new();
        assert_eq!(guard().check("/auth", &mut session, &jar), GuardDecision::Open);
        assert_eq!(
            guard().check("/register", &mut session, &jar),
            GuardDecision::Open
        );
    }

    #[test]
    fn valid_cookie_hydrates_and_opens_private_paths() {
        let mut session = SessionStore::new();
        let decision = guard().check("/dashboard", &mut session, &cookie_jar_with_user());
        assert_eq!(decision, GuardDecision::Open);
        // Hydration populated the session as a side effect.
        assert_eq!(session.user().map(|u| u.id.as_str()), Some("u1"));
    }

    #[test]
    fn corrupt_cookie_is_treated_as_no_session() {
        let jar = CookieJar::new().add(Cookie::new(SESSION_COOKIE, "%%%"));
        let mut session = SessionStore::new();
        let decision = guard().check("/dashboard", &mut session, &jar);
        assert_eq!(decision, GuardDecision::Redirect("/auth".to_string()));
    }

    #[test]
    fn redirect_target_is_itself_public() {
        let g = guard();
        let mut session = SessionStore::new();
        if let GuardDecision::Redirect(to) = g.check("/dashboard", &mut session, &CookieJar::new())
        {
            assert!(g.is_public(&to));
        } else {
            panic!("expected a redirect");
        }
    }
}

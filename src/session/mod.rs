//! Client-side session persistence.
//!
//! A visitor's authenticated identity lives in two places that must
//! never disagree: the in-memory [`SessionStore`] and the `user`
//! cookie. Every mutating operation updates both in one step, which is
//! why the mutators consume and return the [`CookieJar`].

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::db::SessionUser;

/// Name of the cookie carrying the JSON-serialized [`SessionUser`].
pub const SESSION_COOKIE: &str = "user";

/// Holds at most one authenticated identity. Absence means the visitor
/// is not logged in; corruption of the persisted copy degrades to
/// absence, never to an error.
#[derive(Debug, Default)]
pub struct SessionStore {
    user: Option<SessionUser>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(&self) -> Option<&SessionUser> {
        self.user.as_ref()
    }

    /// Store the identity in memory and mirror it into the cookie.
    pub fn set_user(&mut self, jar: CookieJar, user: SessionUser) -> CookieJar {
        let payload = match serde_json::to_string(&user) {
            Ok(payload) => payload,
            Err(e) => {
                // Leave both sides untouched rather than desync them.
                tracing::error!(error = %e, "failed to serialize session user");
                return jar;
            }
        };
        self.user = Some(user);
        jar.add(session_cookie(payload))
    }

    /// Hydrate from the cookie if memory is empty. An unparseable
    /// cookie is logged and treated as "not logged in".
    pub fn load_user(&mut self, jar: &CookieJar) -> Option<&SessionUser> {
        if self.user.is_none() {
            if let Some(cookie) = jar.get(SESSION_COOKIE) {
                match serde_json::from_str::<SessionUser>(cookie.value()) {
                    Ok(user) => self.user = Some(user),
                    Err(e) => {
                        tracing::warn!(error = %e, "discarding unparseable session cookie");
                    }
                }
            }
        }
        self.user.as_ref()
    }

    /// Clear memory and erase the cookie together.
    pub fn logout(&mut self, jar: CookieJar) -> CookieJar {
        self.user = None;
        jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/"))
    }
}

fn session_cookie(payload: String) -> Cookie<'static> {
    // Same-site restricted, but readable by the client: the cookie only
    // ever holds the non-secret identity projection.
    Cookie::build((SESSION_COOKIE, payload))
        .path("/")
        .same_site(SameSite::Lax)
        .build()
}

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod guard;
pub mod session;

pub use db::DbPool;

use std::time::Duration;

use anyhow::Result;
use config::Config;

use crate::auth::{AuthService, Hasher};
use crate::guard::RouteGuard;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub auth: AuthService,
    pub guard: RouteGuard,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Result<Self> {
        let hasher = Hasher::new(&config.auth)?;
        let auth = AuthService::new(
            db.clone(),
            hasher,
            Duration::from_secs(config.server.storage_timeout_secs),
        );
        let guard = RouteGuard::new(&config.auth);
        Ok(Self {
            config,
            db,
            auth,
            guard,
        })
    }
}

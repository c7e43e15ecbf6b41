//! Credential verification: password hashing and the register/login
//! use cases over the user store.

use std::future::Future;
use std::time::Duration;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use thiserror::Error;
use tokio::task;

use crate::config::AuthConfig;
use crate::db::{DbPool, SessionUser, User};

#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing or malformed input; the client can fix and retry.
    #[error("{0}")]
    Validation(&'static str),
    /// Unknown email or wrong password. Deliberately one variant so the
    /// caller cannot tell which part was wrong.
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("email is already registered")]
    DuplicateEmail,
    /// Hashing fault, including a malformed stored digest. Distinct from
    /// a mismatch, which is the expected `false` path of verification.
    #[error("password hashing failed: {0}")]
    Hash(String),
    /// Unexpected persistence-layer fault. Not client-fixable and never
    /// conflated with credential errors.
    #[error("storage fault: {0}")]
    Storage(String),
}

/// Argon2id hasher with the work factor taken from `[auth]` config.
/// Digests are self-contained PHC strings carrying their own salt and
/// parameters, so verification needs no external state.
#[derive(Clone)]
pub struct Hasher {
    argon2: Argon2<'static>,
}

impl Hasher {
    pub fn new(config: &AuthConfig) -> Result<Self, argon2::Error> {
        let params = Params::new(
            config.hash_memory_kib,
            config.hash_iterations,
            config.hash_parallelism,
            None,
        )?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    pub fn hash(&self, password: &str) -> Result<String, argon2::password_hash::Error> {
        let salt = SaltString::generate(&mut OsRng);
        let digest = self.argon2.hash_password(password.as_bytes(), &salt)?;
        Ok(digest.to_string())
    }

    /// `Ok(false)` is the expected mismatch path; `Err` means the stored
    /// digest itself could not be parsed or verified.
    pub fn verify(&self, password: &str, digest: &str) -> Result<bool, argon2::password_hash::Error> {
        let parsed = PasswordHash::new(digest)?;
        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Register and login use cases. Stateless between calls; the user table
/// is the only shared resource, and its UNIQUE constraint is the
/// authoritative arbiter for concurrent registrations.
pub struct AuthService {
    db: DbPool,
    hasher: Hasher,
    storage_timeout: Duration,
}

impl AuthService {
    pub fn new(db: DbPool, hasher: Hasher, storage_timeout: Duration) -> Self {
        Self {
            db,
            hasher,
            storage_timeout,
        }
    }

    /// Create a new user. The email UNIQUE constraint fires at insert
    /// time; there is no lookup-then-insert window.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<User, AuthError> {
        if email.is_empty() {
            return Err(AuthError::Validation("Email is required"));
        }
        if password.is_empty() {
            return Err(AuthError::Validation("Password is required"));
        }

        let password_hash = self.hash_blocking(password.to_string()).await?;

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.to_string(),
            password_hash,
            name: name.map(str::to_string),
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        self.store_call(
            sqlx::query(
                "INSERT INTO users (id, email, password_hash, name, created_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&user.id)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.name)
            .bind(&user.created_at)
            .execute(&self.db),
        )
        .await?;

        tracing::info!(user_id = %user.id, "registered new user");
        Ok(user)
    }

    /// Authenticate and return the non-secret session projection. An
    /// unknown email and a wrong password are indistinguishable to the
    /// caller.
    pub async fn login(&self, email: &str, password: &str) -> Result<SessionUser, AuthError> {
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::Validation("Email and password are required"));
        }

        let user: Option<User> = self
            .store_call(
                sqlx::query_as("SELECT * FROM users WHERE email = ?")
                    .bind(email)
                    .fetch_optional(&self.db),
            )
            .await?;

        let user = user.ok_or(AuthError::InvalidCredentials)?;

        if !self
            .verify_blocking(password.to_string(), user.password_hash.clone())
            .await?
        {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(SessionUser::from(user))
    }

    /// Hashing is the only CPU-bound step; keep it off the async workers.
    async fn hash_blocking(&self, password: String) -> Result<String, AuthError> {
        let hasher = self.hasher.clone();
        task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AuthError::Hash(e.to_string()))?
            .map_err(|e| AuthError::Hash(e.to_string()))
    }

    async fn verify_blocking(&self, password: String, digest: String) -> Result<bool, AuthError> {
        let hasher = self.hasher.clone();
        task::spawn_blocking(move || hasher.verify(&password, &digest))
            .await
            .map_err(|e| AuthError::Hash(e.to_string()))?
            .map_err(|e| AuthError::Hash(e.to_string()))
    }

    /// Run a storage call under the configured timeout and translate
    /// sqlx errors into the domain taxonomy.
    async fn store_call<T>(
        &self,
        fut: impl Future<Output = Result<T, sqlx::Error>>,
    ) -> Result<T, AuthError> {
        match tokio::time::timeout(self.storage_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(map_store_error(e)),
            Err(_) => Err(AuthError::Storage("storage call timed out".to_string())),
        }
    }
}

fn map_store_error(err: sqlx::Error) -> AuthError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.message().contains("UNIQUE constraint failed") {
            return AuthError::DuplicateEmail;
        }
    }
    AuthError::Storage(err.to_string())
}

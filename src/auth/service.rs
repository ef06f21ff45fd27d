//!
//! # Authentication Service
//!
//! [`AuthService`] owns the account lifecycle: registration, credential
//! checks, session issue/teardown, and turning an incoming cookie token back
//! into a user. It talks to storage through trait objects, so the HTTP layer
//! and the tests wire it to whichever backend they need.

use serde_json::Value;
use std::sync::Arc;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::session::SessionStore;
use crate::error::ApiError;
use crate::models::user::{NewUser, UserStore, UserView};
use crate::validation::{Schema, SchemaError, Validator};

/// What a session cookie turned out to mean for this request.
#[derive(Debug)]
pub enum Hydration {
    /// No cookie was sent.
    Anonymous,
    /// Live session; the user behind it.
    Active(UserView),
    /// A cookie was sent but no usable session backs it. The response should
    /// tell the browser to drop it.
    Stale,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    validator: Validator,
    register_schema: Schema,
    login_schema: Schema,
}

impl AuthService {
    /// Compiles the auth schemas up front; a bad rule string means the
    /// process never starts.
    pub fn new(
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
        validator: Validator,
    ) -> Result<Self, SchemaError> {
        let register_schema = Schema::build(&[
            ("username", &["required", "min:3", "max:50"]),
            ("email", &["required", "email", "unique:users,email"]),
            ("password", &["required", "min:6", "password_strength"]),
        ])?;
        let login_schema = Schema::build(&[
            ("email", &["required", "email"]),
            ("password", &["required"]),
        ])?;
        Ok(Self {
            users,
            sessions,
            validator,
            register_schema,
            login_schema,
        })
    }

    /// Validates and creates an account. No session is issued; the client is
    /// expected to log in next.
    pub async fn register(&self, body: &Value) -> Result<i64, ApiError> {
        let data = self.validator.validate(&self.register_schema, body).await?;
        let password_hash = hash_password(data.str("password"))?;
        let user = NewUser {
            username: data.str("username").to_string(),
            email: data.str("email").to_string(),
            password_hash,
        };
        self.users.create(user).await.map_err(|err| {
            log::error!("User insert failed during registration: {}", err);
            ApiError::ServerError(
                "Failed to register user. Possible duplicate email or database issue.".into(),
            )
        })
    }

    /// Checks credentials and opens a session.
    ///
    /// Unknown email and wrong password take the same exit so the responses
    /// cannot be told apart. A `prior_token` from the request cookie is
    /// destroyed before the new session is created, giving each login a
    /// fresh token.
    pub async fn login(
        &self,
        body: &Value,
        prior_token: Option<&str>,
    ) -> Result<(String, UserView), ApiError> {
        let data = self.validator.validate(&self.login_schema, body).await?;

        let user = self
            .users
            .find_by_email(data.str("email"))
            .await?
            .ok_or_else(invalid_credentials)?;
        if !verify_password(data.str("password"), &user.password_hash)? {
            return Err(invalid_credentials());
        }

        if let Some(token) = prior_token {
            self.sessions.destroy(token);
        }
        let token = self.sessions.create(user.id);

        Ok((token, UserView::from(&user)))
    }

    pub fn logout(&self, token: &str) {
        self.sessions.destroy(token);
    }

    /// Used when an account is deleted: no session may outlive it.
    pub fn revoke_user_sessions(&self, user_id: i64) {
        self.sessions.destroy_user_sessions(user_id);
    }

    /// Resolves a request's cookie token into a user.
    ///
    /// A token whose session is gone, or whose user row no longer exists, is
    /// stale; the latter also purges the orphaned session. A storage failure
    /// during the lookup keeps the session and degrades to anonymous rather
    /// than logging the user out over a hiccup.
    pub async fn hydrate(&self, token: Option<&str>) -> Hydration {
        let Some(token) = token else {
            return Hydration::Anonymous;
        };
        let Some(user_id) = self.sessions.resolve(token) else {
            return Hydration::Stale;
        };
        match self.users.find_view(user_id).await {
            Ok(Some(user)) => Hydration::Active(user),
            Ok(None) => {
                self.sessions.destroy(token);
                Hydration::Stale
            }
            Err(err) => {
                log::warn!("User lookup failed during session hydration: {}", err);
                Hydration::Anonymous
            }
        }
    }
}

fn invalid_credentials() -> ApiError {
    ApiError::Unauthorized("Invalid email or password.".into())
}

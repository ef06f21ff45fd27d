use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde_json::{json, Value};

use crate::auth::guard::CurrentUser;
use crate::auth::service::AuthService;
use crate::auth::session::{clear_cookie, issue_cookie, SESSION_COOKIE};
use crate::config::Config;
use crate::error::ApiError;

/// Register a new user
///
/// Creates the account but does not log it in; the client is expected to
/// call `/login` next.
pub async fn register(
    auth: web::Data<AuthService>,
    body: web::Json<Value>,
) -> Result<impl Responder, ApiError> {
    auth.register(&body).await?;

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Registration successful. Please log in.",
    })))
}

/// Login user
///
/// Checks credentials, opens a session and sets the session cookie. Logging
/// in over an existing session replaces it with a fresh token.
pub async fn login(
    auth: web::Data<AuthService>,
    config: web::Data<Config>,
    req: HttpRequest,
    body: web::Json<Value>,
) -> Result<impl Responder, ApiError> {
    let prior = req.cookie(SESSION_COOKIE);
    let (token, user) = auth
        .login(&body, prior.as_ref().map(|cookie| cookie.value()))
        .await?;

    Ok(HttpResponse::Ok()
        .cookie(issue_cookie(&token, &config))
        .json(json!({
            "success": true,
            "message": "Login successful",
            "user": user,
        })))
}

/// Tears down the session behind the request cookie and tells the browser
/// to drop it.
pub async fn logout(
    auth: web::Data<AuthService>,
    req: HttpRequest,
    _user: CurrentUser,
) -> Result<impl Responder, ApiError> {
    if let Some(cookie) = req.cookie(SESSION_COOKIE) {
        auth.logout(cookie.value());
    }

    Ok(HttpResponse::Ok().cookie(clear_cookie()).json(json!({
        "success": true,
        "message": "Logged out successfully.",
    })))
}

/// Reports whether the request carries a live session. Always 200; the
/// `authenticated` flag carries the answer so frontends can poll it freely.
pub async fn check_auth(user: Option<CurrentUser>) -> Result<impl Responder, ApiError> {
    let body = match user {
        Some(CurrentUser(user)) => json!({
            "success": true,
            "message": "Operation successful.",
            "authenticated": true,
            "user": user,
        }),
        None => json!({
            "success": true,
            "message": "Operation successful.",
            "authenticated": false,
            "user": null,
        }),
    };

    Ok(HttpResponse::Ok().json(body))
}

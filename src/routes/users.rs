use actix_web::{web, HttpResponse, Responder};
use serde_json::{json, Value};

use crate::auth::guard::CurrentUser;
use crate::auth::password::hash_password;
use crate::auth::service::AuthService;
use crate::auth::session::clear_cookie;
use crate::error::ApiError;
use crate::models::{UserChanges, UserStore};
use crate::routes::Schemas;
use crate::validation::{Schema, SchemaError, Validator};

pub(super) fn profile_schema() -> Result<Schema, SchemaError> {
    Schema::build(&[
        ("username", &["required", "min:3", "max:50"]),
        ("email", &["required", "email", "unique:users,email"]),
        ("password", &["required", "min:6", "password_strength"]),
    ])
}

/// Fetch the user's own profile. Asking for anyone else's is a 403, not a
/// 404: the route is self-service only, it does not hide which ids exist.
pub async fn get_user(
    users: web::Data<dyn UserStore>,
    user: CurrentUser,
    user_id: web::Path<i64>,
) -> Result<impl Responder, ApiError> {
    let user_id = user_id.into_inner();
    if user_id != user.0.id {
        return Err(ApiError::Forbidden(
            "Forbidden: You can only access your own user data.".into(),
        ));
    }

    let view = users
        .find_view(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found.".into()))?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Operation successful.",
        "data": view,
    })))
}

/// Partial profile update: username, email and/or password.
///
/// The email uniqueness check excludes the user's own row, so re-submitting
/// the current address passes. A password sent as `null` or `""` means
/// "keep the old one" and is dropped before validation.
pub async fn update_user(
    validator: web::Data<Validator>,
    schemas: web::Data<Schemas>,
    users: web::Data<dyn UserStore>,
    user: CurrentUser,
    user_id: web::Path<i64>,
    body: web::Json<Value>,
) -> Result<impl Responder, ApiError> {
    let user_id = user_id.into_inner();
    if user_id != user.0.id {
        return Err(ApiError::Forbidden(
            "Forbidden: You can only update your own user data.".into(),
        ));
    }

    let mut payload = body.into_inner();
    if let Some(object) = payload.as_object_mut() {
        let blank = match object.get("password") {
            Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty(),
            _ => false,
        };
        if blank {
            object.remove("password");
        }
    }

    let schema = schemas.profile.with_except_id("email", user_id);
    let data = validator.validate_partial(&schema, &payload).await?;

    let mut changes = UserChanges::default();
    if data.has("username") {
        changes.username = Some(data.str("username").to_string());
    }
    if data.has("email") {
        changes.email = Some(data.str("email").to_string());
    }
    if data.has("password") {
        changes.password_hash = Some(hash_password(data.str("password"))?);
    }

    if !users.update(user_id, changes).await? {
        return Err(ApiError::ServerError("Failed to update user.".into()));
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "User updated successfully.",
    })))
}

/// Deletes the account with everything it owns, then revokes every session
/// the user still has open.
pub async fn delete_user(
    users: web::Data<dyn UserStore>,
    auth: web::Data<AuthService>,
    user: CurrentUser,
    user_id: web::Path<i64>,
) -> Result<impl Responder, ApiError> {
    let user_id = user_id.into_inner();
    if user_id != user.0.id {
        return Err(ApiError::Forbidden(
            "Forbidden: You can only delete your own account.".into(),
        ));
    }

    if !users.delete(user_id).await? {
        return Err(ApiError::ServerError("Failed to delete user account.".into()));
    }
    auth.revoke_user_sessions(user_id);

    Ok(HttpResponse::Ok().cookie(clear_cookie()).json(json!({
        "success": true,
        "message": "User account and all associated data deleted successfully.",
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::middleware::SessionHydration;
    use crate::auth::session::{MemorySessionStore, SESSION_COOKIE};
    use crate::store::MemStore;
    use actix_web::cookie::Cookie;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use std::sync::Arc;
    use std::time::Duration;

    async fn logged_in() -> (Arc<MemStore>, Validator, AuthService, i64, Cookie<'static>) {
        let store = Arc::new(MemStore::new());
        let sessions = Arc::new(MemorySessionStore::new(Duration::from_secs(86400)));
        let validator = Validator::new(store.clone());
        let auth = AuthService::new(store.clone(), sessions, validator.clone()).unwrap();
        let user_id = auth
            .register(&json!({
                "username": "alice",
                "email": "alice@example.com",
                "password": "Passw0rd",
            }))
            .await
            .unwrap();
        let (token, _) = auth
            .login(&json!({"email": "alice@example.com", "password": "Passw0rd"}), None)
            .await
            .unwrap();
        (store, validator, auth, user_id, Cookie::new(SESSION_COOKIE, token))
    }

    macro_rules! user_app {
        ($store:expr, $validator:expr, $auth:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($validator))
                    .app_data(web::Data::new($auth.clone()))
                    .app_data(web::Data::new(Schemas::build().unwrap()))
                    .app_data(web::Data::from($store.clone() as Arc<dyn UserStore>))
                    .wrap(SessionHydration::new($auth.clone()))
                    .route("/users/{id}", web::get().to(get_user))
                    .route("/users/{id}", web::put().to(update_user))
                    .route("/users/{id}", web::delete().to(delete_user)),
            )
            .await
        };
    }

    #[actix_rt::test]
    async fn test_profile_is_self_service_only() {
        let (store, validator, auth, user_id, cookie) = logged_in().await;
        let app = user_app!(store, validator, auth);
        let foreign = format!("/users/{}", user_id + 1);

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri(&foreign)
                .cookie(cookie.clone())
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(
            body["message"],
            "Forbidden: You can only access your own user data."
        );

        let resp = test::call_service(
            &app,
            test::TestRequest::put()
                .uri(&foreign)
                .cookie(cookie.clone())
                .set_json(json!({"username": "intruder"}))
                .to_request(),
        )
        .await;
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(
            body["message"],
            "Forbidden: You can only update your own user data."
        );

        let resp = test::call_service(
            &app,
            test::TestRequest::delete()
                .uri(&foreign)
                .cookie(cookie)
                .to_request(),
        )
        .await;
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(
            body["message"],
            "Forbidden: You can only delete your own account."
        );
    }

    #[actix_rt::test]
    async fn test_own_email_passes_the_unique_check() {
        let (store, validator, auth, user_id, cookie) = logged_in().await;
        let app = user_app!(store, validator, auth);

        // resubmitting the current address collides only with the own row
        let resp = test::call_service(
            &app,
            test::TestRequest::put()
                .uri(&format!("/users/{}", user_id))
                .cookie(cookie.clone())
                .set_json(json!({"email": "alice@example.com", "username": "alice2"}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "User updated successfully.");

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri(&format!("/users/{}", user_id))
                .cookie(cookie)
                .to_request(),
        )
        .await;
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["username"], "alice2");
        assert_eq!(body["data"]["email"], "alice@example.com");
    }

    #[actix_rt::test]
    async fn test_blank_password_is_dropped_not_validated() {
        let (store, validator, auth, user_id, cookie) = logged_in().await;
        let app = user_app!(store, validator, auth);

        let resp = test::call_service(
            &app,
            test::TestRequest::put()
                .uri(&format!("/users/{}", user_id))
                .cookie(cookie.clone())
                .set_json(json!({"username": "alice3", "password": ""}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        // the old password still works
        assert!(auth
            .login(&json!({"email": "alice@example.com", "password": "Passw0rd"}), None)
            .await
            .is_ok());

        // a blank password on its own leaves nothing to update
        let resp = test::call_service(
            &app,
            test::TestRequest::put()
                .uri(&format!("/users/{}", user_id))
                .cookie(cookie)
                .set_json(json!({"password": null}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "No data provided for update.");
    }

    #[actix_rt::test]
    async fn test_password_change_swaps_the_accepted_credentials() {
        let (store, validator, auth, user_id, cookie) = logged_in().await;
        let app = user_app!(store, validator, auth);

        let resp = test::call_service(
            &app,
            test::TestRequest::put()
                .uri(&format!("/users/{}", user_id))
                .cookie(cookie)
                .set_json(json!({"password": "NewPassw0rd"}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        assert!(auth
            .login(&json!({"email": "alice@example.com", "password": "Passw0rd"}), None)
            .await
            .is_err());
        assert!(auth
            .login(&json!({"email": "alice@example.com", "password": "NewPassw0rd"}), None)
            .await
            .is_ok());
    }

    #[actix_rt::test]
    async fn test_delete_account_revokes_the_session() {
        let (store, validator, auth, user_id, cookie) = logged_in().await;
        let app = user_app!(store, validator, auth);

        let resp = test::call_service(
            &app,
            test::TestRequest::delete()
                .uri(&format!("/users/{}", user_id))
                .cookie(cookie.clone())
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(
            body["message"],
            "User account and all associated data deleted successfully."
        );

        // the cookie authenticates nothing anymore
        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri(&format!("/users/{}", user_id))
                .cookie(cookie)
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}

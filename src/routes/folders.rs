use actix_web::{web, HttpResponse, Responder};
use serde_json::{json, Value};

use crate::auth::guard::CurrentUser;
use crate::error::ApiError;
use crate::models::FolderStore;
use crate::routes::Schemas;
use crate::validation::{Schema, SchemaError, Validator};

const FOLDER_NOT_FOUND: &str = "Folder not found or you do not have access.";

pub(super) fn folder_schema() -> Result<Schema, SchemaError> {
    Schema::build(&[("name", &["required", "min:1", "max:255"])])
}

/// Create a folder
pub async fn create_folder(
    validator: web::Data<Validator>,
    schemas: web::Data<Schemas>,
    folders: web::Data<dyn FolderStore>,
    user: CurrentUser,
    body: web::Json<Value>,
) -> Result<impl Responder, ApiError> {
    let data = validator.validate(&schemas.folder, &body).await?;
    let folder = folders.create(user.0.id, data.str("name")).await?;

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Folder created successfully.",
        "folder": folder,
    })))
}

/// List the user's folders, newest first
pub async fn get_folders(
    folders: web::Data<dyn FolderStore>,
    user: CurrentUser,
) -> Result<impl Responder, ApiError> {
    let folders = folders.list(user.0.id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Operation successful.",
        "folders": folders,
    })))
}

/// Fetch one folder. A folder owned by someone else looks exactly like one
/// that does not exist.
pub async fn get_folder(
    folders: web::Data<dyn FolderStore>,
    user: CurrentUser,
    folder_id: web::Path<i64>,
) -> Result<impl Responder, ApiError> {
    let folder = folders
        .find(folder_id.into_inner(), user.0.id)
        .await?
        .ok_or_else(|| ApiError::NotFound(FOLDER_NOT_FOUND.into()))?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Operation successful.",
        "folder": folder,
    })))
}

/// Rename a folder
pub async fn update_folder(
    validator: web::Data<Validator>,
    schemas: web::Data<Schemas>,
    folders: web::Data<dyn FolderStore>,
    user: CurrentUser,
    folder_id: web::Path<i64>,
    body: web::Json<Value>,
) -> Result<impl Responder, ApiError> {
    let data = validator.validate(&schemas.folder, &body).await?;
    let folder_id = folder_id.into_inner();

    if !folders.exists(folder_id, user.0.id).await? {
        return Err(ApiError::NotFound(FOLDER_NOT_FOUND.into()));
    }
    if !folders.rename(folder_id, user.0.id, data.str("name")).await? {
        return Err(ApiError::ServerError("Failed to update folder.".into()));
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Folder updated successfully.",
    })))
}

/// Delete a folder together with every task inside it
pub async fn delete_folder(
    folders: web::Data<dyn FolderStore>,
    user: CurrentUser,
    folder_id: web::Path<i64>,
) -> Result<impl Responder, ApiError> {
    if !folders.delete(folder_id.into_inner(), user.0.id).await? {
        return Err(ApiError::NotFound(
            "Folder not found or you do not have access, or it has tasks that prevent deletion."
                .into(),
        ));
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Folder and associated tasks deleted successfully.",
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::middleware::SessionHydration;
    use crate::auth::service::AuthService;
    use crate::auth::session::{MemorySessionStore, SESSION_COOKIE};
    use crate::store::MemStore;
    use actix_web::cookie::Cookie;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use std::sync::Arc;
    use std::time::Duration;

    async fn logged_in() -> (Arc<MemStore>, Validator, AuthService, Cookie<'static>) {
        let store = Arc::new(MemStore::new());
        let sessions = Arc::new(MemorySessionStore::new(Duration::from_secs(86400)));
        let validator = Validator::new(store.clone());
        let auth = AuthService::new(store.clone(), sessions, validator.clone()).unwrap();
        auth.register(&json!({
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
        (store, validator, auth, Cookie::new(SESSION_COOKIE, token))
    }

    macro_rules! folder_app {
        ($store:expr, $validator:expr, $auth:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($validator))
                    .app_data(web::Data::new(Schemas::build().unwrap()))
                    .app_data(web::Data::from($store.clone() as Arc<dyn FolderStore>))
                    .wrap(SessionHydration::new($auth))
                    .route("/folders", web::post().to(create_folder))
                    .route("/folders", web::get().to(get_folders))
                    .route("/folders/{id}", web::get().to(get_folder))
                    .route("/folders/{id}", web::put().to(update_folder))
                    .route("/folders/{id}", web::delete().to(delete_folder)),
            )
            .await
        };
    }

    #[actix_rt::test]
    async fn test_create_then_list_folders() {
        let (store, validator, auth, cookie) = logged_in().await;
        let app = folder_app!(store, validator, auth);

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/folders")
                .cookie(cookie.clone())
                .set_json(json!({"name": "  Work  "}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Folder created successfully.");
        assert_eq!(body["folder"]["name"], "Work");

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/folders")
                .cookie(cookie)
                .to_request(),
        )
        .await;
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["folders"].as_array().unwrap().len(), 1);
        assert_eq!(body["folders"][0]["name"], "Work");
    }

    #[actix_rt::test]
    async fn test_folder_routes_require_login() {
        let (store, validator, auth, _) = logged_in().await;
        let app = folder_app!(store, validator, auth);

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/folders").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(
            body["message"],
            "Unauthorized: Please log in to access this resource."
        );
    }

    #[actix_rt::test]
    async fn test_missing_folder_is_not_found() {
        let (store, validator, auth, cookie) = logged_in().await;
        let app = folder_app!(store, validator, auth);

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/folders/999")
                .cookie(cookie)
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], FOLDER_NOT_FOUND);
    }

    #[actix_rt::test]
    async fn test_update_folder_validates_the_name() {
        let (store, validator, auth, cookie) = logged_in().await;
        let app = folder_app!(store, validator, auth);

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/folders")
                .cookie(cookie.clone())
                .set_json(json!({"name": "Work"}))
                .to_request(),
        )
        .await;
        let body: Value = test::read_body_json(resp).await;
        let id = body["folder"]["id"].as_i64().unwrap();

        let resp = test::call_service(
            &app,
            test::TestRequest::put()
                .uri(&format!("/folders/{}", id))
                .cookie(cookie.clone())
                .set_json(json!({"name": ""}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["errors"]["name"][0], "Name is required.");

        let resp = test::call_service(
            &app,
            test::TestRequest::put()
                .uri(&format!("/folders/{}", id))
                .cookie(cookie)
                .set_json(json!({"name": "Chores"}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Folder updated successfully.");
    }
}

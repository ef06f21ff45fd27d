pub mod auth;
pub mod folders;
pub mod health;
pub mod tasks;
pub mod users;

use actix_web::{web, HttpResponse};

use crate::error::ApiError;
use crate::validation::{Schema, SchemaError};

/// Every request schema, compiled once at startup. A bad rule string stops
/// the process before it ever binds a socket.
#[derive(Clone)]
pub struct Schemas {
    pub folder: Schema,
    pub task_create: Schema,
    pub task_update: Schema,
    pub profile: Schema,
}

impl Schemas {
    pub fn build() -> Result<Self, SchemaError> {
        Ok(Self {
            folder: folders::folder_schema()?,
            task_create: tasks::create_schema()?,
            task_update: tasks::update_schema()?,
            profile: users::profile_schema()?,
        })
    }
}

/// A known path hit with a method it does not serve.
async fn method_not_allowed() -> Result<HttpResponse, ApiError> {
    Err(ApiError::MethodNotAllowed)
}

/// Everything outside the route table.
async fn not_found() -> Result<HttpResponse, ApiError> {
    Err(ApiError::NotFound("Not Found".into()))
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|_err, _req| ApiError::BadRequest("Invalid JSON payload.".into()).into()),
    )
    .app_data(
        // a non-numeric {id} segment is an unknown path, not a bad request
        web::PathConfig::default()
            .error_handler(|_err, _req| ApiError::NotFound("Not Found".into()).into()),
    )
    .service(
        web::resource("/register")
            .route(web::post().to(auth::register))
            .default_service(web::route().to(method_not_allowed)),
    )
    .service(
        web::resource("/login")
            .route(web::post().to(auth::login))
            .default_service(web::route().to(method_not_allowed)),
    )
    .service(
        web::resource("/logout")
            .route(web::post().to(auth::logout))
            .default_service(web::route().to(method_not_allowed)),
    )
    .service(
        web::resource("/check-auth")
            .route(web::get().to(auth::check_auth))
            .default_service(web::route().to(method_not_allowed)),
    )
    .service(
        web::resource("/folders")
            .route(web::get().to(folders::get_folders))
            .route(web::post().to(folders::create_folder))
            .default_service(web::route().to(method_not_allowed)),
    )
    .service(
        web::resource("/folders/{id}")
            .route(web::get().to(folders::get_folder))
            .route(web::put().to(folders::update_folder))
            .route(web::delete().to(folders::delete_folder))
            .default_service(web::route().to(method_not_allowed)),
    )
    .service(
        web::resource("/tasks")
            .route(web::get().to(tasks::get_tasks))
            .route(web::post().to(tasks::create_task))
            .default_service(web::route().to(method_not_allowed)),
    )
    .service(
        web::resource("/tasks/{id}")
            .route(web::get().to(tasks::get_task))
            .route(web::put().to(tasks::update_task))
            .route(web::delete().to(tasks::delete_task))
            .default_service(web::route().to(method_not_allowed)),
    )
    .service(
        web::resource("/users/{id}")
            .route(web::get().to(users::get_user))
            .route(web::put().to(users::update_user))
            .route(web::delete().to(users::delete_user))
            .default_service(web::route().to(method_not_allowed)),
    )
    .service(
        web::resource("/health")
            .route(web::get().to(health::health))
            .default_service(web::route().to(method_not_allowed)),
    )
    .default_service(web::route().to(not_found));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::middleware::SessionHydration;
    use crate::auth::service::AuthService;
    use crate::auth::session::{MemorySessionStore, SESSION_COOKIE};
    use crate::config::Config;
    use crate::models::{FolderStore, TaskStore, UserStore};
    use crate::store::MemStore;
    use crate::validation::{UniqueProbe, Validator};
    use actix_web::cookie::Cookie;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;

    fn auth_service(store: &Arc<MemStore>) -> AuthService {
        let sessions = Arc::new(MemorySessionStore::new(Duration::from_secs(86400)));
        let validator = Validator::new(store.clone() as Arc<dyn UniqueProbe>);
        AuthService::new(store.clone(), sessions, validator).unwrap()
    }

    macro_rules! full_app {
        ($store:expr, $auth:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($auth.clone()))
                    .app_data(web::Data::new(Validator::new(
                        $store.clone() as Arc<dyn UniqueProbe>
                    )))
                    .app_data(web::Data::new(Config::default()))
                    .app_data(web::Data::new(Schemas::build().unwrap()))
                    .app_data(web::Data::from($store.clone() as Arc<dyn UserStore>))
                    .app_data(web::Data::from($store.clone() as Arc<dyn FolderStore>))
                    .app_data(web::Data::from($store.clone() as Arc<dyn TaskStore>))
                    .wrap(SessionHydration::new($auth.clone()))
                    .configure(config),
            )
            .await
        };
    }

    #[actix_rt::test]
    async fn test_known_path_wrong_method_is_405() {
        let store = Arc::new(MemStore::new());
        let auth = auth_service(&store);
        let app = full_app!(store, auth);

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/register").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Method Not Allowed");
    }

    #[actix_rt::test]
    async fn test_unknown_path_is_404() {
        let store = Arc::new(MemStore::new());
        let auth = auth_service(&store);
        let app = full_app!(store, auth);

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/no-such-route").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Not Found");
    }

    #[actix_rt::test]
    async fn test_malformed_json_is_rejected_with_the_envelope() {
        let store = Arc::new(MemStore::new());
        let auth = auth_service(&store);
        let app = full_app!(store, auth);

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/register")
                .insert_header(("content-type", "application/json"))
                .set_payload("{not json")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Invalid JSON payload.");
    }

    #[actix_rt::test]
    async fn test_non_numeric_id_reads_as_unknown_path() {
        let store = Arc::new(MemStore::new());
        let auth = auth_service(&store);
        let app = full_app!(store, auth);

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

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/folders/abc")
                .cookie(Cookie::new(SESSION_COOKIE, token))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Not Found");
    }

    #[actix_rt::test]
    async fn test_health_is_reachable_without_a_session() {
        let store = Arc::new(MemStore::new());
        let auth = auth_service(&store);
        let app = full_app!(store, auth);

        let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request())
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}

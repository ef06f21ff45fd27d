use actix_cors::Cors;
use actix_web::http::header::HeaderName;
use actix_web::middleware::Logger;
use actix_web::{http::header, web, App, HttpServer};
use std::sync::Arc;
use std::time::Duration;

use tasknest::auth::{AuthService, MemorySessionStore, SessionHydration};
use tasknest::config::Config;
use tasknest::models::{FolderStore, TaskStore, UserStore};
use tasknest::routes::{self, Schemas};
use tasknest::store::PgStore;
use tasknest::validation::{UniqueProbe, Validator};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = Config::from_env();
    let pool = sqlx::PgPool::connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    let store = Arc::new(PgStore::new(pool));
    let users: Arc<dyn UserStore> = store.clone();
    let folders: Arc<dyn FolderStore> = store.clone();
    let tasks: Arc<dyn TaskStore> = store.clone();
    let probe: Arc<dyn UniqueProbe> = store;

    let sessions = Arc::new(MemorySessionStore::new(Duration::from_secs(
        config.session_ttl_secs,
    )));
    let validator = Validator::new(probe);
    let schemas = Schemas::build().expect("request schemas must compile");
    let auth = AuthService::new(users.clone(), sessions, validator.clone())
        .expect("auth schemas must compile");

    println!("Starting TaskNest server at {}", config.server_url());

    let bind_addr = (config.server_host.clone(), config.server_port);
    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&config.allowed_origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                header::CONTENT_TYPE,
                header::AUTHORIZATION,
                HeaderName::from_static("x-requested-with"),
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(auth.clone()))
            .app_data(web::Data::new(validator.clone()))
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(schemas.clone()))
            .app_data(web::Data::from(users.clone()))
            .app_data(web::Data::from(folders.clone()))
            .app_data(web::Data::from(tasks.clone()))
            .wrap(SessionHydration::new(auth.clone()))
            .wrap(cors)
            .wrap(Logger::default())
            .configure(routes::config)
    })
    .bind(bind_addr)?
    .run()
    .await
}

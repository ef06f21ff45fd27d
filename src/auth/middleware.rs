use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;

use crate::auth::service::{AuthService, Hydration};
use crate::auth::session::{clear_cookie, SESSION_COOKIE};

/// Resolves the session cookie before any handler runs.
///
/// A live session puts the [`crate::models::UserView`] into the request
/// extensions for the extractors to pick up. A cookie that no longer maps to
/// a session gets a removal cookie attached to whatever response the handler
/// produces. This middleware never rejects a request on its own; deciding
/// whether anonymous access is acceptable is the route's job.
pub struct SessionHydration {
    auth: AuthService,
}

impl SessionHydration {
    pub fn new(auth: AuthService) -> Self {
        Self { auth }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SessionHydration
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = SessionHydrationService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SessionHydrationService {
            service: Rc::new(service),
            auth: self.auth.clone(),
        }))
    }
}

pub struct SessionHydrationService<S> {
    service: Rc<S>,
    auth: AuthService,
}

impl<S, B> Service<ServiceRequest> for SessionHydrationService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let auth = self.auth.clone();

        Box::pin(async move {
            let token = req
                .cookie(SESSION_COOKIE)
                .map(|cookie| cookie.value().to_owned());

            let mut stale = false;
            match auth.hydrate(token.as_deref()).await {
                Hydration::Active(user) => {
                    req.extensions_mut().insert(user);
                }
                Hydration::Stale => stale = true,
                Hydration::Anonymous => {}
            }

            let mut res = service.call(req).await?;
            if stale {
                let _ = res.response_mut().add_removal_cookie(&clear_cookie());
            }
            Ok(res)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::MemorySessionStore;
    use crate::models::UserView;
    use crate::store::MemStore;
    use crate::validation::Validator;
    use actix_web::cookie::Cookie;
    use actix_web::{test, web, App, HttpRequest, HttpResponse};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    async fn whoami(req: HttpRequest) -> HttpResponse {
        match req.extensions().get::<UserView>() {
            Some(user) => HttpResponse::Ok().body(user.username.clone()),
            None => HttpResponse::Ok().body("anonymous"),
        }
    }

    async fn logged_in_service() -> (AuthService, String) {
        let store = Arc::new(MemStore::new());
        let sessions = Arc::new(MemorySessionStore::new(Duration::from_secs(86400)));
        let validator = Validator::new(store.clone());
        let auth = AuthService::new(store, sessions, validator).unwrap();
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
        (auth, token)
    }

    #[actix_rt::test]
    async fn test_live_cookie_fills_request_extensions() {
        let (auth, token) = logged_in_service().await;
        let app = test::init_service(
            App::new()
                .wrap(SessionHydration::new(auth))
                .route("/whoami", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/whoami")
            .cookie(Cookie::new(SESSION_COOKIE, token))
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body, "alice");
    }

    #[actix_rt::test]
    async fn test_missing_cookie_stays_anonymous() {
        let (auth, _) = logged_in_service().await;
        let app = test::init_service(
            App::new()
                .wrap(SessionHydration::new(auth))
                .route("/whoami", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get().uri("/whoami").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.response().cookies().next().is_none());
        assert_eq!(test::read_body(resp).await, "anonymous");
    }

    #[actix_rt::test]
    async fn test_stale_cookie_gets_a_removal_cookie() {
        let (auth, _) = logged_in_service().await;
        let app = test::init_service(
            App::new()
                .wrap(SessionHydration::new(auth))
                .route("/whoami", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/whoami")
            .cookie(Cookie::new(SESSION_COOKIE, "forged-or-expired"))
            .to_request();
        let resp = test::call_service(&app, req).await;

        let removal = resp
            .response()
            .cookies()
            .find(|c| c.name() == SESSION_COOKIE)
            .unwrap();
        assert_eq!(removal.value(), "");
        assert_eq!(test::read_body(resp).await, "anonymous");
    }
}

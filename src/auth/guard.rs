use actix_web::dev::Payload;
use actix_web::{Error as ActixError, FromRequest, HttpMessage, HttpRequest};
use std::future::{ready, Ready};

use crate::error::ApiError;
use crate::models::UserView;

/// Extracts the logged-in user from request extensions.
///
/// `SessionHydration` runs first and inserts a [`UserView`] whenever the
/// request carried a live session cookie. Routes that take a `CurrentUser`
/// parameter are therefore login-walled: no live session means the handler
/// never runs and the client gets a 401. Routes that merely want to know
/// who is asking can take `Option<CurrentUser>` instead.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserView);

impl FromRequest for CurrentUser {
    type Error = ActixError; // ApiError converts via ResponseError
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match req.extensions().get::<UserView>().cloned() {
            Some(user) => ready(Ok(CurrentUser(user))),
            None => {
                let err = ApiError::Unauthorized(
                    "Unauthorized: Please log in to access this resource.".to_string(),
                );
                ready(Err(err.into()))
            }
        }
    }
}

//! Actix cookie jar for the session artifact.
//!
//! Handlers extract [`SessionCookies`], pass it to the session lifecycle as a
//! [`SessionCookieJar`], then [`SessionCookies::apply`] the pending cookies to
//! their response. Reads observe writes made earlier in the same request.

use std::collections::HashMap;

use actix_web::cookie::{Cookie, SameSite, time::Duration as CookieDuration};
use actix_web::{FromRequest, HttpRequest, HttpResponse, dev::Payload};
use futures_util::future::{Ready, ready};
use tracing::warn;

use crate::domain::ports::SessionCookieJar;
use crate::domain::session::{CookieLifetime, SameSitePolicy, SessionCookie};

/// Request cookies plus the cookies a handler wants to send back.
#[derive(Debug, Clone, Default)]
pub struct SessionCookies {
    values: HashMap<String, Option<String>>,
    pending: Vec<Cookie<'static>>,
}

impl SessionCookies {
    /// Snapshot the cookies sent with `req`. Unparsable cookie headers read
    /// as no cookies.
    pub fn from_http_request(req: &HttpRequest) -> Self {
        let values = match req.cookies() {
            Ok(cookies) => cookies
                .iter()
                .map(|cookie| (cookie.name().to_owned(), Some(cookie.value().to_owned())))
                .collect(),
            Err(error) => {
                warn!(error = %error, "ignoring unparsable cookie header");
                HashMap::new()
            }
        };
        Self {
            values,
            pending: Vec::new(),
        }
    }

    /// Cookies queued for the response, in write order.
    pub fn pending(&self) -> &[Cookie<'static>] {
        &self.pending
    }

    /// Add every pending cookie to `response`.
    ///
    /// # Errors
    ///
    /// Returns an error when a cookie cannot be encoded as a header.
    pub fn apply(self, response: &mut HttpResponse) -> actix_web::Result<()> {
        for cookie in &self.pending {
            response
                .add_cookie(cookie)
                .map_err(actix_web::error::ErrorInternalServerError)?;
        }
        Ok(())
    }
}

impl SessionCookieJar for SessionCookies {
    fn read(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned().flatten()
    }

    fn write(&mut self, cookie: SessionCookie) {
        let value = match cookie.lifetime {
            CookieLifetime::MaxAge(_) => Some(cookie.value.clone()),
            CookieLifetime::Removal => None,
        };
        self.values.insert(cookie.name.clone(), value);
        self.pending.push(to_actix_cookie(cookie));
    }
}

impl FromRequest for SessionCookies {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Ok(Self::from_http_request(req)))
    }
}

fn to_actix_cookie(cookie: SessionCookie) -> Cookie<'static> {
    let SessionCookie {
        name,
        value,
        path,
        http_only,
        secure,
        same_site,
        lifetime,
    } = cookie;
    let mut built = Cookie::new(name, value);
    built.set_path(path);
    built.set_http_only(http_only);
    built.set_secure(secure);
    built.set_same_site(match same_site {
        SameSitePolicy::Strict => SameSite::Strict,
        SameSitePolicy::Lax => SameSite::Lax,
        SameSitePolicy::None => SameSite::None,
    });
    match lifetime {
        CookieLifetime::MaxAge(max_age) => built.set_max_age(CookieDuration::seconds(
            i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX),
        )),
        CookieLifetime::Removal => built.make_removal(),
    }
    built
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use actix_web::http::StatusCode;
    use actix_web::test as actix_test;
    use actix_web::{App, web};
    use rstest::rstest;

    use super::*;
    use crate::domain::session::{
        SESSION_COOKIE_NAME, SessionClaims, SessionCodec, SessionManager, SessionSecret,
    };

    fn manager() -> SessionManager {
        let secret = SessionSecret::from_bytes(vec![b'z'; 32]).expect("fixture secret");
        SessionManager::new(
            SessionCodec::new(&secret, Arc::new(mockable::DefaultClock)),
            true,
        )
    }

    async fn set_session(
        manager: web::Data<SessionManager>,
        mut cookies: SessionCookies,
    ) -> actix_web::Result<HttpResponse> {
        let claims = SessionClaims::new("u-1", "upstream-token", "member")
            .map_err(actix_web::error::ErrorInternalServerError)?;
        manager
            .create(&mut cookies, &claims)
            .map_err(actix_web::error::ErrorInternalServerError)?;
        let mut response = HttpResponse::Ok().finish();
        cookies.apply(&mut response)?;
        Ok(response)
    }

    async fn whoami(
        manager: web::Data<SessionManager>,
        cookies: SessionCookies,
    ) -> HttpResponse {
        match manager.current(&cookies) {
            Some(session) => HttpResponse::Ok().body(session.claims.user_id().to_owned()),
            None => HttpResponse::Unauthorized().finish(),
        }
    }

    async fn clear_session(
        manager: web::Data<SessionManager>,
        mut cookies: SessionCookies,
    ) -> actix_web::Result<HttpResponse> {
        manager.destroy(&mut cookies);
        let mut response = HttpResponse::Ok().finish();
        cookies.apply(&mut response)?;
        Ok(response)
    }

    macro_rules! session_app {
        () => {
            actix_test::init_service(
                App::new()
                    .app_data(web::Data::new(manager()))
                    .route("/set", web::post().to(set_session))
                    .route("/me", web::get().to(whoami))
                    .route("/clear", web::post().to(clear_session)),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn session_cookie_round_trips() {
        let app = session_app!();

        let set_res =
            actix_test::call_service(&app, actix_test::TestRequest::post().uri("/set").to_request()).await;
        assert_eq!(set_res.status(), StatusCode::OK);
        let cookie = set_res
            .response()
            .cookies()
            .find(|cookie| cookie.name() == SESSION_COOKIE_NAME)
            .expect("session cookie set");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(CookieDuration::days(7)));

        let me_res = actix_test::call_service(
            &app,
            actix_test::TestRequest::get().uri("/me").cookie(cookie).to_request(),
        )
        .await;
        assert_eq!(me_res.status(), StatusCode::OK);
        assert_eq!(actix_test::read_body(me_res).await, "u-1");
    }

    #[actix_web::test]
    async fn missing_or_tampered_cookie_is_unauthorised() {
        let app = session_app!();

        let missing =
            actix_test::call_service(&app, actix_test::TestRequest::get().uri("/me").to_request()).await;
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let tampered = actix_test::call_service(
            &app,
            actix_test::TestRequest::get()
                .uri("/me")
                .cookie(Cookie::new(SESSION_COOKIE_NAME, "eyJhbGciOiJIUzI1NiJ9.e30.bogus"))
                .to_request(),
        )
        .await;
        assert_eq!(tampered.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn destroy_emits_removal_cookie() {
        let app = session_app!();

        let res =
            actix_test::call_service(&app, actix_test::TestRequest::post().uri("/clear").to_request()).await;
        let cookie = res
            .response()
            .cookies()
            .find(|cookie| cookie.name() == SESSION_COOKIE_NAME)
            .expect("removal cookie set");
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(CookieDuration::ZERO));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
    }

    #[rstest]
    fn reads_observe_earlier_writes() {
        let mut cookies = SessionCookies::default();
        cookies.write(SessionCookie::session("v1", Duration::from_secs(5), false));
        assert_eq!(cookies.read(SESSION_COOKIE_NAME).as_deref(), Some("v1"));

        cookies.write(SessionCookie::removal(SESSION_COOKIE_NAME, false));
        assert_eq!(cookies.read(SESSION_COOKIE_NAME), None);
        assert_eq!(cookies.pending().len(), 2);
    }

    #[rstest]
    fn converts_attributes_to_actix_cookie() {
        let mut cookie = SessionCookie::session("v", Duration::from_secs(90), false);
        cookie.same_site = SameSitePolicy::Strict;

        let built = to_actix_cookie(cookie);
        assert_eq!(built.secure(), Some(false));
        assert_eq!(built.same_site(), Some(SameSite::Strict));
        assert_eq!(built.max_age(), Some(CookieDuration::seconds(90)));
    }
}

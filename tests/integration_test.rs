//! End-to-end request scenarios through the middleware seam.

use std::sync::Arc;

use http::Method;
use serde_json::{Map, Value};

use crumb_guard::{
    handler, BodySource, CrumbError, CrumbGuard, CrumbOverride, GuardConfig, HttpRequest,
    HttpResponse, Middleware, ResponseBody, Route, TokenMethod,
};

/// Run a request through the guard with a trivial 200 handler.
async fn run(guard: &CrumbGuard, req: HttpRequest) -> Result<HttpResponse, CrumbError> {
    guard
        .handle(req, handler(|_req| async { Ok(HttpResponse::ok()) }))
        .await
}

fn cookie_token(res: &HttpResponse) -> String {
    let cookie = res.headers.get("Set-Cookie").expect("Set-Cookie present");
    let pair = cookie.split(';').next().unwrap();
    let (name, value) = pair.split_once('=').unwrap();
    assert_eq!(name, "crumb");
    value.to_string()
}

#[tokio::test]
async fn restful_round_trip() {
    let guard = CrumbGuard::new(GuardConfig::default().with_restful(true)).unwrap();

    // GET /1 issues the crumb cookie.
    let res = run(&guard, HttpRequest::new(Arc::new(Route::new(Method::GET, "/1"))))
        .await
        .unwrap();
    assert_eq!(res.status, 200);
    let token = cookie_token(&res);

    // POST /2 with the matching header and cookie succeeds.
    let post = Arc::new(Route::new(Method::POST, "/2"));
    let req = HttpRequest::new(post.clone())
        .with_cookie("crumb", token.clone())
        .with_header("x-csrf-token", token.clone());
    let res = run(&guard, req).await.unwrap();
    assert_eq!(res.status, 200);

    // A single altered character is rejected.
    let req = HttpRequest::new(post)
        .with_cookie("crumb", token.clone())
        .with_header("x-csrf-token", format!("x{}", token));
    let err = run(&guard, req).await.unwrap_err();
    assert_eq!(err.status_code(), 403);
}

#[tokio::test]
async fn restful_method_scoping() {
    let guard = CrumbGuard::new(GuardConfig::default().with_restful(true)).unwrap();

    // GET is never validated.
    let res = run(&guard, HttpRequest::new(Arc::new(Route::new(Method::GET, "/a"))))
        .await
        .unwrap();
    assert_eq!(res.status, 200);

    // Every mutating method without a header is rejected.
    for method in [Method::POST, Method::PUT, Method::PATCH, Method::DELETE] {
        let route = Arc::new(Route::new(method, "/a"));
        let err = run(&guard, HttpRequest::new(route)).await.unwrap_err();
        assert_eq!(err.status_code(), 403);
    }
}

#[tokio::test]
async fn body_round_trip() {
    let guard = CrumbGuard::new(GuardConfig::default()).unwrap();

    let res = run(&guard, HttpRequest::new(Arc::new(Route::new(Method::GET, "/form"))))
        .await
        .unwrap();
    let token = cookie_token(&res);

    let post = Arc::new(Route::new(Method::POST, "/submit"));
    let mut body = Map::new();
    body.insert("crumb".to_string(), Value::String(token.clone()));
    let req = HttpRequest::new(post.clone())
        .with_cookie("crumb", token.clone())
        .with_body(BodySource::Buffered(body));
    let res = run(&guard, req).await.unwrap();
    assert_eq!(res.status, 200);

    let mut tampered = Map::new();
    tampered.insert("crumb".to_string(), Value::String(format!("x{}", token)));
    let req = HttpRequest::new(post)
        .with_cookie("crumb", token)
        .with_body(BodySource::Buffered(tampered));
    let err = run(&guard, req).await.unwrap_err();
    assert_eq!(err.status_code(), 403);
}

#[tokio::test]
async fn idempotent_cookie_reuse() {
    let guard = CrumbGuard::new(GuardConfig::default()).unwrap();
    let route = Arc::new(Route::new(Method::GET, "/"));

    let res = run(&guard, HttpRequest::new(route.clone())).await.unwrap();
    let token = cookie_token(&res);

    // Second request presenting the cookie gets no new Set-Cookie.
    let req = HttpRequest::new(route).with_cookie("crumb", token);
    let res = run(&guard, req).await.unwrap();
    assert!(!res.headers.contains_key("Set-Cookie"));
}

#[tokio::test]
async fn streamed_body_rejected_despite_valid_cookie() {
    let guard = CrumbGuard::new(GuardConfig::default()).unwrap();
    let route = Arc::new(Route::new(Method::POST, "/upload"));

    let req = HttpRequest::new(route)
        .with_cookie("crumb", "valid-token")
        .with_body(BodySource::Streamed);
    let err = run(&guard, req).await.unwrap_err();
    assert_eq!(err.status_code(), 403);
}

#[tokio::test]
async fn disabled_route_bypass() {
    let guard = CrumbGuard::new(GuardConfig::default()).unwrap();
    let route = Arc::new(
        Route::new(Method::POST, "/webhook").with_crumb(CrumbOverride::Disabled),
    );

    // No validation even without any token, and no cookie issued.
    let res = run(&guard, HttpRequest::new(route)).await.unwrap();
    assert_eq!(res.status, 200);
    assert!(!res.headers.contains_key("Set-Cookie"));
}

#[tokio::test]
async fn dry_run_issues_cookie_without_validating() {
    let guard = CrumbGuard::new(GuardConfig::default().with_enforce(false)).unwrap();
    let route = Arc::new(Route::new(Method::POST, "/submit"));

    // No token anywhere, streamed body: still 200, cookie still set.
    let req = HttpRequest::new(route).with_body(BodySource::Streamed);
    let res = run(&guard, req).await.unwrap();
    assert_eq!(res.status, 200);
    assert!(res.headers.contains_key("Set-Cookie"));
}

#[tokio::test]
async fn origin_gating() {
    let guard = CrumbGuard::new(
        GuardConfig::default()
            .with_allow_origins(vec!["*.test.com".to_string(), "host:*".to_string()]),
    )
    .unwrap();
    let route = Arc::new(Route::new(Method::GET, "/cors").with_cors(true));

    // Disallowed origin: request passes, but no crumb cookie leaks out.
    let req = HttpRequest::new(route.clone()).with_origin("http://badsite.com");
    let res = run(&guard, req).await.unwrap();
    assert_eq!(res.status, 200);
    assert!(!res.headers.contains_key("Set-Cookie"));

    // Wildcard host segment.
    let req = HttpRequest::new(route.clone()).with_origin("http://sub.test.com");
    let res = run(&guard, req).await.unwrap();
    assert!(res.headers.contains_key("Set-Cookie"));

    // Wildcard port.
    let req = HttpRequest::new(route).with_origin("http://host:9090");
    let res = run(&guard, req).await.unwrap();
    assert!(res.headers.contains_key("Set-Cookie"));
}

#[tokio::test]
async fn view_context_injection() {
    let guard = CrumbGuard::new(GuardConfig::default()).unwrap();
    let route = Arc::new(Route::new(Method::GET, "/page"));

    let res = guard
        .handle(
            HttpRequest::new(route),
            handler(|_req| async { Ok(HttpResponse::view("index", None)) }),
        )
        .await
        .unwrap();

    let token = cookie_token(&res);
    match res.body {
        ResponseBody::View { context, .. } => {
            let context = context.expect("context created when absent");
            assert_eq!(context["crumb"], Value::String(token));
        }
        _ => panic!("expected a view body"),
    }
}

#[tokio::test]
async fn view_context_not_injected_when_disabled() {
    let guard =
        CrumbGuard::new(GuardConfig::default().with_add_to_view_context(false)).unwrap();
    let route = Arc::new(Route::new(Method::GET, "/page"));

    let res = guard
        .handle(
            HttpRequest::new(route),
            handler(|_req| async { Ok(HttpResponse::view("index", None)) }),
        )
        .await
        .unwrap();

    match res.body {
        ResponseBody::View { context, .. } => assert!(context.is_none()),
        _ => panic!("expected a view body"),
    }
}

#[tokio::test]
async fn hmac_round_trip_through_header() {
    let guard = CrumbGuard::new(
        GuardConfig::default()
            .with_restful(true)
            .with_method(TokenMethod::Hmac)
            .with_secret("integration-secret"),
    )
    .unwrap();

    let get = Arc::new(Route::new(Method::GET, "/session"));
    let res = run(&guard, HttpRequest::new(get).with_auth("userId", "user-1"))
        .await
        .unwrap();
    let token = cookie_token(&res);

    let post = Arc::new(Route::new(Method::POST, "/action"));
    let req = HttpRequest::new(post.clone())
        .with_auth("userId", "user-1")
        .with_cookie("crumb", token.clone())
        .with_header("x-csrf-token", token.clone());
    let res = run(&guard, req).await.unwrap();
    assert_eq!(res.status, 200);

    // Another user cannot replay the token.
    let req = HttpRequest::new(post)
        .with_auth("userId", "user-2")
        .with_cookie("crumb", token.clone())
        .with_header("x-csrf-token", token);
    let err = run(&guard, req).await.unwrap_err();
    assert_eq!(err.status_code(), 403);
}

#[tokio::test]
async fn skip_predicate_bypasses_guard() {
    let guard = CrumbGuard::new(GuardConfig::default().with_skip(
        |req: &HttpRequest| req.header("x-health-check").is_some(),
    ))
    .unwrap();
    let route = Arc::new(Route::new(Method::POST, "/internal"));

    let req = HttpRequest::new(route).with_header("x-health-check", "1");
    let res = run(&guard, req).await.unwrap();
    assert_eq!(res.status, 200);
    assert!(!res.headers.contains_key("Set-Cookie"));
}

#[test]
fn registration_fails_on_invalid_config() {
    // HMAC without a secret.
    let err = CrumbGuard::new(GuardConfig::default().with_method(TokenMethod::Hmac))
        .unwrap_err();
    assert!(matches!(err, CrumbError::Config(_)));

    // Bare wildcard in the origin allow-list.
    let err = CrumbGuard::new(
        GuardConfig::default().with_allow_origins(vec!["*".to_string()]),
    )
    .unwrap_err();
    assert!(matches!(err, CrumbError::Config(_)));
}

#[tokio::test]
async fn token_field_stripped_before_handler() {
    let guard = CrumbGuard::new(GuardConfig::default()).unwrap();
    let route = Arc::new(Route::new(Method::POST, "/submit"));

    let mut body = Map::new();
    body.insert("crumb".to_string(), Value::String("tok".to_string()));
    body.insert("comment".to_string(), Value::String("hello".to_string()));

    let req = HttpRequest::new(route)
        .with_cookie("crumb", "tok")
        .with_body(BodySource::Buffered(body));

    let res = guard
        .handle(
            req,
            handler(|req| async move {
                match &req.body {
                    BodySource::Buffered(map) => {
                        assert!(!map.contains_key("crumb"));
                        assert!(map.contains_key("comment"));
                    }
                    _ => panic!("expected buffered body"),
                }
                Ok(HttpResponse::ok())
            }),
        )
        .await
        .unwrap();
    assert_eq!(res.status, 200);
}

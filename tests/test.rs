use cookie::Cookie;
use cookie_session::{Error, Key, KeyRing, Session, SessionConfig, SessionLayer, KEY_LENGTH};
use http::header::{COOKIE, SET_COOKIE, VARY};
use http::{HeaderValue, Request, Response, StatusCode};
use parking_lot::Mutex;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tower::{Layer, ServiceExt};

async fn handler(request: Request<String>) -> Result<Response<String>, Infallible> {
    let session = Session::from_request(&request);
    let body = match request.uri().path() {
        "/put" => {
            session.put("msg", "hi");
            String::new()
        }
        "/get" => session.get_string("msg"),
        "/pop" => {
            let msg = session.pop_string("msg");
            format!("{msg} {}", session.exists("msg"))
        }
        "/keys" => {
            session.put("b", 1);
            session.put("a", 2);
            session.put("c", 3);
            session.keys().join(",")
        }
        "/destroy" => {
            session.destroy();
            String::new()
        }
        "/big" => {
            session.put("blob", vec![0x2au8; 5000]);
            String::new()
        }
        "/created" => {
            session.put("msg", "created");
            let mut response = Response::new("made".to_owned());
            *response.status_mut() = StatusCode::CREATED;
            return Ok(response);
        }
        _ => String::new(),
    };
    Ok(Response::new(body))
}

fn key(byte: u8) -> Key {
    Key::from_bytes([byte; KEY_LENGTH])
}

fn layer() -> SessionLayer {
    SessionLayer::new(SessionConfig::default(), KeyRing::new(key(1)))
}

fn request(path: &str, cookie: Option<&Cookie<'_>>) -> Request<String> {
    let mut builder = Request::builder().uri(path);
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, format!("session={}", cookie.value()));
    }
    builder.body(String::new()).unwrap()
}

async fn send(layer: &SessionLayer, request: Request<String>) -> Response<String> {
    layer
        .layer(tower::service_fn(handler))
        .oneshot(request)
        .await
        .unwrap()
}

fn session_cookie(response: &Response<String>) -> Cookie<'static> {
    let header = response
        .headers()
        .get(SET_COOKIE)
        .expect("response sets the session cookie")
        .to_str()
        .unwrap();
    Cookie::parse(header.to_owned()).unwrap()
}

type ErrorLog = Arc<Mutex<Vec<String>>>;

fn recording_layer() -> (SessionLayer, ErrorLog) {
    let errors = ErrorLog::default();
    let recorded = errors.clone();
    let layer = layer().with_error_handler(move |_, error| {
        recorded.lock().push(error.to_string());
        let mut response = Response::new("custom".to_owned());
        *response.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
        response
    });
    (layer, errors)
}

/// A value written in one request can be read in the next one, until the session expires.
#[async_std::test]
async fn test_put_then_get_until_expiry() {
    let layer = SessionLayer::new(
        SessionConfig::default().with_lifetime(Duration::from_secs(1)),
        KeyRing::new(key(1)),
    );
    let response = send(&layer, request("/put", None)).await;
    let cookie = session_cookie(&response);

    let response = send(&layer, request("/get", Some(&cookie))).await;
    assert_eq!(response.into_body(), "hi");

    async_std::task::sleep(Duration::from_secs(2)).await;
    let response = send(&layer, request("/get", Some(&cookie))).await;
    assert_eq!(response.into_body(), "");
}

/// Popping a value returns it once and removes it.
#[async_std::test]
async fn test_pop_removes_value() {
    let layer = layer();
    let cookie = session_cookie(&send(&layer, request("/put", None)).await);

    let response = send(&layer, request("/pop", Some(&cookie))).await;
    let cookie = session_cookie(&response);
    assert_eq!(response.into_body(), "hi false");

    let response = send(&layer, request("/get", Some(&cookie))).await;
    assert_eq!(response.into_body(), "");
}

/// Requests that only read the session do not set a cookie.
#[async_std::test]
async fn test_reading_does_not_set_cookie() {
    let layer = layer();
    let response = send(&layer, request("/get", None)).await;
    assert!(response.headers().get(SET_COOKIE).is_none());

    let cookie = session_cookie(&send(&layer, request("/put", None)).await);
    let response = send(&layer, request("/get", Some(&cookie))).await;
    assert!(response.headers().get(SET_COOKIE).is_none());
    assert!(response.headers().get(VARY).is_none());
}

/// Popping a key that does not exist is not a change.
#[async_std::test]
async fn test_popping_absent_key_does_not_set_cookie() {
    let response = send(&layer(), request("/pop", None)).await;
    assert!(response.headers().get(SET_COOKIE).is_none());
    assert_eq!(response.into_body(), " false");
}

/// Keys are listed alphabetically.
#[async_std::test]
async fn test_keys_are_sorted() {
    let response = send(&layer(), request("/keys", None)).await;
    assert_eq!(response.into_body(), "a,b,c");
}

/// Destroying a session tells the client to delete its cookie.
#[async_std::test]
async fn test_destroy_deletes_cookie() {
    let layer = layer();
    let cookie = session_cookie(&send(&layer, request("/put", None)).await);

    let response = send(&layer, request("/destroy", Some(&cookie))).await;
    let removal = session_cookie(&response);
    assert_eq!(removal.name(), "session");
    assert_eq!(removal.value(), "");
    assert_eq!(removal.max_age(), Some(time::Duration::ZERO));
    assert!(removal
        .expires_datetime()
        .is_some_and(|expires| expires < time::OffsetDateTime::now_utc()));
}

/// The handler's status and body are kept, and the cookie comes with `Vary: Cookie`.
#[async_std::test]
async fn test_response_passes_through() {
    let response = send(&layer(), request("/created", None)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers().get(VARY).unwrap(), "Cookie");
    session_cookie(&response);
    assert_eq!(response.into_body(), "made");
}

/// Sessions that do not fit into a cookie are handed to the error handler.
#[async_std::test]
async fn test_oversized_session_goes_to_error_handler() {
    let (layer, errors) = recording_layer();
    let response = send(&layer, request("/big", None)).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(response.headers().get(SET_COOKIE).is_none());
    assert_eq!(response.into_body(), "custom");
    let errors = errors.lock();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("greater than 4096 bytes"));
}

/// By default, errors result in a generic 500 response without any detail.
#[async_std::test]
async fn test_default_error_handler_hides_detail() {
    let response = send(&layer(), request("/big", None)).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.headers().get(SET_COOKIE).is_none());
    assert_eq!(response.into_body(), "Internal Server Error");
}

/// A cookie header that is not valid UTF-8 starts a fresh session instead of failing the request.
#[async_std::test]
async fn test_non_utf8_cookie_header_starts_fresh_session() {
    let (layer, errors) = recording_layer();
    let mut request = request("/get", None);
    request.headers_mut().insert(
        COOKIE,
        HeaderValue::from_bytes(b"session=\xfe\xff").unwrap(),
    );
    let response = send(&layer, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.into_body(), "");
    assert!(errors.lock().is_empty());
}

/// Non-ASCII bytes in another application's cookie do not hide the session cookie.
#[async_std::test]
async fn test_non_ascii_neighbour_cookie_keeps_session() {
    let (layer, errors) = recording_layer();
    let cookie = session_cookie(&send(&layer, request("/put", None)).await);

    let mut value = b"theme=caf\xc3\xa9; session=".to_vec();
    value.extend_from_slice(cookie.value().as_bytes());
    let mut request = request("/get", None);
    request
        .headers_mut()
        .insert(COOKIE, HeaderValue::from_bytes(&value).unwrap());

    let response = send(&layer, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.into_body(), "hi");
    assert!(errors.lock().is_empty());
}

/// Tampered and foreign cookies are silently replaced by a fresh session.
#[async_std::test]
async fn test_invalid_cookie_starts_fresh_session() {
    let (layer, errors) = recording_layer();
    let cookie = session_cookie(&send(&layer, request("/put", None)).await);

    let mut tampered = cookie.value().to_owned();
    let replacement = if &tampered[10..11] == "A" { "B" } else { "A" };
    tampered.replace_range(10..11, replacement);
    let response = send(&layer, request("/get", Some(&Cookie::new("session", tampered)))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.into_body(), "");

    let foreign = SessionLayer::new(SessionConfig::default(), KeyRing::new(key(2)));
    let response = send(&foreign, request("/get", Some(&cookie))).await;
    assert_eq!(response.into_body(), "");

    assert!(errors.lock().is_empty());
}

/// Cookies issued under a retired key stay valid, and are re-issued under the active key.
#[async_std::test]
async fn test_key_rotation() {
    let cookie = session_cookie(&send(&layer(), request("/put", None)).await);

    let rotated = SessionLayer::new(
        SessionConfig::default(),
        KeyRing::with_retired(key(2), [key(1)]),
    );
    let response = send(&rotated, request("/keys", Some(&cookie))).await;
    let reissued = session_cookie(&response);
    assert_eq!(response.into_body(), "a,b,c,msg");

    let active_only = SessionLayer::new(SessionConfig::default(), KeyRing::new(key(2)));
    let response = send(&active_only, request("/get", Some(&reissued))).await;
    assert_eq!(response.into_body(), "hi");
    let response = send(&active_only, request("/get", Some(&cookie))).await;
    assert_eq!(response.into_body(), "");
}

/// Nested session layers share one session and set the cookie only once.
#[async_std::test]
async fn test_nested_layers_share_session() {
    let layer = layer();
    let service = layer.layer(layer.layer(tower::service_fn(handler)));
    let response = service.oneshot(request("/put", None)).await.unwrap();
    assert_eq!(response.headers().get_all(SET_COOKIE).iter().count(), 1);

    let cookie = session_cookie(&response);
    let response = send(&layer, request("/get", Some(&cookie))).await;
    assert_eq!(response.into_body(), "hi");
}

/// A custom cookie name is used for both reading and writing.
#[async_std::test]
async fn test_custom_cookie_name() {
    let layer = SessionLayer::new(
        SessionConfig::default().with_cookie_name("sid"),
        KeyRing::new(key(1)),
    );
    let cookie = session_cookie(&send(&layer, request("/put", None)).await);
    assert_eq!(cookie.name(), "sid");

    let request = Request::builder()
        .uri("/get")
        .header(COOKIE, format!("session=ignored; sid={}", cookie.value()))
        .body(String::new())
        .unwrap();
    let response = send(&layer, request).await;
    assert_eq!(response.into_body(), "hi");
}

/// Errors are typed, so applications can react to them in their error handler.
#[async_std::test]
async fn test_error_handler_receives_typed_error() {
    let seen = Arc::new(Mutex::new(false));
    let flag = seen.clone();
    let layer = layer().with_error_handler(move |head, error| {
        assert_eq!(head.uri.path(), "/big");
        *flag.lock() = matches!(error, Error::CookieTooLarge { maximum: 4096, .. });
        Response::new(String::new())
    });
    send(&layer, request("/big", None)).await;
    assert!(*seen.lock());
}

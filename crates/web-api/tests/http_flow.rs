mod support;

use application::{ConnectionHandle, Frame};
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use domain::{Identity, SessionError};
use serde_json::{json, Value};
use tower::ServiceExt;

use support::{body_json, build_app, session_cookie};

fn request(method: Method, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = cookie {
        builder = builder.header(header::COOKIE, session_cookie(token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn set_cookies(response: &axum::response::Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect()
}

fn frame_json(frame: Frame) -> Value {
    match frame {
        Frame::Text(text) => serde_json::from_str(&text).unwrap(),
        Frame::Binary(_) => panic!("expected text frame"),
    }
}

#[tokio::test]
async fn health_reports_hub_stats() {
    let app = build_app();
    let (conn, _queue) = ConnectionHandle::open(Some(Identity::new(7, "ann")), 4);
    app.hub.admit(conn);

    let response = app
        .router
        .clone()
        .oneshot(request(Method::GET, "/health", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"connections": 1, "identities": 1})
    );
}

#[tokio::test]
async fn session_requires_a_cookie() {
    let app = build_app();
    let response = app
        .router
        .clone()
        .oneshot(request(Method::GET, "/api/session", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "UNAUTHENTICATED");

    let response = app
        .router
        .clone()
        .oneshot(request(Method::GET, "/api/session", Some("bogus"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn session_resolves_then_expires() {
    let app = build_app();
    let session = app.state.sessions.create(Identity::new(7, "ann")).await.unwrap();
    let token = session.token.as_str();

    let response = app
        .router
        .clone()
        .oneshot(request(Method::GET, "/api/session", Some(token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["username"], "ann");
    assert_eq!(body["user_id"], 7);

    app.clock.advance(chrono::Duration::hours(25));
    let response = app
        .router
        .clone()
        .oneshot(request(Method::GET, "/api/session", Some(token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "SESSION_EXPIRED");

    // 过期会话在第一次发现时被删除
    let response = app
        .router
        .clone()
        .oneshot(request(Method::GET, "/api/session", Some(token), None))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["code"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn refresh_reissues_cookie_with_new_expiry() {
    let app = build_app();
    let session = app.state.sessions.create(Identity::new(7, "ann")).await.unwrap();
    app.clock.advance(chrono::Duration::hours(2));

    let response = app
        .router
        .clone()
        .oneshot(request(
            Method::POST,
            "/api/session/refresh",
            Some(session.token.as_str()),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 1);
    let cookie = &cookies[0];
    assert!(cookie.starts_with(&session_cookie(session.token.as_str())));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Path=/"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(!cookie.contains("Secure"));

    let body = body_json(response).await;
    let expires_at: chrono::DateTime<chrono::Utc> =
        serde_json::from_value(body["expires_at"].clone()).unwrap();
    assert_eq!(expires_at - session.expires_at, chrono::Duration::hours(2));
}

#[tokio::test]
async fn logout_emits_offline_status_and_expires_cookie() {
    let app = build_app();
    let ann = Identity::new(7, "ann");
    let session = app.state.sessions.create(ann.clone()).await.unwrap();

    let (watcher, mut queue) = ConnectionHandle::open(None, 4);
    app.hub.admit(watcher);

    let response = app
        .router
        .clone()
        .oneshot(request(
            Method::POST,
            "/api/logout",
            Some(session.token.as_str()),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookies = set_cookies(&response);
    assert!(cookies[0].starts_with("session_token=;"));
    assert!(cookies[0].contains("1970"));

    let event = frame_json(queue.recv().await.unwrap());
    assert_eq!(
        event,
        json!({
            "type": "user_online_status",
            "data": {"user_id": 7, "username": "ann", "is_online": false}
        })
    );
    assert_eq!(
        app.state.sessions.resolve(session.token.as_str()).await,
        Err(SessionError::NotFound)
    );

    // 没有会话时登出同样成功
    let response = app
        .router
        .clone()
        .oneshot(request(Method::POST, "/api/logout", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn typing_indicator_goes_to_the_recipient_only() {
    let app = build_app();
    let session = app.state.sessions.create(Identity::new(7, "ann")).await.unwrap();
    let (ann_conn, mut ann_queue) = ConnectionHandle::open(Some(Identity::new(7, "ann")), 4);
    let (bob_conn, mut bob_queue) = ConnectionHandle::open(Some(Identity::new(8, "bob")), 4);
    app.hub.admit(ann_conn);
    app.hub.admit(bob_conn);

    for (uri, is_typing) in [("/api/typing/start", true), ("/api/typing/stop", false)] {
        let response = app
            .router
            .clone()
            .oneshot(request(
                Method::POST,
                uri,
                Some(session.token.as_str()),
                Some(json!({"to_user_id": 8})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let event = frame_json(bob_queue.recv().await.unwrap());
        assert_eq!(event["type"], "user_typing");
        assert_eq!(
            event["data"],
            json!({"from_user_id": 7, "username": "ann", "is_typing": is_typing})
        );
    }

    // Hub 顺序处理命令，统计返回时之前的投递都已完成
    app.hub.stats().await.unwrap();
    assert!(ann_queue.try_recv().is_err());
}

#[tokio::test]
async fn typing_rejects_bad_requests() {
    let app = build_app();
    let response = app
        .router
        .clone()
        .oneshot(request(
            Method::POST,
            "/api/typing/start",
            None,
            Some(json!({"to_user_id": 8})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let session = app.state.sessions.create(Identity::new(7, "ann")).await.unwrap();
    let response = app
        .router
        .clone()
        .oneshot(request(
            Method::POST,
            "/api/typing/start",
            Some(session.token.as_str()),
            Some(json!({"to_user_id": 0})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "INVALID_ARGUMENT");
}

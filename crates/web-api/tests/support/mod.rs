#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use application::{
    session_tiers::memory::MemoryDurableTier, EventEmitter, FixedClock, Hub, HubHandle,
    InMemoryCacheTier, SessionSettings, SessionStore, SessionStoreDependencies,
};
use axum::{body::Body, http::Response, Router};
use chrono::DateTime;
use serde_json::Value;
use web_api::{router, AppState, CookieSettings};

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub hub: HubHandle,
    pub clock: Arc<FixedClock>,
}

pub fn build_app() -> TestApp {
    let (hub, _task) = Hub::spawn();
    // 测试中每个应用各有一个发射器，生产环境使用进程级实例
    let emitter: &'static EventEmitter = Box::leak(Box::new(EventEmitter::with_hub(hub.clone())));
    let clock = Arc::new(FixedClock::new(
        DateTime::from_timestamp(1_700_000_000, 0).expect("valid timestamp"),
    ));

    let sessions = Arc::new(SessionStore::new(
        SessionStoreDependencies {
            cache: Arc::new(InMemoryCacheTier::new()),
            durable: Arc::new(MemoryDurableTier::new()),
            clock: clock.clone(),
        },
        SessionSettings {
            duration: chrono::Duration::hours(24),
            sweep_interval: Duration::from_secs(3600),
        },
    ));

    let state = AppState::new(hub.clone(), sessions, emitter, CookieSettings::default(), 8);
    TestApp {
        router: router(state.clone()),
        state,
        hub,
        clock,
    }
}

pub fn session_cookie(token: &str) -> String {
    format!("session_token={token}")
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

/// 等待 Hub 中的连接数达到预期（连接准入是异步的）
pub async fn wait_for_connections(hub: &HubHandle, expected: usize) {
    for _ in 0..100 {
        if hub.stats().await.map(|stats| stats.connections) == Some(expected) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("hub never reached {expected} connections");
}

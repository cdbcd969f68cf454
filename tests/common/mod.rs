#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header::COOKIE, Request, Response};
use http_body_util::BodyExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use gatekeeper::catalog::{CatalogError, ExerciseCatalog};
use gatekeeper::gate::Gatekeeper;
use gatekeeper::http::AppState;
use gatekeeper::identity::IdentityResolver;
use gatekeeper::ratelimit::{
    Counter, CounterStore, FailurePolicy, ManualClock, MemoryStore, RateKey, RateLimiter,
    StoreError, Versioned,
};

/// 2024-01-01T00:00:00Z
pub const START_MS: u64 = 1_704_067_200_000;

/// In-memory catalog that can be told to fail.
#[derive(Default)]
pub struct FakeCatalog {
    pub failing: bool,
    pub calls: AtomicUsize,
}

impl FakeCatalog {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn list(&self, items: &[&str]) -> Result<Vec<String>, CatalogError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(CatalogError::Status(reqwest::StatusCode::INTERNAL_SERVER_ERROR));
        }
        Ok(items.iter().map(|s| s.to_string()).collect())
    }
}

#[async_trait]
impl ExerciseCatalog for FakeCatalog {
    async fn body_parts(&self) -> Result<Vec<String>, CatalogError> {
        self.list(&["back", "chest", "upper legs"])
    }

    async fn targets(&self) -> Result<Vec<String>, CatalogError> {
        self.list(&["biceps", "glutes"])
    }

    async fn equipment(&self) -> Result<Vec<String>, CatalogError> {
        self.list(&["barbell", "body weight"])
    }
}

pub struct Harness {
    pub state: AppState,
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryStore>,
}

pub fn harness(catalog: Arc<dyn ExerciseCatalog>) -> Harness {
    let clock = Arc::new(ManualClock::new(START_MS));
    let store = Arc::new(MemoryStore::new());
    let limiter = RateLimiter::new(store.clone()).with_clock(clock.clone());
    let gatekeeper = Arc::new(Gatekeeper::new(Arc::new(limiter)));

    Harness {
        state: AppState::new(gatekeeper, catalog, IdentityResolver::default()),
        clock,
        store,
    }
}

/// Counter store whose every call fails.
pub struct DownStore;

#[async_trait]
impl CounterStore for DownStore {
    async fn get(&self, _key: &RateKey) -> Result<Option<Versioned<Counter>>, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn compare_and_set(
        &self,
        _key: &RateKey,
        _expected: Option<u64>,
        _counter: Counter,
    ) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

/// App state whose limiter sits on an unreachable store.
pub fn down_store_state(catalog: Arc<dyn ExerciseCatalog>, policy: FailurePolicy) -> AppState {
    let limiter = RateLimiter::new(Arc::new(DownStore)).with_failure_policy(policy);
    let gatekeeper = Arc::new(Gatekeeper::new(Arc::new(limiter)));
    AppState::new(gatekeeper, catalog, IdentityResolver::default())
}

pub fn get(path: &str, device: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(path);
    if let Some(device) = device {
        builder = builder.header(COOKIE, format!("deviceId={}", device));
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

//! Shared fixtures for engine tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use url::Url;

use super::{Engine, EngineSettings, Fetch, FetchMode, FixedRandom, LocalHost};
use crate::Error;
use crate::cache::CacheDb;
use crate::config::AppConfig;
use crate::http::HttpResponse;

pub(crate) const ORIGIN: &str = "https://example.com";

#[derive(Clone)]
enum Route {
    Respond(HttpResponse),
    Fail(String),
    Hang,
}

/// Scripted origin keyed by URL path (plus query). Unscripted paths fail.
#[derive(Default)]
pub(crate) struct StubNetwork {
    routes: Mutex<HashMap<String, Route>>,
    calls: Mutex<Vec<(String, FetchMode)>>,
}

impl StubNetwork {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn respond(&self, path: &str, response: HttpResponse) {
        self.routes.lock().unwrap().insert(path.to_string(), Route::Respond(response));
    }

    pub(crate) fn fail(&self, path: &str, message: &str) {
        self.routes.lock().unwrap().insert(path.to_string(), Route::Fail(message.to_string()));
    }

    pub(crate) fn hang(&self, path: &str) {
        self.routes.lock().unwrap().insert(path.to_string(), Route::Hang);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn calls_for(&self, path: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|(p, _)| p == path).count()
    }

    pub(crate) fn modes(&self) -> Vec<FetchMode> {
        self.calls.lock().unwrap().iter().map(|(_, m)| *m).collect()
    }
}

fn route_key(url: &Url) -> String {
    match url.query() {
        Some(q) => format!("{}?{}", url.path(), q),
        None => url.path().to_string(),
    }
}

#[async_trait]
impl Fetch for StubNetwork {
    async fn fetch(&self, url: &Url, mode: FetchMode) -> Result<HttpResponse, Error> {
        let key = route_key(url);
        self.calls.lock().unwrap().push((key.clone(), mode));
        let route = self.routes.lock().unwrap().get(&key).cloned();
        match route {
            Some(Route::Respond(response)) => Ok(response),
            Some(Route::Fail(message)) => Err(Error::Network(message)),
            Some(Route::Hang) => std::future::pending().await,
            None => Err(Error::Network(format!("no route for {key}"))),
        }
    }
}

pub(crate) fn config() -> AppConfig {
    AppConfig { origin: ORIGIN.into(), timeout_ms: 150, ..Default::default() }
}

pub(crate) fn settings() -> EngineSettings {
    EngineSettings::from_config(&config()).unwrap()
}

pub(crate) fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

pub(crate) fn ok(body: &str) -> HttpResponse {
    HttpResponse::new(200, "OK", body.to_string()).with_header("content-type", "text/plain")
}

/// Engine over an in-memory store whose random source always returns `sample`.
pub(crate) async fn engine_with(network: Arc<StubNetwork>, sample: f64) -> (Engine, Arc<LocalHost>) {
    engine_with_settings(network, sample, settings()).await
}

pub(crate) async fn engine_with_settings(
    network: Arc<StubNetwork>, sample: f64, settings: EngineSettings,
) -> (Engine, Arc<LocalHost>) {
    let db = CacheDb::open_in_memory().await.unwrap();
    let host = Arc::new(LocalHost::new());
    let engine = Engine::builder(settings, db, network)
        .host(host.clone())
        .random(Arc::new(FixedRandom(sample)))
        .build();
    (engine, host)
}

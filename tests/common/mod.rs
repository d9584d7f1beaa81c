#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use coach_server::app::{self, SessionRegistry};
use coach_server::config::Config;
use coach_server::oracle::ScriptedOracle;
use reqwest::Client;
use serde_json::Value;

/// A server bound to an ephemeral port, backed by a scripted oracle.
pub struct TestServer {
    pub base_url: String,
    pub oracle: Arc<ScriptedOracle>,
}

impl TestServer {
    pub async fn start() -> Self {
        let config = Config {
            thinking_delay: Duration::ZERO,
            ..Config::default()
        };
        let oracle = Arc::new(ScriptedOracle::new());
        let registry = Arc::new(SessionRegistry::new(oracle.clone(), &config));
        let router = app::router(registry, config);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            oracle,
        }
    }

    /// Build a URL for an API endpoint.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Create a game and return its id.
    pub async fn create_game(&self) -> u64 {
        let resp = client().post(self.url("/api/games")).send().await.unwrap();
        assert_eq!(resp.status(), 201);
        let body: Value = resp.json().await.unwrap();
        body["id"].as_u64().unwrap()
    }

    /// Poll the game until the computer is done thinking and `plies`
    /// half-moves have been played.
    pub async fn settled(&self, id: u64, plies: usize) -> Value {
        for _ in 0..200 {
            let snap: Value = client()
                .get(self.url(&format!("/api/games/{}", id)))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            if snap["history"].as_array().map(Vec::len) == Some(plies)
                && snap["oracle_pending"] == false
            {
                return snap;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("game {} never settled at {} plies", id, plies);
    }
}

/// Build a reqwest client for tests.
pub fn client() -> Client {
    Client::new()
}

//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cart_service::config::SimulationConfig;
use cart_service::http::{AppState, HttpServer, ServerError};
use cart_service::observability::{RecorderPtr, RequestLabels, RequestRecorder};
use cart_service::{Cart, Shutdown};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Recorder that keeps every measurement in memory.
#[derive(Default)]
pub struct MemoryRecorder {
    latencies: Mutex<Vec<(RequestLabels, f64)>>,
    errors: Mutex<Vec<RequestLabels>>,
}

#[allow(dead_code)]
impl MemoryRecorder {
    pub fn latencies(&self) -> Vec<(RequestLabels, f64)> {
        self.latencies.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<RequestLabels> {
        self.errors.lock().unwrap().clone()
    }

    pub fn errors_for(&self, route: &str) -> usize {
        self.errors().iter().filter(|l| &*l.route == route).count()
    }

    pub fn latencies_for(&self, route: &str) -> Vec<(RequestLabels, f64)> {
        self.latencies()
            .into_iter()
            .filter(|(l, _)| &*l.route == route)
            .collect()
    }
}

impl RequestRecorder for MemoryRecorder {
    fn record_latency(&self, labels: &RequestLabels, elapsed_ms: f64) {
        self.latencies.lock().unwrap().push((labels.clone(), elapsed_ms));
    }

    fn record_error(&self, labels: &RequestLabels) {
        self.errors.lock().unwrap().push(labels.clone());
    }
}

/// A service running on an ephemeral port.
#[allow(dead_code)]
pub struct TestService {
    pub addr: SocketAddr,
    pub cart: Cart,
    pub recorder: Arc<MemoryRecorder>,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), ServerError>>,
}

#[allow(dead_code)]
impl TestService {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start the service with the given simulated latency and grace period.
pub async fn spawn_service(simulation: SimulationConfig, grace_period: Duration) -> TestService {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let cart = Cart::new();
    let recorder = Arc::new(MemoryRecorder::default());
    let shared: RecorderPtr = recorder.clone();
    let server = HttpServer::new(AppState::new(cart.clone(), simulation), shared, grace_period);

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let handle = tokio::spawn(async move { server.run(listener, server_shutdown).await });

    TestService {
        addr,
        cart,
        recorder,
        shutdown,
        handle,
    }
}

/// Client that never reuses connections, so shutdown is not held up by idle sockets.
#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

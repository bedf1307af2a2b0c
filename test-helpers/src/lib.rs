//! Spawns a mock Cartelera backend on a local port, paired with a dashboard
//! pointed at it.
//!
//! Used by the dashboard's integration tests at dashboard/tests/dashboard and
//! by the dev-server crate.

pub mod backend;
pub mod fixtures;
pub mod routes;
pub mod telemetry;

pub use backend::{Hit, MockBackend};

use actix_web::dev::Server;
use actix_web::{App, HttpServer, web};
use dashboard::{Config, Dashboard, MemoryStorage};
use reqwest::StatusCode;
use std::net::TcpListener;
use std::sync::Arc;
use tracing_log::LogTracer;
use tracing_subscriber::util::SubscriberInitExt;

pub struct TestApp {
    pub port: u16,
    pub address: String,
    pub backend: MockBackend,
    pub dashboard: Dashboard,
    /// Where `dashboard` persists its session.
    pub storage: Arc<MemoryStorage>,
}

impl TestApp {
    /// A second dashboard sharing this one's saved session, as after a
    /// restart.
    pub fn restart_dashboard(&self) -> Dashboard {
        Dashboard::new(self.dashboard.config.clone(), self.storage.clone())
    }
}

/// Build the server, but not await it.
///
/// Returns the port the server bound to; pass 0 to have the OS pick one.
pub fn build(backend: MockBackend, port: u16) -> std::io::Result<(Server, u16)> {
    let listener = TcpListener::bind(format!("127.0.0.1:{port}"))?;
    let port = listener.local_addr()?.port();
    let backend = web::Data::new(backend);
    let server = HttpServer::new(move || {
        App::new()
            .service(routes::services())
            .app_data(backend.clone())
    })
    .workers(1)
    .listen(listener)?
    .run();
    Ok((server, port))
}

pub async fn spawn_app_on_port(port: u16) -> TestApp {
    let subscriber = telemetry::get_subscriber("error".into());
    let _ = LogTracer::init();
    let _ = subscriber.try_init();

    let backend = MockBackend::new();
    let (server, port) = build(backend.clone(), port).unwrap();
    tokio::spawn(server);

    let address = format!("http://127.0.0.1:{port}");
    let storage = Arc::new(MemoryStorage::new());
    let dashboard = Dashboard::new(Config::with_api_url(address.as_str()), storage.clone());

    TestApp {
        port,
        address,
        backend,
        dashboard,
        storage,
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_on_port(0).await
}

pub fn assert_status_code<T>(
    result: Result<T, payloads::ClientError>,
    expected: StatusCode,
) {
    match result {
        Err(payloads::ClientError::APIError(code, _)) => {
            assert_eq!(code, expected)
        }
        _ => panic!("Expected APIError"),
    };
}

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use common::actors::{Actor, ActorType, ControlMessage};
use common::config::Config;
use coordination::{JobQueue, LockService, QueueCounts};
use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Clone)]
struct HealthState {
    pool: SqlitePool,
    locks: Arc<dyn LockService>,
    execute_queue: Arc<dyn JobQueue>,
    classify_queue: Arc<dyn JobQueue>,
    config: Config,
}

#[derive(Serialize)]
struct HealthReport {
    status: &'static str,
    database: bool,
    queue_backend: bool,
    lock_backend: bool,
    worker_count: usize,
    execute_concurrency: usize,
    classify_concurrency: usize,
    trigger_interval_ms: u64,
    execute_queue: QueueCounts,
    classify_queue: QueueCounts,
}

async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthReport>) {
    let database = sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&state.pool)
        .await
        .is_ok();
    let lock_backend = state.locks.ping().await.is_ok();

    let execute_counts = state.execute_queue.counts().await;
    let classify_counts = state.classify_queue.counts().await;
    let queue_backend = state.execute_queue.ping().await.is_ok()
        && state.classify_queue.ping().await.is_ok()
        && execute_counts.is_ok()
        && classify_counts.is_ok();

    let healthy = database && queue_backend && lock_backend;
    let report = HealthReport {
        status: if healthy { "ok" } else { "degraded" },
        database,
        queue_backend,
        lock_backend,
        worker_count: state.config.worker_count,
        execute_concurrency: state.config.execute_concurrency,
        classify_concurrency: state.config.classify_concurrency,
        trigger_interval_ms: state.config.trigger_interval.as_millis() as u64,
        execute_queue: execute_counts.unwrap_or_default(),
        classify_queue: classify_counts.unwrap_or_default(),
    };

    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(report))
}

/// Serves `GET /health` for operators: backend reachability, configured
/// worker capacity, and queue depth counters.
pub struct HealthServer {
    state: HealthState,
    port: u16,
}

impl HealthServer {
    pub fn new(
        pool: SqlitePool,
        locks: Arc<dyn LockService>,
        execute_queue: Arc<dyn JobQueue>,
        classify_queue: Arc<dyn JobQueue>,
        config: Config,
    ) -> Self {
        let port = config.health_port;
        Self {
            state: HealthState {
                pool,
                locks,
                execute_queue,
                classify_queue,
                config,
            },
            port,
        }
    }
}

#[async_trait]
impl Actor for HealthServer {
    fn name(&self) -> ActorType {
        ActorType::HealthActor
    }

    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        let heartbeat_handle = self.spawn_heartbeat(supervisor_tx.clone());

        let app = Router::new()
            .route("/health", get(health))
            .with_state(self.state.clone());

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting health server on {}", addr);

        let result: anyhow::Result<()> = async {
            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
            Ok(())
        }
        .await;

        if let Err(e) = &result {
            warn!("Health server stopped: {}", e);
            heartbeat_handle.abort();
            supervisor_tx
                .send(ControlMessage::Error(self.name(), e.to_string()))
                .await?;
        }
        result
    }
}

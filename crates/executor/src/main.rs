use dotenvy::dotenv;
use std::{env, sync::Arc};
use tracing::debug;

use common::actors::ActorType;
use common::config::Config;
use common::logger;
use coordination::{InMemoryJobQueue, InMemoryLockService, JobQueue, LockService};
use storage::db;
use venue::{AlphaClassifier, HttpClassifierClient, HttpVenueClient, VenueClient};

use executor::actors::supervisor::Supervisor;
use executor::health::HealthServer;
use executor::services::JobContext;
use executor::services::trigger_service::TriggerService;
use executor::services::worker_service::{Pipeline, WorkerService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::setup_logger();
    dotenv().ok();
    debug!("System starting up...");

    let config = Config::from_env();
    let data_folder = env::var("WORKDIR").unwrap_or_else(|_| "data".to_string());
    let pool = db::connect(&data_folder).await?;

    let locks: Arc<dyn LockService> = Arc::new(InMemoryLockService::new());
    let execute_queue: Arc<dyn JobQueue> = Arc::new(InMemoryJobQueue::new());
    let classify_queue: Arc<dyn JobQueue> = Arc::new(InMemoryJobQueue::new());
    let venue_client: Arc<dyn VenueClient> =
        Arc::new(HttpVenueClient::new(config.venue_api_url.clone()));
    let classifier: Arc<dyn AlphaClassifier> = Arc::new(HttpClassifierClient::new(
        config.classifier_api_url.clone(),
        config.classifier_api_key.clone(),
    ));

    let ctx = JobContext {
        pool: pool.clone(),
        locks: locks.clone(),
        venue: venue_client,
        classifier,
        config: config.clone(),
    };

    let mut supervisor = Supervisor::new();

    let pool_for_trigger = pool.clone();
    let exec_q_for_trigger = execute_queue.clone();
    let class_q_for_trigger = classify_queue.clone();
    let config_for_trigger = config.clone();
    supervisor.register_actor(
        ActorType::TriggerActor,
        Box::new(move || {
            Box::new(TriggerService::new(
                pool_for_trigger.clone(),
                exec_q_for_trigger.clone(),
                class_q_for_trigger.clone(),
                config_for_trigger.trigger_interval,
                config_for_trigger.retry_window,
            ))
        }),
    );

    for i in 0..config.worker_count {
        let queue = execute_queue.clone();
        let ctx_for_worker = ctx.clone();
        let concurrency = config.execute_concurrency;
        supervisor.register_actor(
            ActorType::ExecuteWorker(i as u8),
            Box::new(move || {
                Box::new(WorkerService::new(
                    i as u8,
                    Pipeline::Execute,
                    queue.clone(),
                    ctx_for_worker.clone(),
                    concurrency,
                ))
            }),
        );

        let queue = classify_queue.clone();
        let ctx_for_worker = ctx.clone();
        let concurrency = config.classify_concurrency;
        supervisor.register_actor(
            ActorType::ClassifyWorker(i as u8),
            Box::new(move || {
                Box::new(WorkerService::new(
                    i as u8,
                    Pipeline::Classify,
                    queue.clone(),
                    ctx_for_worker.clone(),
                    concurrency,
                ))
            }),
        );
    }

    let pool_for_health = pool.clone();
    let locks_for_health = locks.clone();
    let exec_q_for_health = execute_queue.clone();
    let class_q_for_health = classify_queue.clone();
    let config_for_health = config.clone();
    supervisor.register_actor(
        ActorType::HealthActor,
        Box::new(move || {
            Box::new(HealthServer::new(
                pool_for_health.clone(),
                locks_for_health.clone(),
                exec_q_for_health.clone(),
                class_q_for_health.clone(),
                config_for_health.clone(),
            ))
        }),
    );

    supervisor.start().await;
    Ok(())
}

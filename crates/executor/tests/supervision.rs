use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::actors::{Actor, ActorType, ControlMessage};
use executor::actors::supervisor::Supervisor;
use tokio::sync::mpsc;
use tokio::time::sleep;

/// Increments its counter on spawn and immediately crashes.
struct Crashing {
    spawns: Arc<AtomicUsize>,
}

#[async_trait]
impl Actor for Crashing {
    fn name(&self) -> ActorType {
        ActorType::TriggerActor
    }

    async fn run(&mut self, _supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        self.spawns.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("boom")
    }
}

/// Increments its counter on spawn, then heartbeats forever.
struct Steady {
    spawns: Arc<AtomicUsize>,
}

#[async_trait]
impl Actor for Steady {
    fn name(&self) -> ActorType {
        ActorType::HealthActor
    }

    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        self.spawns.fetch_add(1, Ordering::SeqCst);
        let _heartbeat_handle = self.spawn_heartbeat(supervisor_tx);
        loop {
            sleep(Duration::from_secs(1)).await;
        }
    }
}

#[tokio::test]
async fn crashed_actor_is_respawned_after_staleness() {
    let spawns = Arc::new(AtomicUsize::new(0));
    let mut supervisor = Supervisor::new();
    let counter = spawns.clone();
    supervisor.register_actor(
        ActorType::TriggerActor,
        Box::new(move || {
            Box::new(Crashing {
                spawns: counter.clone(),
            })
        }),
    );

    let supervisor_task = tokio::spawn(async move { supervisor.start().await });

    // staleness threshold is 3s with a 1s check cadence
    sleep(Duration::from_secs(6)).await;
    supervisor_task.abort();

    assert!(
        spawns.load(Ordering::SeqCst) >= 2,
        "crashed actor was never respawned"
    );
}

#[tokio::test]
async fn heartbeating_actor_is_left_alone() {
    let spawns = Arc::new(AtomicUsize::new(0));
    let mut supervisor = Supervisor::new();
    let counter = spawns.clone();
    supervisor.register_actor(
        ActorType::HealthActor,
        Box::new(move || {
            Box::new(Steady {
                spawns: counter.clone(),
            })
        }),
    );

    let supervisor_task = tokio::spawn(async move { supervisor.start().await });

    sleep(Duration::from_secs(6)).await;
    supervisor_task.abort();

    assert_eq!(spawns.load(Ordering::SeqCst), 1);
}

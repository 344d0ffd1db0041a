use std::{collections::HashMap, time::Duration};

use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{self, Instant},
};
use tracing::{error, warn};

use common::actors::{Actor, ActorType, ControlMessage};

const CHECK_INTERVAL: Duration = Duration::from_secs(1);
const STALE_AFTER: Duration = Duration::from_secs(3);

type ActorFactory = Box<dyn Fn() -> Box<dyn Actor> + Send + Sync>;

/// Runtime state of one supervised actor: its task handle and the last
/// heartbeat it sent.
struct Supervised {
    handle: JoinHandle<()>,
    last_pulse: Instant,
}

/// Spawns every registered actor from its factory and watches heartbeats;
/// an actor whose pulse goes stale is aborted and respawned.
pub struct Supervisor {
    factories: HashMap<ActorType, ActorFactory>,
    running: HashMap<ActorType, Supervised>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            running: HashMap::new(),
        }
    }

    pub fn register_actor(&mut self, actor_type: ActorType, factory: ActorFactory) {
        self.factories.insert(actor_type, factory);
    }

    pub async fn start(&mut self) {
        let (supervisor_tx, mut supervisor_rx) = mpsc::channel::<ControlMessage>(512);
        let mut check_interval = time::interval(CHECK_INTERVAL);

        let registered: Vec<ActorType> = self.factories.keys().copied().collect();
        for actor_type in registered {
            self.spawn_actor(actor_type, supervisor_tx.clone());
        }

        loop {
            tokio::select! {
                Some(msg) = supervisor_rx.recv() => {
                    match msg {
                        ControlMessage::Heartbeat(actor_type) => {
                            if let Some(state) = self.running.get_mut(&actor_type) {
                                state.last_pulse = Instant::now();
                            }
                        }
                        ControlMessage::Shutdown(actor_type) => {
                            warn!("{:?} is shutting down gracefully.", actor_type);
                            if let Some(state) = self.running.remove(&actor_type) {
                                state.handle.abort();
                            }
                        }
                        ControlMessage::Error(actor_type, error_msg) => {
                            error!("Actor {:?} reported error: {}", actor_type, error_msg);
                            // the actor is still alive enough to report;
                            // staleness decides the respawn
                            if let Some(state) = self.running.get_mut(&actor_type) {
                                state.last_pulse = Instant::now();
                            }
                        }
                    }
                }

                _ = check_interval.tick() => {
                    let now = Instant::now();
                    let dead: Vec<ActorType> = self
                        .running
                        .iter()
                        .filter(|(_, state)| now.duration_since(state.last_pulse) > STALE_AFTER)
                        .map(|(actor_type, _)| *actor_type)
                        .collect();

                    for actor_type in dead {
                        warn!("{:?} is unresponsive!", actor_type);
                        if let Some(state) = self.running.remove(&actor_type) {
                            state.handle.abort();
                        }
                        self.spawn_actor(actor_type, supervisor_tx.clone());
                    }
                }
            }
        }
    }

    fn spawn_actor(&mut self, actor_type: ActorType, tx: mpsc::Sender<ControlMessage>) {
        let mut new_actor = self.factories[&actor_type]();
        let handle = tokio::spawn(async move {
            if let Err(e) = new_actor.run(tx).await {
                error!("Actor {:?} crashed: {}", &actor_type, e);
            }
        });
        self.running.insert(
            actor_type,
            Supervised {
                handle,
                last_pulse: Instant::now(),
            },
        );
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

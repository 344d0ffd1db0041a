pub mod agents_repo;
pub mod deployments_repo;
pub mod messages_repo;
pub mod positions_repo;
pub mod signals_repo;

pub use agents_repo::AgentsRepository;
pub use deployments_repo::DeploymentsRepository;
pub use messages_repo::MessagesRepository;
pub use positions_repo::PositionsRepository;
pub use signals_repo::{ExecutionCandidate, SignalsRepository};

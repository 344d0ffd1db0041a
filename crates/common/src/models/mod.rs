pub mod agent;
pub mod deployment;
pub mod job;
pub mod message;
pub mod position;
pub mod signal;

pub use agent::Agent;
pub use deployment::Deployment;
pub use job::JobPayload;
pub use message::{Classification, Message};
pub use position::{Position, PositionInsert};
pub use signal::Signal;

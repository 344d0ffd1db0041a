pub mod actors;
pub mod health;
pub mod retry;
pub mod services;

pub mod classifier_client;
pub mod venue_client;

pub use classifier_client::{AlphaClassifier, HttpClassifierClient};
pub use venue_client::{HttpVenueClient, TradeResult, VenueClient};

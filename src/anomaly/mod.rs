pub mod engine;
pub mod feed;
pub mod rules;
pub mod types;

pub use engine::AnomalyClassifier;
pub use feed::{AnomalyFeed, SharedFeed};
pub use types::{Anomaly, AnomalyType, Severity, ValueUnit};

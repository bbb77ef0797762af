pub mod anomaly;
pub mod api;
pub mod config;
pub mod history;
pub mod monitor;
pub mod pattern;
pub mod pipeline;
pub mod session;
pub mod stats;
pub mod stream;

pub mod detector;
pub mod types;

pub use detector::{detect_patterns, in_window};
pub use types::{Pattern, PatternData, PatternType};

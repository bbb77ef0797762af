pub mod connector;
pub mod normalize;
pub mod raw;
pub mod replay;
pub mod types;

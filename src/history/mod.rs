pub mod buffer;
pub mod store;

pub use buffer::BoundedBuffer;
pub use store::CandleHistory;

pub mod checkpoint;
pub mod processor;
pub mod throttle;

pub use checkpoint::Checkpoint;
pub use processor::BatchProcessor;
pub use throttle::Throttle;

pub mod aggregator;
pub mod fleet;
pub mod retention;

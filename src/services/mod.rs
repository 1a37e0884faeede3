pub mod aggregator;
pub mod engine;
pub mod fetch;
pub mod orchestrator;
pub mod queue;
pub mod render;
pub mod segmentation;
pub mod storage;
pub mod worker;

pub mod analysis;
pub mod artifact;
pub mod importance;
pub mod job;
pub mod request;

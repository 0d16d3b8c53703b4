pub mod error;
pub mod job;
pub mod manager;
pub mod store;

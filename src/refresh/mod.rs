pub mod coordinator;
pub mod subscribers;

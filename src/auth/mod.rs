pub mod account;
pub mod events;
pub mod token;
pub mod token_store;

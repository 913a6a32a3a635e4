pub mod arena;
pub mod auth;
pub mod citations;
pub mod client;
pub mod config;
pub mod conversation;
pub mod errors;
pub mod intermediate;
pub mod models;
pub mod slots;
pub mod stream;

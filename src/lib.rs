pub mod app;
pub mod auth;
pub mod config;
pub mod console;
pub mod error;
pub mod handlers;
pub mod stream;
pub mod upstream;

// src/lib.rs

pub mod config;
pub mod error;
pub mod grading;
pub mod handlers;
pub mod models;
pub mod notifier;
pub mod routes;
pub mod state;
pub mod utils;

pub use routes::create_router;

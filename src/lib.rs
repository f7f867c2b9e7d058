pub mod cache;
pub mod cli;
pub mod config;
pub mod model;
pub mod repository;
pub mod resolver;

mod api;
mod flock;

pub use api::{default_cache_directory, EngineError, ResolutionEngine, ResolutionEngineBuilder};

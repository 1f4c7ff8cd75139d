pub mod analysis;
pub mod backend;
pub mod config;
pub mod error;
pub mod gateway;
pub mod guides;
pub mod intake;
pub mod reply;
pub mod service;
pub mod speech;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use gateway::{GroqGateway, LlmGateway};
pub use service::{AppState, build_router, create_app};

pub mod commands;
pub mod config;
pub mod dependency;
pub mod engine;
pub mod error;
pub mod executor;
pub mod logging;
pub mod models;
pub mod monitor;
pub mod objects;
pub mod processor;
pub mod queue;
pub mod scheduler;
pub mod timeperiod;

pub use engine::{Engine, EngineHooks, HookDecision};
pub use error::VigilError;

pub mod combine;
pub mod config;
pub mod dirs;
pub mod emit;
pub mod expander;
pub mod orchestrator;
pub mod parser;
pub mod resolver;
pub mod syntax;
pub mod util;

pub use config::Config;
pub use orchestrator::AggregateOrchestrator;

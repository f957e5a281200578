pub mod config;
pub mod doctrine;
pub mod errors;
pub mod executor;
pub mod export;
pub mod gates;
pub mod generate;
pub mod llm;
pub mod orchestrator;
pub mod policy;
pub mod ui;

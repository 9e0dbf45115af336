pub mod agents;
pub mod calendar;
pub mod cli;
pub mod config;
pub mod doctor;
pub mod error;
pub mod llm;
pub mod profiles;
pub mod provider;
pub mod report;
pub mod runner;
pub mod server;
pub mod telemetry;

//! askdb - natural language questions answered with engine-backed SQL.
//!
//! The pipeline classifies a question, renders the schema catalog into a
//! grounded prompt, generates one Presto SQL statement, executes it through a
//! shared engine session, and formats the result for display.

pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod generator;
pub mod history;
pub mod llm;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod schema;
pub mod session;
pub mod triage;

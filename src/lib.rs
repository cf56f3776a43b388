//! Toolwright: an LLM agent harness.
//!
//! Tools come from OpenAPI documents, the local filesystem, command line
//! programs and MCP servers. An [`agent::Agent`] drives the conversation
//! between a completion service and those tools.

pub mod agent;
pub mod config;
pub mod llm;
pub mod openapi;
pub mod setup;
pub mod tools;
pub mod types;

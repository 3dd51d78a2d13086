//! agentflow — workflow execution engine for remote coding-agent jobs.
//!
//! A workflow declares one or more prompts to run against a remote coding
//! agent, optionally fanning out into parallel child workflows bound to
//! elements of a parent run's structured result. This crate owns the
//! execution engine: dispatcher, shape handlers, timeout tracking,
//! fallback dispatch, result extraction, and completion checking.
//! Storage, workflow parsing, and the agent API are consumed through
//! traits; an external ticker drives [`engine::Dispatcher::process_all`].

pub mod agent;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod prompts;
pub mod store;
pub mod workflow;

pub use error::{Error, Result};

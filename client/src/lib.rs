//! Deployctl Library
//!
//! Core modules for the AutoDeploy dashboard client: it submits a deployment
//! request to the orchestrator and tracks its progress over a persistent
//! event stream until a terminal outcome.

pub mod app;
pub mod deploy;
pub mod errors;
pub mod http;
pub mod logs;
pub mod models;
pub mod socket;
pub mod utils;

//! Deployment tracking module

pub mod binder;
pub mod catalog;
pub mod progress;
pub mod reconciler;

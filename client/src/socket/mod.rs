//! Event-stream connection layer

pub mod events;
pub mod manager;
pub mod transport;

//! Real-time chat relay over WebSockets

pub mod auth;
pub mod connections;
pub mod listener;
pub mod message;
pub mod relay;

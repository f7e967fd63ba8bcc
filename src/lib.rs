//! Scheduled notification jobs and the real-time chat relay of the
//! AfroAsiaConnect marketplace.

pub mod api;
pub mod app;
pub mod auth;
pub mod boot;
pub mod broadcaster;
pub mod cli;
pub mod commands;
pub mod config;
pub mod copywriter;
pub mod database;
pub mod environment;
pub mod job_queue;
pub mod jobs;
pub mod messaging;
pub mod notifications;
pub mod notifiers;
pub mod router;
pub mod setup_tracing;
pub mod websocket;

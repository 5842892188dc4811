//! PingyThingy - Webhook API Service
//!
//! This crate implements a small webhook-receiving API guarded by fixed-window
//! admission control. Every request is checked against a process-wide limiter
//! and a limiter for its resolved identity, each partitioned into independent
//! windows.

pub mod config;
pub mod error;
pub mod http;
pub mod models;
pub mod ratelimit;
pub mod telemetry;
pub mod validation;

//! Shared utilities for the fiscal watchdog
//!
//! This crate provides common functionality used across the watchdog workspace:
//! tracing subscriber setup and the logging settings it is driven by.

pub mod config;
pub mod logging;

pub use config::{LogConfig, LogFormat};
pub use logging::{LoggingError, init_tracing, try_init_tracing};

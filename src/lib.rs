//! SleepyDrive - host control daemon
//!
//! Serves an HTTP(S) control API with manual or automatic (ACME) TLS, an
//! optional local diagnostics endpoint and an optional best-effort capture
//! loop, each run as a supervised background task.

pub mod boot;
pub mod capture;
pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod middleware;
pub mod notice;
pub mod profiler;
pub mod provision;
pub mod routes;
pub mod state;
pub mod supervisor;
pub mod system;

pub use boot::{Boot, BootOptions, Running};
pub use error::BootError;

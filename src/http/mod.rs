//! Primary listener and TLS strategy handling.
//!
//! The strategy is decided once per boot ([`strategy::select_strategy`]),
//! turned into listener TLS settings ([`tls::ListenerConfig`]) and served by
//! [`server::Listener`]:
//! - **Automatic**: ACME (Let's Encrypt) certificates for one hostname
//! - **Manual**: user-provided certificate and key files
//! - **None**: plain HTTP
//!
//! The listener also includes graceful shutdown on SIGTERM/SIGINT and, for
//! automatic TLS, a port-80 challenge responder.

pub mod challenge;
pub mod server;
pub mod shutdown;
pub mod strategy;
pub mod tls;

pub use server::{Listener, ListenerState, ServerError};
pub use strategy::{select_strategy, AutoTlsRequest, StrategyKind, TlsStrategy};
pub use tls::{CertificateSource, ListenerConfig, TlsSettings};

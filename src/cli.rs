//! Command line interface.

use std::path::PathBuf;

use chrono::Datelike;
use clap::{Parser, Subcommand};

use crate::boot::BootOptions;
use crate::config::{DEFAULT_CONFIG_PATH, DEFAULT_PPROF_PORT};
use crate::http::AutoTlsRequest;
use crate::profiler::ProfilerSettings;

/// Runs the API server allowing programmatic control of this machine.
#[derive(Parser, Debug)]
#[command(name = "sleepydrive", version, about)]
pub struct Args {
    /// Set the location for the configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Pass in order to run sleepydrive in debug mode
    #[arg(long, global = true)]
    pub debug: bool,

    /// If the profiler should be enabled. It binds to localhost:6060 by default
    #[arg(long)]
    pub pprof: bool,

    /// Enables block profile support, may have performance impacts
    #[arg(long, default_value_t = 0)]
    pub pprof_block_rate: u32,

    /// If provided with --pprof, the port it will run on
    #[arg(long, default_value_t = DEFAULT_PPROF_PORT)]
    pub pprof_port: u16,

    /// Generate and manage TLS certificates automatically using Let's Encrypt
    #[arg(long)]
    pub auto_tls: bool,

    /// Required with --auto-tls, the FQDN for the generated certificate
    #[arg(long, default_value = "")]
    pub tls_hostname: String,

    /// Ignore certificate verification errors when executing API calls
    #[arg(long)]
    pub ignore_certificate_errors: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Prints the current executable version and exits.
    Version,
}

/// Invalid flag combination, reported before anything else runs
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UsageError {
    #[error(
        "A TLS hostname must be provided when running sleepydrive with automatic TLS, \
         e.g.:\n\n    ./sleepydrive --auto-tls --tls-hostname my.example.com"
    )]
    MissingTlsHostname,
}

impl Args {
    /// Pre-flight validation of the flag combination.
    pub fn validate(&self) -> Result<(), UsageError> {
        if self.auto_tls && self.tls_hostname.is_empty() {
            return Err(UsageError::MissingTlsHostname);
        }
        Ok(())
    }

    pub fn boot_options(&self) -> BootOptions {
        BootOptions {
            auto_tls: AutoTlsRequest::new(self.auto_tls, self.tls_hostname.clone()),
            profiler: ProfilerSettings {
                enabled: self.pprof,
                block_rate: self.pprof_block_rate,
                port: self.pprof_port,
            },
            ignore_certificate_errors: self.ignore_certificate_errors,
        }
    }
}

/// Text printed by the `version` subcommand
pub fn version_text() -> String {
    format!(
        "sleepydrive v{}\nCopyright © 2022 - {} Jimmi Hansen & Contributors",
        env!("CARGO_PKG_VERSION"),
        chrono::Local::now().year()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("sleepydrive").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]);
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert!(!args.debug);
        assert_eq!(args.pprof_port, 6060);
        assert_eq!(args.command, None);
        assert_eq!(args.validate(), Ok(()));
    }

    #[test]
    fn test_auto_tls_requires_hostname() {
        let args = parse(&["--auto-tls"]);
        assert_eq!(args.validate(), Err(UsageError::MissingTlsHostname));

        let args = parse(&["--auto-tls", "--tls-hostname", "my.example.com"]);
        assert_eq!(args.validate(), Ok(()));
    }

    #[test]
    fn test_boot_options_from_flags() {
        let args = parse(&[
            "--pprof",
            "--pprof-block-rate",
            "10",
            "--pprof-port",
            "7070",
            "--auto-tls",
            "--tls-hostname",
            "my.example.com",
            "--ignore-certificate-errors",
        ]);
        let options = args.boot_options();
        assert!(options.auto_tls.enabled);
        assert_eq!(options.auto_tls.hostname, "my.example.com");
        assert_eq!(
            options.profiler,
            ProfilerSettings {
                enabled: true,
                block_rate: 10,
                port: 7070,
            }
        );
        assert!(options.ignore_certificate_errors);
    }

    #[test]
    fn test_version_subcommand() {
        let args = parse(&["version", "--config", "/tmp/x.toml"]);
        assert_eq!(args.command, Some(Command::Version));
        assert_eq!(args.config, PathBuf::from("/tmp/x.toml"));
        assert!(version_text().starts_with(&format!("sleepydrive v{}", env!("CARGO_PKG_VERSION"))));
    }
}

//! SleepyDrive: host control daemon.
//!
//! This is the application entry point. It validates the command line, loads
//! the TOML configuration, initializes logging, and hands over to the boot
//! sequence which serves until the process is signalled.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use sleepydrive::cli::{self, Args, Command};
use sleepydrive::config::{self, AppConfig, ConfigError, RUNTIME_SHUTDOWN_SECS};
use sleepydrive::http::tls;
use sleepydrive::{boot, logging, notice, Boot};

fn main() -> ExitCode {
    let args = Args::parse();

    if let Some(Command::Version) = args.command {
        println!("{}", cli::version_text());
        return ExitCode::SUCCESS;
    }

    // Checked before anything touches the disk
    if let Err(e) = args.validate() {
        println!("{e}");
        return ExitCode::FAILURE;
    }

    // The capture loop may be parked in device I/O that no cancellation reaches,
    // so the runtime is shut down with a deadline instead of dropped.
    match boot::block_on(serve(args), Duration::from_secs(RUNTIME_SHUTDOWN_SECS)) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Failed to start the async runtime: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn serve(args: Args) -> ExitCode {
    if !tls::install_crypto_provider() {
        eprintln!("Failed to install the default TLS crypto provider");
        return ExitCode::FAILURE;
    }

    let config_path = match config::resolve_config_path(&args.config) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let mut config = match AppConfig::load(&config_path) {
        Ok(config) => config,
        Err(ConfigError::NotFound(path)) => {
            println!("{}", notice::configuration_notice(&path));
            return ExitCode::FAILURE;
        }
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    config.set_debug_via_flag(args.debug);

    let _log = match logging::init(&config.system.log_directory, config.debug) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    notice::print_logo();

    if config.debug {
        tracing::debug!("running in debug mode");
    }
    tracing::info!(config_file = %config_path.display(), "loading configuration from file");
    tracing::info!(timezone = %config.system.timezone, "configured system timezone");
    tracing::info!(
        username = %config.system.username,
        uid = config.system.user.uid,
        gid = config.system.user.gid,
        "configured system user"
    );

    if args.ignore_certificate_errors {
        tracing::warn!(
            "running with --ignore-certificate-errors: TLS certificate verification is disabled \
             for outbound API calls"
        );
    }

    if let Err(e) = config.write_to_disk(&config_path) {
        tracing::error!(error = %e, "failed to save configuration to disk");
        return ExitCode::FAILURE;
    }

    match Boot::new(Arc::new(config), args.boot_options()).run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "failed to serve the API");
            ExitCode::FAILURE
        }
    }
}

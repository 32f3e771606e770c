//! Boot sequence.
//!
//! Directories are provisioned and the TLS strategy is selected before the
//! listener starts. The profiler and capture subsystems are started after
//! strategy selection as supervised tasks; their order relative to each
//! other and to the listener is not significant. The listener is the only
//! step that blocks.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum_server::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::capture::{CaptureSettings, CaptureSupervisor, RawBackend};
use crate::config::AppConfig;
use crate::error::BootError;
use crate::http::server::parse_listen_address;
use crate::http::{
    select_strategy, shutdown, AutoTlsRequest, Listener, ListenerConfig, ListenerState,
    ServerError, TlsStrategy,
};
use crate::profiler::{self, ProfilerSettings};
use crate::provision::{self, ProvisionReport};
use crate::routes::create_router;
use crate::state::{build_http_client, AppState};
use crate::supervisor::TaskHandle;

/// Run `main` to completion on a fresh multi-threaded runtime.
///
/// Blocking subsystem work that is still stuck in device I/O afterwards is
/// abandoned after `grace` instead of holding the process open.
pub fn block_on<F: Future>(main: F, grace: Duration) -> std::io::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let output = runtime.block_on(main);
    runtime.shutdown_timeout(grace);
    Ok(output)
}

/// Options supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct BootOptions {
    pub auto_tls: AutoTlsRequest,
    pub profiler: ProfilerSettings,
    pub ignore_certificate_errors: bool,
}

/// Result of the side-effecting steps that precede the listener
#[derive(Debug)]
pub struct Prepared {
    pub directories: ProvisionReport,
    pub strategy: TlsStrategy,
    pub listener: ListenerConfig,
}

pub struct Boot {
    config: Arc<AppConfig>,
    options: BootOptions,
}

impl Boot {
    pub fn new(config: Arc<AppConfig>, options: BootOptions) -> Self {
        Self { config, options }
    }

    /// Provision directories, select the strategy and build the listener settings.
    pub fn prepare(&self) -> Result<Prepared, BootError> {
        let directories = provision::provision_system(&self.config.system);

        let api = &self.config.api;
        let strategy = select_strategy(
            &self.options.auto_tls,
            &api.ssl,
            &self.config.system.tls_cache_directory(),
            &api.address(),
        );
        let addr = parse_listen_address(&api.host, api.port)?;
        let listener = ListenerConfig::for_strategy(addr, &strategy);

        Ok(Prepared {
            directories,
            strategy,
            listener,
        })
    }

    /// Run every boot step and start serving in the background.
    pub fn start(self) -> Result<Running, BootError> {
        let prepared = self.prepare()?;

        let http = build_http_client(self.options.ignore_certificate_errors)?;
        let app = create_router(AppState::new(self.config.clone(), http));

        let tasks = CancellationToken::new();
        let mut subsystems = Vec::new();
        subsystems.extend(profiler::start(self.options.profiler, &tasks));
        subsystems.extend(
            CaptureSupervisor::new(RawBackend, CaptureSettings::from(&self.config.capture))
                .start(self.config.capture.enabled, &tasks),
        );

        let listener = Listener::new(prepared.listener);
        let state = listener.subscribe();
        let handle = listener.handle();
        let join = tokio::spawn(listener.run(app));

        Ok(Running {
            listener: join,
            state,
            handle,
            subsystems,
            tasks,
        })
    }

    /// Boot and serve until the process is asked to exit.
    pub async fn run(self) -> Result<(), BootError> {
        let running = self.start()?;
        shutdown::setup_shutdown_handler(running.shutdown_handle());
        running.wait().await
    }
}

/// A booted daemon whose listener runs in the background
pub struct Running {
    listener: JoinHandle<Result<(), ServerError>>,
    state: watch::Receiver<ListenerState>,
    handle: Handle,
    subsystems: Vec<TaskHandle>,
    tasks: CancellationToken,
}

impl Running {
    pub fn state(&self) -> watch::Receiver<ListenerState> {
        self.state.clone()
    }

    pub fn shutdown_handle(&self) -> Handle {
        self.handle.clone()
    }

    pub fn subsystems(&self) -> &[TaskHandle] {
        &self.subsystems
    }

    /// Take ownership of the subsystem handles, e.g. to join them.
    pub fn take_subsystems(&mut self) -> Vec<TaskHandle> {
        std::mem::take(&mut self.subsystems)
    }

    /// Wait for the listener to stop, then cancel the subsystems.
    pub async fn wait(self) -> Result<(), BootError> {
        let result = match self.listener.await {
            Ok(result) => result.map_err(BootError::from),
            Err(e) => Err(BootError::ListenerAborted(e.to_string())),
        };
        self.tasks.cancel();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SystemConfig;

    fn config_in(dir: &std::path::Path) -> AppConfig {
        let mut config = AppConfig {
            system: SystemConfig {
                root_directory: dir.to_path_buf(),
                archive_directory: dir.join("archives"),
                backup_directory: dir.join("backups"),
                ..SystemConfig::default()
            },
            ..AppConfig::default()
        };
        config.api.host = "127.0.0.1".to_string();
        config.api.port = 0;
        config
    }

    #[test]
    fn test_prepare_provisions_before_selecting() {
        let dir = tempfile::tempdir().unwrap();
        let boot = Boot::new(Arc::new(config_in(dir.path())), BootOptions::default());

        let prepared = boot.prepare().unwrap();
        assert!(prepared.directories.all_ok());
        assert!(dir.path().join("archives").is_dir());
        assert!(dir.path().join("backups").is_dir());
        assert_eq!(prepared.strategy, TlsStrategy::None);
        assert_eq!(prepared.listener.tls, None);
    }

    #[test]
    fn test_prepare_automatic_uses_root_cache() {
        let dir = tempfile::tempdir().unwrap();
        let options = BootOptions {
            auto_tls: AutoTlsRequest::new(true, "example.com"),
            ..BootOptions::default()
        };
        let boot = Boot::new(Arc::new(config_in(dir.path())), options);

        let prepared = boot.prepare().unwrap();
        assert_eq!(
            prepared.strategy,
            TlsStrategy::Automatic {
                hostname: "example.com".to_string(),
                cache_dir: dir.path().join(".tls-cache"),
            }
        );
        assert!(prepared.listener.tls.unwrap().has_certificate_callback());
    }

    #[test]
    fn test_prepare_rejects_unparseable_host() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.api.host = "not a host".to_string();

        let err = Boot::new(Arc::new(config), BootOptions::default())
            .prepare()
            .unwrap_err();
        assert!(matches!(err, BootError::Server(ServerError::Address(_))));
    }
}

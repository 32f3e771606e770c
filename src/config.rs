//! Configuration loading and constants.
//!
//! Loads the daemon configuration from a TOML file and defines the default
//! paths, ports and log filters. `AppConfig` is the root configuration struct;
//! it is read once at start-up and shared read-only behind an `Arc`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// =============================================================================
// Default Paths and Strings
// =============================================================================

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "/etc/ddu/config.toml";

/// Default log filter when RUST_LOG is not set
pub const DEFAULT_LOG_FILTER: &str = "sleepydrive=info,tower_http=info";

/// Log filter used in debug mode when RUST_LOG is not set
pub const DEBUG_LOG_FILTER: &str = "sleepydrive=debug,tower_http=debug";

/// File name prefix of the rotating log file
pub const LOG_FILE_PREFIX: &str = "sleepydrive";

/// Number of rotated log files kept on disk
pub const LOG_FILES_RETAINED: usize = 7;

/// Sub-directory of the root directory used as the ACME certificate cache
pub const TLS_CACHE_DIR: &str = ".tls-cache";

/// Port of the unencrypted ACME challenge responder
pub const ACME_HTTP_PORT: u16 = 80;

/// Default port of the diagnostics endpoint
pub const DEFAULT_PPROF_PORT: u16 = 6060;

/// Mode for the archive and backup directories (rwxr-xr-x)
pub const DATA_DIR_MODE: u32 = 0o755;

/// Mode for the log install directory (rwx------)
pub const INSTALL_DIR_MODE: u32 = 0o700;

/// Seconds allowed for in-flight requests to drain on shutdown
pub const SHUTDOWN_DRAIN_SECS: u64 = 30;

/// Seconds blocking subsystem work gets to finish once the daemon is done
pub const RUNTIME_SHUTDOWN_SECS: u64 = 5;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Enables debug logging
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
}

/// Paths and identity of the host system
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SystemConfig {
    #[serde(default = "SystemConfig::default_root")]
    pub root_directory: PathBuf,
    #[serde(default = "SystemConfig::default_log")]
    pub log_directory: PathBuf,
    #[serde(default = "SystemConfig::default_archive")]
    pub archive_directory: PathBuf,
    #[serde(default = "SystemConfig::default_backup")]
    pub backup_directory: PathBuf,
    /// Name of the system user the daemon manages files as
    #[serde(default = "SystemConfig::default_username")]
    pub username: String,
    #[serde(default = "SystemConfig::default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub user: SystemUser,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            root_directory: Self::default_root(),
            log_directory: Self::default_log(),
            archive_directory: Self::default_archive(),
            backup_directory: Self::default_backup(),
            username: Self::default_username(),
            timezone: Self::default_timezone(),
            user: SystemUser::default(),
        }
    }
}

impl SystemConfig {
    fn default_root() -> PathBuf {
        PathBuf::from("/var/lib/ddu")
    }
    fn default_log() -> PathBuf {
        PathBuf::from("/var/log/ddu")
    }
    fn default_archive() -> PathBuf {
        PathBuf::from("/var/lib/ddu/archives")
    }
    fn default_backup() -> PathBuf {
        PathBuf::from("/var/lib/ddu/backups")
    }
    fn default_username() -> String {
        "ddu".to_string()
    }
    fn default_timezone() -> String {
        "UTC".to_string()
    }

    /// Directory used by the ACME client to cache account keys and certificates
    pub fn tls_cache_directory(&self) -> PathBuf {
        self.root_directory.join(TLS_CACHE_DIR)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SystemUser {
    #[serde(default)]
    pub uid: u32,
    #[serde(default)]
    pub gid: u32,
}

/// API listener configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default = "ApiConfig::default_host")]
    pub host: String,
    #[serde(default = "ApiConfig::default_port")]
    pub port: u16,
    #[serde(default)]
    pub ssl: SslConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            ssl: SslConfig::default(),
        }
    }
}

impl ApiConfig {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8080
    }

    /// `host:port` as written in the configuration
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Manually managed TLS certificate
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SslConfig {
    #[serde(default)]
    pub enabled: bool,
    /// PEM certificate chain
    #[serde(default, rename = "cert")]
    pub certificate_file: PathBuf,
    /// PEM private key
    #[serde(default, rename = "key")]
    pub key_file: PathBuf,
}

/// Peripheral capture loop settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CaptureConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Device node or file frames are read from
    #[serde(default = "CaptureConfig::default_device")]
    pub device: PathBuf,
    /// Classifier model descriptor
    #[serde(default = "CaptureConfig::default_model")]
    pub model: PathBuf,
    #[serde(default = "CaptureConfig::default_width")]
    pub width: u32,
    #[serde(default = "CaptureConfig::default_height")]
    pub height: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            device: Self::default_device(),
            model: Self::default_model(),
            width: Self::default_width(),
            height: Self::default_height(),
        }
    }
}

impl CaptureConfig {
    fn default_device() -> PathBuf {
        PathBuf::from("/dev/video0")
    }
    fn default_model() -> PathBuf {
        PathBuf::from("/etc/ddu/classifier.toml")
    }
    fn default_width() -> u32 {
        640
    }
    fn default_height() -> u32 {
        480
    }
}

impl AppConfig {
    /// Read and parse the configuration file.
    ///
    /// A missing file is reported as [`ConfigError::NotFound`] so the caller can
    /// print setup instructions instead of a generic error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConfigError::NotFound(path.to_path_buf()),
            _ => ConfigError::Io(e),
        })?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Persist the configuration back to disk.
    pub fn write_to_disk<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Turn debug mode on when requested on the command line.
    ///
    /// The flag can only enable debug mode; it never disables a file setting.
    pub fn set_debug_via_flag(&mut self, debug: bool) {
        if debug && !self.debug {
            self.debug = true;
        }
    }
}

/// Resolve a possibly relative configuration path against the working directory.
pub fn resolve_config_path(path: &Path) -> Result<PathBuf, ConfigError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(path))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

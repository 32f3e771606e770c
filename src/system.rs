//! Host system information.

use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Information {
    pub version: String,
    pub kernel_version: String,
    pub architecture: String,
    pub os: String,
    pub cpu_count: usize,
    pub timezone: String,
}

/// Collect information about the running host.
pub fn information(timezone: &str) -> Information {
    Information {
        version: env!("CARGO_PKG_VERSION").to_string(),
        kernel_version: sysinfo::System::kernel_version().unwrap_or_default(),
        architecture: std::env::consts::ARCH.to_string(),
        os: std::env::consts::OS.to_string(),
        cpu_count: std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1),
        timezone: timezone.to_string(),
    }
}

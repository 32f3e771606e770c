//! Best-effort peripheral capture loop.
//!
//! Runs on the blocking pool, fully decoupled from the listener:
//! 1. Open the capture device. Failure ends the task (no retry).
//! 2. Load the classifier model. Failure is logged and the loop runs with an
//!    unloaded classifier, which detects nothing.
//! 3. Read, detect, annotate and render frames until the render surface
//!    reports an interrupt. Empty frames and read errors are skipped.
//!
//! The loop owns the device, the surface and the frame buffer; all three are
//! dropped on every exit path.

mod classifier;
mod frame;
mod raw;

use std::path::PathBuf;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

pub use classifier::{Classifier, Detection, Model};
pub use frame::{draw_rectangle, Frame, Region};
pub use raw::{LogSurface, RawBackend, RawDevice};

use crate::config::CaptureConfig;
use crate::supervisor::{SupervisedTask, TaskHandle};

/// Outline colour for detections
const ANNOTATION_VALUE: u8 = 255;

/// Outline thickness in pixels
const ANNOTATION_THICKNESS: u32 = 3;

/// Time given to the surface to report an interrupt after each frame
const INTERRUPT_POLL: Duration = Duration::from_millis(1);

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Failed to open capture device {}: {source}", device.display())]
    DeviceOpen {
        device: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read from capture device {}: {source}", device.display())]
    FrameRead {
        device: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load classifier model {}: {reason}", path.display())]
    ModelLoad { path: PathBuf, reason: String },

    #[error("Render surface error: {0}")]
    Render(String),
}

/// Source of frames
pub trait CaptureDevice: Send {
    /// Fill `frame` with the next frame. `Ok(false)` means nothing was available.
    fn read(&mut self, frame: &mut Frame) -> Result<bool, CaptureError>;
}

/// Where annotated frames are shown
pub trait RenderSurface: Send {
    fn present(&mut self, frame: &Frame, detections: &[Detection]) -> Result<(), CaptureError>;

    /// Wait up to `timeout` for a viewer interrupt. Returns true once interrupted.
    fn wait_interrupt(&mut self, timeout: Duration) -> bool;
}

/// Opens the device and the render surface
pub trait CaptureBackend: Send + 'static {
    type Device: CaptureDevice;
    type Surface: RenderSurface;

    fn open_device(&self, settings: &CaptureSettings) -> Result<Self::Device, CaptureError>;

    fn open_surface(
        &self,
        settings: &CaptureSettings,
        interrupt: CancellationToken,
    ) -> Result<Self::Surface, CaptureError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSettings {
    pub device: PathBuf,
    pub model: PathBuf,
    pub width: u32,
    pub height: u32,
    pub window_title: String,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self::from(&CaptureConfig::default())
    }
}

impl From<&CaptureConfig> for CaptureSettings {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            device: config.device.clone(),
            model: config.model.clone(),
            width: config.width,
            height: config.height,
            window_title: "Face Detect".to_string(),
        }
    }
}

/// Counters reported when the loop ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub frames: u64,
    pub skipped: u64,
    pub read_errors: u64,
    pub detections: u64,
}

pub struct CaptureSupervisor<B: CaptureBackend> {
    backend: B,
    settings: CaptureSettings,
}

impl<B: CaptureBackend> CaptureSupervisor<B> {
    pub fn new(backend: B, settings: CaptureSettings) -> Self {
        Self { backend, settings }
    }

    /// Run the capture loop on the current thread until interrupted.
    pub fn run(self, interrupt: CancellationToken) -> Result<CaptureStats, CaptureError> {
        let device = self.settings.device.display().to_string();
        let mut camera = self.backend.open_device(&self.settings)?;
        let mut surface = self.backend.open_surface(&self.settings, interrupt)?;
        let mut frame = Frame::new();

        let mut classifier = Classifier::new();
        if let Err(e) = classifier.load(&self.settings.model) {
            tracing::error!(
                subsystem = "classifier",
                file = %self.settings.model.display(),
                error = %e,
                "failed reading classifier model"
            );
        }

        tracing::debug!(device = %device, "start reading capture device");

        let mut stats = CaptureStats::default();
        loop {
            match camera.read(&mut frame) {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(subsystem = "camera", device = %device, "no frame available");
                }
                Err(e) => {
                    stats.read_errors += 1;
                    frame.clear();
                    tracing::error!(
                        subsystem = "camera",
                        device = %device,
                        error = %e,
                        "cannot read device"
                    );
                }
            }

            if frame.is_empty() {
                stats.skipped += 1;
                if surface.wait_interrupt(INTERRUPT_POLL) {
                    break;
                }
                continue;
            }

            let detections = classifier.detect(&frame);
            tracing::debug!("found {} detections", detections.len());
            for detection in &detections {
                draw_rectangle(
                    &mut frame,
                    detection.region,
                    ANNOTATION_VALUE,
                    ANNOTATION_THICKNESS,
                );
            }
            stats.frames += 1;
            stats.detections += detections.len() as u64;

            if let Err(e) = surface.present(&frame, &detections) {
                tracing::error!(subsystem = "capture-window", error = %e, "failed to render frame");
            }
            if surface.wait_interrupt(INTERRUPT_POLL) {
                break;
            }
        }

        tracing::info!(
            frames = stats.frames,
            skipped = stats.skipped,
            read_errors = stats.read_errors,
            detections = stats.detections,
            "capture loop stopped"
        );
        Ok(stats)
    }

    /// Start the loop as a supervised blocking task.
    pub fn start(self, enabled: bool, parent: &CancellationToken) -> Option<TaskHandle> {
        SupervisedTask::new("capture", enabled)
            .spawn_blocking(parent, move |interrupt| self.run(interrupt).map(|_| ()))
    }
}

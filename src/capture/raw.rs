//! Default capture backend.
//!
//! Reads fixed-size 8-bit grayscale frames from a device node or file, and
//! renders annotated frames to the log. The viewer interrupt is the capture
//! task's cancellation token.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::PathBuf;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::classifier::Detection;
use super::frame::Frame;
use super::{CaptureBackend, CaptureDevice, CaptureError, CaptureSettings, RenderSurface};

#[derive(Debug, Clone, Copy, Default)]
pub struct RawBackend;

impl CaptureBackend for RawBackend {
    type Device = RawDevice;
    type Surface = LogSurface;

    fn open_device(&self, settings: &CaptureSettings) -> Result<RawDevice, CaptureError> {
        let file = File::open(&settings.device).map_err(|source| CaptureError::DeviceOpen {
            device: settings.device.clone(),
            source,
        })?;
        tracing::debug!(device = %settings.device.display(), "capture device opened");
        Ok(RawDevice {
            path: settings.device.clone(),
            file,
            width: settings.width,
            height: settings.height,
        })
    }

    fn open_surface(
        &self,
        settings: &CaptureSettings,
        interrupt: CancellationToken,
    ) -> Result<LogSurface, CaptureError> {
        Ok(LogSurface {
            title: settings.window_title.clone(),
            interrupt,
            presented: 0,
        })
    }
}

pub struct RawDevice {
    path: PathBuf,
    file: File,
    width: u32,
    height: u32,
}

impl CaptureDevice for RawDevice {
    fn read(&mut self, frame: &mut Frame) -> Result<bool, CaptureError> {
        let buffer = frame.buffer_mut(self.width, self.height);
        match self.file.read_exact(buffer) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                frame.clear();
                Ok(false)
            }
            Err(source) => {
                frame.clear();
                Err(CaptureError::FrameRead {
                    device: self.path.clone(),
                    source,
                })
            }
        }
    }
}

impl Drop for RawDevice {
    fn drop(&mut self) {
        tracing::debug!(device = %self.path.display(), "capture device released");
    }
}

pub struct LogSurface {
    title: String,
    interrupt: CancellationToken,
    presented: u64,
}

impl RenderSurface for LogSurface {
    fn present(&mut self, _frame: &Frame, detections: &[Detection]) -> Result<(), CaptureError> {
        self.presented += 1;
        for detection in detections {
            tracing::debug!(
                window = %self.title,
                label = %detection.label,
                x = detection.region.x,
                y = detection.region.y,
                width = detection.region.width,
                height = detection.region.height,
                "detection rendered"
            );
        }
        Ok(())
    }

    fn wait_interrupt(&mut self, timeout: Duration) -> bool {
        if !self.interrupt.is_cancelled() {
            std::thread::sleep(timeout);
        }
        self.interrupt.is_cancelled()
    }
}

impl Drop for LogSurface {
    fn drop(&mut self) {
        tracing::debug!(window = %self.title, frames = self.presented, "render surface closed");
    }
}

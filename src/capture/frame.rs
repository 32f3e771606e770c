//! 8-bit grayscale frame buffer and annotation.

/// A single captured frame. An empty frame carries no pixels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap raw pixels. Returns `None` if the length does not match the geometry.
    pub fn from_pixels(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        (pixels.len() == Self::byte_len(width, height)).then_some(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Resize to the given geometry and hand out the buffer for filling.
    pub fn buffer_mut(&mut self, width: u32, height: u32) -> &mut [u8] {
        self.width = width;
        self.height = height;
        self.pixels.resize(Self::byte_len(width, height), 0);
        &mut self.pixels
    }

    /// Drop the contents but keep the allocation for the next read.
    pub fn clear(&mut self) {
        self.pixels.clear();
    }

    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(y as usize * self.width as usize + x as usize).copied()
    }

    fn set(&mut self, x: u32, y: u32, value: u8) {
        if x < self.width && y < self.height {
            let idx = y as usize * self.width as usize + x as usize;
            if let Some(p) = self.pixels.get_mut(idx) {
                *p = value;
            }
        }
    }
}

/// Axis-aligned box in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Draw the outline of `region` with the given thickness, clipped to the frame.
pub fn draw_rectangle(frame: &mut Frame, region: Region, value: u8, thickness: u32) {
    if region.width == 0 || region.height == 0 {
        return;
    }
    let right = region.x + region.width - 1;
    let bottom = region.y + region.height - 1;

    for y in region.y..=bottom {
        for x in region.x..=right {
            let on_edge = x < region.x + thickness
                || y < region.y + thickness
                || x + thickness > right
                || y + thickness > bottom;
            if on_edge {
                frame.set(x, y, value);
            }
        }
    }
}

//! The in-memory canvas: a fixed-size RGB grid with PNG encoding.

use crate::error::{Error, Result};

/// Canvas width in pixels
pub const WIDTH: u32 = 256;
/// Canvas height in pixels
pub const HEIGHT: u32 = 256;

/// Current colors of every pixel, row-major, 3 bytes per pixel.
///
/// Freshly constructed canvases are all black. Alpha is implicitly opaque;
/// only RGB is stored and encoded.
#[derive(Clone, PartialEq, Eq)]
pub struct Canvas {
    pixels: Vec<u8>,
}

impl Canvas {
    pub fn new() -> Self {
        Self {
            pixels: vec![0; (WIDTH * HEIGHT * 3) as usize],
        }
    }

    fn index(x: u32, y: u32) -> usize {
        ((y * WIDTH + x) * 3) as usize
    }

    /// Validate raw client coordinates against the grid.
    ///
    /// Returns the narrowed in-bounds coordinates, or `OutOfBounds` with the
    /// offending values preserved for the error message.
    pub fn check_bounds(x: i64, y: i64) -> Result<(u32, u32)> {
        if x < 0 || y < 0 || x >= i64::from(WIDTH) || y >= i64::from(HEIGHT) {
            return Err(Error::OutOfBounds {
                x,
                y,
                width: WIDTH,
                height: HEIGHT,
            });
        }
        Ok((x as u32, y as u32))
    }

    /// Color at (x, y). Callers pass coordinates already validated by
    /// [`Canvas::check_bounds`].
    pub fn get(&self, x: u32, y: u32) -> (u8, u8, u8) {
        let i = Self::index(x, y);
        (self.pixels[i], self.pixels[i + 1], self.pixels[i + 2])
    }

    pub fn set(&mut self, x: u32, y: u32, rgb: (u8, u8, u8)) {
        let i = Self::index(x, y);
        self.pixels[i] = rgb.0;
        self.pixels[i + 1] = rgb.1;
        self.pixels[i + 2] = rgb.2;
    }

    /// Raw RGB buffer, row-major.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Encode the whole grid as an 8-bit RGB PNG.
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut encoder = png::Encoder::new(&mut out, WIDTH, HEIGHT);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder
            .write_header()
            .map_err(|e| Error::Encode(e.to_string()))?;
        writer
            .write_image_data(&self.pixels)
            .map_err(|e| Error::Encode(e.to_string()))?;
        writer.finish().map_err(|e| Error::Encode(e.to_string()))?;
        Ok(out)
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Canvas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Canvas({}x{})", WIDTH, HEIGHT)
    }
}

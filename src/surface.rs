//! Panel surfaces: where composed frames end up.
//!
//! The Scene Root composes into an `RgbImage` and hands it to a
//! `PanelSurface`. On the Pi that is [`LedSurface`], which owns the matrix
//! and double-buffers through `swap()`. [`MemorySurface`] keeps the frame
//! in memory for tests and headless runs.

use crate::PanelConfig;
use image::RgbImage;

/// The physical (or simulated) pixel buffer.
pub trait PanelSurface {
    /// Fixed panel geometry.
    fn panel(&self) -> PanelConfig;

    /// Push a composed frame to the panel.
    fn present(&mut self, frame: &RgbImage);

    fn width(&self) -> i32 {
        self.panel().width()
    }

    fn height(&self) -> i32 {
        self.panel().height()
    }
}

/// Keeps the last presented frame.
pub struct MemorySurface {
    panel: PanelConfig,
    last_frame: RgbImage,
    presents: usize,
}

impl MemorySurface {
    pub fn new(panel: PanelConfig) -> Self {
        Self {
            panel,
            last_frame: RgbImage::new(panel.cols, panel.rows),
            presents: 0,
        }
    }

    pub fn last_frame(&self) -> &RgbImage {
        &self.last_frame
    }

    /// Number of frames presented so far.
    pub fn present_count(&self) -> usize {
        self.presents
    }

    /// Number of pixels that are not black in the last frame.
    pub fn lit_pixels(&self) -> usize {
        self.last_frame.pixels().filter(|p| p.0 != [0, 0, 0]).count()
    }
}

impl PanelSurface for MemorySurface {
    fn panel(&self) -> PanelConfig {
        self.panel
    }

    fn present(&mut self, frame: &RgbImage) {
        self.last_frame.clone_from(frame);
        self.presents += 1;
    }
}

#[cfg(feature = "hardware")]
pub use led::LedSurface;

#[cfg(feature = "hardware")]
mod led {
    use super::PanelSurface;
    use crate::{Color, PanelConfig, create_matrix};
    use image::RgbImage;
    use rpi_led_matrix::{LedCanvas, LedMatrix};

    /// The real panel, driven through `rpi-led-matrix`.
    ///
    /// The C library is not thread-safe, so this must stay on the thread
    /// that runs the scheduler.
    pub struct LedSurface {
        matrix: LedMatrix,
        canvas: Option<LedCanvas>,
        panel: PanelConfig,
        brightness: u8,
    }

    impl LedSurface {
        pub fn new(
            panel: PanelConfig,
            brightness: u8,
        ) -> std::result::Result<Self, Box<dyn std::error::Error>> {
            let matrix = create_matrix(panel)?;
            let canvas = matrix.offscreen_canvas();
            Ok(Self {
                matrix,
                canvas: Some(canvas),
                panel,
                brightness: brightness.min(100),
            })
        }
    }

    /// Draw an image to canvas with brightness scaling applied.
    fn draw_frame_with_brightness(canvas: &mut LedCanvas, img: &RgbImage, brightness: u8) {
        for (x, y, pixel) in img.enumerate_pixels() {
            let c = Color::new(pixel[0], pixel[1], pixel[2]).apply_brightness(brightness);
            canvas.set(x as i32, y as i32, &c.into());
        }
    }

    impl PanelSurface for LedSurface {
        fn panel(&self) -> PanelConfig {
            self.panel
        }

        fn present(&mut self, frame: &RgbImage) {
            if let Some(mut canvas) = self.canvas.take() {
                draw_frame_with_brightness(&mut canvas, frame, self.brightness);
                self.canvas = Some(self.matrix.swap(canvas));
            }
        }
    }
}

//! Fireworks and scrolling marquee for an RGB LED matrix panel.
//!
//! The display alternates two phases forever:
//! - a particle fireworks burst ([`fireworks`])
//! - one scrolling pass per configured message ([`marquee`])
//!
//! [`scheduler`] drives both and recovers from memory exhaustion.
//! Everything renders into a [`scene::SceneRoot`] which pushes composed
//! frames to a [`surface::PanelSurface`]. On the Pi that surface is the
//! real panel (`hardware` feature); in tests it is an in-memory buffer.
//!
//! This module also holds the small shared pieces:
//! - Panel configuration
//! - Color type and palettes
//! - Matrix initialization with our hardware defaults
//! - Signal handling for clean shutdown

pub mod assets;
pub mod clock;
pub mod config;
pub mod error;
pub mod fireworks;
pub mod font;
pub mod marquee;
pub mod scene;
pub mod scheduler;
pub mod surface;
pub mod timekeeping;

pub use error::{Error, Result};

#[cfg(feature = "hardware")]
use rpi_led_matrix::{LedMatrix, LedMatrixOptions, LedRuntimeOptions};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

// ── Panel configuration ────────────────────────────────────────────

/// Configuration for the LED panel dimensions.
///
/// Panel geometry is fixed at startup and passed explicitly to every
/// component that needs it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PanelConfig {
    pub rows: u32,
    pub cols: u32,
}

impl PanelConfig {
    pub fn new(rows: u32, cols: u32) -> Self {
        Self { rows, cols }
    }

    /// Panel width in pixels, as a signed coordinate.
    pub fn width(&self) -> i32 {
        self.cols as i32
    }

    /// Panel height in pixels, as a signed coordinate.
    pub fn height(&self) -> i32 {
        self.rows as i32
    }

    /// Total number of pixels on the panel.
    pub fn pixel_count(&self) -> u32 {
        self.rows * self.cols
    }
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self { rows: 64, cols: 64 }
    }
}

// ── Color ──────────────────────────────────────────────────────────

/// Our own color type, decoupled from the hardware crate.
///
/// At the hardware boundary, we convert via `Into<LedColor>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::from_hex(0x000000);
    pub const WHITE: Color = Color::from_hex(0xFFFFFF);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Build a color from a packed `0xRRGGBB` value.
    pub const fn from_hex(rgb: u32) -> Self {
        Self {
            r: ((rgb >> 16) & 0xFF) as u8,
            g: ((rgb >> 8) & 0xFF) as u8,
            b: (rgb & 0xFF) as u8,
        }
    }

    /// Pack into `0xRRGGBB`.
    pub fn to_hex(self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }

    /// Parse `#RRGGBB`, `0xRRGGBB` or bare `RRGGBB`.
    pub fn parse_hex(s: &str) -> Option<Self> {
        let s = s.trim();
        let digits = s
            .strip_prefix('#')
            .or_else(|| s.strip_prefix("0x"))
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if digits.len() != 6 {
            return None;
        }
        u32::from_str_radix(digits, 16).ok().map(Self::from_hex)
    }

    /// Scale every channel by `numerator / denominator`, rounding down.
    ///
    /// Used for the spark fade: `numerator` is the remaining lifetime.
    /// Values outside `0..=denominator` are clamped so the result always
    /// fits in 8 bits.
    pub fn faded(self, numerator: i32, denominator: i32) -> Self {
        if denominator <= 0 {
            return Self::BLACK;
        }
        let n = numerator.clamp(0, denominator) as u32;
        let d = denominator as u32;
        Self {
            r: (self.r as u32 * n / d) as u8,
            g: (self.g as u32 * n / d) as u8,
            b: (self.b as u32 * n / d) as u8,
        }
    }

    /// Apply brightness scaling (0-100) to this color.
    pub fn apply_brightness(self, brightness: u8) -> Self {
        if brightness >= 100 {
            return self;
        }
        Self {
            r: ((self.r as u16 * brightness as u16) / 100) as u8,
            g: ((self.g as u16 * brightness as u16) / 100) as u8,
            b: ((self.b as u16 * brightness as u16) / 100) as u8,
        }
    }
}

impl From<Color> for image::Rgb<u8> {
    fn from(c: Color) -> Self {
        image::Rgb([c.r, c.g, c.b])
    }
}

/// Convert our Color to the hardware crate's LedColor at the boundary.
#[cfg(feature = "hardware")]
impl From<Color> for rpi_led_matrix::LedColor {
    fn from(c: Color) -> Self {
        rpi_led_matrix::LedColor {
            red: c.r,
            green: c.g,
            blue: c.b,
        }
    }
}

// ── Palettes ───────────────────────────────────────────────────────

pub const SOFT_RED: Color = Color::from_hex(0xCC4444);
pub const DEEP_CORAL: Color = Color::from_hex(0xFF6F61);
pub const PEACH: Color = Color::from_hex(0xFFDAB9);
pub const WARM_GOLD: Color = Color::from_hex(0xFFD700);
pub const GOLDENROD: Color = Color::from_hex(0xDAA520);
pub const TANGERINE: Color = Color::from_hex(0xFFA07A);

/// Spark base colors, leaning toward warm tones.
pub const FIREWORK_COLORS: [Color; 6] = [
    Color::WHITE,
    GOLDENROD,
    WARM_GOLD,
    DEEP_CORAL,
    SOFT_RED,
    TANGERINE,
];

/// Text colors picked when a message has no explicit color.
pub const CELEBRATION_COLORS: [Color; 7] = [
    Color::WHITE,
    GOLDENROD,
    WARM_GOLD,
    DEEP_CORAL,
    SOFT_RED,
    TANGERINE,
    PEACH,
];

// ── Matrix initialization ──────────────────────────────────────────

/// Create a matrix configured for our hardware:
/// Pi Zero 2 W + Adafruit Bonnet + configurable panel size.
///
/// # Rust concept: Result and the ? operator
/// Matrix initialization can fail (e.g., if not running as root, or if
/// GPIO is unavailable). The caller uses `?` to propagate errors upward.
#[cfg(feature = "hardware")]
pub fn create_matrix(panel: PanelConfig) -> std::result::Result<LedMatrix, Box<dyn std::error::Error>> {
    let mut options = LedMatrixOptions::new();
    options.set_rows(panel.rows);
    options.set_cols(panel.cols);
    options.set_hardware_mapping("adafruit-hat");

    options.set_pwm_bits(6)?; // The marquee palette doesn't need more than 6 bits
    options.set_pwm_lsb_nanoseconds(130);

    let mut rt_options = LedRuntimeOptions::new();
    rt_options.set_gpio_slowdown(2); // Pi Zero 2 W requires slowdown=2

    let matrix = LedMatrix::new(Some(options), Some(rt_options))?;

    Ok(matrix)
}

/// Set up a Ctrl+C handler that sets `running` to false.
///
/// # Rust concept: Arc and AtomicBool
/// The flag is shared between the scheduler loop and the signal handler.
/// `AtomicBool` is a thread-safe boolean, no mutex needed for a single bool.
pub fn setup_signal_handler() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl-C handler");

    running
}

/// Check if the main loop should keep running.
pub fn is_running(running: &AtomicBool) -> bool {
    running.load(Ordering::SeqCst)
}

// ── Tests ──────────────────────────────────────────────────────────

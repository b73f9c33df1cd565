//! Scroll compositor: turns a message into one measured, scrollable unit.
//!
//! Layout, left to right:
//! `[icon] <33 px> [line 1 / line 2] [icon]`
//!
//! A single line uses the large font; two lines use the small font
//! stacked at y = 10 and y = 22. The compositor only builds and measures
//! the unit; the scheduler moves it.

use crate::assets::IconStore;
use crate::error::Result;
use crate::font::FontSet;
use crate::scene::{Element, Icon, Label, Layer};
use crate::{CELEBRATION_COLORS, Color};
use rand::Rng;
use std::fmt;
use std::sync::Arc;

/// Gap between the leading icon and the text.
pub const ICON_SPACING: i32 = 33;
/// Extra pixel after the trailing icon so it fully leaves the panel.
pub const TRAILING_MARGIN: i32 = 1;
pub const SINGLE_LINE_Y: i32 = 16;
pub const FIRST_LINE_Y: i32 = 10;
pub const SECOND_LINE_Y: i32 = 22;
const LEADING_ICON_POS: (i32, i32) = (2, 33);
const TRAILING_ICON_Y: i32 = 0;

/// Zero-argument text source evaluated at layout time.
pub type TextProvider = Arc<dyn Fn() -> String + Send + Sync>;

/// One line of a message: fixed text, or text produced when the message
/// is about to scroll (e.g. the current time).
#[derive(Clone)]
pub enum MessageLine {
    Literal(String),
    Provider(TextProvider),
}

impl MessageLine {
    pub fn provider<F>(f: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        MessageLine::Provider(Arc::new(f))
    }

    pub fn resolve(&self) -> String {
        match self {
            MessageLine::Literal(text) => text.clone(),
            MessageLine::Provider(f) => f(),
        }
    }
}

impl fmt::Debug for MessageLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageLine::Literal(text) => f.debug_tuple("Literal").field(text).finish(),
            MessageLine::Provider(_) => f.write_str("Provider(..)"),
        }
    }
}

impl From<&str> for MessageLine {
    fn from(text: &str) -> Self {
        MessageLine::Literal(text.to_string())
    }
}

impl From<String> for MessageLine {
    fn from(text: String) -> Self {
        MessageLine::Literal(text)
    }
}

/// A message as configured. An empty `line2` means single-line layout.
#[derive(Clone, Debug)]
pub struct MessageDescriptor {
    pub line1: MessageLine,
    pub line2: MessageLine,
    /// Icon reference, e.g. `/graphics/logo.bmp`.
    pub icon: Option<String>,
    /// Used for both lines when set.
    pub color: Option<Color>,
}

impl MessageDescriptor {
    pub fn new(line1: impl Into<MessageLine>, line2: impl Into<MessageLine>) -> Self {
        Self {
            line1: line1.into(),
            line2: line2.into(),
            icon: None,
            color: None,
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    /// Evaluate providers once; the result stays fixed for the whole pass.
    pub fn resolve(&self) -> ResolvedMessage {
        ResolvedMessage {
            line1: self.line1.resolve(),
            line2: self.line2.resolve(),
            icon: self.icon.clone(),
            color: self.color,
        }
    }
}

/// A message with all text known.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedMessage {
    pub line1: String,
    pub line2: String,
    pub icon: Option<String>,
    pub color: Option<Color>,
}

impl ResolvedMessage {
    pub fn is_single_line(&self) -> bool {
        self.line2.trim().is_empty()
    }
}

/// The laid-out message: its elements and how far it must scroll.
#[derive(Debug)]
pub struct ContentUnit {
    layer: Layer,
    total_width: i32,
}

impl ContentUnit {
    pub fn total_width(&self) -> i32 {
        self.total_width
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.layer.elements()
    }

    pub fn labels(&self) -> impl Iterator<Item = &Label> {
        self.elements().filter_map(|e| match e {
            Element::Label(l) => Some(l),
            _ => None,
        })
    }

    pub fn icons(&self) -> impl Iterator<Item = &Icon> {
        self.elements().filter_map(|e| match e {
            Element::Icon(i) => Some(i),
            _ => None,
        })
    }

    /// Hand the elements over to the scene.
    pub fn into_layer(self) -> Layer {
        self.layer
    }
}

/// Pick the two line colors.
///
/// An explicit color is used for both lines. Otherwise line 1 gets a
/// random palette entry and line 2 a random entry that differs from it.
pub fn pick_colors<R: Rng + ?Sized>(explicit: Option<Color>, palette: &[Color], rng: &mut R) -> (Color, Color) {
    if let Some(color) = explicit {
        return (color, color);
    }
    if palette.is_empty() {
        return (Color::WHITE, Color::WHITE);
    }

    let first = palette[rng.random_range(0..palette.len())];
    let others = palette.iter().filter(|c| **c != first).count();
    if others == 0 {
        return (first, first);
    }
    let pick = rng.random_range(0..others);
    let second = palette
        .iter()
        .filter(|c| **c != first)
        .nth(pick)
        .copied()
        .unwrap_or(first);
    (first, second)
}

/// Builds content units from messages.
#[derive(Clone, Debug)]
pub struct ScrollCompositor {
    fonts: FontSet,
    icons: IconStore,
    palette: Vec<Color>,
}

impl ScrollCompositor {
    pub fn new(fonts: FontSet, icons: IconStore) -> Self {
        Self {
            fonts,
            icons,
            palette: CELEBRATION_COLORS.to_vec(),
        }
    }

    pub fn fonts(&self) -> &FontSet {
        &self.fonts
    }

    /// Lay out one message.
    ///
    /// A missing or unreadable icon is logged and left out; the text is
    /// still laid out as if the icon had zero width. Only running out of
    /// memory is an error.
    pub fn layout<R: Rng + ?Sized>(&self, message: &ResolvedMessage, rng: &mut R) -> Result<ContentUnit> {
        let mut layer = Layer::new();
        let (color1, color2) = pick_colors(message.color, &self.palette, rng);

        let icon = message.icon.as_deref().and_then(|reference| {
            self.icons
                .load(reference)
                .inspect_err(|e| tracing::warn!("Error loading icon {}: {}", reference, e))
                .ok()
        });

        let mut icon_width = 0;
        if let Some(image) = &icon {
            let leading = Icon {
                image: Arc::clone(image),
                x: LEADING_ICON_POS.0,
                y: LEADING_ICON_POS.1,
            };
            icon_width = leading.width();
            layer.push(Element::Icon(leading))?;
        }

        let text_start = if message.icon.is_some() {
            icon_width + ICON_SPACING
        } else {
            0
        };

        let text_width = if message.is_single_line() {
            let label = Label {
                text: message.line1.clone(),
                font: Arc::clone(&self.fonts.large),
                color: color1,
                x: text_start,
                y: SINGLE_LINE_Y,
            };
            let width = label.width();
            layer.push(Element::Label(label))?;
            width
        } else {
            let first = Label {
                text: message.line1.clone(),
                font: Arc::clone(&self.fonts.small),
                color: color1,
                x: text_start,
                y: FIRST_LINE_Y,
            };
            let second = Label {
                text: message.line2.clone(),
                font: Arc::clone(&self.fonts.small),
                color: color2,
                x: text_start,
                y: SECOND_LINE_Y,
            };
            let width = first.width().max(second.width());
            layer.push(Element::Label(first))?;
            layer.push(Element::Label(second))?;
            width
        };

        let mut total_width = text_start + text_width;

        if let Some(image) = icon {
            let trailing = Icon {
                image,
                x: text_start + text_width,
                y: TRAILING_ICON_Y,
            };
            total_width += trailing.width() + TRAILING_MARGIN;
            layer.push(Element::Icon(trailing))?;
        }

        Ok(ContentUnit { layer, total_width })
    }
}

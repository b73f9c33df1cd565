//! BDF bitmap fonts: measuring and drawing text.
//!
//! Parsing is done by `bdf-parser`; this module keeps what the panel needs
//! from each glyph (advance, bounding box, bitmap) and the `FONT_ASCENT`,
//! `FONT_DESCENT` and `DEFAULT_CHAR` properties.

use crate::error::{Error, Result};
use crate::Color;
use bdf_parser::Property;
use image::RgbImage;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One glyph's metrics and bitmap.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Glyph {
    /// Horizontal pen advance in pixels.
    pub advance: i32,
    pub width: u32,
    pub height: u32,
    pub x_offset: i32,
    /// Offset of the bitmap's bottom row above the baseline.
    pub y_offset: i32,
    /// Rows top to bottom, each padded to whole bytes, MSB first.
    bitmap: Vec<u8>,
}

impl Glyph {
    fn from_bdf(glyph: &bdf_parser::Glyph) -> Self {
        let bbox = &glyph.bounding_box;
        Self {
            advance: glyph.device_width.x,
            width: bbox.size.x.max(0) as u32,
            height: bbox.size.y.max(0) as u32,
            x_offset: bbox.offset.x,
            y_offset: bbox.offset.y,
            bitmap: glyph.bitmap.clone(),
        }
    }

    fn is_set(&self, x: u32, y: u32) -> bool {
        if x >= self.width {
            return false;
        }
        let stride = self.width.div_ceil(8) as usize;
        self.bitmap
            .get(y as usize * stride + x as usize / 8)
            .is_some_and(|byte| byte & (0x80 >> (x % 8)) != 0)
    }
}

#[derive(Clone, Debug)]
pub struct BdfFont {
    name: String,
    ascent: i32,
    descent: i32,
    default_char: Option<u32>,
    glyphs: HashMap<u32, Glyph>,
}

impl BdfFont {
    /// Load and parse a `.bdf` file.
    pub fn load(path: &Path) -> Result<Self> {
        let source = fs::read(path)?;
        Self::parse(&source, path)
    }

    /// Parse BDF source. `origin` is only used in error messages.
    pub fn parse(source: &[u8], origin: &Path) -> Result<Self> {
        let fail = |message: String| Error::Font {
            path: origin.to_path_buf(),
            message,
        };

        let parsed = bdf_parser::BdfFont::parse(source).map_err(|e| fail(format!("{e:?}")))?;

        // Unencoded glyphs (ENCODING -1) cannot be looked up by character.
        let glyphs: HashMap<u32, Glyph> = parsed
            .glyphs
            .iter()
            .filter_map(|g| g.encoding.map(|ch| (ch as u32, Glyph::from_bdf(g))))
            .collect();
        if glyphs.is_empty() {
            return Err(fail("no glyphs".into()));
        }

        let property = |p: Property| parsed.properties.try_get::<i32>(p).ok();
        let bbox = &parsed.metadata.bounding_box;
        let (ascent, descent) = match (property(Property::FontAscent), property(Property::FontDescent)) {
            (Some(ascent), Some(descent)) => (ascent, descent),
            // Fall back to the font bounding box.
            _ => (bbox.size.y + bbox.offset.y, -bbox.offset.y),
        };

        Ok(BdfFont {
            name: parsed.metadata.name.clone(),
            ascent,
            descent,
            default_char: property(Property::DefaultChar)
                .and_then(|c| u32::try_from(c).ok()),
            glyphs,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ascent(&self) -> i32 {
        self.ascent
    }

    pub fn line_height(&self) -> i32 {
        self.ascent + self.descent
    }

    fn glyph(&self, ch: char) -> Option<&Glyph> {
        self.glyphs
            .get(&(ch as u32))
            .or_else(|| self.default_char.and_then(|c| self.glyphs.get(&c)))
    }

    /// Rendered width of `text` in pixels (sum of glyph advances).
    pub fn measure(&self, text: &str) -> i32 {
        text.chars().filter_map(|ch| self.glyph(ch)).map(|g| g.advance).sum()
    }

    /// Draw `text` with its baseline at `baseline`, clipped to the frame.
    pub fn draw(&self, frame: &mut RgbImage, text: &str, x: i32, baseline: i32, color: Color) {
        let mut pen_x = x;
        for glyph in text.chars().filter_map(|ch| self.glyph(ch)) {
            let top = baseline - glyph.y_offset - glyph.height as i32 + 1;
            for gy in 0..glyph.height {
                for gx in 0..glyph.width {
                    if glyph.is_set(gx, gy) {
                        put_pixel(frame, pen_x + glyph.x_offset + gx as i32, top + gy as i32, color);
                    }
                }
            }
            pen_x += glyph.advance;
        }
    }
}

/// The two sizes the marquee uses.
#[derive(Clone, Debug)]
pub struct FontSet {
    /// Two-line messages and the status screen.
    pub small: Arc<BdfFont>,
    /// Single-line messages.
    pub large: Arc<BdfFont>,
}

impl FontSet {
    pub fn new(small: BdfFont, large: BdfFont) -> Self {
        Self {
            small: Arc::new(small),
            large: Arc::new(large),
        }
    }

    /// Load `<dir>/<small>.bdf` and `<dir>/<large>.bdf`.
    pub fn load(dir: &Path, small: &str, large: &str) -> Result<Self> {
        Ok(Self::new(
            BdfFont::load(&font_path(dir, small))?,
            BdfFont::load(&font_path(dir, large))?,
        ))
    }
}

pub fn font_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.bdf"))
}

/// Set one pixel if it lies on the frame.
pub fn put_pixel(frame: &mut RgbImage, x: i32, y: i32, color: Color) {
    if x >= 0 && y >= 0 && (x as u32) < frame.width() && (y as u32) < frame.height() {
        frame.put_pixel(x as u32, y as u32, color.into());
    }
}

/// Generate a monospaced BDF covering printable ASCII, every glyph a
/// solid `advance - 1` by 7 block. Used by tests across the crate.
#[cfg(test)]
pub(crate) fn block_font(advance: i32) -> BdfFont {
    let width = (advance - 1).max(1) as u32;
    let row = format!("{:02X}", (0xFFu32 << (8 - width.min(8))) & 0xFF);
    let mut src = format!(
        "STARTFONT 2.1\nFONT block-{advance}\nSIZE 7 75 75\nFONTBOUNDINGBOX {width} 7 0 0\n\
         STARTPROPERTIES 2\nFONT_ASCENT 7\nFONT_DESCENT 1\nENDPROPERTIES\nCHARS 95\n"
    );
    for code in 32u32..127 {
        src.push_str(&format!(
            "STARTCHAR c{code}\nENCODING {code}\nSWIDTH 500 0\nDWIDTH {advance} 0\nBBX {width} 7 0 0\nBITMAP\n"
        ));
        for _ in 0..7 {
            src.push_str(&row);
            src.push('\n');
        }
        src.push_str("ENDCHAR\n");
    }
    src.push_str("ENDFONT\n");
    BdfFont::parse(src.as_bytes(), Path::new("block.bdf")).expect("generated font parses")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const TINY: &str = "\
STARTFONT 2.1
FONT -tiny-
SIZE 8 75 75
FONTBOUNDINGBOX 3 3 0 0
STARTPROPERTIES 3
FONT_ASCENT 3
FONT_DESCENT 1
DEFAULT_CHAR 63
ENDPROPERTIES
CHARS 2
STARTCHAR A
ENCODING 65
SWIDTH 500 0
DWIDTH 4 0
BBX 3 3 0 0
BITMAP
40
A0
E0
ENDCHAR
STARTCHAR question
ENCODING 63
SWIDTH 250 0
DWIDTH 2 0
BBX 1 1 0 0
BITMAP
80
ENDCHAR
ENDFONT
";

    fn tiny() -> BdfFont {
        BdfFont::parse(TINY.as_bytes(), Path::new("tiny.bdf")).unwrap()
    }

    #[test]
    fn parses_properties() {
        let font = tiny();
        assert_eq!(font.name(), "-tiny-");
        assert_eq!(font.ascent(), 3);
        assert_eq!(font.line_height(), 4);
    }

    #[rstest]
    #[case("", 0)]
    #[case("A", 4)]
    #[case("AA", 8)]
    #[case("A?", 6)]
    #[case("Az", 6)] // 'z' falls back to DEFAULT_CHAR
    fn measure_sums_advances(#[case] text: &str, #[case] expected: i32) {
        assert_eq!(tiny().measure(text), expected);
    }

    #[test]
    fn draw_places_bitmap_above_baseline() {
        let font = tiny();
        let mut frame = RgbImage::new(8, 8);
        font.draw(&mut frame, "A", 1, 4, Color::WHITE);

        let lit: Vec<(u32, u32)> = frame
            .enumerate_pixels()
            .filter(|(_, _, p)| p.0 != [0, 0, 0])
            .map(|(x, y, _)| (x, y))
            .collect();
        // Rows top to bottom: .X. / X.X / XXX, bottom row on the baseline.
        assert_eq!(lit, vec![(2, 2), (1, 3), (3, 3), (1, 4), (2, 4), (3, 4)]);
    }

    #[test]
    fn draw_clips_outside_frame() {
        let font = tiny();
        let mut frame = RgbImage::new(4, 4);
        font.draw(&mut frame, "AAAA", -2, 1, Color::WHITE);
        assert_eq!(frame.dimensions(), (4, 4));
    }

    #[rstest]
    #[case("not a font")]
    #[case("STARTFONT 2.1\nENDFONT\n")]
    fn rejects_malformed_source(#[case] src: &str) {
        let err = BdfFont::parse(src.as_bytes(), Path::new("bad.bdf")).unwrap_err();
        assert!(matches!(err, Error::Font { .. }));
        assert!(err.to_string().contains("bad.bdf"), "{err}");
    }

    #[test]
    fn glyph_bitmap_rows_are_byte_padded() {
        let glyph = Glyph {
            advance: 10,
            width: 9,
            height: 2,
            bitmap: vec![0x80, 0x80, 0x00, 0x80],
            ..Glyph::default()
        };
        assert!(glyph.is_set(0, 0));
        assert!(glyph.is_set(8, 0));
        assert!(!glyph.is_set(1, 0));
        assert!(glyph.is_set(8, 1));
        assert!(!glyph.is_set(0, 1));
        assert!(!glyph.is_set(9, 0));
        assert!(!glyph.is_set(0, 2));
    }

    #[test]
    fn block_font_is_monospaced() {
        let font = block_font(6);
        assert_eq!(font.measure("Hello"), 30);
        assert_eq!(font.measure("World"), 30);
    }

    #[test]
    fn font_set_loads_from_directory() {
        let tmp = tempfile::TempDir::new().unwrap();
        fs::write(tmp.path().join("tiny.bdf"), TINY).unwrap();
        let fonts = FontSet::load(tmp.path(), "tiny", "tiny").unwrap();
        assert_eq!(fonts.large.measure("A"), 4);
        assert!(FontSet::load(tmp.path(), "tiny", "missing").is_err());
    }
}

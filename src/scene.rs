//! Scene Root: the single composition presented on the panel.
//!
//! A scene holds an ordered list of layers; later layers draw on top. Each
//! layer is a positioned group of elements (spark pixels, text labels,
//! icons). Components own the layer they created: they add it, mutate it
//! through its `LayerId`, and remove it before handing control back.
//!
//! The scene can carry an element budget standing in for the device heap.
//! Going over it, or a failed allocation, is `Error::ResourceExhausted`.

use crate::error::{Error, Result};
use crate::font::{BdfFont, put_pixel};
use crate::surface::PanelSurface;
use crate::{Color, PanelConfig};
use image::RgbImage;
use std::sync::Arc;

/// Index of an element inside its layer. Detached slots are never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ElementId(usize);

/// Handle to a layer in the scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LayerId(u64);

/// A single-pixel sprite.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pixel {
    pub x: i32,
    pub y: i32,
    pub color: Color,
    pub visible: bool,
}

/// A line of text. `y` is the vertical centre of the line.
#[derive(Clone, Debug)]
pub struct Label {
    pub text: String,
    pub font: Arc<BdfFont>,
    pub color: Color,
    pub x: i32,
    pub y: i32,
}

impl Label {
    /// Rendered width in pixels.
    pub fn width(&self) -> i32 {
        self.font.measure(&self.text)
    }

    fn baseline(&self) -> i32 {
        self.y + self.font.ascent() / 2
    }
}

/// A bitmap placed with its top-left corner at (x, y).
#[derive(Clone, Debug)]
pub struct Icon {
    pub image: Arc<RgbImage>,
    pub x: i32,
    pub y: i32,
}

impl Icon {
    pub fn width(&self) -> i32 {
        self.image.width() as i32
    }
}

#[derive(Clone, Debug)]
pub enum Element {
    Pixel(Pixel),
    Label(Label),
    Icon(Icon),
}

impl Element {
    fn draw(&self, frame: &mut RgbImage, dx: i32, dy: i32) {
        match self {
            Element::Pixel(p) if p.visible => put_pixel(frame, dx + p.x, dy + p.y, p.color),
            Element::Pixel(_) => {}
            Element::Label(l) => l.font.draw(frame, &l.text, dx + l.x, dy + l.baseline(), l.color),
            Element::Icon(icon) => {
                for (x, y, px) in icon.image.enumerate_pixels() {
                    let color = Color::new(px[0], px[1], px[2]);
                    put_pixel(frame, dx + icon.x + x as i32, dy + icon.y + y as i32, color);
                }
            }
        }
    }
}

/// A positioned group of elements.
#[derive(Clone, Debug, Default)]
pub struct Layer {
    pub x: i32,
    pub y: i32,
    slots: Vec<Option<Element>>,
}

impl Layer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-allocate room for `additional` elements.
    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        self.slots.try_reserve(additional)?;
        Ok(())
    }

    pub fn push(&mut self, element: Element) -> Result<ElementId> {
        self.slots.try_reserve(1)?;
        self.slots.push(Some(element));
        Ok(ElementId(self.slots.len() - 1))
    }

    /// Drop an element. Detaching twice is a no-op.
    pub fn detach(&mut self, id: ElementId) {
        if let Some(slot) = self.slots.get_mut(id.0) {
            *slot = None;
        }
    }

    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    /// `None` once the element is detached, so updates become no-ops.
    pub fn element_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.slots.iter().flatten()
    }

    /// Elements still attached.
    pub fn len(&self) -> usize {
        self.elements().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn draw(&self, frame: &mut RgbImage) {
        for element in self.elements() {
            element.draw(frame, self.x, self.y);
        }
    }
}

/// The composition the panel renders.
pub struct SceneRoot {
    panel: PanelConfig,
    layers: Vec<(LayerId, Layer)>,
    next_id: u64,
    element_budget: Option<usize>,
    frame: RgbImage,
}

impl SceneRoot {
    pub fn new(panel: PanelConfig) -> Self {
        Self {
            panel,
            layers: Vec::new(),
            next_id: 0,
            element_budget: None,
            frame: RgbImage::new(panel.cols, panel.rows),
        }
    }

    /// A scene that refuses to hold more than `budget` attached elements.
    pub fn with_element_budget(panel: PanelConfig, budget: usize) -> Self {
        Self {
            element_budget: Some(budget),
            ..Self::new(panel)
        }
    }

    /// Start over from an empty composition.
    ///
    /// All layer storage and the frame buffer are freed before anything is
    /// allocated again. Layer ids keep counting up, so a handle from before
    /// the reset never matches a new layer.
    pub fn reset(&mut self) -> &mut Self {
        self.layers = Vec::new();
        self.frame = RgbImage::new(0, 0);
        self.frame = RgbImage::new(self.panel.cols, self.panel.rows);
        self
    }

    pub fn panel(&self) -> PanelConfig {
        self.panel
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Attached elements across all layers.
    pub fn element_count(&self) -> usize {
        self.layers.iter().map(|(_, l)| l.len()).sum()
    }

    pub fn contains(&self, id: LayerId) -> bool {
        self.layers.iter().any(|(lid, _)| *lid == id)
    }

    /// Add a layer on top of the existing ones.
    pub fn add_layer(&mut self, layer: Layer) -> Result<LayerId> {
        if let Some(budget) = self.element_budget {
            let requested = layer.len();
            let available = budget.saturating_sub(self.element_count());
            if requested > available {
                return Err(Error::ResourceExhausted {
                    requested,
                    available,
                });
            }
        }
        self.layers.try_reserve(1)?;

        let id = LayerId(self.next_id);
        self.next_id += 1;
        self.layers.push((id, layer));
        Ok(id)
    }

    /// Remove a layer and hand it back. Removing an absent layer is a no-op.
    pub fn remove_layer(&mut self, id: LayerId) -> Option<Layer> {
        let idx = self.layers.iter().position(|(lid, _)| *lid == id)?;
        Some(self.layers.remove(idx).1)
    }

    pub fn layer_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|(lid, _)| *lid == id).map(|(_, l)| l)
    }

    /// Drop every layer.
    pub fn clear(&mut self) {
        self.layers.clear();
    }

    /// Give unused capacity back to the allocator.
    pub fn reclaim(&mut self) {
        self.layers.shrink_to_fit();
    }

    /// Compose all layers into the frame buffer, bottom to top.
    pub fn compose(&mut self) -> &RgbImage {
        for px in self.frame.pixels_mut() {
            *px = image::Rgb([0, 0, 0]);
        }
        for (_, layer) in &self.layers {
            layer.draw(&mut self.frame);
        }
        &self.frame
    }

    /// Compose and push the frame to the panel.
    pub fn present<S: PanelSurface>(&mut self, surface: &mut S) {
        let frame = self.compose();
        surface.present(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::MemorySurface;
    use pretty_assertions::assert_eq;

    fn pixel(x: i32, y: i32, color: Color) -> Element {
        Element::Pixel(Pixel {
            x,
            y,
            color,
            visible: true,
        })
    }

    fn layer_with(elements: Vec<Element>) -> Layer {
        let mut layer = Layer::new();
        for e in elements {
            layer.push(e).unwrap();
        }
        layer
    }

    #[test]
    fn add_and_remove_layers() {
        let mut scene = SceneRoot::new(PanelConfig::new(8, 8));
        let a = scene.add_layer(Layer::new()).unwrap();
        let b = scene.add_layer(Layer::new()).unwrap();
        assert_eq!(scene.layer_count(), 2);
        assert_ne!(a, b);

        assert!(scene.remove_layer(a).is_some());
        assert!(!scene.contains(a));
        assert!(scene.contains(b));
    }

    #[test]
    fn removing_twice_is_a_no_op() {
        let mut scene = SceneRoot::new(PanelConfig::new(8, 8));
        let id = scene.add_layer(Layer::new()).unwrap();
        assert!(scene.remove_layer(id).is_some());
        assert!(scene.remove_layer(id).is_none());
        assert_eq!(scene.layer_count(), 0);
    }

    #[test]
    fn clear_drops_all_layers() {
        let mut scene = SceneRoot::new(PanelConfig::new(8, 8));
        scene.add_layer(Layer::new()).unwrap();
        scene.add_layer(Layer::new()).unwrap();
        scene.clear();
        assert_eq!(scene.layer_count(), 0);
    }

    #[test]
    fn later_layers_draw_on_top() {
        let mut scene = SceneRoot::new(PanelConfig::new(4, 4));
        scene.add_layer(layer_with(vec![pixel(1, 1, Color::WHITE)])).unwrap();
        scene.add_layer(layer_with(vec![pixel(1, 1, crate::SOFT_RED)])).unwrap();

        let frame = scene.compose();
        assert_eq!(frame.get_pixel(1, 1).0, [0xCC, 0x44, 0x44]);
    }

    #[test]
    fn layer_offset_moves_elements_and_clips() {
        let mut scene = SceneRoot::new(PanelConfig::new(4, 4));
        let mut layer = layer_with(vec![pixel(0, 0, Color::WHITE), pixel(1, 0, Color::WHITE)]);
        layer.x = 3;
        scene.add_layer(layer).unwrap();

        let mut surface = MemorySurface::new(scene.panel());
        scene.present(&mut surface);
        assert_eq!(surface.lit_pixels(), 1);
        assert_eq!(surface.last_frame().get_pixel(3, 0).0, [255, 255, 255]);
    }

    #[test]
    fn hidden_and_detached_pixels_are_not_drawn() {
        let mut layer = Layer::new();
        let hidden = layer
            .push(Element::Pixel(Pixel {
                x: 0,
                y: 0,
                color: Color::WHITE,
                visible: false,
            }))
            .unwrap();
        let gone = layer.push(pixel(1, 0, Color::WHITE)).unwrap();
        layer.detach(gone);
        layer.detach(gone);

        assert!(layer.element(hidden).is_some());
        assert!(layer.element_mut(gone).is_none());
        assert_eq!(layer.len(), 1);

        let mut frame = RgbImage::new(2, 1);
        layer.draw(&mut frame);
        assert!(frame.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn element_budget_rejects_oversized_layers() {
        let mut scene = SceneRoot::with_element_budget(PanelConfig::new(4, 4), 2);
        scene.add_layer(layer_with(vec![pixel(0, 0, Color::WHITE)])).unwrap();

        let err = scene
            .add_layer(layer_with(vec![pixel(0, 0, Color::WHITE), pixel(1, 1, Color::WHITE)]))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ResourceExhausted {
                requested: 2,
                available: 1
            }
        ));
        assert_eq!(scene.layer_count(), 1);
    }

    #[test]
    fn reset_returns_an_empty_scene_with_the_same_budget() {
        let mut scene = SceneRoot::with_element_budget(PanelConfig::new(4, 4), 1);
        scene.add_layer(layer_with(vec![pixel(0, 0, Color::WHITE)])).unwrap();

        let stale = scene.add_layer(Layer::new()).unwrap();

        scene.reset();
        assert_eq!(scene.layer_count(), 0);
        let fresh = scene.add_layer(layer_with(vec![pixel(0, 0, Color::WHITE)])).unwrap();
        assert_ne!(fresh, stale);
        assert!(scene.remove_layer(stale).is_none());
        assert!(scene.add_layer(layer_with(vec![pixel(0, 0, Color::WHITE)])).is_err());
    }
}

//! Fireworks: a short-lived particle burst.
//!
//! A burst is assembled up front (every spark allocated once), then stepped
//! on a fixed 50 ms tick until `duration + 1s` has elapsed. Each spark is a
//! one-pixel element in the animation layer; the spark keeps the element's
//! id and updates it in place.
//!
//! ## Rust concepts
//! - Generic `R: Rng` so tests can use a seeded generator
//! - `swap_remove` to retire expired sparks without shifting the vector

use crate::clock::Clock;
use crate::error::Result;
use crate::scene::{Element, ElementId, Layer, Pixel, SceneRoot};
use crate::surface::PanelSurface;
use crate::{Color, FIREWORK_COLORS, PanelConfig};
use rand::Rng;
use rand::seq::IndexedRandom;
use std::f32::consts::TAU;
use std::time::Duration;

/// Time between simulation steps.
pub const TICK: Duration = Duration::from_millis(50);
/// Extra time after `duration` so late, long-lived sparks finish fading.
pub const GRACE: Duration = Duration::from_secs(1);
/// Added to `dy` every tick.
pub const GRAVITY: f32 = 0.15;
/// Initial upward kick added to every spark's `dy`.
pub const LAUNCH_LIFT: f32 = -2.0;
/// Lifetime that maps to full brightness.
pub const FADE_SPAN: i32 = 25;
pub const MIN_LIFE: i32 = 15;
pub const MAX_LIFE: i32 = 25;
pub const MIN_SPEED: f32 = 1.5;
pub const MAX_SPEED: f32 = 3.0;
/// Delay between consecutive bursts.
pub const STAGGER: Duration = Duration::from_millis(100);
/// Keep burst centres this far from the left and right edges.
const EDGE_MARGIN: i32 = 8;
const TOP_MARGIN: i32 = 6;

/// Parameters of one fireworks phase.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BurstParams {
    pub centers: usize,
    pub sparks_per_center: usize,
    pub duration: Duration,
}

impl Default for BurstParams {
    fn default() -> Self {
        Self {
            centers: 3,
            sparks_per_center: 40,
            duration: Duration::from_millis(2500),
        }
    }
}

/// Spawn group: a shared center, color and launch delay.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Burst {
    pub cx: i32,
    pub cy: i32,
    pub color: Color,
    pub delay: Duration,
}

impl Burst {
    /// Pick a random center in the upper half of the panel.
    pub fn random<R: Rng + ?Sized>(panel: PanelConfig, index: usize, rng: &mut R) -> Self {
        let max_x = (panel.width() - EDGE_MARGIN).max(EDGE_MARGIN);
        let max_y = (panel.height() / 2).max(TOP_MARGIN);
        Self {
            cx: rng.random_range(EDGE_MARGIN..=max_x),
            cy: rng.random_range(TOP_MARGIN..=max_y),
            color: *FIREWORK_COLORS.choose(rng).unwrap_or(&Color::WHITE),
            delay: STAGGER * index as u32,
        }
    }
}

/// One particle.
#[derive(Clone, Debug, PartialEq)]
pub struct Spark {
    pub x: f32,
    pub y: f32,
    pub dx: f32,
    pub dy: f32,
    /// Remaining ticks. Only ever decreases.
    pub life: i32,
    pub color: Color,
    pub delay: Duration,
    sprite: ElementId,
}

impl Spark {
    fn launch<R: Rng + ?Sized>(burst: &Burst, sprite: ElementId, rng: &mut R) -> Self {
        let angle = rng.random_range(0.0..TAU);
        let speed = rng.random_range(MIN_SPEED..=MAX_SPEED);
        Self {
            x: burst.cx as f32,
            y: burst.cy as f32,
            dx: speed * angle.cos(),
            dy: speed * angle.sin() + LAUNCH_LIFT,
            life: rng.random_range(MIN_LIFE..=MAX_LIFE),
            color: burst.color,
            delay: burst.delay,
            sprite,
        }
    }

    /// Current color: base color scaled by remaining life.
    pub fn faded_color(&self) -> Color {
        self.color.faded(self.life, FADE_SPAN)
    }

    pub fn sprite(&self) -> ElementId {
        self.sprite
    }

    /// Integrate one tick of motion and burn one tick of life.
    fn advance(&mut self) {
        self.x += self.dx;
        self.y += self.dy;
        self.dy += GRAVITY;
        self.life -= 1;
    }
}

/// The live sparks of one fireworks phase.
#[derive(Debug, Default)]
pub struct ParticleSystem {
    sparks: Vec<Spark>,
}

impl ParticleSystem {
    /// Create every spark and its (initially hidden) pixel in a new layer.
    pub fn assemble<R: Rng + ?Sized>(
        panel: PanelConfig,
        params: &BurstParams,
        rng: &mut R,
    ) -> Result<(Self, Layer)> {
        let total = params.centers * params.sparks_per_center;
        let mut sparks = Vec::new();
        sparks.try_reserve_exact(total)?;
        let mut layer = Layer::new();
        layer.reserve(total)?;

        for index in 0..params.centers {
            let burst = Burst::random(panel, index, rng);
            for _ in 0..params.sparks_per_center {
                let sprite = layer.push(Element::Pixel(Pixel {
                    x: burst.cx,
                    y: burst.cy,
                    color: burst.color,
                    visible: false,
                }))?;
                sparks.push(Spark::launch(&burst, sprite, rng));
            }
        }

        Ok((Self { sparks }, layer))
    }

    pub fn sparks(&self) -> &[Spark] {
        &self.sparks
    }

    pub fn active_count(&self) -> usize {
        self.sparks.len()
    }

    /// Advance every launched spark by one tick.
    ///
    /// Sparks whose delay hasn't elapsed stay hidden. A spark whose life
    /// reaches zero is detached from the layer and dropped in the same
    /// tick, so it is never drawn at zero brightness.
    pub fn step(&mut self, elapsed: Duration, layer: &mut Layer) {
        let mut i = 0;
        while i < self.sparks.len() {
            let spark = &mut self.sparks[i];
            if elapsed < spark.delay {
                i += 1;
                continue;
            }

            spark.advance();
            if spark.life <= 0 {
                layer.detach(spark.sprite);
                self.sparks.swap_remove(i);
                continue;
            }

            if let Some(Element::Pixel(px)) = layer.element_mut(spark.sprite) {
                px.x = spark.x as i32;
                px.y = spark.y as i32;
                px.color = spark.faded_color();
                px.visible = true;
            }
            i += 1;
        }
    }
}

/// Run one fireworks phase to completion.
///
/// The animation layer is added to `scene` for the duration of the phase
/// and removed before returning.
pub fn burst<S, C, R>(
    scene: &mut SceneRoot,
    surface: &mut S,
    clock: &mut C,
    rng: &mut R,
    params: &BurstParams,
) -> Result<()>
where
    S: PanelSurface,
    C: Clock,
    R: Rng + ?Sized,
{
    tracing::info!(
        "Fireworks: {} bursts x {} sparks for {:?}",
        params.centers,
        params.sparks_per_center,
        params.duration
    );

    let (mut system, layer) = ParticleSystem::assemble(scene.panel(), params, rng)?;
    let layer_id = scene.add_layer(layer)?;

    let start = clock.now();
    let end = params.duration + GRACE;
    loop {
        let elapsed = clock.now().saturating_sub(start);
        if elapsed >= end {
            break;
        }
        if let Some(layer) = scene.layer_mut(layer_id) {
            system.step(elapsed, layer);
        }
        scene.present(surface);
        clock.sleep(TICK);
    }

    scene.remove_layer(layer_id);
    scene.present(surface);
    tracing::debug!("Fireworks done, {} sparks left", system.active_count());
    Ok(())
}

//! Cycle scheduler: the display's control loop.
//!
//! ```text
//!            ┌────────────┐  burst done   ┌────────────┐
//!   start ─▶ │ Animating  │ ────────────▶ │ Messaging  │
//!            └────────────┘ ◀──────────── └────────────┘
//!                  ▲         last message        │
//!                  │                              │
//!                  │    out of memory (either)    │
//!                  └──────── Recovery ◀───────────┘
//! ```
//!
//! Exactly one phase runs at a time, so the scene is never touched by two
//! components at once. Every phase removes its own layer before returning;
//! recovery throws the whole scene away instead.

use crate::clock::Clock;
use crate::error::Result;
use crate::fireworks::{self, BurstParams};
use crate::marquee::{ContentUnit, MessageDescriptor, ScrollCompositor};
use crate::scene::{Element, Label, Layer, LayerId, SceneRoot};
use crate::surface::PanelSurface;
use crate::{Color, is_running};
use rand::Rng;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

/// Where the status line sits on the panel.
const STATUS_POS: (i32, i32) = (2, 32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Animating,
    Messaging,
    Recovery,
}

/// Timing and geometry of one cycle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CycleSettings {
    pub burst: BurstParams,
    /// Pixels moved per scroll tick.
    pub scroll_step: i32,
    pub scroll_delay: Duration,
    /// How far past the left edge a unit travels before it is removed.
    pub scroll_margin: i32,
    /// Pause after each message.
    pub message_pause: Duration,
    /// Pause after a recovery.
    pub recovery_pause: Duration,
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            burst: BurstParams::default(),
            scroll_step: 1,
            scroll_delay: Duration::from_millis(25),
            scroll_margin: 32,
            message_pause: Duration::from_millis(500),
            recovery_pause: Duration::from_secs(1),
        }
    }
}

pub struct CycleScheduler<S, C, R> {
    scene: SceneRoot,
    surface: S,
    clock: C,
    rng: R,
    compositor: ScrollCompositor,
    messages: Vec<MessageDescriptor>,
    settings: CycleSettings,
    phase: Phase,
    status_layer: Option<LayerId>,
    recoveries: u64,
}

impl<S, C, R> CycleScheduler<S, C, R>
where
    S: PanelSurface,
    C: Clock,
    R: Rng,
{
    pub fn new(
        surface: S,
        clock: C,
        rng: R,
        compositor: ScrollCompositor,
        messages: Vec<MessageDescriptor>,
    ) -> Self {
        Self {
            scene: SceneRoot::new(surface.panel()),
            surface,
            clock,
            rng,
            compositor,
            messages,
            settings: CycleSettings::default(),
            phase: Phase::Animating,
            status_layer: None,
            recoveries: 0,
        }
    }

    /// Replace the scene, e.g. with one that has an element budget.
    pub fn with_scene(mut self, scene: SceneRoot) -> Self {
        self.scene = scene;
        self
    }

    pub fn with_settings(mut self, settings: CycleSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Begin in a phase other than `Animating`.
    pub fn starting_at(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn scene(&self) -> &SceneRoot {
        &self.scene
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Number of out-of-memory recoveries so far.
    pub fn recoveries(&self) -> u64 {
        self.recoveries
    }

    /// Swap the message list. Takes effect at the next Messaging phase.
    pub fn set_messages(&mut self, messages: Vec<MessageDescriptor>) {
        self.messages = messages;
    }

    /// Run phases until `running` goes false. The flag is checked between
    /// phases; a phase always runs to completion.
    pub fn run(&mut self, running: &AtomicBool) {
        while is_running(running) {
            self.step();
        }
        self.clear_status();
        self.scene.clear();
        self.scene.present(&mut self.surface);
    }

    /// Run the current phase to completion and move to the next one.
    pub fn step(&mut self) {
        self.phase = match self.phase {
            Phase::Animating => {
                self.clear_status();
                let result = fireworks::burst(
                    &mut self.scene,
                    &mut self.surface,
                    &mut self.clock,
                    &mut self.rng,
                    &self.settings.burst,
                );
                self.scene.reclaim();
                self.after(result, Phase::Messaging)
            }
            Phase::Messaging => {
                self.clear_status();
                let result = self.show_messages();
                self.scene.reclaim();
                self.after(result, Phase::Animating)
            }
            Phase::Recovery => {
                self.recover();
                Phase::Animating
            }
        };
    }

    fn after(&mut self, result: Result<()>, next: Phase) -> Phase {
        match result {
            Ok(()) => next,
            Err(e) if e.is_resource_exhausted() => {
                tracing::error!("Out of memory during {:?}: {}", self.phase, e);
                Phase::Recovery
            }
            Err(e) => {
                tracing::warn!("{:?} phase failed: {}", self.phase, e);
                next
            }
        }
    }

    /// Drop the scene and start again from nothing.
    fn recover(&mut self) {
        tracing::warn!("Recovering: resetting scene");
        self.status_layer = None;
        self.scene.reset();
        self.scene.present(&mut self.surface);
        self.recoveries += 1;
        self.clock.sleep(self.settings.recovery_pause);
    }

    fn show_messages(&mut self) -> Result<()> {
        // Snapshot so the list can be swapped without affecting this pass.
        let messages = self.messages.clone();
        tracing::info!("Messaging: {} messages", messages.len());

        for descriptor in &messages {
            let message = descriptor.resolve();
            let unit = self.compositor.layout(&message, &mut self.rng)?;
            tracing::debug!("Scrolling {:?} ({} px)", message.line1, unit.total_width());
            self.scroll(unit)?;
            self.scene.reclaim();
            self.clock.sleep(self.settings.message_pause);
        }
        Ok(())
    }

    /// Scroll one unit in from the right edge until it has fully left the
    /// left edge plus the margin.
    fn scroll(&mut self, unit: ContentUnit) -> Result<()> {
        let end = -unit.total_width() - self.settings.scroll_margin;
        let mut layer = unit.into_layer();
        layer.x = self.scene.panel().width();
        let id = self.scene.add_layer(layer)?;

        while let Some(layer) = self.scene.layer_mut(id) {
            if layer.x <= end {
                break;
            }
            layer.x -= self.settings.scroll_step.max(1);
            self.scene.present(&mut self.surface);
            self.clock.sleep(self.settings.scroll_delay);
        }

        self.scene.remove_layer(id);
        self.scene.present(&mut self.surface);
        Ok(())
    }

    /// Replace whatever is on screen with one line of white status text.
    pub fn show_status(&mut self, text: &str) -> Result<()> {
        tracing::info!("Status: {}", text);
        self.clear_status();
        self.scene.clear();

        let mut layer = Layer::new();
        layer.push(Element::Label(Label {
            text: text.to_string(),
            font: Arc::clone(&self.compositor.fonts().small),
            color: Color::WHITE,
            x: STATUS_POS.0,
            y: STATUS_POS.1,
        }))?;
        self.status_layer = Some(self.scene.add_layer(layer)?);
        self.scene.present(&mut self.surface);
        self.scene.reclaim();
        Ok(())
    }

    fn clear_status(&mut self) {
        if let Some(id) = self.status_layer.take() {
            self.scene.remove_layer(id);
        }
    }
}

// SPDX-License-Identifier: CEPL-1.0
use bitflags::bitflags;
use lumen_core::CancelToken;
use lumen_math::OutputTransform;
use tracing::{debug, info};

use crate::geometry::{FullscreenPolicy, WindowGeometry};
use crate::output::{Membership, OutputId, OutputRegistry};
use crate::{RenderSize, SurfaceSink};

bitflags! {
    /// Toplevel states the geometry cares about.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct WindowStates: u8 {
        const FULLSCREEN = 1;
        const MAXIMIZED = 1 << 1;
    }
}

/// Everything the compositor can tell the window that affects rendering.
#[derive(Clone, Debug, PartialEq)]
pub enum WindowEvent {
    OutputAdded(OutputId),
    OutputRemoved(OutputId),
    OutputEntered(OutputId),
    OutputLeft(OutputId),
    OutputGeometryChanged { output: OutputId, transform: OutputTransform },
    OutputScaleChanged { output: OutputId, scale: i32 },
    /// Preferred scale, already converted from 1/120 units.
    FractionalScaleChanged { scale: f64 },
    ToplevelConfigured { width: i32, height: i32, states: WindowStates },
    ToplevelClosed,
}

/// Window-side state fed by [`WindowEvent`]s.
pub struct WindowState {
    outputs: OutputRegistry,
    entered: Membership,
    geometry: WindowGeometry,
    states: WindowStates,
    keep_ratio: bool,
    cancel: CancelToken,
}

impl WindowState {
    pub fn new(initial: RenderSize, keep_ratio: bool, cancel: CancelToken) -> Self {
        Self {
            outputs: OutputRegistry::default(),
            entered: Membership::default(),
            geometry: WindowGeometry::new(initial),
            states: WindowStates::empty(),
            keep_ratio,
            cancel,
        }
    }

    pub fn dispatch(&mut self, event: WindowEvent) {
        match event {
            WindowEvent::OutputAdded(id) => {
                if self.outputs.add(id) {
                    debug!(output = id.0, "output added");
                }
            }
            WindowEvent::OutputRemoved(id) => {
                self.outputs.remove(id);
                if self.entered.leave(id) {
                    self.geometry.mark_dirty();
                }
            }
            WindowEvent::OutputEntered(id) => {
                if self.outputs.get(id).is_none() {
                    debug!(output = id.0, "enter for unknown output ignored");
                    return;
                }
                if self.entered.enter(id) {
                    self.geometry.mark_dirty();
                }
            }
            WindowEvent::OutputLeft(id) => {
                if self.entered.leave(id) {
                    self.geometry.mark_dirty();
                }
            }
            WindowEvent::OutputGeometryChanged { output, transform } => {
                if self.outputs.set_transform(output, transform) && self.entered.contains(output) {
                    self.geometry.mark_dirty();
                }
            }
            WindowEvent::OutputScaleChanged { output, scale } => {
                if self.outputs.set_scale(output, scale) && self.entered.contains(output) {
                    self.geometry.mark_dirty();
                }
            }
            WindowEvent::FractionalScaleChanged { scale } => {
                self.geometry.set_fractional_scale(scale);
            }
            WindowEvent::ToplevelConfigured { width, height, states } => {
                self.states = states;
                self.geometry.configure(width, height, states);
            }
            WindowEvent::ToplevelClosed => {
                info!("window closed");
                self.cancel.cancel();
            }
        }
    }

    pub fn needs_resolve(&self) -> bool {
        self.geometry.is_dirty()
    }

    pub fn resolve(&mut self, surface: &mut dyn SurfaceSink) -> RenderSize {
        let entered = self.entered.resolve(&self.outputs);
        self.geometry.resolve(&entered, self.fullscreen_policy(), surface)
    }

    pub fn fullscreen_policy(&self) -> FullscreenPolicy {
        FullscreenPolicy {
            active: self.states.contains(WindowStates::FULLSCREEN),
            keep_ratio: self.keep_ratio,
        }
    }

    #[cfg(test)]
    pub(crate) fn is_fullscreen(&self) -> bool {
        self.states.contains(WindowStates::FULLSCREEN)
    }

    pub fn geometry(&self) -> &WindowGeometry {
        &self.geometry
    }

    #[cfg(test)]
    pub(crate) fn outputs(&self) -> &OutputRegistry {
        &self.outputs
    }

    #[cfg(test)]
    pub(crate) fn entered(&self) -> &Membership {
        &self.entered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingSink;

    fn state() -> WindowState {
        WindowState::new(RenderSize::new(250, 250), false, CancelToken::new())
    }

    fn settle(s: &mut WindowState) -> RenderSize {
        s.resolve(&mut RecordingSink::default())
    }

    #[test]
    fn enter_and_leave_mark_dirty() {
        let mut s = state();
        s.dispatch(WindowEvent::OutputAdded(OutputId(3)));
        assert!(!s.needs_resolve());
        s.dispatch(WindowEvent::OutputEntered(OutputId(3)));
        assert!(s.needs_resolve());
        settle(&mut s);

        s.dispatch(WindowEvent::OutputEntered(OutputId(3)));
        assert!(!s.needs_resolve());
        s.dispatch(WindowEvent::OutputLeft(OutputId(3)));
        assert!(s.needs_resolve());
    }

    #[test]
    fn enter_for_unknown_output_is_ignored() {
        let mut s = state();
        s.dispatch(WindowEvent::OutputEntered(OutputId(9)));
        assert!(s.entered().is_empty());
        assert!(!s.needs_resolve());
    }

    #[test]
    fn only_entered_outputs_dirty_geometry() {
        let mut s = state();
        s.dispatch(WindowEvent::OutputAdded(OutputId(1)));
        s.dispatch(WindowEvent::OutputAdded(OutputId(2)));
        s.dispatch(WindowEvent::OutputEntered(OutputId(1)));
        settle(&mut s);

        s.dispatch(WindowEvent::OutputScaleChanged { output: OutputId(2), scale: 2 });
        assert!(!s.needs_resolve());
        assert_eq!(s.outputs().get(OutputId(2)).map(|o| o.scale), Some(2));

        s.dispatch(WindowEvent::OutputScaleChanged { output: OutputId(1), scale: 2 });
        assert!(s.needs_resolve());
        assert_eq!(settle(&mut s), RenderSize::new(500, 500));
    }

    #[test]
    fn transform_change_on_entered_output_rotates_buffer() {
        let mut s = state();
        s.dispatch(WindowEvent::OutputAdded(OutputId(1)));
        s.dispatch(WindowEvent::OutputEntered(OutputId(1)));
        s.dispatch(WindowEvent::ToplevelConfigured {
            width: 400,
            height: 300,
            states: WindowStates::empty(),
        });
        assert_eq!(settle(&mut s), RenderSize::new(400, 300));

        s.dispatch(WindowEvent::OutputGeometryChanged {
            output: OutputId(1),
            transform: OutputTransform::Rotate270,
        });
        assert!(s.needs_resolve());
        assert_eq!(settle(&mut s), RenderSize::new(300, 400));
    }

    #[test]
    fn removing_an_entered_output_drops_membership() {
        let mut s = state();
        s.dispatch(WindowEvent::OutputAdded(OutputId(1)));
        s.dispatch(WindowEvent::OutputEntered(OutputId(1)));
        s.dispatch(WindowEvent::OutputScaleChanged { output: OutputId(1), scale: 3 });
        assert_eq!(settle(&mut s), RenderSize::new(750, 750));

        s.dispatch(WindowEvent::OutputRemoved(OutputId(1)));
        assert!(s.entered().is_empty());
        assert!(s.needs_resolve());
        assert_eq!(settle(&mut s), RenderSize::new(250, 250));
    }

    #[test]
    fn fullscreen_configure_sets_policy() {
        let mut s = WindowState::new(RenderSize::new(250, 250), true, CancelToken::new());
        s.dispatch(WindowEvent::ToplevelConfigured {
            width: 1920,
            height: 1080,
            states: WindowStates::FULLSCREEN,
        });
        assert!(s.is_fullscreen());
        assert_eq!(s.fullscreen_policy(), FullscreenPolicy { active: true, keep_ratio: true });
        assert_eq!(settle(&mut s), RenderSize::new(1080, 1080));
    }

    #[test]
    fn fractional_scale_event_dirties_geometry() {
        let mut s = state();
        s.dispatch(WindowEvent::FractionalScaleChanged { scale: 2.0 });
        assert!(s.needs_resolve());
        assert_eq!(settle(&mut s), RenderSize::new(500, 500));
    }

    #[test]
    fn close_cancels_the_loop() {
        let cancel = CancelToken::new();
        let mut s = WindowState::new(RenderSize::new(250, 250), false, cancel.clone());
        s.dispatch(WindowEvent::ToplevelClosed);
        assert!(cancel.is_cancelled());
    }
}

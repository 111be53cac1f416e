// SPDX-License-Identifier: CEPL-1.0
//! Buffer geometry for the window surface.
//!
//! Reconciles what the compositor reports about the outputs the window sits
//! on (integer scale, fractional scale, transform) with the window's logical
//! size, and produces the pixel size the swapchain must be built at.

use lumen_math::OutputTransform;
use tracing::debug;

use crate::event::WindowStates;
use crate::output::Output;
use crate::{RenderSize, SurfaceSink};

/// Highest integer scale among `outputs`, or 1 when the window is on none.
pub fn compute_scale(outputs: &[&Output]) -> i32 {
    outputs.iter().map(|o| o.scale).fold(1, i32::max)
}

/// Transform of the first output the window entered.
pub fn compute_transform(outputs: &[&Output]) -> OutputTransform {
    outputs.first().map(|o| o.transform).unwrap_or_default()
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FullscreenPolicy {
    pub active: bool,
    /// Keep a square buffer while fullscreen.
    pub keep_ratio: bool,
}

impl FullscreenPolicy {
    fn squares(self) -> bool {
        self.active && self.keep_ratio
    }
}

#[derive(Clone, Debug)]
pub struct WindowGeometry {
    window_size: RenderSize,
    logical_size: RenderSize,
    buffer_size: RenderSize,
    destination_size: RenderSize,
    integer_scale: i32,
    /// 0 while the compositor has not sent a preferred fractional scale.
    fractional_scale: f64,
    transform: OutputTransform,
    applied_viewport: Option<RenderSize>,
    dirty: bool,
}

impl WindowGeometry {
    pub fn new(initial: RenderSize) -> Self {
        Self {
            window_size: initial,
            logical_size: initial,
            buffer_size: initial,
            destination_size: initial,
            integer_scale: 1,
            fractional_scale: 0.0,
            transform: OutputTransform::Normal,
            applied_viewport: None,
            dirty: false,
        }
    }

    pub fn window_size(&self) -> RenderSize {
        self.window_size
    }

    pub fn logical_size(&self) -> RenderSize {
        self.logical_size
    }

    pub fn buffer_size(&self) -> RenderSize {
        self.buffer_size
    }

    pub fn destination_size(&self) -> RenderSize {
        self.destination_size
    }

    pub fn integer_scale(&self) -> i32 {
        self.integer_scale
    }

    pub fn fractional_scale(&self) -> f64 {
        self.fractional_scale
    }

    pub fn transform(&self) -> OutputTransform {
        self.transform
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn set_fractional_scale(&mut self, scale: f64) {
        self.fractional_scale = if scale > 0.0 { scale } else { 0.0 };
        self.dirty = true;
    }

    /// Apply a toplevel configure. Zero dimensions mean the client picks.
    pub fn configure(&mut self, width: i32, height: i32, states: WindowStates) {
        let constrained = states.intersects(WindowStates::FULLSCREEN | WindowStates::MAXIMIZED);
        if width > 0 && height > 0 {
            let size = RenderSize::new(width as u32, height as u32);
            self.logical_size = size;
            if !constrained {
                self.window_size = size;
            }
        } else if !constrained {
            self.logical_size = self.window_size;
        }
        self.dirty = true;
    }

    /// Recompute the buffer size from the entered outputs.
    ///
    /// Surface requests are only issued for values that differ from the last
    /// ones applied, so calling this again with the same inputs is silent.
    pub fn resolve(
        &mut self,
        entered: &[&Output],
        fullscreen: FullscreenPolicy,
        surface: &mut dyn SurfaceSink,
    ) -> RenderSize {
        let transform = compute_transform(entered);
        if transform != self.transform {
            debug!(?transform, "buffer transform");
            self.transform = transform;
            surface.set_buffer_transform(transform);
        }

        let mut size = self.logical_size;
        if transform.swaps_axes() {
            size = size.swapped();
        }

        if self.fractional_scale > 0.0 {
            if self.integer_scale > 1 {
                self.integer_scale = 1;
                debug!("buffer scale pinned to 1 for fractional scaling");
                surface.set_buffer_scale(1);
            }
            let f = self.fractional_scale;
            size = RenderSize::new(scale_ceil(size.width, f), scale_ceil(size.height, f));
        } else {
            let scale = compute_scale(entered);
            if scale != self.integer_scale {
                debug!(scale, "buffer scale");
                self.integer_scale = scale;
                surface.set_buffer_scale(scale);
            }
            // Compositor-supplied; the swapchain clamps to the surface limits.
            let s = scale as u32;
            size = RenderSize::new(size.width.saturating_mul(s), size.height.saturating_mul(s));
        }

        let mut destination = self.logical_size;
        if fullscreen.squares() {
            size = size.square();
            destination = destination.square();
        }

        if self.fractional_scale > 0.0 && self.applied_viewport != Some(destination) {
            debug!(width = destination.width, height = destination.height, "viewport destination");
            self.applied_viewport = Some(destination);
            surface.set_viewport_destination(destination);
        }

        self.destination_size = destination;
        self.buffer_size = RenderSize::new(size.width.max(1), size.height.max(1));
        self.dirty = false;
        self.buffer_size
    }
}

fn scale_ceil(v: u32, scale: f64) -> u32 {
    (f64::from(v) * scale).ceil() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputId;
    use crate::testing::{RecordingSink, SinkCall};

    fn output(id: u32, transform: OutputTransform, scale: i32) -> Output {
        Output { id: OutputId(id), transform, scale }
    }

    fn logical(width: u32, height: u32) -> WindowGeometry {
        let mut g = WindowGeometry::new(RenderSize::new(250, 250));
        g.configure(width as i32, height as i32, WindowStates::empty());
        g
    }

    #[test]
    fn empty_membership_defaults() {
        assert_eq!(compute_scale(&[]), 1);
        assert_eq!(compute_transform(&[]), OutputTransform::Normal);
    }

    #[test]
    fn oldest_entered_output_decides_transform() {
        let a = output(1, OutputTransform::Rotate270, 1);
        let b = output(2, OutputTransform::Normal, 3);
        assert_eq!(compute_transform(&[&a, &b]), OutputTransform::Rotate270);
        assert_eq!(compute_scale(&[&a, &b]), 3);
    }

    #[test]
    fn scale_is_the_maximum_over_entered_outputs() {
        let a = output(1, OutputTransform::Normal, 1);
        let b = output(2, OutputTransform::Normal, 2);
        let c = output(3, OutputTransform::Normal, 3);
        assert_eq!(compute_scale(&[&a, &b, &c]), 3);
    }

    #[test]
    fn rotated_first_output_wins_over_normal() {
        let a = output(1, OutputTransform::Rotate90, 1);
        let b = output(2, OutputTransform::Normal, 1);
        assert_eq!(compute_transform(&[&a, &b]), OutputTransform::Rotate90);
    }

    #[test]
    fn rotated_output_swaps_then_scales() {
        let out = output(1, OutputTransform::Rotate90, 2);
        let mut g = logical(800, 600);
        let mut sink = RecordingSink::default();
        let size = g.resolve(&[&out], FullscreenPolicy::default(), &mut sink);
        assert_eq!(size, RenderSize::new(1200, 1600));
        assert_eq!(
            sink.take(),
            vec![SinkCall::Transform(OutputTransform::Rotate90), SinkCall::Scale(2)]
        );
    }

    #[test]
    fn oversized_scale_saturates_instead_of_wrapping() {
        let out = output(1, OutputTransform::Normal, 70_000);
        let mut g = logical(70_000, 70_000);
        let size = g.resolve(&[&out], FullscreenPolicy::default(), &mut RecordingSink::default());
        assert_eq!(size, RenderSize::new(u32::MAX, u32::MAX));
    }

    #[test]
    fn fractional_scale_rounds_up_and_pins_integer_scale() {
        let out = output(1, OutputTransform::Normal, 2);
        let mut g = logical(800, 600);
        let mut sink = RecordingSink::default();
        g.resolve(&[&out], FullscreenPolicy::default(), &mut sink);
        assert_eq!(g.integer_scale(), 2);
        sink.take();

        g.set_fractional_scale(1.5);
        let size = g.resolve(&[&out], FullscreenPolicy::default(), &mut sink);
        assert_eq!(size, RenderSize::new(1200, 900));
        assert_eq!(g.integer_scale(), 1);
        assert_eq!(
            sink.take(),
            vec![SinkCall::Scale(1), SinkCall::Viewport(RenderSize::new(800, 600))]
        );
    }

    #[test]
    fn fractional_scale_uses_ceiling() {
        let mut g = WindowGeometry::new(RenderSize::new(250, 250));
        g.set_fractional_scale(1.25);
        let size = g.resolve(&[], FullscreenPolicy::default(), &mut RecordingSink::default());
        assert_eq!(size, RenderSize::new(313, 313));
    }

    #[test]
    fn fixed_ratio_fullscreen_squares_buffer_and_destination() {
        let out = output(1, OutputTransform::Normal, 1);
        let mut g = WindowGeometry::new(RenderSize::new(250, 250));
        g.configure(1920, 1080, WindowStates::FULLSCREEN);
        let policy = FullscreenPolicy { active: true, keep_ratio: true };
        let mut sink = RecordingSink::default();
        let size = g.resolve(&[&out], policy, &mut sink);
        assert_eq!(size, RenderSize::new(1080, 1080));
        assert_eq!(g.destination_size(), RenderSize::new(1080, 1080));
        // integer path: the destination is computed but never sent
        assert!(sink.calls.is_empty());
    }

    #[test]
    fn fullscreen_without_ratio_keeps_logical_destination() {
        let mut g = WindowGeometry::new(RenderSize::new(250, 250));
        g.configure(1920, 1080, WindowStates::FULLSCREEN);
        let policy = FullscreenPolicy { active: true, keep_ratio: false };
        let size = g.resolve(&[], policy, &mut RecordingSink::default());
        assert_eq!(size, RenderSize::new(1920, 1080));
        assert_eq!(g.destination_size(), RenderSize::new(1920, 1080));
    }

    #[test]
    fn second_resolve_with_same_inputs_is_silent() {
        let out = output(1, OutputTransform::Flipped270, 3);
        let mut g = logical(640, 480);
        g.set_fractional_scale(1.75);
        let policy = FullscreenPolicy { active: true, keep_ratio: true };
        let mut sink = RecordingSink::default();
        let first = g.resolve(&[&out], policy, &mut sink);
        assert!(!sink.take().is_empty());

        let second = g.resolve(&[&out], policy, &mut sink);
        assert_eq!(first, second);
        assert!(sink.calls.is_empty());
    }

    #[test]
    fn integer_scale_has_no_viewport_update() {
        let out = output(1, OutputTransform::Normal, 2);
        let mut g = logical(400, 400);
        let mut sink = RecordingSink::default();
        let size = g.resolve(&[&out], FullscreenPolicy::default(), &mut sink);
        assert_eq!(size, RenderSize::new(800, 800));
        assert!(!sink.calls.iter().any(|c| matches!(c, SinkCall::Viewport(_))));
    }

    #[test]
    fn resolve_clears_dirty() {
        let mut g = WindowGeometry::new(RenderSize::new(250, 250));
        g.mark_dirty();
        g.resolve(&[], FullscreenPolicy::default(), &mut RecordingSink::default());
        assert!(!g.is_dirty());
    }

    #[test]
    fn configure_tracks_window_size_only_when_unconstrained() {
        let mut g = WindowGeometry::new(RenderSize::new(250, 250));
        g.configure(1024, 768, WindowStates::MAXIMIZED);
        assert_eq!(g.logical_size(), RenderSize::new(1024, 768));
        assert_eq!(g.window_size(), RenderSize::new(250, 250));

        g.configure(0, 0, WindowStates::empty());
        assert_eq!(g.logical_size(), RenderSize::new(250, 250));
        assert!(g.is_dirty());

        g.configure(300, 200, WindowStates::empty());
        assert_eq!(g.window_size(), RenderSize::new(300, 200));
    }

    #[test]
    fn zero_configure_while_fullscreen_keeps_logical_size() {
        let mut g = WindowGeometry::new(RenderSize::new(250, 250));
        g.configure(1920, 1080, WindowStates::FULLSCREEN);
        g.configure(0, 0, WindowStates::FULLSCREEN);
        assert_eq!(g.logical_size(), RenderSize::new(1920, 1080));
    }
}

// SPDX-License-Identifier: CEPL-1.0
use std::thread;
use std::time::Duration;

use anyhow::Result;
use tracing::debug;

use crate::event::WindowState;
use crate::{FrameStatus, RenderSize, Renderer, SurfaceSink};

/// Ties geometry resolution to chain rebuilds and drives one frame at a time.
pub struct FrameDriver {
    chain_size: RenderSize,
    swap_delay: Duration,
}

impl FrameDriver {
    /// `chain_size` is the size the renderer's chain was first built at.
    pub fn new(chain_size: RenderSize, swap_delay: Duration) -> Self {
        Self { chain_size, swap_delay }
    }

    pub fn chain_size(&self) -> RenderSize {
        self.chain_size
    }

    pub fn frame<R: Renderer + ?Sized>(
        &mut self,
        state: &mut WindowState,
        renderer: &mut R,
        surface: &mut dyn SurfaceSink,
    ) -> Result<FrameStatus> {
        if state.needs_resolve() {
            let size = state.resolve(surface);
            if size != self.chain_size {
                debug!(width = size.width, height = size.height, "geometry changed");
                renderer.resize(size)?;
                self.chain_size = size;
            }
        }

        let status = renderer.render(state.geometry().transform(), surface)?;
        match status {
            FrameStatus::Presented => {
                if !self.swap_delay.is_zero() {
                    thread::sleep(self.swap_delay);
                }
            }
            FrameStatus::NeedsRecreate => {
                let size = if state.needs_resolve() {
                    state.resolve(surface)
                } else {
                    state.geometry().buffer_size()
                };
                debug!(width = size.width, height = size.height, "chain stale");
                renderer.resize(size)?;
                self.chain_size = size;
            }
            FrameStatus::Skipped => {}
        }
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{WindowEvent, WindowStates};
    use crate::output::OutputId;
    use crate::testing::RecordingSink;
    use lumen_core::CancelToken;
    use lumen_math::OutputTransform;

    #[derive(Default)]
    struct ScriptedRenderer {
        statuses: Vec<FrameStatus>,
        resizes: Vec<RenderSize>,
        transforms: Vec<OutputTransform>,
    }

    impl Renderer for ScriptedRenderer {
        fn resize(&mut self, size: RenderSize) -> Result<()> {
            self.resizes.push(size);
            Ok(())
        }

        fn render(
            &mut self,
            transform: OutputTransform,
            _surface: &mut dyn SurfaceSink,
        ) -> Result<FrameStatus> {
            self.transforms.push(transform);
            Ok(if self.statuses.is_empty() { FrameStatus::Presented } else { self.statuses.remove(0) })
        }
    }

    fn setup() -> (FrameDriver, WindowState) {
        let size = RenderSize::new(250, 250);
        (
            FrameDriver::new(size, Duration::ZERO),
            WindowState::new(size, false, CancelToken::new()),
        )
    }

    #[test]
    fn steady_state_never_resizes() {
        let (mut driver, mut state) = setup();
        let mut r = ScriptedRenderer::default();
        let mut sink = RecordingSink::default();
        for _ in 0..3 {
            assert_eq!(driver.frame(&mut state, &mut r, &mut sink).ok(), Some(FrameStatus::Presented));
        }
        assert!(r.resizes.is_empty());
        assert_eq!(r.transforms.len(), 3);
    }

    #[test]
    fn geometry_change_rebuilds_before_rendering() {
        let (mut driver, mut state) = setup();
        state.dispatch(WindowEvent::OutputAdded(OutputId(1)));
        state.dispatch(WindowEvent::OutputEntered(OutputId(1)));
        state.dispatch(WindowEvent::OutputGeometryChanged {
            output: OutputId(1),
            transform: OutputTransform::Rotate90,
        });
        state.dispatch(WindowEvent::ToplevelConfigured {
            width: 400,
            height: 200,
            states: WindowStates::empty(),
        });
        let mut r = ScriptedRenderer::default();
        driver.frame(&mut state, &mut r, &mut RecordingSink::default()).ok();
        assert_eq!(r.resizes, vec![RenderSize::new(200, 400)]);
        assert_eq!(r.transforms, vec![OutputTransform::Rotate90]);
        assert_eq!(driver.chain_size(), RenderSize::new(200, 400));
    }

    #[test]
    fn unchanged_size_after_resolve_skips_rebuild() {
        let (mut driver, mut state) = setup();
        state.dispatch(WindowEvent::ToplevelConfigured {
            width: 250,
            height: 250,
            states: WindowStates::empty(),
        });
        let mut r = ScriptedRenderer::default();
        driver.frame(&mut state, &mut r, &mut RecordingSink::default()).ok();
        assert!(r.resizes.is_empty());
    }

    #[test]
    fn stale_chain_is_rebuilt_at_current_size() {
        let (mut driver, mut state) = setup();
        let mut r = ScriptedRenderer {
            statuses: vec![FrameStatus::NeedsRecreate, FrameStatus::Presented],
            ..Default::default()
        };
        let mut sink = RecordingSink::default();
        assert_eq!(
            driver.frame(&mut state, &mut r, &mut sink).ok(),
            Some(FrameStatus::NeedsRecreate)
        );
        assert_eq!(r.resizes, vec![RenderSize::new(250, 250)]);
        assert_eq!(driver.frame(&mut state, &mut r, &mut sink).ok(), Some(FrameStatus::Presented));
        assert_eq!(r.resizes.len(), 1);
    }

    #[test]
    fn skipped_frame_changes_nothing() {
        let (mut driver, mut state) = setup();
        let mut r = ScriptedRenderer { statuses: vec![FrameStatus::Skipped], ..Default::default() };
        assert_eq!(
            driver.frame(&mut state, &mut r, &mut RecordingSink::default()).ok(),
            Some(FrameStatus::Skipped)
        );
        assert!(r.resizes.is_empty());
    }
}

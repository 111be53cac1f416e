// SPDX-License-Identifier: CEPL-1.0
//! Backend-agnostic contracts between the window glue and the renderer.

use anyhow::Result;
use thiserror::Error;

mod driver;
mod event;
mod geometry;
mod output;

pub use driver::FrameDriver;
pub use event::{WindowEvent, WindowState, WindowStates};
pub use geometry::{compute_scale, compute_transform, FullscreenPolicy, WindowGeometry};
pub use lumen_math::OutputTransform;
pub use output::{Membership, Output, OutputId, OutputRegistry};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn swapped(self) -> Self {
        Self::new(self.height, self.width)
    }

    /// Largest square that fits.
    pub fn square(self) -> Self {
        let side = self.width.min(self.height);
        Self::new(side, side)
    }
}

/// How presented images reach the display. Values follow the `-p` flag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PresentMode {
    Immediate = 0,
    Mailbox = 1,
    #[default]
    Fifo = 2,
    FifoRelaxed = 3,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("present mode {0} is not one of 0 (immediate), 1 (mailbox), 2 (fifo), 3 (fifo relaxed)")]
pub struct InvalidPresentMode(pub u32);

impl TryFrom<u32> for PresentMode {
    type Error = InvalidPresentMode;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Self::Immediate),
            1 => Ok(Self::Mailbox),
            2 => Ok(Self::Fifo),
            3 => Ok(Self::FifoRelaxed),
            other => Err(InvalidPresentMode(other)),
        }
    }
}

/// What happened to one driven frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    Presented,
    /// Present failed in a way that only costs this frame.
    Skipped,
    /// The chain is suboptimal or out of date; rebuild before the next frame.
    NeedsRecreate,
}

/// Outbound requests toward the compositor-side surface.
///
/// Every request is double-buffered state that takes effect on the next
/// surface commit, which presentation performs.
pub trait SurfaceSink {
    fn set_buffer_transform(&mut self, transform: OutputTransform);
    fn set_buffer_scale(&mut self, scale: i32);
    fn set_viewport_destination(&mut self, size: RenderSize);
    /// Returns false when the surface has no tearing control to apply it to.
    fn set_tearing(&mut self, _enabled: bool) -> bool {
        false
    }
}

pub trait Renderer {
    /// Rebuild the presentable-image chain at `size`.
    fn resize(&mut self, size: RenderSize) -> Result<()>;
    fn render(&mut self, transform: OutputTransform, surface: &mut dyn SurfaceSink)
        -> Result<FrameStatus>;
}

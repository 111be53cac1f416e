// SPDX-License-Identifier: CEPL-1.0
//! Per-frame protocol over the images of the current chain.
//!
//! One frame is: acquire, fence wait, uniform write, record, submit, present,
//! then a full queue drain. The drain keeps at most one frame of GPU work in
//! flight, which is what lets all images share two semaphores and lets
//! `SwapchainManager::destroy` skip fence waits.

use std::time::{Duration, Instant};

use ash::prelude::VkResult;
use ash::vk;
use lumen_math::{spin_matrix, OutputTransform};
use lumen_render::{FrameStatus, SurfaceSink};
use thiserror::Error;
use tracing::{info, warn};

use crate::device::FrameDevice;
use crate::swapchain::Swapchain;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("acquire_next_image failed: {0}")]
    Acquire(vk::Result),
    #[error("acquired image index {index} but the chain has {count} images")]
    ImageIndex { index: u32, count: usize },
    #[error("wait_for_fences failed: {0}")]
    Fence(vk::Result),
    #[error("recording the draw failed: {0}")]
    Record(vk::Result),
    #[error("queue_submit failed: {0}")]
    Submit(vk::Result),
    #[error("queue_present failed: {0}")]
    Present(vk::Result),
    #[error("queue_wait_idle failed: {0}")]
    Drain(vk::Result),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FrameState {
    #[default]
    Idle,
    Acquiring,
    Recording,
    Submitted,
    Presenting,
    NeedsRecreate,
}

/// Map a present result onto what the loop should do next.
pub fn classify_present(result: VkResult<bool>) -> Result<FrameStatus, FrameError> {
    match result {
        Ok(false) => Ok(FrameStatus::Presented),
        Ok(true)
        | Err(vk::Result::SUBOPTIMAL_KHR)
        | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(FrameStatus::NeedsRecreate),
        Err(
            e @ (vk::Result::ERROR_DEVICE_LOST
            | vk::Result::ERROR_SURFACE_LOST_KHR
            | vk::Result::ERROR_OUT_OF_HOST_MEMORY
            | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY),
        ) => Err(FrameError::Present(e)),
        Err(e) => {
            warn!("queue_present: {e:?}, frame dropped");
            Ok(FrameStatus::Skipped)
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Throughput {
    pub frames: u32,
    pub secs: u64,
    pub fps: f32,
}

/// Frame counter and wall clock for the spin angle and the periodic report.
#[derive(Debug)]
pub struct FrameClock {
    interval: Duration,
    start: Option<Instant>,
    window_start: Option<Instant>,
    frames: u32,
}

impl FrameClock {
    pub fn new(interval: Duration) -> Self {
        Self { interval, start: None, window_start: None, frames: 0 }
    }

    /// Time since the first tick. The start is never reset.
    pub fn elapsed(&mut self, now: Instant) -> Duration {
        let start = *self.start.get_or_insert(now);
        now.saturating_duration_since(start)
    }

    /// Returns a report once more than one interval has passed since the last.
    pub fn tick(&mut self, now: Instant) -> Option<Throughput> {
        let window_start = *self.window_start.get_or_insert(now);
        if self.interval.is_zero() || now.saturating_duration_since(window_start) <= self.interval {
            return None;
        }
        let secs = self.interval.as_secs().max(1);
        let report = Throughput {
            frames: self.frames,
            secs,
            fps: self.frames as f32 / secs as f32,
        };
        self.window_start = Some(now);
        self.frames = 0;
        Some(report)
    }

    pub fn count_frame(&mut self) {
        self.frames += 1;
    }

    pub fn frames(&self) -> u32 {
        self.frames
    }
}

/// Tearing presentation hint, optionally flipped at every report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TearingHint {
    pub enabled: bool,
    pub periodic: bool,
}

pub struct FrameScheduler {
    state: FrameState,
    clock: FrameClock,
    tearing: TearingHint,
}

impl FrameScheduler {
    pub fn new(report_interval: Duration, tearing: TearingHint) -> Self {
        Self {
            state: FrameState::Idle,
            clock: FrameClock::new(report_interval),
            tearing,
        }
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn tearing(&self) -> TearingHint {
        self.tearing
    }

    /// Drive one frame on `chain`.
    ///
    /// # Safety
    /// `chain` must have been created on `dev`, and `dev` must not have work
    /// in flight from anyone else.
    pub unsafe fn draw<D: FrameDevice + ?Sized>(
        &mut self,
        dev: &D,
        chain: &Swapchain,
        transform: OutputTransform,
        now: Instant,
        surface: &mut dyn SurfaceSink,
    ) -> Result<FrameStatus, FrameError> {
        if let Some(t) = self.clock.tick(now) {
            info!("{} frames in {} seconds: {:.6} fps", t.frames, t.secs, t.fps);
            if self.tearing.periodic && surface.set_tearing(!self.tearing.enabled) {
                self.tearing.enabled = !self.tearing.enabled;
            }
        }
        let rotation = spin_matrix(self.clock.elapsed(now), transform);

        self.state = FrameState::Acquiring;
        let index = match dev.acquire_next_image(chain.handle(), chain.image_acquired()) {
            Ok((index, false)) => index,
            Ok((_, true))
            | Err(vk::Result::SUBOPTIMAL_KHR)
            | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                self.state = FrameState::NeedsRecreate;
                return Ok(FrameStatus::NeedsRecreate);
            }
            Err(e) => {
                self.state = FrameState::Idle;
                return Err(FrameError::Acquire(e));
            }
        };
        let Some(img) = chain.image(index) else {
            self.state = FrameState::Idle;
            return Err(FrameError::ImageIndex { index, count: chain.image_count() });
        };

        self.state = FrameState::Recording;
        dev.wait_and_reset_fence(img.fence).map_err(FrameError::Fence)?;
        // The fence wait above guarantees the GPU is done reading the mapping.
        dev.write_rotation(&rotation);
        dev.record_draw(img.cmd, img.framebuffer, chain.extent())
            .map_err(FrameError::Record)?;
        dev.submit(img.cmd, chain.image_acquired(), chain.render_finished(), img.fence)
            .map_err(FrameError::Submit)?;
        self.state = FrameState::Submitted;
        self.clock.count_frame();

        self.state = FrameState::Presenting;
        let presented = dev.present(chain.handle(), index, chain.render_finished());
        let drained = dev.drain_queue();
        let status = classify_present(presented)?;
        drained.map_err(FrameError::Drain)?;

        self.state = match status {
            FrameStatus::NeedsRecreate => FrameState::NeedsRecreate,
            _ => FrameState::Idle,
        };
        Ok(status)
    }
}

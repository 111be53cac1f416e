// SPDX-License-Identifier: CEPL-1.0
//! Vulkan backend: device bring-up, the presentable-image chain and the
//! per-frame protocol.

use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use lumen_math::OutputTransform;
use lumen_render::{FrameStatus, PresentMode, RenderSize, Renderer, SurfaceSink};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::info;

mod device;
mod frame;
mod gpu;
mod pipeline;
mod present_mode;
mod swapchain;

pub use device::{ChainDevice, FrameDevice};
pub use frame::{classify_present, FrameClock, FrameError, FrameScheduler, FrameState, TearingHint};
pub use gpu::Gpu;
pub use present_mode::{validate as validate_present_mode, PresentModeError};
pub use swapchain::{
    ChainConfig, PresentableImage, Swapchain, SwapchainError, SwapchainManager, MAX_IMAGES,
};

#[derive(Clone, Copy, Debug)]
pub struct VkSettings {
    pub present_mode: PresentMode,
    pub opaque: bool,
    pub clear_color: [f32; 4],
    pub report_interval: Duration,
    pub tearing: TearingHint,
}

pub struct VkRenderer {
    chain: SwapchainManager,
    frames: FrameScheduler,
    gpu: Gpu,
}

impl Drop for VkRenderer {
    fn drop(&mut self) {
        unsafe {
            self.gpu.wait_idle();
            self.chain.destroy(&self.gpu);
        }
    }
}

impl VkRenderer {
    pub fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        settings: &VkSettings,
    ) -> Result<Self> {
        let dh = display.display_handle()?.as_raw();
        let wh = window.window_handle()?.as_raw();
        unsafe {
            let gpu = Gpu::new(dh, wh, settings.clear_color)?;
            let modes = gpu.supported_present_modes()?;
            let present_mode = present_mode::validate(settings.present_mode, &modes)?;

            let mut chain = SwapchainManager::new(ChainConfig {
                format: gpu.format(),
                present_mode,
                opaque: settings.opaque,
            });
            chain.create(&gpu, size).context("create swapchain")?;
            info!("Vulkan renderer ready ({}x{})", size.width, size.height);

            Ok(Self {
                chain,
                frames: FrameScheduler::new(settings.report_interval, settings.tearing),
                gpu,
            })
        }
    }
}

impl Renderer for VkRenderer {
    fn resize(&mut self, size: RenderSize) -> Result<()> {
        unsafe { self.chain.recreate(&self.gpu, size) }.context("recreate swapchain")?;
        Ok(())
    }

    fn render(
        &mut self,
        transform: OutputTransform,
        surface: &mut dyn SurfaceSink,
    ) -> Result<FrameStatus> {
        let chain = self
            .chain
            .current()
            .ok_or_else(|| anyhow!("render called without a swapchain"))?;
        let status =
            unsafe { self.frames.draw(&self.gpu, chain, transform, Instant::now(), surface) }?;
        Ok(status)
    }
}

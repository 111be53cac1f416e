// SPDX-License-Identifier: CEPL-1.0
//! Presentable-image chain and the per-image resources built on it.
//!
//! The chain is owned by [`SwapchainManager`]; a create that fails part-way
//! releases everything it already made before returning. `destroy` does not
//! wait on the per-image fences. The frame scheduler drains the queue at the
//! end of every frame, so nothing submitted can still reference the chain
//! when it is torn down.

use std::mem;

use ash::vk;
use lumen_render::RenderSize;
use thiserror::Error;
use tracing::{debug, info};

use crate::device::ChainDevice;
use crate::present_mode::pm_name;

pub const MAX_IMAGES: usize = 4;
const PREFERRED_IMAGE_COUNT: u32 = 2;

#[derive(Debug, Error)]
pub enum SwapchainError {
    #[error("swapchain already created; destroy it before creating another")]
    AlreadyCreated,
    #[error("surface does not support composite alpha {0:?}")]
    CompositeAlphaUnsupported(vk::CompositeAlphaFlagsKHR),
    #[error("queue family cannot present to this surface")]
    PresentationUnsupported,
    #[error("surface minimum image count {0} exceeds {MAX_IMAGES}")]
    MinImageCountTooLarge(u32),
    #[error("swapchain returned {0} images, more than {MAX_IMAGES}")]
    TooManyImages(usize),
    #[error("swapchain returned no images")]
    NoImages,
    #[error("{op} failed: {source}")]
    Vk {
        op: &'static str,
        #[source]
        source: vk::Result,
    },
}

fn vk_err(op: &'static str) -> impl FnOnce(vk::Result) -> SwapchainError {
    move |source| SwapchainError::Vk { op, source }
}

/// Resources that exist once per chain image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PresentableImage {
    pub view: vk::ImageView,
    pub framebuffer: vk::Framebuffer,
    /// Signaled at creation; tracks the last submit of `cmd`.
    pub fence: vk::Fence,
    pub cmd: vk::CommandBuffer,
}

#[derive(Clone, Copy, Debug)]
pub struct ChainConfig {
    pub format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub opaque: bool,
}

impl ChainConfig {
    fn composite_alpha(&self) -> vk::CompositeAlphaFlagsKHR {
        if self.opaque {
            vk::CompositeAlphaFlagsKHR::OPAQUE
        } else {
            vk::CompositeAlphaFlagsKHR::PRE_MULTIPLIED
        }
    }
}

#[derive(Debug)]
pub struct Swapchain {
    handle: vk::SwapchainKHR,
    format: vk::Format,
    present_mode: vk::PresentModeKHR,
    extent: vk::Extent2D,
    images: Vec<PresentableImage>,
    image_acquired: vk::Semaphore,
    render_finished: vk::Semaphore,
}

impl Swapchain {
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    pub fn format(&self) -> vk::Format {
        self.format
    }

    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn images(&self) -> &[PresentableImage] {
        &self.images
    }

    pub fn image(&self, index: u32) -> Option<&PresentableImage> {
        self.images.get(index as usize)
    }

    /// Shared by every image; safe only because at most one frame is in flight.
    pub fn image_acquired(&self) -> vk::Semaphore {
        self.image_acquired
    }

    pub fn render_finished(&self) -> vk::Semaphore {
        self.render_finished
    }
}

/// Image count to ask for: two, raised to the surface minimum and capped at
/// its maximum when it has one.
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> Result<u32, SwapchainError> {
    if caps.min_image_count as usize > MAX_IMAGES {
        return Err(SwapchainError::MinImageCountTooLarge(caps.min_image_count));
    }
    let mut count = PREFERRED_IMAGE_COUNT.max(caps.min_image_count);
    if caps.max_image_count > 0 {
        count = count.min(caps.max_image_count);
    }
    Ok(count)
}

pub fn extent_from_caps(caps: &vk::SurfaceCapabilitiesKHR, want: RenderSize) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: want
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: want
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

// Release order per image: command buffer, fence, framebuffer, view. Then the
// chain, then both semaphores. Null handles are skipped.
unsafe fn release<D: ChainDevice + ?Sized>(
    dev: &D,
    handle: vk::SwapchainKHR,
    images: &[PresentableImage],
    semaphores: [vk::Semaphore; 2],
) {
    for img in images {
        if img.cmd != vk::CommandBuffer::null() {
            dev.free_command_buffer(img.cmd);
        }
        if img.fence != vk::Fence::null() {
            dev.destroy_fence(img.fence);
        }
        if img.framebuffer != vk::Framebuffer::null() {
            dev.destroy_framebuffer(img.framebuffer);
        }
        if img.view != vk::ImageView::null() {
            dev.destroy_image_view(img.view);
        }
    }
    if handle != vk::SwapchainKHR::null() {
        dev.destroy_swapchain(handle);
    }
    for sem in semaphores {
        if sem != vk::Semaphore::null() {
            dev.destroy_semaphore(sem);
        }
    }
}

/// A chain under construction. Dropping it releases whatever was created.
struct Building<'d, D: ChainDevice + ?Sized> {
    dev: &'d D,
    handle: vk::SwapchainKHR,
    images: Vec<PresentableImage>,
    image_acquired: vk::Semaphore,
    render_finished: vk::Semaphore,
}

impl<'d, D: ChainDevice + ?Sized> Building<'d, D> {
    fn new(dev: &'d D) -> Self {
        Self {
            dev,
            handle: vk::SwapchainKHR::null(),
            images: Vec::new(),
            image_acquired: vk::Semaphore::null(),
            render_finished: vk::Semaphore::null(),
        }
    }

    fn finish(
        mut self,
        format: vk::Format,
        present_mode: vk::PresentModeKHR,
        extent: vk::Extent2D,
    ) -> Swapchain {
        Swapchain {
            handle: mem::take(&mut self.handle),
            format,
            present_mode,
            extent,
            images: mem::take(&mut self.images),
            image_acquired: mem::take(&mut self.image_acquired),
            render_finished: mem::take(&mut self.render_finished),
        }
    }
}

impl<D: ChainDevice + ?Sized> Drop for Building<'_, D> {
    fn drop(&mut self) {
        unsafe {
            release(
                self.dev,
                self.handle,
                &self.images,
                [self.image_acquired, self.render_finished],
            );
        }
    }
}

pub struct SwapchainManager {
    config: ChainConfig,
    current: Option<Swapchain>,
}

impl SwapchainManager {
    pub fn new(config: ChainConfig) -> Self {
        Self { config, current: None }
    }

    pub fn current(&self) -> Option<&Swapchain> {
        self.current.as_ref()
    }

    /// Build the chain at `size`.
    ///
    /// # Safety
    /// `dev` must be the device every later `destroy`/`recreate` is given.
    pub unsafe fn create<D: ChainDevice + ?Sized>(
        &mut self,
        dev: &D,
        size: RenderSize,
    ) -> Result<&Swapchain, SwapchainError> {
        if self.current.is_some() {
            return Err(SwapchainError::AlreadyCreated);
        }

        let caps = dev
            .surface_capabilities()
            .map_err(vk_err("get_physical_device_surface_capabilities"))?;
        let alpha = self.config.composite_alpha();
        if !caps.supported_composite_alpha.contains(alpha) {
            return Err(SwapchainError::CompositeAlphaUnsupported(alpha));
        }
        if !dev
            .surface_supported()
            .map_err(vk_err("get_physical_device_surface_support"))?
        {
            return Err(SwapchainError::PresentationUnsupported);
        }

        let min_image_count = choose_image_count(&caps)?;
        let extent = extent_from_caps(&caps, size);
        let format = self.config.format;
        let families = [dev.queue_family()];

        let info = vk::SwapchainCreateInfoKHR {
            s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
            surface: dev.surface(),
            min_image_count,
            image_format: format.format,
            image_color_space: format.color_space,
            image_extent: extent,
            image_array_layers: 1,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            image_sharing_mode: vk::SharingMode::EXCLUSIVE,
            queue_family_index_count: families.len() as u32,
            p_queue_family_indices: families.as_ptr(),
            pre_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
            composite_alpha: alpha,
            present_mode: self.config.present_mode,
            clipped: vk::TRUE,
            ..Default::default()
        };

        let mut chain = Building::new(dev);
        chain.handle = dev
            .create_swapchain(&info)
            .map_err(vk_err("create_swapchain"))?;

        let images = dev
            .swapchain_images(chain.handle)
            .map_err(vk_err("get_swapchain_images"))?;
        if images.is_empty() {
            return Err(SwapchainError::NoImages);
        }
        if images.len() > MAX_IMAGES {
            return Err(SwapchainError::TooManyImages(images.len()));
        }

        for (i, &image) in images.iter().enumerate() {
            chain.images.push(PresentableImage::default());
            let slot = &mut chain.images[i];
            slot.view = dev
                .create_image_view(image, format.format)
                .map_err(vk_err("create_image_view"))?;
            slot.framebuffer = dev
                .create_framebuffer(slot.view, extent)
                .map_err(vk_err("create_framebuffer"))?;
            slot.fence = dev.create_fence(true).map_err(vk_err("create_fence"))?;
            slot.cmd = dev
                .allocate_command_buffer()
                .map_err(vk_err("allocate_command_buffers"))?;
        }

        chain.image_acquired = dev
            .create_semaphore()
            .map_err(vk_err("create_semaphore"))?;
        chain.render_finished = dev
            .create_semaphore()
            .map_err(vk_err("create_semaphore"))?;

        let chain = chain.finish(format.format, self.config.present_mode, extent);
        info!(
            "swapchain {}x{}, {} images, fmt {:?}, present {}",
            extent.width,
            extent.height,
            chain.image_count(),
            chain.format(),
            pm_name(chain.present_mode())
        );
        Ok(self.current.insert(chain))
    }

    /// Free the chain and every per-image resource. No-op without a chain.
    ///
    /// # Safety
    /// No submitted work may still use the chain; this does not wait.
    pub unsafe fn destroy<D: ChainDevice + ?Sized>(&mut self, dev: &D) {
        if let Some(chain) = self.current.take() {
            release(
                dev,
                chain.handle,
                &chain.images,
                [chain.image_acquired, chain.render_finished],
            );
        }
    }

    /// # Safety
    /// Same as [`Self::destroy`].
    pub unsafe fn recreate<D: ChainDevice + ?Sized>(
        &mut self,
        dev: &D,
        size: RenderSize,
    ) -> Result<&Swapchain, SwapchainError> {
        debug!(width = size.width, height = size.height, "recreate swapchain");
        self.destroy(dev);
        self.create(dev, size)
    }
}

// SPDX-License-Identifier: CEPL-1.0
//! The slices of the Vulkan device the swapchain manager and the frame
//! scheduler need. [`crate::gpu::Gpu`] implements both on top of ash.
//!
//! Every method is a thin wrapper over one Vulkan entry point and carries the
//! same safety contract: handles passed in must come from the same device,
//! and must not be in use by pending GPU work when destroyed.

use ash::prelude::VkResult;
use ash::vk;
use lumen_math::Mat4;

pub trait ChainDevice {
    fn surface(&self) -> vk::SurfaceKHR;
    fn queue_family(&self) -> u32;

    unsafe fn surface_capabilities(&self) -> VkResult<vk::SurfaceCapabilitiesKHR>;
    /// Whether the queue family can present to the surface.
    unsafe fn surface_supported(&self) -> VkResult<bool>;

    unsafe fn create_swapchain(
        &self,
        info: &vk::SwapchainCreateInfoKHR<'_>,
    ) -> VkResult<vk::SwapchainKHR>;
    unsafe fn destroy_swapchain(&self, chain: vk::SwapchainKHR);
    unsafe fn swapchain_images(&self, chain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>>;

    unsafe fn create_image_view(
        &self,
        image: vk::Image,
        format: vk::Format,
    ) -> VkResult<vk::ImageView>;
    unsafe fn destroy_image_view(&self, view: vk::ImageView);

    unsafe fn create_framebuffer(
        &self,
        view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> VkResult<vk::Framebuffer>;
    unsafe fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer);

    unsafe fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence>;
    unsafe fn destroy_fence(&self, fence: vk::Fence);

    unsafe fn allocate_command_buffer(&self) -> VkResult<vk::CommandBuffer>;
    unsafe fn free_command_buffer(&self, cmd: vk::CommandBuffer);

    unsafe fn create_semaphore(&self) -> VkResult<vk::Semaphore>;
    unsafe fn destroy_semaphore(&self, semaphore: vk::Semaphore);
}

pub trait FrameDevice {
    /// Blocks without timeout. `Ok((index, true))` means suboptimal.
    unsafe fn acquire_next_image(
        &self,
        chain: vk::SwapchainKHR,
        signal: vk::Semaphore,
    ) -> VkResult<(u32, bool)>;

    unsafe fn wait_and_reset_fence(&self, fence: vk::Fence) -> VkResult<()>;

    /// Overwrite the host-mapped rotation uniform.
    unsafe fn write_rotation(&self, rotation: &Mat4);

    unsafe fn record_draw(
        &self,
        cmd: vk::CommandBuffer,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
    ) -> VkResult<()>;

    unsafe fn submit(
        &self,
        cmd: vk::CommandBuffer,
        wait: vk::Semaphore,
        signal: vk::Semaphore,
        fence: vk::Fence,
    ) -> VkResult<()>;

    /// `Ok(true)` means suboptimal.
    unsafe fn present(
        &self,
        chain: vk::SwapchainKHR,
        index: u32,
        wait: vk::Semaphore,
    ) -> VkResult<bool>;

    /// Wait until the queue has no work left.
    unsafe fn drain_queue(&self) -> VkResult<()>;
}
